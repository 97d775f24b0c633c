use crate::domain::callback::{CallbackForm, CallbackKind};
use crate::http::extract::Payload;
use crate::http::render::{self, Style};
use crate::AppState;
use axum::extract::State;
use axum::response::Response;

async fn dispatch(state: &AppState, style: Style, kind: CallbackKind, form: CallbackForm) -> Response {
    let callback = form.into_callback(kind);
    tracing::info!(
        session_key = %callback.session_key,
        kind = kind.as_str(),
        gateway_status = %callback.gateway_status_code,
        "gateway callback received"
    );
    let result = match kind {
        CallbackKind::Success => state.orchestrator.handle_success(callback).await,
        CallbackKind::Failure => state.orchestrator.handle_failure(callback).await,
        CallbackKind::Cancel => state.orchestrator.handle_cancel(callback).await,
    };
    render::redirect(style, result)
}

pub async fn payment_good(State(state): State<AppState>, Payload(form): Payload<CallbackForm>) -> Response {
    dispatch(&state, Style::Browser, CallbackKind::Success, form).await
}

pub async fn payment_error(State(state): State<AppState>, Payload(form): Payload<CallbackForm>) -> Response {
    dispatch(&state, Style::Browser, CallbackKind::Failure, form).await
}

pub async fn payment_cancel(State(state): State<AppState>, Payload(form): Payload<CallbackForm>) -> Response {
    dispatch(&state, Style::Browser, CallbackKind::Cancel, form).await
}

pub async fn token_good(State(state): State<AppState>, Payload(form): Payload<CallbackForm>) -> Response {
    dispatch(&state, Style::Api, CallbackKind::Success, form).await
}

pub async fn token_error(State(state): State<AppState>, Payload(form): Payload<CallbackForm>) -> Response {
    dispatch(&state, Style::Api, CallbackKind::Failure, form).await
}

pub async fn token_cancel(State(state): State<AppState>, Payload(form): Payload<CallbackForm>) -> Response {
    dispatch(&state, Style::Api, CallbackKind::Cancel, form).await
}
