use crate::domain::session::{ChargeMode, CreateSessionRequest};
use crate::http::extract::Payload;
use crate::http::render::{self, Style};
use crate::service::redirect::{RedirectStatus, RedirectTarget};
use crate::AppState;
use axum::extract::State;
use axum::response::Response;

async fn create(state: &AppState, req: CreateSessionRequest, mode: ChargeMode) -> Response {
    let style = match mode {
        ChargeMode::OneTime => Style::Browser,
        ChargeMode::RecurringToken => Style::Api,
    };
    let result = state
        .orchestrator
        .create_session(req, mode)
        .await
        .map(|url| RedirectTarget {
            status: RedirectStatus::Success,
            url,
        });
    render::redirect(style, result)
}

/// One-time payment: answers with a page that forwards the payer to the gateway.
pub async fn new_payment(State(state): State<AppState>, Payload(req): Payload<CreateSessionRequest>) -> Response {
    create(&state, req, ChargeMode::OneTime).await
}

/// Card registration for recurring charges: answers `{status, url}`.
pub async fn new_token(State(state): State<AppState>, Payload(req): Payload<CreateSessionRequest>) -> Response {
    create(&state, req, ChargeMode::RecurringToken).await
}
