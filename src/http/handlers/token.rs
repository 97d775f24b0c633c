use crate::domain::session::ChargeRequest;
use crate::http::extract::Payload;
use crate::http::render;
use crate::service::orchestrator::AuthorizeRequest;
use crate::AppState;
use axum::extract::State;
use axum::response::Response;

pub async fn charge(State(state): State<AppState>, Payload(req): Payload<ChargeRequest>) -> Response {
    render::transaction(state.orchestrator.charge_recurring(req).await)
}

pub async fn authorize(State(state): State<AppState>, Payload(req): Payload<AuthorizeRequest>) -> Response {
    render::transaction(state.orchestrator.authorize_token(req).await)
}
