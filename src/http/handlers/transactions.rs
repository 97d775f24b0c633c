use crate::http::extract::Payload;
use crate::http::render;
use crate::service::orchestrator::LookupRequest;
use crate::AppState;
use axum::extract::State;
use axum::response::Response;

pub async fn lookup(State(state): State<AppState>, Payload(req): Payload<LookupRequest>) -> Response {
    render::transaction(state.orchestrator.lookup_transaction(req).await)
}
