use crate::http::extract::Payload;
use crate::http::render;
use crate::service::confirmation::ConfirmRequest;
use crate::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;

pub async fn confirm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(req): Payload<ConfirmRequest>,
) -> Response {
    match state.confirmation.confirm(&req).await {
        Ok(confirmed) => render::confirmation(&headers, confirmed),
        Err(e) => {
            tracing::error!(error = %e, "confirmation query failed");
            render::confirmation(&headers, false)
        }
    }
}
