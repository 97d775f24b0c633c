use crate::error::{ErrorEnvelope, ErrorPayload};
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Guards server-to-server routes with the shared `X-Internal-Api-Key` header.
pub async fn require_internal_api_key(
    State(expected): State<String>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("X-Internal-Api-Key")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if expected.is_empty() || provided != expected {
        tracing::warn!(path = %request.uri().path(), "rejected request without a valid internal api key");
        let body = ErrorEnvelope {
            error: ErrorPayload {
                code: "UNAUTHORIZED".to_string(),
                message: "missing or invalid internal api key".to_string(),
                details: None,
            },
        };
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }

    next.run(request).await
}
