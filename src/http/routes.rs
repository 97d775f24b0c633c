use crate::http::handlers::{callbacks, confirm, ops, sessions, token, transactions};
use crate::http::middleware::internal_auth::require_internal_api_key;
use crate::AppState;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState, internal_api_key: String) -> Router {
    let internal_routes = Router::new()
        .route("/token/charge", post(token::charge))
        .route("/token/authorize", post(token::authorize))
        .layer(from_fn_with_state(internal_api_key, require_internal_api_key));

    Router::new()
        .route("/health", get(ops::health))
        .route("/ops/liveness", get(ops::liveness))
        .route("/ops/readiness", get(ops::readiness))
        .route("/payments/new", get(sessions::new_payment).post(sessions::new_payment))
        .route("/payments/good", post(callbacks::payment_good))
        .route("/payments/error", post(callbacks::payment_error))
        .route("/payments/cancel", post(callbacks::payment_cancel))
        .route("/payments/confirm", get(confirm::confirm).post(confirm::confirm))
        .route("/payments/transaction", get(transactions::lookup).post(transactions::lookup))
        .route("/token/new", get(sessions::new_token).post(sessions::new_token))
        .route("/token/good", post(callbacks::token_good))
        .route("/token/error", post(callbacks::token_error))
        .route("/token/cancel", post(callbacks::token_cancel))
        .route("/token/confirm", get(confirm::confirm).post(confirm::confirm))
        .merge(internal_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
