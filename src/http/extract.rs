use crate::error::{ErrorEnvelope, PaymentError};
use axum::extract::{FromRequest, Query, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::de::DeserializeOwned;

/// Request input from the query string (GET), a JSON body, or a form body.
pub struct Payload<T>(pub T);

fn rejection(message: String) -> Response {
    let err = PaymentError::validation("request", message);
    (StatusCode::BAD_REQUEST, Json(ErrorEnvelope::from(&err))).into_response()
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if req.method() == Method::GET {
            let Query(value) = Query::<T>::try_from_uri(req.uri()).map_err(|e| rejection(e.body_text()))?;
            return Ok(Self(value));
        }

        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| rejection(e.body_text()))?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| rejection(e.body_text()))?;
            Ok(Self(value))
        }
    }
}
