use crate::domain::transaction::GatewayTransactionDetail;
use crate::error::{ErrorPayload, PaymentError, PaymentResult};
use crate::service::redirect::RedirectTarget;
use axum::http::header::ACCEPT;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// How a route talks back: a browser page or a JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Browser,
    Api,
}

#[derive(Serialize)]
struct ApiFailure {
    status: &'static str,
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ApiData<'a> {
    status: &'static str,
    data: &'a GatewayTransactionDetail,
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Page that sends the browser on to `url`.
pub fn redirect_page(url: &str) -> Response {
    let attr = escape_html(url);
    let script_url = serde_json::to_string(url)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/");
    Html(format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"0;url={attr}\">\
         <script>window.location.replace({script_url});</script></head>\
         <body><a href=\"{attr}\">Continue</a></body></html>"
    ))
    .into_response()
}

pub fn error_page(err: &PaymentError) -> Response {
    let body = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body>\
         <h1 style=\"color: red;\">Error <code>{}</code></h1><p>{}</p></body></html>",
        escape_html(err.code()),
        escape_html(&err.to_string())
    );
    (err.status_code(), Html(body)).into_response()
}

pub fn api_error(err: &PaymentError) -> Response {
    let body = ApiFailure {
        status: "error",
        error: crate::error::ErrorEnvelope::from(err).error,
    };
    (err.status_code(), Json(body)).into_response()
}

pub fn failure(style: Style, err: &PaymentError) -> Response {
    match style {
        Style::Browser => error_page(err),
        Style::Api => api_error(err),
    }
}

/// Renders a redirect outcome in the route's style.
pub fn redirect(style: Style, result: PaymentResult<RedirectTarget>) -> Response {
    match (style, result) {
        (Style::Browser, Ok(target)) => redirect_page(&target.url),
        (Style::Api, Ok(target)) => (StatusCode::OK, Json(target)).into_response(),
        (style, Err(e)) => failure(style, &e),
    }
}

pub fn transaction(result: PaymentResult<GatewayTransactionDetail>) -> Response {
    match result {
        Ok(detail) => (
            StatusCode::OK,
            Json(ApiData {
                status: "success",
                data: &detail,
            }),
        )
            .into_response(),
        Err(e) => api_error(&e),
    }
}

/// `status=SUCCESS` / `status=FAILURE`, or JSON when the caller asks for it.
pub fn confirmation(headers: &HeaderMap, confirmed: bool) -> Response {
    let word = if confirmed { "SUCCESS" } else { "FAILURE" };
    let wants_json = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|a| a.contains("application/json"));
    if wants_json {
        (StatusCode::OK, Json(serde_json::json!({ "status": word }))).into_response()
    } else {
        (StatusCode::OK, format!("status={word}")).into_response()
    }
}
