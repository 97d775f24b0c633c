use axum::http::StatusCode;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayErrorKind {
    /// Connection could not be established or was dropped.
    Transport,
    /// The bounded per-call timeout elapsed.
    Timeout,
    /// Non-2xx HTTP status.
    Http,
    /// The gateway answered 200 with an error envelope.
    Rejected,
    /// An expected field was absent or undecodable.
    MalformedResponse,
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Http => "http",
            Self::Rejected => "rejected",
            Self::MalformedResponse => "malformed response",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("gateway {kind} error {code}: {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub code: String,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::MalformedResponse, "MALFORMED", message)
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("validation failed: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("no transaction around {around} with approval number {approval_number}")]
    NotFound {
        around: String,
        approval_number: String,
    },

    #[error("unique-key validation rejected session {0}")]
    Authenticity(String),

    #[error("no payment session for key {0}")]
    SessionNotFound(String),

    #[error("session {session_key} is already {status}")]
    SessionClosed { session_key: String, status: String },

    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type PaymentResult<T> = Result<T, PaymentError>;

impl PaymentError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldViolation::new(field, message)])
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Gateway(e) if e.kind == GatewayErrorKind::Timeout => "GATEWAY_TIMEOUT",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::NotFound { .. } => "TRANSACTION_NOT_FOUND",
            Self::Authenticity(_) => "AUTHENTICITY_ERROR",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::SessionClosed { .. } => "SESSION_CLOSED",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Gateway(e) if e.kind == GatewayErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound { .. } | Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Authenticity(_) => StatusCode::FORBIDDEN,
            Self::SessionClosed { .. } => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Field-level details, present only for validation failures.
    pub fn violations(&self) -> Option<&[FieldViolation]> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<Vec<FieldViolation>>,
}

impl From<&PaymentError> for ErrorEnvelope {
    fn from(e: &PaymentError) -> Self {
        Self {
            error: ErrorPayload {
                code: e.code().to_string(),
                message: e.to_string(),
                details: e.violations().map(<[FieldViolation]>::to_vec),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_field() {
        let err = PaymentError::Validation(vec![
            FieldViolation::new("currency", "has illegal value"),
            FieldViolation::new("email", "is not a valid email address"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("currency has illegal value"));
        assert!(msg.contains("email is not a valid email address"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let err = PaymentError::from(GatewayError::new(GatewayErrorKind::Timeout, "TIMEOUT", "gateway timeout"));
        assert_eq!(err.code(), "GATEWAY_TIMEOUT");
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn envelope_carries_violations() {
        let err = PaymentError::validation("amount", "should be greater than 0.01");
        let env = ErrorEnvelope::from(&err);
        assert_eq!(env.error.code, "VALIDATION_ERROR");
        assert_eq!(env.error.details.map(|d| d.len()), Some(1));
    }
}
