use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackKind {
    Success,
    Failure,
    Cancel,
}

impl CallbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Cancel => "CANCEL",
        }
    }
}

impl FromStr for CallbackKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            "CANCEL" => Ok(Self::Cancel),
            other => Err(anyhow::anyhow!("unknown callback kind {other}")),
        }
    }
}

/// Raw data received on a gateway redirect-back, kept verbatim for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayCallback {
    pub session_key: String,
    pub kind: CallbackKind,
    pub gateway_transaction_id: String,
    pub gateway_status_code: String,
    pub confirmation_key: String,
    pub approval_number: String,
    pub card_token: Option<String>,
    pub merchant_param: String,
    pub received_at: DateTime<Utc>,
}

/// Form body the gateway posts back through the browser.
///
/// The gateway posts its own field names; both spellings are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallbackForm {
    #[serde(alias = "UserKey")]
    pub session_key: String,
    #[serde(alias = "PelecardTransactionId")]
    pub gateway_transaction_id: String,
    #[serde(alias = "PelecardStatusCode")]
    pub gateway_status_code: String,
    #[serde(alias = "ConfirmationKey")]
    pub confirmation_key: String,
    #[serde(alias = "ApprovalNo")]
    pub approval_number: String,
    #[serde(alias = "Token")]
    pub card_token: Option<String>,
    #[serde(alias = "ParamX")]
    pub merchant_param: String,
}

impl CallbackForm {
    pub fn into_callback(self, kind: CallbackKind) -> GatewayCallback {
        GatewayCallback {
            session_key: self.session_key.trim().to_string(),
            kind,
            gateway_transaction_id: self.gateway_transaction_id,
            gateway_status_code: self.gateway_status_code,
            confirmation_key: self.confirmation_key,
            approval_number: self.approval_number,
            card_token: self.card_token.filter(|t| !t.trim().is_empty()),
            merchant_param: self.merchant_param,
            received_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_is_dropped() {
        let form = CallbackForm {
            session_key: " k-1 ".to_string(),
            card_token: Some("  ".to_string()),
            ..Default::default()
        };
        let cb = form.into_callback(CallbackKind::Success);
        assert_eq!(cb.session_key, "k-1");
        assert!(cb.card_token.is_none());
    }

    #[test]
    fn accepts_gateway_field_names() {
        let form: CallbackForm = serde_json::from_value(serde_json::json!({
            "UserKey": "k-7",
            "PelecardTransactionId": "tx-1",
            "PelecardStatusCode": "000",
            "ConfirmationKey": "ck",
            "ApprovalNo": "0123",
            "Token": "tok",
            "ParamX": "ref-1"
        }))
        .unwrap();
        assert_eq!(form.session_key, "k-7");
        assert_eq!(form.gateway_transaction_id, "tx-1");
        assert_eq!(form.card_token.as_deref(), Some("tok"));
    }
}
