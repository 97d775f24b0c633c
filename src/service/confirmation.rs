use crate::domain::session::{Currency, SessionStatus};
use crate::error::PaymentResult;
use crate::repo::session_store::SessionStore;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfirmRequest {
    #[serde(alias = "userKey")]
    pub session_key: String,
    #[serde(alias = "price")]
    pub amount: Option<Decimal>,
    pub currency: String,
    pub sku: String,
    pub reference: String,
    pub organization: String,
}

/// Answers "did this exact payment succeed?" for merchant back-ends.
#[derive(Clone)]
pub struct ConfirmationOracle {
    pub store: Arc<dyn SessionStore>,
}

impl ConfirmationOracle {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// True only when the newest revision for the key is `valid` and matches every field.
    pub async fn confirm(&self, req: &ConfirmRequest) -> PaymentResult<bool> {
        let Some(session) = self.store.current_session(req.session_key.trim()).await? else {
            return Ok(false);
        };
        let matches = session.status == SessionStatus::Valid
            && req.amount == Some(session.amount)
            && Currency::parse(req.currency.trim()) == Some(session.currency)
            && req.sku == session.sku
            && req.reference == session.reference
            && req.organization == session.organization;
        tracing::info!(
            session_key = %session.session_key,
            status = %session.status,
            confirmed = matches,
            "confirmation query"
        );
        Ok(matches)
    }
}
