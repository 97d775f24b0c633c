use crate::domain::callback::GatewayCallback;
use crate::domain::session::{NewSession, PaymentSession, SessionStatus};
use crate::domain::transaction::{GatewayTransactionDetail, RecordedTransaction, TransactionSource};
use crate::repo::session_store::SessionStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    next_id: i64,
    sessions: Vec<PaymentSession>,
    callbacks: Vec<GatewayCallback>,
    transactions: Vec<RecordedTransaction>,
}

/// Process-local session log for tests and `STORE=memory` runs.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn push_revision(&mut self, mut session: PaymentSession) -> PaymentSession {
        self.next_id += 1;
        session.revision_id = self.next_id;
        session.recorded_at = Utc::now();
        self.sessions.push(session.clone());
        session
    }

    fn latest(&self, session_key: &str) -> Option<&PaymentSession> {
        self.sessions.iter().rev().find(|s| s.session_key == session_key)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert_session(&self, session: &NewSession) -> anyhow::Result<PaymentSession> {
        let mut tables = self.tables.write().await;
        let row = PaymentSession::from_new(0, session, Utc::now());
        Ok(tables.push_revision(row))
    }

    async fn current_session(&self, session_key: &str) -> anyhow::Result<Option<PaymentSession>> {
        let tables = self.tables.read().await;
        Ok(tables.latest(session_key).cloned())
    }

    async fn append_status(
        &self,
        session_key: &str,
        status: SessionStatus,
    ) -> anyhow::Result<Option<PaymentSession>> {
        let mut tables = self.tables.write().await;
        let Some(mut row) = tables.latest(session_key).cloned() else {
            return Ok(None);
        };
        row.status = status;
        Ok(Some(tables.push_revision(row)))
    }

    async fn session_history(&self, session_key: &str) -> anyhow::Result<Vec<PaymentSession>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .iter()
            .filter(|s| s.session_key == session_key)
            .cloned()
            .collect())
    }

    async fn record_callback(&self, callback: &GatewayCallback) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        tables.callbacks.push(callback.clone());
        Ok(())
    }

    async fn callbacks_for(&self, session_key: &str) -> anyhow::Result<Vec<GatewayCallback>> {
        let tables = self.tables.read().await;
        Ok(tables
            .callbacks
            .iter()
            .filter(|c| c.session_key == session_key)
            .cloned()
            .collect())
    }

    async fn record_transaction(
        &self,
        session_key: &str,
        source: TransactionSource,
        detail: &GatewayTransactionDetail,
    ) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        tables.transactions.push(RecordedTransaction {
            session_key: session_key.to_string(),
            source,
            detail: detail.clone(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn transactions_for(&self, session_key: &str) -> anyhow::Result<Vec<RecordedTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .filter(|t| t.session_key == session_key)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::{ChargeMode, Currency, Language, Payer};
    use rust_decimal_macros::dec;

    fn new_session(key: &str, amount: rust_decimal::Decimal) -> NewSession {
        NewSession {
            session_id: uuid::Uuid::new_v4(),
            session_key: key.to_string(),
            organization: "ben2".to_string(),
            charge_mode: ChargeMode::OneTime,
            amount,
            currency: Currency::Usd,
            installments_requested: 1,
            installments_min: 1,
            installments_max: 1,
            success_url: "https://shop.example/ok".to_string(),
            failure_url: "https://shop.example/fail".to_string(),
            cancel_url: "https://shop.example/cancel".to_string(),
            reference: "ref".to_string(),
            sku: "sku".to_string(),
            payer: Payer::default(),
            participants: String::new(),
            details: String::new(),
            vat: false,
            language: Language::En,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn latest_row_wins() {
        let store = InMemorySessionStore::new();
        store.insert_session(&new_session("k", dec!(10))).await.unwrap();
        store.insert_session(&new_session("k", dec!(20))).await.unwrap();
        let current = store.current_session("k").await.unwrap().unwrap();
        assert_eq!(current.amount, dec!(20));
        assert_eq!(store.session_history("k").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn status_appends_a_revision() {
        let store = InMemorySessionStore::new();
        let first = store.insert_session(&new_session("k", dec!(10))).await.unwrap();
        let next = store
            .append_status("k", SessionStatus::InProcess)
            .await
            .unwrap()
            .unwrap();
        assert!(next.revision_id > first.revision_id);
        assert_eq!(next.amount, first.amount);
        assert_eq!(store.session_history("k").await.unwrap()[0].status, SessionStatus::New);
        assert!(store.append_status("missing", SessionStatus::Valid).await.unwrap().is_none());
    }
}
