use crate::domain::callback::GatewayCallback;
use crate::domain::session::{NewSession, PaymentSession, SessionStatus};
use crate::domain::transaction::{GatewayTransactionDetail, RecordedTransaction, TransactionSource};
use async_trait::async_trait;

/// Append-only session log. Every read of a key resolves to its newest revision.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &NewSession) -> anyhow::Result<PaymentSession>;

    async fn current_session(&self, session_key: &str) -> anyhow::Result<Option<PaymentSession>>;

    /// Appends a copy of the newest revision with `status`; `None` when the key is unknown.
    async fn append_status(
        &self,
        session_key: &str,
        status: SessionStatus,
    ) -> anyhow::Result<Option<PaymentSession>>;

    /// Every revision for the key, oldest first.
    async fn session_history(&self, session_key: &str) -> anyhow::Result<Vec<PaymentSession>>;

    async fn record_callback(&self, callback: &GatewayCallback) -> anyhow::Result<()>;

    async fn callbacks_for(&self, session_key: &str) -> anyhow::Result<Vec<GatewayCallback>>;

    async fn record_transaction(
        &self,
        session_key: &str,
        source: TransactionSource,
        detail: &GatewayTransactionDetail,
    ) -> anyhow::Result<()>;

    async fn transactions_for(&self, session_key: &str) -> anyhow::Result<Vec<RecordedTransaction>>;

    async fn ping(&self) -> anyhow::Result<()>;
}
