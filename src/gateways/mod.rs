use crate::domain::transaction::GatewayTransactionDetail;
use crate::error::PaymentResult;
use crate::policy::Branding;
use chrono::NaiveDateTime;

pub mod credentials;
pub mod http_client;
pub mod messages;
pub mod mock;

pub use credentials::{GatewayCredentialResolver, GatewayCredentials, Terminal};

/// What the hosted page does with the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    /// Debit immediately (J4).
    Charge,
    /// Verify and tokenize the card without debiting it (J2).
    Register,
}

impl PageAction {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Charge => "J4",
            Self::Register => "J2",
        }
    }
}

/// Everything the gateway needs to render the hosted card page.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPage {
    pub action: PageAction,
    pub session_key: String,
    pub merchant_param: String,
    pub total_minor: i64,
    pub currency_code: u16,
    pub min_payments: i32,
    pub max_payments: i32,
    pub branding: Branding,
    pub good_url: String,
    pub error_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKeyCheck {
    pub confirmation_key: String,
    pub session_key: String,
    pub total_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCharge {
    pub token: String,
    pub approval_number: Option<String>,
    pub total_minor: i64,
    pub currency_code: u16,
    pub merchant_param: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAuthorization {
    pub token: String,
    pub merchant_param: String,
}

/// One round trip per call; no retries.
#[async_trait::async_trait]
pub trait HostedGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn init_redirect(&self, creds: &GatewayCredentials, page: &PaymentPage) -> PaymentResult<String>;

    async fn fetch_transaction(
        &self,
        creds: &GatewayCredentials,
        transaction_id: &str,
    ) -> PaymentResult<GatewayTransactionDetail>;

    /// Searches five minutes either side of `around` for the approval number.
    async fn fetch_transaction_by_window(
        &self,
        creds: &GatewayCredentials,
        around: NaiveDateTime,
        approval_number: &str,
    ) -> PaymentResult<GatewayTransactionDetail>;

    async fn validate_unique_key(&self, creds: &GatewayCredentials, check: &UniqueKeyCheck) -> PaymentResult<bool>;

    async fn charge_by_token(
        &self,
        creds: &GatewayCredentials,
        charge: &TokenCharge,
    ) -> PaymentResult<GatewayTransactionDetail>;

    async fn authorize(
        &self,
        creds: &GatewayCredentials,
        authorization: &TokenAuthorization,
    ) -> PaymentResult<GatewayTransactionDetail>;
}
