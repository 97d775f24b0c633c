use crate::domain::transaction::GatewayTransactionDetail;
use crate::error::{GatewayError, PaymentError, PaymentResult};
use crate::gateways::{
    GatewayCredentials, HostedGateway, PageAction, PaymentPage, TokenAuthorization, TokenCharge,
    UniqueKeyCheck,
};
use chrono::NaiveDateTime;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Init {
        session_key: String,
        action: PageAction,
        terminal: String,
        total_minor: i64,
        max_payments: i32,
    },
    Fetch {
        transaction_id: String,
        terminal: String,
    },
    FetchWindow {
        approval_number: String,
    },
    Validate {
        session_key: String,
        total_minor: i64,
        terminal: String,
    },
    Charge {
        token: String,
        total_minor: i64,
        currency_code: u16,
        terminal: String,
    },
    Authorize {
        token: String,
        terminal: String,
    },
}

/// Scripted outcomes for each gateway operation.
#[derive(Debug, Clone)]
pub struct MockScript {
    pub init_error: Option<GatewayError>,
    pub fetch_error: Option<GatewayError>,
    pub unique_key_valid: bool,
    pub charge_error: Option<GatewayError>,
    pub transaction: GatewayTransactionDetail,
    pub ledger: Vec<GatewayTransactionDetail>,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            init_error: None,
            fetch_error: None,
            unique_key_valid: true,
            charge_error: None,
            transaction: GatewayTransactionDetail {
                card_number_masked: Some("458045******4580".to_string()),
                card_brand: Some("1".to_string()),
                approval_number: Some("0123456".to_string()),
                total_payments: Some("1".to_string()),
                ..Default::default()
            },
            ledger: Vec::new(),
        }
    }
}

/// In-process gateway for local runs and tests; records every call it receives.
pub struct MockGateway {
    pub page_base_url: String,
    script: Mutex<MockScript>,
    calls: Mutex<Vec<GatewayCall>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockGateway {
    pub fn new(page_base_url: &str) -> Self {
        Self {
            page_base_url: page_base_url.trim_end_matches('/').to_string(),
            script: Mutex::new(MockScript::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(self, script: MockScript) -> Self {
        *lock(&self.script) = script;
        self
    }

    pub fn script(&self, edit: impl FnOnce(&mut MockScript)) {
        edit(&mut lock(&self.script));
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, matches: impl Fn(&GatewayCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: GatewayCall) {
        lock(&self.calls).push(call);
    }

    fn current(&self) -> MockScript {
        lock(&self.script).clone()
    }
}

#[async_trait::async_trait]
impl HostedGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn init_redirect(&self, creds: &GatewayCredentials, page: &PaymentPage) -> PaymentResult<String> {
        self.record(GatewayCall::Init {
            session_key: page.session_key.clone(),
            action: page.action,
            terminal: creds.terminal.clone(),
            total_minor: page.total_minor,
            max_payments: page.max_payments,
        });
        if let Some(e) = self.current().init_error {
            return Err(e.into());
        }
        Ok(format!("{}/{}", self.page_base_url, uuid::Uuid::new_v4()))
    }

    async fn fetch_transaction(
        &self,
        creds: &GatewayCredentials,
        transaction_id: &str,
    ) -> PaymentResult<GatewayTransactionDetail> {
        self.record(GatewayCall::Fetch {
            transaction_id: transaction_id.to_string(),
            terminal: creds.terminal.clone(),
        });
        let script = self.current();
        if let Some(e) = script.fetch_error {
            return Err(e.into());
        }
        Ok(GatewayTransactionDetail {
            transaction_id: Some(transaction_id.to_string()),
            ..script.transaction
        })
    }

    async fn fetch_transaction_by_window(
        &self,
        _creds: &GatewayCredentials,
        around: NaiveDateTime,
        approval_number: &str,
    ) -> PaymentResult<GatewayTransactionDetail> {
        self.record(GatewayCall::FetchWindow {
            approval_number: approval_number.to_string(),
        });
        self.current()
            .ledger
            .into_iter()
            .find(|t| t.approval_number.as_deref() == Some(approval_number))
            .ok_or_else(|| PaymentError::NotFound {
                around: around.format("%Y-%m-%d %H:%M:%S").to_string(),
                approval_number: approval_number.to_string(),
            })
    }

    async fn validate_unique_key(&self, creds: &GatewayCredentials, check: &UniqueKeyCheck) -> PaymentResult<bool> {
        self.record(GatewayCall::Validate {
            session_key: check.session_key.clone(),
            total_minor: check.total_minor,
            terminal: creds.terminal.clone(),
        });
        Ok(self.current().unique_key_valid)
    }

    async fn charge_by_token(
        &self,
        creds: &GatewayCredentials,
        charge: &TokenCharge,
    ) -> PaymentResult<GatewayTransactionDetail> {
        self.record(GatewayCall::Charge {
            token: charge.token.clone(),
            total_minor: charge.total_minor,
            currency_code: charge.currency_code,
            terminal: creds.terminal.clone(),
        });
        let script = self.current();
        if let Some(e) = script.charge_error {
            return Err(e.into());
        }
        Ok(GatewayTransactionDetail {
            transaction_id: Some(format!("mock_txn_{}", uuid::Uuid::new_v4())),
            debit_total: Some(charge.total_minor.to_string()),
            debit_currency: Some(charge.currency_code.to_string()),
            approval_number: charge.approval_number.clone().or(script.transaction.approval_number),
            merchant_param: Some(charge.merchant_param.clone()).filter(|p| !p.is_empty()),
            ..Default::default()
        })
    }

    async fn authorize(
        &self,
        creds: &GatewayCredentials,
        authorization: &TokenAuthorization,
    ) -> PaymentResult<GatewayTransactionDetail> {
        self.record(GatewayCall::Authorize {
            token: authorization.token.clone(),
            terminal: creds.terminal.clone(),
        });
        Ok(GatewayTransactionDetail {
            transaction_id: Some(format!("mock_auth_{}", uuid::Uuid::new_v4())),
            debit_total: Some("100".to_string()),
            debit_currency: Some("1".to_string()),
            ..self.current().transaction
        })
    }
}
