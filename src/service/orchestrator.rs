use crate::domain::callback::GatewayCallback;
use crate::domain::session::{
    to_minor_units, ChargeMode, ChargeRequest, CreateSessionRequest, Currency, Language, NewSession, Payer,
    PaymentSession, SessionStatus,
};
use crate::domain::transaction::{GatewayTransactionDetail, TransactionSource};
use crate::domain::validation::{
    authorize_schema, charge_schema, lookup_schema, parse_vat, session_schema, RequestValidator, LOOKUP_TIME_FORMAT,
};
use crate::error::{GatewayError, PaymentError, PaymentResult};
use crate::gateways::messages::status_message;
use crate::gateways::{
    GatewayCredentialResolver, HostedGateway, PageAction, PaymentPage, Terminal, TokenAuthorization, TokenCharge,
    UniqueKeyCheck,
};
use crate::policy::{OrganizationPolicy, PolicyTable};
use crate::repo::session_store::SessionStore;
use crate::service::redirect::{cancel_target, failure_target, success_target, RedirectTarget};
use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

pub use crate::domain::session::{AuthorizeRequest, LookupRequest};

/// Drives a payment session from creation through the gateway's redirect-back.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    pub store: Arc<dyn SessionStore>,
    pub gateway: Arc<dyn HostedGateway>,
    pub credentials: Arc<GatewayCredentialResolver>,
    pub policies: Arc<PolicyTable>,
    pub validator: Arc<RequestValidator>,
    pub public_base_url: String,
}

impl PaymentOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        gateway: Arc<dyn HostedGateway>,
        credentials: GatewayCredentialResolver,
        policies: PolicyTable,
        public_base_url: &str,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            store,
            gateway,
            credentials: Arc::new(credentials),
            policies: Arc::new(policies),
            validator: Arc::new(RequestValidator::new()?),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn callback_url(&self, mode: ChargeMode, kind: &str) -> String {
        let prefix = match mode {
            ChargeMode::OneTime => "payments",
            ChargeMode::RecurringToken => "token",
        };
        format!("{}/{prefix}/{kind}", self.public_base_url)
    }

    fn policy(&self, organization: &str) -> PaymentResult<&OrganizationPolicy> {
        self.policies
            .get(organization)
            .ok_or_else(|| PaymentError::Configuration(format!("unknown organization {organization}")))
    }

    /// Validates, records the session as `new`, and asks the gateway for its hosted page.
    pub async fn create_session(&self, req: CreateSessionRequest, mode: ChargeMode) -> PaymentResult<String> {
        self.validator
            .validate(&session_schema(&req, &self.policies.names()))
            .map_err(PaymentError::Validation)?;

        let policy = self.policy(req.organization.trim())?;
        let new = session_from_request(&req, mode, policy)?;
        let session = self.store.insert_session(&new).await?;
        tracing::info!(
            session_key = %session.session_key,
            organization = %session.organization,
            mode = session.charge_mode.as_str(),
            "payment session created"
        );

        let creds = self
            .credentials
            .resolve(&session.organization, Terminal::for_page(mode))?;
        let branding = policy.branding_for(session.language).clone();
        let page = PaymentPage {
            action: match mode {
                ChargeMode::OneTime => PageAction::Charge,
                ChargeMode::RecurringToken => PageAction::Register,
            },
            session_key: session.session_key.clone(),
            merchant_param: session.reference.clone(),
            total_minor: session.amount_minor()?,
            currency_code: session.currency.gateway_code(),
            min_payments: session.installments_min,
            max_payments: session.installments_max,
            branding,
            good_url: self.callback_url(mode, "good"),
            error_url: self.callback_url(mode, "error"),
            cancel_url: self.callback_url(mode, "cancel"),
        };

        match self.gateway.init_redirect(&creds, &page).await {
            Ok(url) => Ok(url),
            Err(e) => {
                tracing::warn!(session_key = %session.session_key, error = %e, "gateway page init failed");
                Err(e)
            }
        }
    }

    async fn require_session(&self, session_key: &str) -> PaymentResult<PaymentSession> {
        self.store
            .current_session(session_key)
            .await?
            .ok_or_else(|| PaymentError::SessionNotFound(session_key.to_string()))
    }

    async fn transition(&self, session: &PaymentSession, next: SessionStatus) -> PaymentResult<PaymentSession> {
        if session.status == next {
            return Ok(session.clone());
        }
        if !session.status.can_transition_to(next) {
            return Err(PaymentError::SessionClosed {
                session_key: session.session_key.clone(),
                status: session.status.to_string(),
            });
        }
        let updated = self
            .store
            .append_status(&session.session_key, next)
            .await?
            .ok_or_else(|| PaymentError::SessionNotFound(session.session_key.clone()))?;
        tracing::info!(
            session_key = %session.session_key,
            from = %session.status,
            to = %next,
            "session status changed"
        );
        Ok(updated)
    }

    /// Records `invalid` and hands back the error to surface. If the status
    /// cannot be written the store failure is returned instead, naming the cause.
    async fn mark_invalid(&self, session: &PaymentSession, cause: PaymentError) -> PaymentError {
        tracing::warn!(session_key = %session.session_key, error = %cause, "payment verification failed");
        match self.transition(session, SessionStatus::Invalid).await {
            Ok(_) => cause,
            Err(e) => {
                tracing::error!(session_key = %session.session_key, error = %e, "could not mark session invalid");
                PaymentError::Store(anyhow::anyhow!(
                    "session {} left {} after verification failed ({cause}): {e}",
                    session.session_key,
                    session.status
                ))
            }
        }
    }

    pub async fn handle_success(&self, callback: GatewayCallback) -> PaymentResult<RedirectTarget> {
        self.store.record_callback(&callback).await?;
        let session = self.require_session(&callback.session_key).await?;

        if session.status == SessionStatus::Valid {
            return self.replay_success(&session, &callback).await;
        }
        if session.status.is_terminal() {
            return Err(PaymentError::SessionClosed {
                session_key: session.session_key.clone(),
                status: session.status.to_string(),
            });
        }

        let session = self.transition(&session, SessionStatus::InProcess).await?;
        match self.verify(&session, &callback).await {
            Ok((detail, charge)) => {
                let session = self.transition(&session, SessionStatus::Valid).await?;
                Ok(self.success_redirect(&session, &detail, charge.as_ref()))
            }
            Err(e) => Err(self.mark_invalid(&session, e).await),
        }
    }

    /// A repeated success callback on a settled session: both verification calls
    /// run again, nothing is charged and the status stays `valid`.
    async fn replay_success(
        &self,
        session: &PaymentSession,
        callback: &GatewayCallback,
    ) -> PaymentResult<RedirectTarget> {
        tracing::info!(session_key = %session.session_key, "success callback replayed on valid session");
        let detail = match self.verify_ledger(session, callback).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(session_key = %session.session_key, error = %e, "replayed success callback failed verification");
                return Err(e);
            }
        };
        let charge = match session.charge_mode {
            ChargeMode::OneTime => None,
            ChargeMode::RecurringToken => self
                .store
                .transactions_for(&session.session_key)
                .await?
                .into_iter()
                .rev()
                .find(|t| t.source == TransactionSource::TokenCharge)
                .map(|t| t.detail),
        };
        Ok(self.success_redirect(session, &detail, charge.as_ref()))
    }

    /// Recurring redirects carry the token and approval number of the recorded debit.
    fn success_redirect(
        &self,
        session: &PaymentSession,
        detail: &GatewayTransactionDetail,
        charge: Option<&GatewayTransactionDetail>,
    ) -> RedirectTarget {
        let card = match session.charge_mode {
            ChargeMode::OneTime => None,
            ChargeMode::RecurringToken => Some((
                charge.and_then(|c| c.token.as_deref()).unwrap_or_default(),
                charge.and_then(|c| c.approval_number.as_deref()).unwrap_or_default(),
            )),
        };
        success_target(&session.success_url, &session.session_key, detail, card)
    }

    /// Ledger lookup then unique-key validation against the stored amount.
    async fn verify_ledger(
        &self,
        session: &PaymentSession,
        callback: &GatewayCallback,
    ) -> PaymentResult<GatewayTransactionDetail> {
        let creds = self
            .credentials
            .resolve(&session.organization, Terminal::for_page(session.charge_mode))?;

        let detail = self
            .gateway
            .fetch_transaction(&creds, &callback.gateway_transaction_id)
            .await?;
        self.store
            .record_transaction(&session.session_key, TransactionSource::Verification, &detail)
            .await?;

        let check = UniqueKeyCheck {
            confirmation_key: callback.confirmation_key.clone(),
            session_key: session.session_key.clone(),
            total_minor: session.amount_minor()?,
        };
        if !self.gateway.validate_unique_key(&creds, &check).await? {
            return Err(PaymentError::Authenticity(session.session_key.clone()));
        }
        Ok(detail)
    }

    /// Ledger verification; recurring sessions also take the first debit.
    async fn verify(
        &self,
        session: &PaymentSession,
        callback: &GatewayCallback,
    ) -> PaymentResult<(GatewayTransactionDetail, Option<GatewayTransactionDetail>)> {
        let detail = self.verify_ledger(session, callback).await?;
        if session.charge_mode != ChargeMode::RecurringToken {
            return Ok((detail, None));
        }
        let token = callback
            .card_token
            .as_deref()
            .ok_or_else(|| GatewayError::malformed("success callback carried no card token"))?;
        let approval = Some(callback.approval_number.clone())
            .filter(|a| !a.is_empty())
            .or_else(|| detail.approval_number.clone());
        let charge = self.debit(session, token, approval, session.amount).await?;
        Ok((detail, Some(charge)))
    }

    async fn debit(
        &self,
        session: &PaymentSession,
        token: &str,
        approval_number: Option<String>,
        amount: Decimal,
    ) -> PaymentResult<GatewayTransactionDetail> {
        let creds = self.credentials.resolve(&session.organization, Terminal::Regular)?;
        let total_minor =
            to_minor_units(amount).ok_or_else(|| PaymentError::validation("amount", "is out of range"))?;
        let charge = TokenCharge {
            token: token.to_string(),
            approval_number,
            total_minor,
            currency_code: session.currency.gateway_code(),
            merchant_param: session.reference.clone(),
        };
        let mut detail = self.gateway.charge_by_token(&creds, &charge).await?;
        if detail.token.is_none() {
            detail.token = Some(charge.token);
        }
        self.store
            .record_transaction(&session.session_key, TransactionSource::TokenCharge, &detail)
            .await?;
        tracing::info!(session_key = %session.session_key, "token debited");
        Ok(detail)
    }

    pub async fn handle_failure(&self, callback: GatewayCallback) -> PaymentResult<RedirectTarget> {
        self.store.record_callback(&callback).await?;
        let session = self.require_session(&callback.session_key).await?;
        if session.status.is_terminal() {
            tracing::info!(session_key = %session.session_key, status = %session.status, "failure callback on closed session");
        } else {
            self.transition(&session, SessionStatus::Error).await?;
        }
        Ok(failure_target(
            &session.failure_url,
            status_message(&callback.gateway_status_code),
        ))
    }

    pub async fn handle_cancel(&self, callback: GatewayCallback) -> PaymentResult<RedirectTarget> {
        self.store.record_callback(&callback).await?;
        let session = self.require_session(&callback.session_key).await?;
        if session.status.is_terminal() {
            tracing::info!(session_key = %session.session_key, status = %session.status, "cancel callback on closed session");
        } else {
            self.transition(&session, SessionStatus::Cancelled).await?;
        }
        Ok(cancel_target(&session.cancel_url))
    }

    /// Debits a stored card token against an open session and settles it.
    pub async fn charge_by_token(
        &self,
        session_key: &str,
        token: &str,
        approval_number: Option<String>,
        amount: Decimal,
    ) -> PaymentResult<GatewayTransactionDetail> {
        let session = self.require_session(session_key).await?;
        let session = self.transition(&session, SessionStatus::InProcess).await?;
        match self.debit(&session, token, approval_number, amount).await {
            Ok(detail) => {
                self.transition(&session, SessionStatus::Valid).await?;
                Ok(detail)
            }
            Err(e) => Err(self.mark_invalid(&session, e).await),
        }
    }

    /// Merchant-initiated billing cycle: records a fresh revision for the key, then debits.
    pub async fn charge_recurring(&self, req: ChargeRequest) -> PaymentResult<GatewayTransactionDetail> {
        self.validator
            .validate(&charge_schema(&req, &self.policies.names()))
            .map_err(PaymentError::Validation)?;
        let policy = self.policy(req.organization.trim())?;
        let new = session_from_charge(&req, policy)?;
        let session = self.store.insert_session(&new).await?;
        tracing::info!(session_key = %session.session_key, organization = %session.organization, "recurring charge requested");
        let approval = Some(req.approval_number.trim().to_string()).filter(|a| !a.is_empty());
        self.charge_by_token(&session.session_key, req.token.trim(), approval, session.amount)
            .await
    }

    /// Checks a stored token on the recurring terminal for a fixed minimal amount; status is untouched.
    pub async fn authorize_token(&self, req: AuthorizeRequest) -> PaymentResult<GatewayTransactionDetail> {
        self.validator
            .validate(&authorize_schema(&req, &self.policies.names()))
            .map_err(PaymentError::Validation)?;
        let stored = if req.session_key.trim().is_empty() {
            None
        } else {
            self.store.current_session(req.session_key.trim()).await?
        };
        let organization = match &stored {
            Some(session) => session.organization.clone(),
            None if req.organization.trim().is_empty() => {
                return Err(PaymentError::validation("organization", "cannot be blank"));
            }
            None => req.organization.trim().to_string(),
        };
        let creds = self.credentials.resolve(&organization, Terminal::Recurring)?;
        let detail = self
            .gateway
            .authorize(
                &creds,
                &TokenAuthorization {
                    token: req.token.trim().to_string(),
                    merchant_param: req.reference.clone(),
                },
            )
            .await?;
        if let Some(session) = stored {
            self.store
                .record_transaction(&session.session_key, TransactionSource::Authorization, &detail)
                .await?;
        }
        Ok(detail)
    }

    /// Reconciliation: finds a transaction by approval number around a point in time.
    pub async fn lookup_transaction(&self, req: LookupRequest) -> PaymentResult<GatewayTransactionDetail> {
        self.validator
            .validate(&lookup_schema(&req, &self.policies.names()))
            .map_err(PaymentError::Validation)?;
        let around = NaiveDateTime::parse_from_str(req.created_at.trim(), LOOKUP_TIME_FORMAT)
            .map_err(|_| PaymentError::validation("createdAt", "is not a valid timestamp"))?;
        let creds = self.credentials.resolve(req.organization.trim(), Terminal::Regular)?;
        self.gateway
            .fetch_transaction_by_window(&creds, around, req.approval_number.trim())
            .await
    }
}

fn requested_installments(value: Option<i64>) -> i32 {
    value.and_then(|v| i32::try_from(v).ok()).unwrap_or(1)
}

fn parse_currency(code: &str) -> PaymentResult<Currency> {
    Currency::parse(code.trim()).ok_or_else(|| PaymentError::validation("currency", "has illegal value"))
}

fn session_from_request(
    req: &CreateSessionRequest,
    mode: ChargeMode,
    policy: &OrganizationPolicy,
) -> PaymentResult<NewSession> {
    let amount = req
        .amount
        .ok_or_else(|| PaymentError::validation("amount", "cannot be blank"))?;
    let requested = requested_installments(req.installments);
    let bounds = policy.installments.bounds(amount, requested);
    Ok(NewSession {
        session_id: Uuid::new_v4(),
        session_key: req.session_key.trim().to_string(),
        organization: req.organization.trim().to_string(),
        charge_mode: mode,
        amount,
        currency: parse_currency(&req.currency)?,
        installments_requested: requested,
        installments_min: bounds.min,
        installments_max: bounds.max,
        success_url: req.success_url.trim().to_string(),
        failure_url: req.failure_url.trim().to_string(),
        cancel_url: req.cancel_url.trim().to_string(),
        reference: req.reference.clone(),
        sku: req.sku.clone(),
        payer: Payer {
            name: req.name.clone(),
            email: req.email.trim().to_string(),
            phone: req.phone.clone(),
            street: req.street.clone(),
            city: req.city.clone(),
            country: req.country.clone(),
        },
        participants: req.participants.clone(),
        details: req.details.clone(),
        vat: parse_vat(&req.vat),
        language: Language::parse(req.language.trim()).unwrap_or(policy.default_language),
        created_at: Utc::now(),
    })
}

fn session_from_charge(req: &ChargeRequest, policy: &OrganizationPolicy) -> PaymentResult<NewSession> {
    let amount = req
        .amount
        .ok_or_else(|| PaymentError::validation("amount", "cannot be blank"))?;
    let requested = requested_installments(req.installments);
    let bounds = policy.installments.bounds(amount, requested);
    Ok(NewSession {
        session_id: Uuid::new_v4(),
        session_key: req.session_key.trim().to_string(),
        organization: req.organization.trim().to_string(),
        charge_mode: ChargeMode::RecurringToken,
        amount,
        currency: parse_currency(&req.currency)?,
        installments_requested: requested,
        installments_min: bounds.min,
        installments_max: bounds.max,
        success_url: String::new(),
        failure_url: String::new(),
        cancel_url: String::new(),
        reference: req.reference.clone(),
        sku: req.sku.clone(),
        payer: Payer {
            name: req.name.clone(),
            email: req.email.trim().to_string(),
            ..Default::default()
        },
        participants: String::new(),
        details: String::new(),
        vat: false,
        language: Language::parse(req.language.trim()).unwrap_or(policy.default_language),
        created_at: Utc::now(),
    })
}
