use crate::error::{PaymentError, PaymentResult};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    New,
    InProcess,
    Valid,
    Invalid,
    Error,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProcess => "in-process",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Valid | Self::Invalid | Self::Error | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        match (self, next) {
            (Self::New, Self::InProcess) => true,
            (Self::New | Self::InProcess, Self::Error | Self::Cancelled) => true,
            (Self::InProcess, Self::Valid | Self::Invalid) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "in-process" => Ok(Self::InProcess),
            "valid" => Ok(Self::Valid),
            "invalid" => Ok(Self::Invalid),
            "error" => Ok(Self::Error),
            "cancelled" | "cancel" => Ok(Self::Cancelled),
            other => Err(anyhow::anyhow!("unknown session status {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChargeMode {
    OneTime,
    RecurringToken,
}

impl ChargeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one-time",
            Self::RecurringToken => "recurring-token",
        }
    }
}

impl FromStr for ChargeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one-time" => Ok(Self::OneTime),
            "recurring-token" => Ok(Self::RecurringToken),
            other => Err(anyhow::anyhow!("unknown charge mode {other}")),
        }
    }
}

/// Currencies the gateway accepts, with their numeric wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Ils,
    Usd,
    Eur,
}

impl Currency {
    pub const ACCEPTED: &'static [&'static str] = &["ILS", "NIS", "USD", "EUR"];

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "ILS" | "NIS" => Some(Self::Ils),
            "USD" => Some(Self::Usd),
            "EUR" => Some(Self::Eur),
            _ => None,
        }
    }

    pub fn gateway_code(&self) -> u16 {
        match self {
            Self::Ils => 1,
            Self::Usd => 2,
            Self::Eur => 978,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ils => "ILS",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    En,
    He,
    Ru,
    Es,
}

impl Language {
    pub const ACCEPTED: &'static [&'static str] = &["EN", "HE", "RU", "ES"];

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "EN" => Some(Self::En),
            "HE" => Some(Self::He),
            "RU" => Some(Self::Ru),
            "ES" => Some(Self::Es),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "EN",
            Self::He => "HE",
            Self::Ru => "RU",
            Self::Es => "ES",
        }
    }
}

/// Converts a decimal currency amount to the gateway's integer minor units.
/// `None` when the result does not fit an `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.round().to_i64())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub country: String,
}

/// Raw create-session input, as submitted by the merchant (JSON, form or query).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSessionRequest {
    pub session_key: String,
    pub success_url: String,
    pub failure_url: String,
    pub cancel_url: String,
    pub name: String,
    pub amount: Option<Decimal>,
    pub currency: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub country: String,
    pub participants: String,
    pub details: String,
    pub sku: String,
    pub vat: String,
    pub installments: Option<i64>,
    pub language: String,
    pub reference: String,
    pub organization: String,
}

/// Merchant-initiated charge of a previously registered card token.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChargeRequest {
    pub session_key: String,
    pub token: String,
    pub approval_number: String,
    pub amount: Option<Decimal>,
    pub currency: String,
    pub organization: String,
    pub reference: String,
    pub sku: String,
    pub name: String,
    pub email: String,
    pub installments: Option<i64>,
    pub language: String,
}

/// Verification-only authorization of a stored card token.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorizeRequest {
    pub session_key: String,
    pub organization: String,
    pub token: String,
    pub reference: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupRequest {
    pub organization: String,
    /// `YYYY-MM-DD HH:MM:SS`
    pub created_at: String,
    pub approval_number: String,
}

/// A session revision ready to be appended to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub session_id: Uuid,
    pub session_key: String,
    pub organization: String,
    pub charge_mode: ChargeMode,
    pub amount: Decimal,
    pub currency: Currency,
    pub installments_requested: i32,
    pub installments_min: i32,
    pub installments_max: i32,
    pub success_url: String,
    pub failure_url: String,
    pub cancel_url: String,
    pub reference: String,
    pub sku: String,
    pub payer: Payer,
    pub participants: String,
    pub details: String,
    pub vat: bool,
    pub language: Language,
    pub created_at: DateTime<Utc>,
}

/// One stored revision of a payment session; the projection for a key is its newest revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSession {
    pub revision_id: i64,
    pub session_id: Uuid,
    pub session_key: String,
    pub organization: String,
    pub charge_mode: ChargeMode,
    pub amount: Decimal,
    pub currency: Currency,
    pub installments_requested: i32,
    pub installments_min: i32,
    pub installments_max: i32,
    pub success_url: String,
    pub failure_url: String,
    pub cancel_url: String,
    pub reference: String,
    pub sku: String,
    pub payer: Payer,
    pub participants: String,
    pub details: String,
    pub vat: bool,
    pub language: Language,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

impl PaymentSession {
    pub fn from_new(revision_id: i64, new: &NewSession, recorded_at: DateTime<Utc>) -> Self {
        Self {
            revision_id,
            session_id: new.session_id,
            session_key: new.session_key.clone(),
            organization: new.organization.clone(),
            charge_mode: new.charge_mode,
            amount: new.amount,
            currency: new.currency,
            installments_requested: new.installments_requested,
            installments_min: new.installments_min,
            installments_max: new.installments_max,
            success_url: new.success_url.clone(),
            failure_url: new.failure_url.clone(),
            cancel_url: new.cancel_url.clone(),
            reference: new.reference.clone(),
            sku: new.sku.clone(),
            payer: new.payer.clone(),
            participants: new.participants.clone(),
            details: new.details.clone(),
            vat: new.vat,
            language: new.language,
            status: SessionStatus::New,
            created_at: new.created_at,
            recorded_at,
        }
    }

    pub fn amount_minor(&self) -> PaymentResult<i64> {
        to_minor_units(self.amount).ok_or_else(|| PaymentError::validation("amount", "is out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn terminal_states_never_transition() {
        let all = [
            SessionStatus::New,
            SessionStatus::InProcess,
            SessionStatus::Valid,
            SessionStatus::Invalid,
            SessionStatus::Error,
            SessionStatus::Cancelled,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn valid_requires_in_process() {
        assert!(!SessionStatus::New.can_transition_to(SessionStatus::Valid));
        assert!(SessionStatus::InProcess.can_transition_to(SessionStatus::Valid));
        assert!(SessionStatus::New.can_transition_to(SessionStatus::Cancelled));
    }

    #[test]
    fn currency_codes_are_fixed() {
        assert_eq!(Currency::parse("NIS"), Some(Currency::Ils));
        assert_eq!(Currency::parse("USD").map(|c| c.gateway_code()), Some(2));
        assert_eq!(Currency::parse("EUR").map(|c| c.gateway_code()), Some(978));
        assert_eq!(Currency::parse("GBP"), None);
    }

    #[test]
    fn minor_units_are_exact() {
        assert_eq!(to_minor_units(dec!(10.00)), Some(1000));
        assert_eq!(to_minor_units(dec!(0.29)), Some(29));
        assert_eq!(to_minor_units(dec!(1234.5)), Some(123_450));
    }

    #[test]
    fn minor_units_refuse_to_overflow() {
        assert_eq!(to_minor_units(Decimal::MAX), None);
        assert_eq!(to_minor_units(dec!(100000000000000000000)), None);
        assert_eq!(to_minor_units(dec!(999999999999.99)), Some(99_999_999_999_999));
    }

    #[test]
    fn status_round_trips_through_text() {
        for s in ["new", "in-process", "valid", "invalid", "error", "cancelled"] {
            assert_eq!(s.parse::<SessionStatus>().map(|v| v.as_str().to_string()).ok(), Some(s.to_string()));
        }
    }
}
