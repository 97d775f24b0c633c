//! Declarative field validation.
//!
//! A request is described as a list of `(field, value, rule)` checks and every
//! check runs; the caller gets all violations at once.

use crate::domain::session::{
    AuthorizeRequest, ChargeRequest, CreateSessionRequest, Currency, LookupRequest, Language,
};
use chrono::NaiveDateTime;
use crate::error::FieldViolation;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const VAT_VALUES: &[&str] = &["y", "Y", "n", "N", "t", "T", "f", "F"];

/// Largest amount the `NUMERIC(14,2)` column holds.
pub const AMOUNT_MAX: Decimal = dec!(999999999999.99);

pub const LOOKUP_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(Option<Decimal>),
}

#[derive(Debug, Clone)]
pub enum Rule {
    RequiredString,
    EnumeratedString {
        allowed: Vec<String>,
        required: bool,
    },
    BoundedNumber {
        min: Decimal,
        max: Option<Decimal>,
        max_scale: Option<u32>,
        required: bool,
    },
    Email {
        required: bool,
    },
    BooleanDomain {
        allowed: &'static [&'static str],
        required: bool,
    },
    /// A `chrono` format string the value must parse with.
    Timestamp {
        format: &'static str,
        required: bool,
    },
}

#[derive(Debug, Clone)]
pub struct FieldCheck<'a> {
    pub field: &'static str,
    pub value: FieldValue<'a>,
    pub rule: Rule,
}

#[derive(Debug, Clone, Default)]
pub struct Schema<'a> {
    checks: Vec<FieldCheck<'a>>,
}

impl<'a> Schema<'a> {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn text(mut self, field: &'static str, value: &'a str, rule: Rule) -> Self {
        self.checks.push(FieldCheck {
            field,
            value: FieldValue::Text(value),
            rule,
        });
        self
    }

    pub fn number(mut self, field: &'static str, value: Option<Decimal>, rule: Rule) -> Self {
        self.checks.push(FieldCheck {
            field,
            value: FieldValue::Number(value),
            rule,
        });
        self
    }

    pub fn checks(&self) -> &[FieldCheck<'a>] {
        &self.checks
    }
}

/// Runs schemas; holds the compiled patterns the rules need.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    email: Regex,
}

impl RequestValidator {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            email: Regex::new(
                r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
            )?,
        })
    }

    pub fn validate(&self, schema: &Schema<'_>) -> Result<(), Vec<FieldViolation>> {
        let violations: Vec<FieldViolation> = schema
            .checks()
            .iter()
            .filter_map(|check| self.check(check))
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn check(&self, check: &FieldCheck<'_>) -> Option<FieldViolation> {
        let message = match (&check.rule, check.value) {
            (Rule::RequiredString, FieldValue::Text(v)) => {
                blank(v).then(|| "cannot be blank".to_string())
            }
            (Rule::EnumeratedString { allowed, required }, FieldValue::Text(v)) => {
                if blank(v) {
                    required.then(|| "cannot be blank".to_string())
                } else if !allowed.iter().any(|a| a == v.trim()) {
                    Some("has illegal value".to_string())
                } else {
                    None
                }
            }
            (Rule::BooleanDomain { allowed, required }, FieldValue::Text(v)) => {
                if blank(v) {
                    required.then(|| "cannot be blank".to_string())
                } else if !allowed.contains(&v.trim()) {
                    Some("has illegal value".to_string())
                } else {
                    None
                }
            }
            (Rule::Timestamp { format, required }, FieldValue::Text(v)) => {
                if blank(v) {
                    required.then(|| "cannot be blank".to_string())
                } else if NaiveDateTime::parse_from_str(v.trim(), format).is_err() {
                    Some(format!("should look like {}", timestamp_hint(format)))
                } else {
                    None
                }
            }
            (Rule::Email { required }, FieldValue::Text(v)) => {
                if blank(v) {
                    required.then(|| "cannot be blank".to_string())
                } else if !self.email.is_match(v.trim()) {
                    Some("is not a valid email address".to_string())
                } else {
                    None
                }
            }
            (
                Rule::BoundedNumber {
                    min,
                    max,
                    max_scale,
                    required,
                },
                FieldValue::Number(v),
            ) => match v {
                None => required.then(|| "cannot be blank".to_string()),
                Some(n) if n < *min => Some(format!("should be greater than {min}")),
                Some(n) if max.is_some_and(|m| n > m) => {
                    Some(format!("should be less than {}", max.unwrap_or_default()))
                }
                Some(n) if max_scale.is_some_and(|s| n.normalize().scale() > s) => Some(format!(
                    "should have at most {} decimal places",
                    max_scale.unwrap_or_default()
                )),
                Some(_) => None,
            },
            _ => Some("has an unsupported value type".to_string()),
        };
        message.map(|m| FieldViolation::new(check.field, m))
    }
}

fn blank(v: &str) -> bool {
    v.trim().is_empty()
}

fn timestamp_hint(format: &str) -> String {
    format
        .replace("%Y", "YYYY")
        .replace("%m", "MM")
        .replace("%d", "DD")
        .replace("%H", "HH")
        .replace("%M", "MM")
        .replace("%S", "SS")
}

fn amount_rule() -> Rule {
    Rule::BoundedNumber {
        min: dec!(0.01),
        max: Some(AMOUNT_MAX),
        max_scale: Some(2),
        required: true,
    }
}

fn installments_rule() -> Rule {
    Rule::BoundedNumber {
        min: Decimal::ONE,
        max: Some(dec!(12)),
        max_scale: Some(0),
        required: false,
    }
}

fn enumerated(values: &[&str], required: bool) -> Rule {
    Rule::EnumeratedString {
        allowed: values.iter().map(|v| v.to_string()).collect(),
        required,
    }
}

/// Checks for a hosted-page session request. `organizations` are the configured tenant names.
pub fn session_schema<'a>(req: &'a CreateSessionRequest, organizations: &[String]) -> Schema<'a> {
    Schema::new()
        .text("sessionKey", &req.session_key, Rule::RequiredString)
        .text("successUrl", &req.success_url, Rule::RequiredString)
        .text("failureUrl", &req.failure_url, Rule::RequiredString)
        .text("cancelUrl", &req.cancel_url, Rule::RequiredString)
        .text("name", &req.name, Rule::RequiredString)
        .number("amount", req.amount, amount_rule())
        .text("currency", &req.currency, enumerated(Currency::ACCEPTED, true))
        .text("email", &req.email, Rule::Email { required: true })
        .text("street", &req.street, Rule::RequiredString)
        .text("city", &req.city, Rule::RequiredString)
        .text("country", &req.country, Rule::RequiredString)
        .text("sku", &req.sku, Rule::RequiredString)
        .text(
            "vat",
            &req.vat,
            Rule::BooleanDomain {
                allowed: VAT_VALUES,
                required: true,
            },
        )
        .number("installments", req.installments.map(Decimal::from), installments_rule())
        .text("language", &req.language, enumerated(Language::ACCEPTED, false))
        .text("reference", &req.reference, Rule::RequiredString)
        .text(
            "organization",
            &req.organization,
            Rule::EnumeratedString {
                allowed: organizations.to_vec(),
                required: true,
            },
        )
}

/// Checks for a standalone token charge.
pub fn charge_schema<'a>(req: &'a ChargeRequest, organizations: &[String]) -> Schema<'a> {
    Schema::new()
        .text("sessionKey", &req.session_key, Rule::RequiredString)
        .text("token", &req.token, Rule::RequiredString)
        .number("amount", req.amount, amount_rule())
        .text("currency", &req.currency, enumerated(Currency::ACCEPTED, true))
        .text("email", &req.email, Rule::Email { required: false })
        .number("installments", req.installments.map(Decimal::from), installments_rule())
        .text("language", &req.language, enumerated(Language::ACCEPTED, false))
        .text(
            "organization",
            &req.organization,
            Rule::EnumeratedString {
                allowed: organizations.to_vec(),
                required: true,
            },
        )
}

/// Checks for a token authorization. The organization may be omitted when the
/// session key names a stored session.
pub fn authorize_schema<'a>(req: &'a AuthorizeRequest, organizations: &[String]) -> Schema<'a> {
    Schema::new()
        .text("token", &req.token, Rule::RequiredString)
        .text(
            "organization",
            &req.organization,
            Rule::EnumeratedString {
                allowed: organizations.to_vec(),
                required: blank(&req.session_key),
            },
        )
}

/// Checks for a reconciliation lookup.
pub fn lookup_schema<'a>(req: &'a LookupRequest, organizations: &[String]) -> Schema<'a> {
    Schema::new()
        .text(
            "organization",
            &req.organization,
            Rule::EnumeratedString {
                allowed: organizations.to_vec(),
                required: true,
            },
        )
        .text(
            "createdAt",
            &req.created_at,
            Rule::Timestamp {
                format: LOOKUP_TIME_FORMAT,
                required: true,
            },
        )
        .text("approvalNumber", &req.approval_number, Rule::RequiredString)
}

/// `y`/`t` in either case mean true; everything else in the domain means false.
pub fn parse_vat(value: &str) -> bool {
    matches!(value.trim(), "y" | "Y" | "t" | "T")
}
