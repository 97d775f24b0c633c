//! Per-organization hosted-page policy: branding, captions, installment bounds
//! and default language. Loaded once at startup.

use crate::domain::session::Language;
use anyhow::Context;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const BUILTIN_TABLE: &str = include_str!("../../config/organizations.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallmentPolicy {
    Fixed {
        min: i32,
        max: i32,
    },
    Requested {
        min: i32,
        cap: i32,
    },
    /// Whole major units below `threshold` allow a single payment, otherwise
    /// `units / divisor + offset`, never above `cap`.
    AmountScaled {
        min: i32,
        threshold: i64,
        divisor: i64,
        offset: i64,
        cap: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallmentBounds {
    pub min: i32,
    pub max: i32,
}

impl InstallmentPolicy {
    pub fn bounds(&self, amount: Decimal, requested: i32) -> InstallmentBounds {
        match *self {
            Self::Fixed { min, max } => InstallmentBounds { min, max: max.max(min) },
            Self::Requested { min, cap } => InstallmentBounds {
                min,
                max: requested.clamp(min, cap.max(min)),
            },
            Self::AmountScaled {
                min,
                threshold,
                divisor,
                offset,
                cap,
            } => {
                let units = amount.trunc().to_i64().unwrap_or_default();
                let scaled = if units < threshold || divisor <= 0 {
                    1
                } else {
                    units / divisor + offset
                };
                let max = scaled.min(i64::from(cap)).max(i64::from(min));
                InstallmentBounds {
                    min,
                    max: i32::try_from(max).unwrap_or(cap),
                }
            }
        }
    }

    fn min(&self) -> i32 {
        match *self {
            Self::Fixed { min, .. } | Self::Requested { min, .. } | Self::AmountScaled { min, .. } => min,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branding {
    pub page_language: Language,
    pub logo_url: String,
    pub top_text: String,
    pub bottom_text: String,
    #[serde(default)]
    pub captions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationPolicy {
    pub default_language: Language,
    pub installments: InstallmentPolicy,
    #[serde(default)]
    pub branding: BTreeMap<Language, Branding>,
    pub fallback_branding: Branding,
}

impl OrganizationPolicy {
    pub fn branding_for(&self, language: Language) -> &Branding {
        self.branding.get(&language).unwrap_or(&self.fallback_branding)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTable {
    organizations: BTreeMap<String, OrganizationPolicy>,
}

impl PolicyTable {
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_json_str(BUILTIN_TABLE).context("built-in organization table")
    }

    pub fn from_json_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        Self::from_json_str(&raw).with_context(|| format!("parsing {path}"))
    }

    /// The override file when one is configured, the built-in table otherwise.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::from_json_file(p),
            None => Self::builtin(),
        }
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let organizations: BTreeMap<String, OrganizationPolicy> = serde_json::from_str(raw)?;
        for (name, policy) in &organizations {
            if policy.installments.min() < 1 {
                anyhow::bail!("organization {name}: installment minimum must be at least 1");
            }
        }
        Ok(Self { organizations })
    }

    pub fn from_policies(organizations: BTreeMap<String, OrganizationPolicy>) -> Self {
        Self { organizations }
    }

    pub fn get(&self, organization: &str) -> Option<&OrganizationPolicy> {
        self.organizations.get(organization)
    }

    pub fn names(&self) -> Vec<String> {
        self.organizations.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn builtin_table_loads() {
        let table = PolicyTable::builtin().unwrap();
        assert_eq!(table.names(), vec!["ben2".to_string(), "meshp18".to_string()]);
    }

    #[test]
    fn ben2_is_single_payment() {
        let table = PolicyTable::builtin().unwrap();
        let ben2 = table.get("ben2").unwrap();
        assert_eq!(
            ben2.installments.bounds(dec!(5000), 12),
            InstallmentBounds { min: 1, max: 1 }
        );
    }

    #[test]
    fn meshp18_scales_with_amount() {
        let table = PolicyTable::builtin().unwrap();
        let policy = table.get("meshp18").unwrap().installments;
        assert_eq!(policy.bounds(dec!(99.99), 1).max, 1);
        assert_eq!(policy.bounds(dec!(100), 1).max, 2);
        assert_eq!(policy.bounds(dec!(1200), 1).max, 4);
        assert_eq!(policy.bounds(dec!(100000), 1).max, 10);
    }

    #[test]
    fn requested_is_clamped() {
        let policy = InstallmentPolicy::Requested { min: 1, cap: 12 };
        assert_eq!(policy.bounds(dec!(10), 3).max, 3);
        assert_eq!(policy.bounds(dec!(10), 40).max, 12);
        assert_eq!(policy.bounds(dec!(10), 0).max, 1);
    }

    #[test]
    fn spanish_page_uses_english_with_captions() {
        let table = PolicyTable::builtin().unwrap();
        let es = table.get("ben2").unwrap().branding_for(Language::Es);
        assert_eq!(es.page_language, Language::En);
        assert_eq!(es.captions.get("cs_submit").map(String::as_str), Some("Pagar ahora"));
    }

    #[test]
    fn unknown_language_falls_back() {
        let table = PolicyTable::builtin().unwrap();
        let meshp = table.get("meshp18").unwrap().branding_for(Language::En);
        assert_eq!(meshp.top_text, "BB Credit Cards");
    }

    #[test]
    fn rejects_zero_minimum() {
        let raw = r#"{"x": {"default_language": "EN", "installments": {"kind": "fixed", "min": 0, "max": 1},
            "fallback_branding": {"page_language": "EN", "logo_url": "", "top_text": "", "bottom_text": ""}}}"#;
        assert!(PolicyTable::from_json_str(raw).is_err());
    }
}
