use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Normalized view of a transaction as the gateway's ledger reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayTransactionDetail {
    pub transaction_id: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub voucher_id: Option<String>,
    pub approval_number: Option<String>,
    pub station_number: Option<String>,
    pub card_number_masked: Option<String>,
    pub card_expiry: Option<String>,
    pub card_brand: Option<String>,
    pub card_name: Option<String>,
    pub card_abroad: Option<String>,
    pub issuer_id: Option<String>,
    pub clearer_id: Option<String>,
    pub debit_total: Option<String>,
    pub debit_currency: Option<String>,
    pub debit_type: Option<String>,
    pub debit_code: Option<String>,
    pub credit_type: Option<String>,
    pub first_payment_total: Option<String>,
    pub fixed_payment_total: Option<String>,
    pub total_payments: Option<String>,
    pub j_param: Option<String>,
    pub merchant_param: Option<String>,
    pub init_time: Option<String>,
    pub update_time: Option<String>,
    /// Card token the gateway charged or issued; never part of `query_pairs`.
    pub token: Option<String>,
}

impl GatewayTransactionDetail {
    /// Present fields as `(name, value)` pairs, in a stable order, for redirect query strings.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let fields: [(&'static str, &Option<String>); 24] = [
            ("transaction_id", &self.transaction_id),
            ("gateway_transaction_id", &self.gateway_transaction_id),
            ("voucher_id", &self.voucher_id),
            ("approval_number", &self.approval_number),
            ("station_number", &self.station_number),
            ("card_number", &self.card_number_masked),
            ("card_expiry", &self.card_expiry),
            ("card_brand", &self.card_brand),
            ("card_name", &self.card_name),
            ("card_abroad", &self.card_abroad),
            ("issuer_id", &self.issuer_id),
            ("clearer_id", &self.clearer_id),
            ("debit_total", &self.debit_total),
            ("debit_currency", &self.debit_currency),
            ("debit_type", &self.debit_type),
            ("debit_code", &self.debit_code),
            ("credit_type", &self.credit_type),
            ("first_payment_total", &self.first_payment_total),
            ("fixed_payment_total", &self.fixed_payment_total),
            ("total_payments", &self.total_payments),
            ("j_param", &self.j_param),
            ("merchant_param", &self.merchant_param),
            ("init_time", &self.init_time),
            ("update_time", &self.update_time),
        ];
        fields
            .into_iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionSource {
    Verification,
    TokenCharge,
    Authorization,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verification => "VERIFICATION",
            Self::TokenCharge => "TOKEN_CHARGE",
            Self::Authorization => "AUTHORIZATION",
        }
    }
}

impl FromStr for TransactionSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VERIFICATION" => Ok(Self::Verification),
            "TOKEN_CHARGE" => Ok(Self::TokenCharge),
            "AUTHORIZATION" => Ok(Self::Authorization),
            other => Err(anyhow::anyhow!("unknown transaction source {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedTransaction {
    pub session_key: String,
    pub source: TransactionSource,
    pub detail: GatewayTransactionDetail,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_skip_absent_fields() {
        let detail = GatewayTransactionDetail {
            transaction_id: Some("tx-9".to_string()),
            approval_number: Some("0042".to_string()),
            ..Default::default()
        };
        assert_eq!(
            detail.query_pairs(),
            vec![("transaction_id", "tx-9"), ("approval_number", "0042")]
        );
    }
}
