use crate::domain::transaction::GatewayTransactionDetail;
use crate::error::{GatewayError, GatewayErrorKind, PaymentError, PaymentResult};
use crate::gateways::{
    GatewayCredentials, HostedGateway, PageAction, PaymentPage, TokenAuthorization, TokenCharge,
    UniqueKeyCheck,
};
use chrono::{Duration, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};

const WINDOW_FORMAT: &str = "%d/%m/%Y %H:%M";
const SHOP_NUMBER: &str = "1000";
const STATUS_OK: &str = "000";

/// JSON-over-HTTP adapter for the hosted payment page and its services API.
pub struct HttpGateway {
    pub payment_page_url: String,
    pub service_url: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(payment_page_url: &str, service_url: &str, timeout_ms: u64) -> Self {
        Self {
            payment_page_url: payment_page_url.trim_end_matches('/').to_string(),
            service_url: service_url.trim_end_matches('/').to_string(),
            timeout_ms,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, url: String, body: &Value) -> PaymentResult<String> {
        let resp = self
            .client
            .post(&url)
            .json(body)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                tracing::warn!(url = %url, "gateway call timed out");
                return Err(GatewayError::new(GatewayErrorKind::Timeout, "TIMEOUT", "gateway timeout").into());
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "gateway transport failure");
                return Err(GatewayError::new(GatewayErrorKind::Transport, "NETWORK_ERROR", e.to_string()).into());
            }
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) if e.is_timeout() => {
                return Err(GatewayError::new(GatewayErrorKind::Timeout, "TIMEOUT", "gateway timeout").into());
            }
            Err(e) => {
                return Err(GatewayError::new(GatewayErrorKind::Transport, "NETWORK_ERROR", e.to_string()).into());
            }
        };
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "gateway answered non-2xx");
            return Err(GatewayError::new(
                GatewayErrorKind::Http,
                format!("HTTP_{}", status.as_u16()),
                text.chars().take(200).collect::<String>(),
            )
            .into());
        }
        Ok(text)
    }

    /// Calls a services endpoint and unwraps its `{StatusCode, ResultData, ErrorMessage}` envelope.
    async fn service<T: DeserializeOwned>(&self, base: &str, action: &str, body: &Value) -> PaymentResult<T> {
        let text = self.post(format!("{base}/{action}"), body).await?;
        let envelope: Value = serde_json::from_str(&text)
            .map_err(|e| GatewayError::malformed(format!("{action}: {e}")))?;
        decode_envelope(action, envelope)
    }

    fn credential_body(creds: &GatewayCredentials) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("user".into(), json!(creds.user));
        body.insert("password".into(), json!(creds.password));
        body.insert("terminal".into(), json!(creds.terminal));
        body
    }

    fn service_body(creds: &GatewayCredentials) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("TerminalNumber".into(), json!(creds.terminal));
        body.insert("User".into(), json!(creds.user));
        body.insert("Password".into(), json!(creds.password));
        body
    }
}

fn decode_envelope<T: DeserializeOwned>(action: &str, envelope: Value) -> PaymentResult<T> {
    let status = envelope.get("StatusCode").map(value_text).unwrap_or_default();
    if status.is_empty() {
        return Err(GatewayError::malformed(format!("{action}: missing StatusCode")).into());
    }
    if status != STATUS_OK {
        let message = envelope.get("ErrorMessage").map(value_text).unwrap_or_default();
        return Err(GatewayError::new(GatewayErrorKind::Rejected, status, message).into());
    }
    let data = envelope
        .get("ResultData")
        .cloned()
        .filter(|v| !v.is_null())
        .ok_or_else(|| GatewayError::malformed(format!("{action}: missing ResultData")))?;
    serde_json::from_value(data)
        .map_err(|e| PaymentError::from(GatewayError::malformed(format!("{action}: {e}"))))
}

/// `{URL}` on success, `{Error: {ErrCode, ErrMsg}}` otherwise; falls back to the service envelope.
fn decode_init(envelope: Value) -> PaymentResult<String> {
    if let Some(url) = envelope.get("URL").and_then(Value::as_str).filter(|u| !u.is_empty()) {
        return Ok(url.to_string());
    }
    if let Some(err) = envelope.get("Error") {
        let code = err.get("ErrCode").map(value_text).unwrap_or_else(|| "0".to_string());
        let message = err.get("ErrMsg").map(value_text).unwrap_or_default();
        return Err(GatewayError::new(GatewayErrorKind::Rejected, code, message).into());
    }
    if envelope.get("StatusCode").is_some() {
        #[derive(Deserialize)]
        struct InitData {
            #[serde(rename = "URL")]
            url: String,
        }
        let data: InitData = decode_envelope("init", envelope)?;
        return Ok(data.url);
    }
    Err(GatewayError::malformed("init: missing URL").into())
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.map(|v| value_text(&v)).filter(|s| !s.is_empty()))
}

/// Transaction record as the gateway spells it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct WireTransaction {
    #[serde(deserialize_with = "lenient")]
    transaction_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    transaction_pelecard_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    voucher_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    debit_approve_number: Option<String>,
    #[serde(deserialize_with = "lenient")]
    station_number: Option<String>,
    #[serde(deserialize_with = "lenient")]
    credit_card_number: Option<String>,
    #[serde(deserialize_with = "lenient")]
    credit_card_exp_date: Option<String>,
    #[serde(deserialize_with = "lenient")]
    credit_card_brand: Option<String>,
    #[serde(deserialize_with = "lenient")]
    card_hebrew_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    credit_card_abroad_card: Option<String>,
    #[serde(deserialize_with = "lenient")]
    credit_card_company_issuer: Option<String>,
    #[serde(deserialize_with = "lenient")]
    credit_card_company_clearer: Option<String>,
    #[serde(deserialize_with = "lenient")]
    debit_total: Option<String>,
    #[serde(deserialize_with = "lenient")]
    debit_currency: Option<String>,
    #[serde(deserialize_with = "lenient")]
    debit_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    debit_code: Option<String>,
    #[serde(deserialize_with = "lenient")]
    credit_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    first_payment_total: Option<String>,
    #[serde(deserialize_with = "lenient")]
    fixed_payment_total: Option<String>,
    #[serde(deserialize_with = "lenient")]
    total_payments: Option<String>,
    #[serde(deserialize_with = "lenient")]
    j_param: Option<String>,
    #[serde(deserialize_with = "lenient")]
    additional_details_param_x: Option<String>,
    #[serde(deserialize_with = "lenient")]
    transaction_init_time: Option<String>,
    #[serde(deserialize_with = "lenient")]
    transaction_update_time: Option<String>,
    #[serde(deserialize_with = "lenient")]
    token: Option<String>,
}

impl From<WireTransaction> for GatewayTransactionDetail {
    fn from(w: WireTransaction) -> Self {
        Self {
            transaction_id: w.transaction_id,
            gateway_transaction_id: w.transaction_pelecard_id,
            voucher_id: w.voucher_id,
            approval_number: w.debit_approve_number,
            station_number: w.station_number,
            card_number_masked: w.credit_card_number,
            card_expiry: w.credit_card_exp_date,
            card_brand: w.credit_card_brand,
            card_name: w.card_hebrew_name,
            card_abroad: w.credit_card_abroad_card,
            issuer_id: w.credit_card_company_issuer,
            clearer_id: w.credit_card_company_clearer,
            debit_total: w.debit_total,
            debit_currency: w.debit_currency,
            debit_type: w.debit_type,
            debit_code: w.debit_code,
            credit_type: w.credit_type,
            first_payment_total: w.first_payment_total,
            fixed_payment_total: w.fixed_payment_total,
            total_payments: w.total_payments,
            j_param: w.j_param,
            merchant_param: w.additional_details_param_x,
            init_time: w.transaction_init_time,
            update_time: w.transaction_update_time,
            token: w.token,
        }
    }
}

fn page_body(creds: &GatewayCredentials, page: &PaymentPage) -> Value {
    let mut body = HttpGateway::credential_body(creds);
    let mut put = |key: &str, value: Value| {
        body.insert(key.to_string(), value);
    };
    put("ActionType", json!(page.action.code()));
    put("Language", json!(page.branding.page_language.as_str()));
    put("UserKey", json!(page.session_key));
    put("ParamX", json!(page.merchant_param));
    put("GoodUrl", json!(page.good_url));
    put("ErrorUrl", json!(page.error_url));
    put("CancelUrl", json!(page.cancel_url));
    put("Total", json!(page.total_minor));
    put("Currency", json!(page.currency_code));
    put("MinPayments", json!(page.min_payments));
    put("MaxPayments", json!(page.max_payments));
    put("TopText", json!(page.branding.top_text));
    put("BottomText", json!(page.branding.bottom_text));
    put("LogoUrl", json!(page.branding.logo_url));
    put(
        "Cvv2Field",
        json!(match page.action {
            PageAction::Charge => "must",
            PageAction::Register => "hide",
        }),
    );
    put("CreateToken", json!("True"));
    put("CardHolderName", json!("hide"));
    put("CustomerIdField", json!("hide"));
    put("EmailField", json!("hide"));
    put("TelField", json!("hide"));
    put("FeedbackDataTransferMethod", json!("POST"));
    put("FirstPayment", json!("auto"));
    put("ShopNo", json!(1000));
    put("SetFocus", json!("CC"));
    put("HiddenPelecardLogo", json!(true));
    put(
        "SupportedCards",
        json!({"Amex": true, "Diners": false, "Isra": true, "Master": true, "Visa": true}),
    );
    if !page.branding.captions.is_empty() {
        put("CaptionSet", json!(page.branding.captions));
    }
    body.retain(|_, v| !matches!(v, Value::String(s) if s.is_empty()));
    Value::Object(body)
}

#[async_trait::async_trait]
impl HostedGateway for HttpGateway {
    fn name(&self) -> &'static str {
        "pelecard"
    }

    async fn init_redirect(&self, creds: &GatewayCredentials, page: &PaymentPage) -> PaymentResult<String> {
        let text = self
            .post(format!("{}/init", self.payment_page_url), &page_body(creds, page))
            .await?;
        let envelope: Value =
            serde_json::from_str(&text).map_err(|e| GatewayError::malformed(format!("init: {e}")))?;
        decode_init(envelope)
    }

    async fn fetch_transaction(
        &self,
        creds: &GatewayCredentials,
        transaction_id: &str,
    ) -> PaymentResult<GatewayTransactionDetail> {
        let mut body = Self::credential_body(creds);
        body.insert("TransactionId".into(), json!(transaction_id));
        let wire: WireTransaction = self
            .service(&self.payment_page_url, "GetTransaction", &Value::Object(body))
            .await?;
        Ok(wire.into())
    }

    async fn fetch_transaction_by_window(
        &self,
        creds: &GatewayCredentials,
        around: NaiveDateTime,
        approval_number: &str,
    ) -> PaymentResult<GatewayTransactionDetail> {
        let mut body = Self::service_body(creds);
        body.insert(
            "startDate".into(),
            json!((around - Duration::minutes(5)).format(WINDOW_FORMAT).to_string()),
        );
        body.insert(
            "endDate".into(),
            json!((around + Duration::minutes(5)).format(WINDOW_FORMAT).to_string()),
        );
        let rows: Vec<WireTransaction> = self
            .service(&self.service_url, "GetTransData", &Value::Object(body))
            .await?;
        tracing::info!(found = rows.len(), %around, "windowed transaction lookup");
        rows.into_iter()
            .find(|r| r.debit_approve_number.as_deref() == Some(approval_number))
            .map(GatewayTransactionDetail::from)
            .ok_or_else(|| PaymentError::NotFound {
                around: around.format("%Y-%m-%d %H:%M:%S").to_string(),
                approval_number: approval_number.to_string(),
            })
    }

    async fn validate_unique_key(&self, creds: &GatewayCredentials, check: &UniqueKeyCheck) -> PaymentResult<bool> {
        let body = json!({
            "User": creds.user,
            "Password": creds.password,
            "Terminal": creds.terminal,
            "ConfirmationKey": check.confirmation_key,
            "UniqueKey": check.session_key,
            "TotalX100": check.total_minor.to_string(),
        });
        let text = self
            .post(format!("{}/ValidateByUniqueKey", self.payment_page_url), &body)
            .await?;
        Ok(text.trim() == "1")
    }

    async fn charge_by_token(
        &self,
        creds: &GatewayCredentials,
        charge: &TokenCharge,
    ) -> PaymentResult<GatewayTransactionDetail> {
        let mut body = Self::service_body(creds);
        body.insert("ShopNumber".into(), json!(SHOP_NUMBER));
        body.insert("Token".into(), json!(charge.token));
        body.insert("Total".into(), json!(charge.total_minor.to_string()));
        body.insert("Currency".into(), json!(charge.currency_code));
        if let Some(approval) = charge.approval_number.as_deref().filter(|a| !a.is_empty()) {
            body.insert("AuthorizationNumber".into(), json!(approval));
        }
        if !charge.merchant_param.is_empty() {
            body.insert("ParamX".into(), json!(charge.merchant_param));
        }
        let wire: WireTransaction = self
            .service(&self.service_url, "DebitRegularType", &Value::Object(body))
            .await?;
        Ok(wire.into())
    }

    async fn authorize(
        &self,
        creds: &GatewayCredentials,
        authorization: &TokenAuthorization,
    ) -> PaymentResult<GatewayTransactionDetail> {
        let mut body = Self::service_body(creds);
        body.insert("ShopNumber".into(), json!(SHOP_NUMBER));
        body.insert("Token".into(), json!(authorization.token));
        body.insert("Total".into(), json!("100"));
        body.insert("Currency".into(), json!(1));
        if !authorization.merchant_param.is_empty() {
            body.insert("ParamX".into(), json!(authorization.merchant_param));
        }
        let wire: WireTransaction = self
            .service(&self.service_url, "AuthorizeCreditCard", &Value::Object(body))
            .await?;
        Ok(wire.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_rejection_carries_code() {
        let err = decode_envelope::<Value>(
            "DebitRegularType",
            json!({"StatusCode": "004", "ErrorMessage": "Refusal", "ResultData": null}),
        )
        .unwrap_err();
        match err {
            PaymentError::Gateway(g) => {
                assert_eq!(g.kind, GatewayErrorKind::Rejected);
                assert_eq!(g.code, "004");
                assert_eq!(g.message, "Refusal");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn envelope_without_status_is_malformed() {
        let err = decode_envelope::<Value>("GetTransaction", json!({"foo": 1})).unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(g) if g.kind == GatewayErrorKind::MalformedResponse));
    }

    #[test]
    fn init_error_object() {
        let err = decode_init(json!({"Error": {"ErrCode": 501, "ErrMsg": "bad user"}})).unwrap_err();
        match err {
            PaymentError::Gateway(g) => assert_eq!((g.code.as_str(), g.message.as_str()), ("501", "bad user")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            decode_init(json!({"URL": "https://pay.example/p/1"})).unwrap(),
            "https://pay.example/p/1"
        );
    }

    #[test]
    fn wire_transaction_accepts_numbers() {
        let wire: WireTransaction = serde_json::from_value(json!({
            "TransactionId": "abc",
            "DebitTotal": 1000,
            "TotalPayments": 1,
            "DebitApproveNumber": "0123",
            "CreditCardNumber": "458045******4580",
            "AdditionalDetailsParamX": "ref-1",
            "VoucherId": ""
        }))
        .unwrap();
        let detail = GatewayTransactionDetail::from(wire);
        assert_eq!(detail.debit_total.as_deref(), Some("1000"));
        assert_eq!(detail.total_payments.as_deref(), Some("1"));
        assert_eq!(detail.approval_number.as_deref(), Some("0123"));
        assert_eq!(detail.merchant_param.as_deref(), Some("ref-1"));
        assert_eq!(detail.voucher_id, None);
    }
}
