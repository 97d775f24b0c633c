use chrono::NaiveDate;
use hosted_checkout::domain::session::Language;
use hosted_checkout::error::{GatewayErrorKind, PaymentError};
use hosted_checkout::gateways::http_client::HttpGateway;
use hosted_checkout::gateways::{
    GatewayCredentials, HostedGateway, PageAction, PaymentPage, TokenCharge, UniqueKeyCheck,
};
use hosted_checkout::policy::Branding;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn creds() -> GatewayCredentials {
    GatewayCredentials {
        user: "user-a".to_string(),
        password: "secret-a".to_string(),
        terminal: "T-REG".to_string(),
    }
}

fn gateway(server: &MockServer, timeout_ms: u64) -> HttpGateway {
    HttpGateway::new(
        &format!("{}/PaymentGW", server.uri()),
        &format!("{}/services", server.uri()),
        timeout_ms,
    )
}

fn page() -> PaymentPage {
    PaymentPage {
        action: PageAction::Charge,
        session_key: "k-1".to_string(),
        merchant_param: "ref-1".to_string(),
        total_minor: 1000,
        currency_code: 2,
        min_payments: 1,
        max_payments: 3,
        branding: Branding {
            page_language: Language::He,
            logo_url: "https://org.example/logo.png".to_string(),
            top_text: "Org".to_string(),
            bottom_text: String::new(),
            captions: BTreeMap::new(),
        },
        good_url: "https://checkout.example/payments/good".to_string(),
        error_url: "https://checkout.example/payments/error".to_string(),
        cancel_url: "https://checkout.example/payments/cancel".to_string(),
    }
}

#[tokio::test]
async fn init_returns_page_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/PaymentGW/init"))
        .and(body_partial_json(json!({
            "ActionType": "J4",
            "UserKey": "k-1",
            "Total": 1000,
            "Currency": 2,
            "MaxPayments": 3,
            "Language": "HE",
            "terminal": "T-REG"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"URL": "https://pay.example/p/abc"})))
        .expect(1)
        .mount(&server)
        .await;

    let url = gateway(&server, 2000).init_redirect(&creds(), &page()).await.unwrap();
    assert_eq!(url, "https://pay.example/p/abc");
}

#[tokio::test]
async fn init_error_object_becomes_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/PaymentGW/init"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"Error": {"ErrCode": 3, "ErrMsg": "bad terminal"}})),
        )
        .mount(&server)
        .await;

    let err = gateway(&server, 2000).init_redirect(&creds(), &page()).await.unwrap_err();
    match err {
        PaymentError::Gateway(g) => {
            assert_eq!(g.kind, GatewayErrorKind::Rejected);
            assert_eq!(g.code, "3");
            assert_eq!(g.message, "bad terminal");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn fetch_transaction_normalizes_ledger_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/PaymentGW/GetTransaction"))
        .and(body_partial_json(json!({"TransactionId": "gw-tx-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "StatusCode": "000",
            "ErrorMessage": "operation success",
            "ResultData": {
                "TransactionId": "gw-tx-1",
                "DebitApproveNumber": "0123456",
                "CreditCardNumber": "458045******4580",
                "DebitTotal": 1000,
                "TotalPayments": 1,
                "AdditionalDetailsParamX": "ref-1"
            }
        })))
        .mount(&server)
        .await;

    let detail = gateway(&server, 2000)
        .fetch_transaction(&creds(), "gw-tx-1")
        .await
        .unwrap();
    assert_eq!(detail.transaction_id.as_deref(), Some("gw-tx-1"));
    assert_eq!(detail.approval_number.as_deref(), Some("0123456"));
    assert_eq!(detail.card_number_masked.as_deref(), Some("458045******4580"));
    assert_eq!(detail.debit_total.as_deref(), Some("1000"));
    assert_eq!(detail.merchant_param.as_deref(), Some("ref-1"));
    assert!(detail.voucher_id.is_none());
}

#[tokio::test]
async fn unique_key_match_is_literal_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/PaymentGW/ValidateByUniqueKey"))
        .and(body_partial_json(json!({"UniqueKey": "k-1", "TotalX100": "1000"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("1"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/PaymentGW/ValidateByUniqueKey"))
        .and(body_partial_json(json!({"UniqueKey": "k-2"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("0"))
        .mount(&server)
        .await;

    let gw = gateway(&server, 2000);
    let ok = gw
        .validate_unique_key(
            &creds(),
            &UniqueKeyCheck {
                confirmation_key: "ck".to_string(),
                session_key: "k-1".to_string(),
                total_minor: 1000,
            },
        )
        .await
        .unwrap();
    let mismatch = gw
        .validate_unique_key(
            &creds(),
            &UniqueKeyCheck {
                confirmation_key: "ck".to_string(),
                session_key: "k-2".to_string(),
                total_minor: 1000,
            },
        )
        .await
        .unwrap();
    assert!(ok);
    assert!(!mismatch);
}

#[tokio::test]
async fn debit_rejection_in_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/DebitRegularType"))
        .and(body_partial_json(json!({"Token": "tok-1", "Total": "1000", "ShopNumber": "1000"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "StatusCode": "004",
            "ErrorMessage": "Refusal by credit company",
            "ResultData": null
        })))
        .mount(&server)
        .await;

    let err = gateway(&server, 2000)
        .charge_by_token(
            &creds(),
            &TokenCharge {
                token: "tok-1".to_string(),
                approval_number: None,
                total_minor: 1000,
                currency_code: 1,
                merchant_param: String::new(),
            },
        )
        .await
        .unwrap_err();
    match err {
        PaymentError::Gateway(g) => {
            assert_eq!(g.kind, GatewayErrorKind::Rejected);
            assert_eq!(g.code, "004");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn windowed_lookup_sends_five_minute_window() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/GetTransData"))
        .and(body_partial_json(json!({
            "startDate": "01/03/2024 12:25",
            "endDate": "01/03/2024 12:35"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "StatusCode": "000",
            "ResultData": [
                {"DebitApproveNumber": "0111111", "DebitTotal": "500"},
                {"DebitApproveNumber": "0555555", "DebitTotal": "1000"}
            ]
        })))
        .mount(&server)
        .await;

    let around = NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(12, 30, 0))
        .unwrap();
    let gw = gateway(&server, 2000);
    let found = gw
        .fetch_transaction_by_window(&creds(), around, "0555555")
        .await
        .unwrap();
    assert_eq!(found.debit_total.as_deref(), Some("1000"));

    let missing = gw
        .fetch_transaction_by_window(&creds(), around, "0999999")
        .await
        .unwrap_err();
    assert!(matches!(missing, PaymentError::NotFound { .. }));
}

#[tokio::test]
async fn non_2xx_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/PaymentGW/GetTransaction"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = gateway(&server, 2000)
        .fetch_transaction(&creds(), "gw-tx-1")
        .await
        .unwrap_err();
    match err {
        PaymentError::Gateway(g) => {
            assert_eq!(g.kind, GatewayErrorKind::Http);
            assert_eq!(g.code, "HTTP_503");
            assert_eq!(g.message, "maintenance");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/PaymentGW/GetTransaction"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"StatusCode": "000", "ResultData": {}}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = gateway(&server, 50)
        .fetch_transaction(&creds(), "gw-tx-1")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "GATEWAY_TIMEOUT");
}
