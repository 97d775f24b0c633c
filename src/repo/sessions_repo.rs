use crate::domain::callback::GatewayCallback;
use crate::domain::session::{Currency, Language, NewSession, Payer, PaymentSession, SessionStatus};
use crate::domain::transaction::{GatewayTransactionDetail, RecordedTransaction, TransactionSource};
use crate::repo::session_store::SessionStore;
use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const SESSION_COLUMNS: &str = "session_id, session_key, organization, charge_mode, amount, currency, \
    installments_requested, installments_min, installments_max, success_url, failure_url, cancel_url, \
    reference, sku, payer_name, payer_email, payer_phone, payer_street, payer_city, payer_country, \
    participants, details, vat, language, created_at";

#[derive(Clone)]
pub struct PgSessionStore {
    pub pool: PgPool,
}

fn session_from_row(r: &PgRow) -> anyhow::Result<PaymentSession> {
    let currency: String = r.get("currency");
    let language: String = r.get("language");
    Ok(PaymentSession {
        revision_id: r.get("id"),
        session_id: r.get("session_id"),
        session_key: r.get("session_key"),
        organization: r.get("organization"),
        charge_mode: r.get::<String, _>("charge_mode").parse()?,
        amount: r.get("amount"),
        currency: Currency::parse(&currency).with_context(|| format!("stored currency {currency}"))?,
        installments_requested: r.get("installments_requested"),
        installments_min: r.get("installments_min"),
        installments_max: r.get("installments_max"),
        success_url: r.get("success_url"),
        failure_url: r.get("failure_url"),
        cancel_url: r.get("cancel_url"),
        reference: r.get("reference"),
        sku: r.get("sku"),
        payer: Payer {
            name: r.get("payer_name"),
            email: r.get("payer_email"),
            phone: r.get("payer_phone"),
            street: r.get("payer_street"),
            city: r.get("payer_city"),
            country: r.get("payer_country"),
        },
        participants: r.get("participants"),
        details: r.get("details"),
        vat: r.get("vat"),
        language: Language::parse(&language).with_context(|| format!("stored language {language}"))?,
        status: r.get::<String, _>("status").parse()?,
        created_at: r.get("created_at"),
        recorded_at: r.get("recorded_at"),
    })
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert_session(&self, s: &NewSession) -> anyhow::Result<PaymentSession> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payment_session_events ({SESSION_COLUMNS}, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
            RETURNING id, {SESSION_COLUMNS}, status, recorded_at
            "#
        ))
        .bind(s.session_id)
        .bind(&s.session_key)
        .bind(&s.organization)
        .bind(s.charge_mode.as_str())
        .bind(s.amount)
        .bind(s.currency.as_str())
        .bind(s.installments_requested)
        .bind(s.installments_min)
        .bind(s.installments_max)
        .bind(&s.success_url)
        .bind(&s.failure_url)
        .bind(&s.cancel_url)
        .bind(&s.reference)
        .bind(&s.sku)
        .bind(&s.payer.name)
        .bind(&s.payer.email)
        .bind(&s.payer.phone)
        .bind(&s.payer.street)
        .bind(&s.payer.city)
        .bind(&s.payer.country)
        .bind(&s.participants)
        .bind(&s.details)
        .bind(s.vat)
        .bind(s.language.as_str())
        .bind(s.created_at)
        .bind(SessionStatus::New.as_str())
        .fetch_one(&self.pool)
        .await?;

        session_from_row(&row)
    }

    async fn current_session(&self, session_key: &str) -> anyhow::Result<Option<PaymentSession>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT id, {SESSION_COLUMNS}, status, recorded_at
            FROM payment_session_events
            WHERE session_key = $1
            ORDER BY id DESC
            LIMIT 1
            "#
        ))
        .bind(session_key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn append_status(
        &self,
        session_key: &str,
        status: SessionStatus,
    ) -> anyhow::Result<Option<PaymentSession>> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payment_session_events ({SESSION_COLUMNS}, status)
            SELECT {SESSION_COLUMNS}, $2
            FROM payment_session_events
            WHERE session_key = $1
            ORDER BY id DESC
            LIMIT 1
            RETURNING id, {SESSION_COLUMNS}, status, recorded_at
            "#
        ))
        .bind(session_key)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn session_history(&self, session_key: &str) -> anyhow::Result<Vec<PaymentSession>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT id, {SESSION_COLUMNS}, status, recorded_at
            FROM payment_session_events
            WHERE session_key = $1
            ORDER BY id ASC
            "#
        ))
        .bind(session_key)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(session_from_row).collect()
    }

    async fn record_callback(&self, cb: &GatewayCallback) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO gateway_callbacks (
                session_key, kind, gateway_transaction_id, gateway_status_code,
                confirmation_key, approval_number, card_token, merchant_param, received_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&cb.session_key)
        .bind(cb.kind.as_str())
        .bind(&cb.gateway_transaction_id)
        .bind(&cb.gateway_status_code)
        .bind(&cb.confirmation_key)
        .bind(&cb.approval_number)
        .bind(cb.card_token.as_deref())
        .bind(&cb.merchant_param)
        .bind(cb.received_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn callbacks_for(&self, session_key: &str) -> anyhow::Result<Vec<GatewayCallback>> {
        let rows = sqlx::query(
            r#"
            SELECT session_key, kind, gateway_transaction_id, gateway_status_code,
                   confirmation_key, approval_number, card_token, merchant_param, received_at
            FROM gateway_callbacks
            WHERE session_key = $1
            ORDER BY id ASC
            "#,
        )
        .bind(session_key)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> anyhow::Result<GatewayCallback> {
                Ok(GatewayCallback {
                    session_key: r.get("session_key"),
                    kind: r.get::<String, _>("kind").parse()?,
                    gateway_transaction_id: r.get("gateway_transaction_id"),
                    gateway_status_code: r.get("gateway_status_code"),
                    confirmation_key: r.get("confirmation_key"),
                    approval_number: r.get("approval_number"),
                    card_token: r.get("card_token"),
                    merchant_param: r.get("merchant_param"),
                    received_at: r.get("received_at"),
                })
            })
            .collect()
    }

    async fn record_transaction(
        &self,
        session_key: &str,
        source: TransactionSource,
        detail: &GatewayTransactionDetail,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO gateway_transactions (session_key, source, detail)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(session_key)
        .bind(source.as_str())
        .bind(sqlx::types::Json(detail))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn transactions_for(&self, session_key: &str) -> anyhow::Result<Vec<RecordedTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT session_key, source, detail, recorded_at
            FROM gateway_transactions
            WHERE session_key = $1
            ORDER BY id ASC
            "#,
        )
        .bind(session_key)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> anyhow::Result<RecordedTransaction> {
                let detail: sqlx::types::Json<GatewayTransactionDetail> = r.get("detail");
                Ok(RecordedTransaction {
                    session_key: r.get("session_key"),
                    source: r.get::<String, _>("source").parse()?,
                    detail: detail.0,
                    recorded_at: r.get("recorded_at"),
                })
            })
            .collect()
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
