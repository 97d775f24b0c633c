use anyhow::{bail, Result};
use hosted_checkout::config::AppConfig;
use hosted_checkout::repo::session_store::SessionStore;
use hosted_checkout::repo::sessions_repo::PgSessionStore;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

/// Prints the revision history, callbacks and gateway transactions of one session.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Some(session_key) = std::env::args().nth(1) else {
        bail!("usage: session_audit <session-key>");
    };

    let cfg = AppConfig::from_env();
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&cfg.database_url)
        .await?;
    let store = PgSessionStore { pool };

    let history = store.session_history(&session_key).await?;
    if history.is_empty() {
        bail!("no session recorded for {session_key}");
    }

    println!("session {session_key}");
    for rev in &history {
        println!(
            "  #{:<6} {} {:<10} {} {} {} org={}",
            rev.revision_id,
            rev.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            rev.status.as_str(),
            rev.amount,
            rev.currency.as_str(),
            rev.charge_mode.as_str(),
            rev.organization
        );
    }

    let callbacks = store.callbacks_for(&session_key).await?;
    println!("callbacks ({})", callbacks.len());
    for cb in &callbacks {
        println!(
            "  {} {:<7} gateway_tx={} status={}",
            cb.received_at.format("%Y-%m-%d %H:%M:%S"),
            cb.kind.as_str(),
            cb.gateway_transaction_id,
            cb.gateway_status_code
        );
    }

    let transactions = store.transactions_for(&session_key).await?;
    println!("gateway transactions ({})", transactions.len());
    for tx in &transactions {
        println!(
            "  {} {:<12} {}",
            tx.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            tx.source.as_str(),
            serde_json::to_string(&tx.detail)?
        );
    }

    Ok(())
}
