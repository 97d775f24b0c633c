use hosted_checkout::config::{AppConfig, GatewayMode, StoreBackend};
use hosted_checkout::gateways::http_client::HttpGateway;
use hosted_checkout::gateways::mock::MockGateway;
use hosted_checkout::gateways::{GatewayCredentialResolver, HostedGateway};
use hosted_checkout::http::routes::router;
use hosted_checkout::policy::PolicyTable;
use hosted_checkout::repo::memory_store::InMemorySessionStore;
use hosted_checkout::repo::session_store::SessionStore;
use hosted_checkout::repo::sessions_repo::PgSessionStore;
use hosted_checkout::service::confirmation::ConfirmationOracle;
use hosted_checkout::service::orchestrator::PaymentOrchestrator;
use hosted_checkout::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let store: Arc<dyn SessionStore> = match cfg.store {
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&cfg.database_url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            Arc::new(PgSessionStore { pool })
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory session store; sessions are lost on restart");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let gateway: Arc<dyn HostedGateway> = match cfg.gateway_mode {
        GatewayMode::Http => Arc::new(HttpGateway::new(
            &cfg.payment_page_url,
            &cfg.gateway_service_url,
            cfg.gateway_timeout_ms,
        )),
        GatewayMode::Mock => Arc::new(MockGateway::new(&format!("{}/mock-page", cfg.public_base_url))),
    };

    let policies = PolicyTable::load(cfg.organizations_file.as_deref())?;
    let credentials = GatewayCredentialResolver::from_env(&policies.names());
    tracing::info!(organizations = ?policies.names(), gateway = gateway.name(), "policies loaded");

    let orchestrator = PaymentOrchestrator::new(
        store.clone(),
        gateway,
        credentials,
        policies,
        &cfg.public_base_url,
    )?;

    let state = AppState {
        orchestrator,
        confirmation: ConfirmationOracle::new(store.clone()),
        store,
    };

    let app = router(state, cfg.internal_api_key.clone());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
