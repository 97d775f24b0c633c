pub mod config;
pub mod error;
pub mod domain {
    pub mod callback;
    pub mod session;
    pub mod transaction;
    pub mod validation;
}
pub mod gateways;
pub mod http {
    pub mod extract;
    pub mod render;
    pub mod routes;
    pub mod handlers {
        pub mod callbacks;
        pub mod confirm;
        pub mod ops;
        pub mod sessions;
        pub mod token;
        pub mod transactions;
    }
    pub mod middleware {
        pub mod internal_auth;
    }
}
pub mod policy;
pub mod repo {
    pub mod memory_store;
    pub mod session_store;
    pub mod sessions_repo;
}
pub mod service {
    pub mod confirmation;
    pub mod orchestrator;
    pub mod redirect;
}

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: service::orchestrator::PaymentOrchestrator,
    pub confirmation: service::confirmation::ConfirmationOracle,
    pub store: Arc<dyn repo::session_store::SessionStore>,
}
