use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::database::init_postgres;
use crate::eligibility::EligibilityGate;
use crate::identity::{IdentityResolver, ProfileJoin, RemoteIdentity, ResolveStrategy};
use crate::store::{ReviewStore, memory::MemoryStore, postgres::PostgresStore};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ReviewStore>,
    pub gate: EligibilityGate,
    pub resolver: IdentityResolver,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store: Arc<dyn ReviewStore> = match config.store_backend {
            StoreBackend::Postgres => {
                Arc::new(PostgresStore::new(init_postgres(&config.database_url).await))
            }
            StoreBackend::Memory => {
                info!("Using in-memory store, nothing will be persisted");
                Arc::new(MemoryStore::new())
            }
        };

        Arc::new(Self::assemble(config, store))
    }

    /// Wiring shared with the tests, which inject their own store.
    pub fn assemble(config: Config, store: Arc<dyn ReviewStore>) -> Self {
        let gate = EligibilityGate::new(store.clone(), config.require_contact_intent);

        let mut strategies: Vec<Box<dyn ResolveStrategy>> =
            vec![Box::new(ProfileJoin::new(store.clone()))];
        if let Some(base_url) = &config.identity_api_url {
            strategies.push(Box::new(RemoteIdentity::new(
                base_url.clone(),
                Duration::from_millis(config.identity_timeout_ms),
            )));
        }
        let resolver = IdentityResolver::new(strategies);

        Self {
            config,
            store,
            gate,
            resolver,
        }
    }
}
