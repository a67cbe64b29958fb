//! Store and policy wiring shared by all handlers.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use stockroom_auth::PolicyTable;
use stockroom_infra::{AppConfig, InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, seed};

/// Everything a handler needs; cheap to clone behind an `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn InventoryStore>,
    /// Loaded once at startup, read-only afterwards.
    pub policy: Arc<PolicyTable>,
}

impl AppServices {
    pub fn new(store: Arc<dyn InventoryStore>, policy: PolicyTable) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
        }
    }

    /// Empty in-memory store with the built-in role table.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryInventoryStore::new()), PolicyTable::default())
    }

    /// Wire the store and policy described by `config`.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn InventoryStore> = match &config.database_url {
            Some(url) => {
                let store = PostgresInventoryStore::connect(url, config.db_max_connections)
                    .await
                    .context("failed to connect to Postgres")?;
                store.migrate().await.context("failed to apply schema")?;
                info!(max_connections = config.db_max_connections, "using Postgres inventory store");
                Arc::new(store)
            }
            None => {
                info!("DATABASE_URL not set; using in-memory inventory store");
                Arc::new(InMemoryInventoryStore::new())
            }
        };

        let policy = match &config.policy_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read policy file {}", path.display()))?;
                let policy = PolicyTable::from_json(&raw)
                    .with_context(|| format!("invalid policy file {}", path.display()))?;
                info!(path = %path.display(), roles = policy.roles().count(), "policy table loaded");
                policy
            }
            None => PolicyTable::default(),
        };

        if config.seed_demo {
            seed::load_demo_data(store.as_ref())
                .await
                .context("failed to load demo data")?;
        }

        Ok(Self::new(store, policy))
    }
}
