pub mod migrations;
pub mod seeds;

use std::sync::Arc;

use anyhow::{Context, Result};
use strata_orm::{
    MemoryStore, MigrationRunner, PostgresDocumentStore, PostgresStoreConfig, StoreBackendType,
    StoreHandle,
};

use crate::config::AppConfig;

/// Open the configured store
pub async fn connect(config: &AppConfig) -> Result<StoreHandle> {
    match config.driver {
        StoreBackendType::Memory => {
            tracing::warn!("Using the in-memory store; nothing persists after this command");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackendType::PostgreSQL => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres driver")?;
            let store = PostgresDocumentStore::connect(url, PostgresStoreConfig::default())
                .await
                .context("Failed to connect to PostgreSQL")?;
            Ok(Arc::new(store))
        }
    }
}

pub fn migration_runner(store: StoreHandle, config: &AppConfig) -> MigrationRunner {
    MigrationRunner::new(store, migrations::registry(), config.migration_config())
}
