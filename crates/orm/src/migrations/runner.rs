//! Migration Runner - Executes migrations against the store
//!
//! Handles the actual execution of migrations, tracking applied migrations,
//! and managing migration batches.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use super::definitions::{
    MigrationConfig, MigrationDirection, MigrationRecord, MigrationRunResult, MigrationUnit,
};
use super::lock::MigrationLock;
use super::record_store::{DocumentRecordStore, MigrationRecordStore};
use super::registry::MigrationRegistry;
use super::status::StatusReporter;
use crate::backends::StoreHandle;
use crate::error::{OrmError, OrmResult};

/// Migration runner that applies and rolls back registered migrations
pub struct MigrationRunner {
    store: StoreHandle,
    registry: Arc<MigrationRegistry>,
    records: Arc<dyn MigrationRecordStore>,
    config: MigrationConfig,
}

impl MigrationRunner {
    /// Create a runner keeping its ledger in the configured collection
    pub fn new(store: StoreHandle, registry: MigrationRegistry, config: MigrationConfig) -> Self {
        let records = Arc::new(DocumentRecordStore::new(
            Arc::clone(&store),
            config.migrations_collection.clone(),
        ));
        Self {
            store,
            registry: Arc::new(registry),
            records,
            config,
        }
    }

    /// Swap the ledger implementation
    pub fn with_record_store(mut self, records: Arc<dyn MigrationRecordStore>) -> Self {
        self.records = records;
        self
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub fn records(&self) -> &Arc<dyn MigrationRecordStore> {
        &self.records
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Read-only reporter over the same registry and ledger
    pub fn status_reporter(&self) -> StatusReporter {
        StatusReporter::new(Arc::clone(&self.registry), Arc::clone(&self.records))
    }

    /// Run all pending migrations as one new batch
    pub async fn apply(&self) -> OrmResult<MigrationRunResult> {
        let start_time = Instant::now();

        // Load every definition before touching the store
        let units = self.registry.list_all()?;

        self.records.ensure_schema().await?;
        let applied = self.records.list_applied().await?;
        if pending_units(&units, &applied).is_empty() {
            tracing::info!(applied = applied.len(), "Nothing to migrate");
            return Ok(MigrationRunResult {
                skipped_count: applied.len(),
                execution_time_ms: start_time.elapsed().as_millis(),
                ..Default::default()
            });
        }

        let lock = self.acquire_lock().await?;
        let outcome = self.apply_pending(&units, start_time).await;
        self.release_lock(lock, outcome).await
    }

    async fn apply_pending(
        &self,
        units: &[MigrationUnit],
        start_time: Instant,
    ) -> OrmResult<MigrationRunResult> {
        // Re-read under the lock; another run may have finished in between
        let applied = self.records.list_applied().await?;
        let pending = pending_units(units, &applied);
        if pending.is_empty() {
            return Ok(MigrationRunResult {
                skipped_count: applied.len(),
                execution_time_ms: start_time.elapsed().as_millis(),
                ..Default::default()
            });
        }

        if let (Some(first), Some(latest)) = (pending.first(), applied.last()) {
            if first.id < latest.id {
                tracing::warn!(
                    migration = %first.id,
                    latest = %latest.id,
                    "Pending migration sorts before the latest applied one"
                );
            }
        }

        let batch = self.records.next_batch_number().await?;
        let mut applied_migrations = Vec::with_capacity(pending.len());

        for unit in pending {
            tracing::info!(
                migration = %unit.id,
                batch,
                direction = %MigrationDirection::Up,
                "Migrating: {}",
                unit.description
            );

            let up = unit
                .up
                .as_ref()
                .ok_or_else(|| OrmError::Discovery(format!("Migration {} has no up operation", unit.id)))?;

            if let Err(e) = up.execute(&self.store).await {
                tracing::error!(migration = %unit.id, batch, error = %e, "Migration failed");
                return Err(OrmError::MigrationFailed {
                    identifier: unit.id.clone(),
                    direction: MigrationDirection::Up,
                    batch,
                    message: e.to_string(),
                });
            }
            if let Err(e) = self.records.record_applied(&unit.id, batch).await {
                tracing::error!(migration = %unit.id, batch, error = %e, "Failed to record migration");
                return Err(OrmError::MigrationFailed {
                    identifier: unit.id.clone(),
                    direction: MigrationDirection::Up,
                    batch,
                    message: format!("applied but not recorded: {}", e),
                });
            }
            applied_migrations.push(unit.id.clone());
        }

        tracing::info!(batch, count = applied_migrations.len(), "Migrations applied");
        Ok(MigrationRunResult {
            applied_count: applied_migrations.len(),
            applied_migrations,
            skipped_count: applied.len(),
            batch: Some(batch),
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    pub(crate) async fn acquire_lock(&self) -> OrmResult<Option<MigrationLock>> {
        if !self.config.use_lock {
            return Ok(None);
        }
        let lock = self.lock();
        lock.acquire().await?;
        Ok(Some(lock))
    }

    fn lock(&self) -> MigrationLock {
        MigrationLock::new(Arc::clone(&self.store), self.config.lock_collection.clone())
            .with_stale_after(self.config.lock_stale_after)
    }

    /// Clear a lock left by a run that died before releasing it
    pub async fn force_unlock(&self) -> OrmResult<bool> {
        self.lock().force_release().await
    }

    /// Release the lock whatever the outcome, keeping the first error
    pub(crate) async fn release_lock<T>(
        &self,
        lock: Option<MigrationLock>,
        outcome: OrmResult<T>,
    ) -> OrmResult<T> {
        let Some(lock) = lock else {
            return outcome;
        };
        match (lock.release().await, outcome) {
            (Ok(()), outcome) => outcome,
            (Err(release_error), Ok(_)) => Err(release_error),
            (Err(release_error), Err(e)) => {
                tracing::warn!(error = %release_error, "Failed to release migration lock");
                Err(e)
            }
        }
    }
}

/// Registered units without a ledger record, in ascending order
pub(crate) fn pending_units<'a>(
    units: &'a [MigrationUnit],
    applied: &[MigrationRecord],
) -> Vec<&'a MigrationUnit> {
    let applied_ids: HashSet<&str> = applied.iter().map(|r| r.id.as_str()).collect();
    units
        .iter()
        .filter(|unit| !applied_ids.contains(unit.id.as_str()))
        .collect()
}
