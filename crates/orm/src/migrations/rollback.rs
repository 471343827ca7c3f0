//! Migration Rollback - Handles rolling back applied migrations
//!
//! Rollback is batch-granular: the last N distinct batches are undone,
//! newest migration first.

use std::collections::BTreeSet;
use std::time::Instant;

use super::definitions::{MigrationDirection, MigrationRunResult, RollbackResult};
use super::runner::MigrationRunner;
use crate::error::{OrmError, OrmResult};

impl MigrationRunner {
    /// Roll back the most recent batch
    pub async fn rollback_last_batch(&self) -> OrmResult<RollbackResult> {
        self.rollback(1).await
    }

    /// Roll back the last `steps` batches. Asking for more batches than exist rolls back all of them.
    pub async fn rollback(&self, steps: usize) -> OrmResult<RollbackResult> {
        let start_time = Instant::now();
        if steps == 0 {
            return Ok(RollbackResult::default());
        }

        // Discovery failures stop the command before anything is undone
        self.registry().list_all()?;

        let applied = self.records().list_applied().await?;
        if applied.is_empty() {
            tracing::info!("Nothing to roll back");
            return Ok(RollbackResult {
                execution_time_ms: start_time.elapsed().as_millis(),
                ..Default::default()
            });
        }

        let lock = self.acquire_lock().await?;
        let outcome = self.rollback_batches(steps, start_time).await;
        self.release_lock(lock, outcome).await
    }

    /// Roll back every batch
    pub async fn rollback_all(&self) -> OrmResult<RollbackResult> {
        self.rollback(usize::MAX).await
    }

    /// Alias for [`rollback_all`](Self::rollback_all)
    pub async fn reset(&self) -> OrmResult<RollbackResult> {
        self.rollback_all().await
    }

    /// Roll back everything, then apply everything as one fresh batch
    pub async fn refresh(&self) -> OrmResult<(RollbackResult, MigrationRunResult)> {
        let rolled_back = self.rollback_all().await?;
        let applied = self.apply().await?;
        Ok((rolled_back, applied))
    }

    async fn rollback_batches(&self, steps: usize, start_time: Instant) -> OrmResult<RollbackResult> {
        let applied = self.records().list_applied().await?;

        let batches: BTreeSet<i32> = applied.iter().map(|r| r.batch).collect();
        let targets: BTreeSet<i32> = batches.into_iter().rev().take(steps).collect();

        let mut records: Vec<_> = applied
            .into_iter()
            .filter(|r| targets.contains(&r.batch))
            .collect();
        records.sort_by(|a, b| b.id.cmp(&a.id));

        let mut rolled_back_migrations = Vec::with_capacity(records.len());
        for record in records {
            let down = self
                .registry()
                .find(&record.id)
                .and_then(|unit| unit.down.as_ref())
                .ok_or_else(|| OrmError::UnknownMigration(record.id.clone()))?;

            tracing::info!(
                migration = %record.id,
                batch = record.batch,
                direction = %MigrationDirection::Down,
                "Rolling back: {}",
                down.describe()
            );

            if let Err(e) = down.execute(self.store()).await {
                tracing::error!(migration = %record.id, batch = record.batch, error = %e, "Rollback failed");
                return Err(OrmError::MigrationFailed {
                    identifier: record.id.clone(),
                    direction: MigrationDirection::Down,
                    batch: record.batch,
                    message: e.to_string(),
                });
            }
            if let Err(e) = self.records().remove_applied(&record.id).await {
                tracing::error!(migration = %record.id, batch = record.batch, error = %e, "Failed to remove migration record");
                return Err(OrmError::MigrationFailed {
                    identifier: record.id.clone(),
                    direction: MigrationDirection::Down,
                    batch: record.batch,
                    message: format!("rolled back but still recorded: {}", e),
                });
            }
            rolled_back_migrations.push(record.id);
        }

        tracing::info!(
            batches = targets.len(),
            count = rolled_back_migrations.len(),
            "Rollback complete"
        );
        Ok(RollbackResult {
            rolled_back_count: rolled_back_migrations.len(),
            rolled_back_migrations,
            batches_rolled_back: targets.len(),
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }
}
