//! Migration Status - Read-only view over registry and ledger

use std::collections::HashSet;
use std::sync::Arc;

use super::definitions::{MigrationRecord, MigrationStatus, MigrationUnit};
use super::record_store::MigrationRecordStore;
use super::registry::MigrationRegistry;
use super::runner::pending_units;
use crate::error::OrmResult;

/// One row of the status table
#[derive(Debug, Clone)]
pub struct MigrationStatusEntry {
    pub id: String,
    /// Empty for orphaned records
    pub description: String,
    pub status: MigrationStatus,
}

/// Applied and pending migrations at one point in time
#[derive(Debug, Clone, Default)]
pub struct MigrationStatusReport {
    pub applied: Vec<MigrationRecord>,
    pub pending: Vec<MigrationUnit>,
    registered: Vec<MigrationUnit>,
}

impl MigrationStatusReport {
    /// Applied records whose identifier is no longer registered
    pub fn orphaned(&self) -> Vec<&MigrationRecord> {
        let known: HashSet<&str> = self.registered.iter().map(|u| u.id.as_str()).collect();
        self.applied
            .iter()
            .filter(|r| !known.contains(r.id.as_str()))
            .collect()
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    /// Every known identifier with its status, ascending
    pub fn entries(&self) -> Vec<MigrationStatusEntry> {
        let mut entries: Vec<MigrationStatusEntry> = self
            .registered
            .iter()
            .map(|unit| {
                let status = match self.applied.iter().find(|r| r.id == unit.id) {
                    Some(record) => MigrationStatus::Applied {
                        applied_at: record.applied_at,
                        batch: record.batch,
                    },
                    None => MigrationStatus::Pending,
                };
                MigrationStatusEntry {
                    id: unit.id.clone(),
                    description: unit.description.clone(),
                    status,
                }
            })
            .collect();

        entries.extend(self.orphaned().into_iter().map(|record| MigrationStatusEntry {
            id: record.id.clone(),
            description: String::new(),
            status: MigrationStatus::Orphaned {
                applied_at: record.applied_at,
                batch: record.batch,
            },
        }));
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }
}

/// Combines registry output and ledger state without mutating either
pub struct StatusReporter {
    registry: Arc<MigrationRegistry>,
    records: Arc<dyn MigrationRecordStore>,
}

impl StatusReporter {
    pub fn new(registry: Arc<MigrationRegistry>, records: Arc<dyn MigrationRecordStore>) -> Self {
        Self { registry, records }
    }

    pub async fn report(&self) -> OrmResult<MigrationStatusReport> {
        let registered = self.registry.list_all()?;
        let applied = self.records.list_applied().await?;
        let pending = pending_units(&registered, &applied)
            .into_iter()
            .cloned()
            .collect();

        let report = MigrationStatusReport {
            applied,
            pending,
            registered,
        };
        for record in report.orphaned() {
            tracing::warn!(migration = %record.id, batch = record.batch, "Applied migration is no longer registered");
        }
        Ok(report)
    }
}
