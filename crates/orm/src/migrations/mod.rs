//! Migration System
//!
//! Ordered, batch-tracked structural and data changes against a document
//! store: a registry of units, a ledger of what was applied, a runner that
//! applies and rolls back, and a read-only status view.

pub mod definitions;
pub mod lock;
pub mod record_store;
pub mod registry;
pub mod rollback;
pub mod runner;
pub mod status;

pub use definitions::*;
pub use lock::MigrationLock;
pub use record_store::{DocumentRecordStore, MigrationRecordStore};
pub use registry::MigrationRegistry;
pub use runner::MigrationRunner;
pub use status::{MigrationStatusEntry, MigrationStatusReport, StatusReporter};
