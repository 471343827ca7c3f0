//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the fundamental types used throughout the migration system:
//! units and their operations, ledger records, configuration and run results.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::backends::{Document, Filter, StoreHandle};
use crate::error::OrmResult;

/// Function value run against the shared store handle
pub type CustomOperation =
    Arc<dyn Fn(StoreHandle) -> BoxFuture<'static, OrmResult<()>> + Send + Sync>;

/// One structural or data change
#[derive(Clone)]
pub enum Operation {
    /// Create a collection with unique indexes on the given fields
    CreateCollection { name: String, unique: Vec<String> },
    DropCollection { name: String },
    InsertMany { collection: String, documents: Vec<Document> },
    /// Merge `set` into every document matching `filter`
    UpdateMany { collection: String, filter: Filter, set: Document },
    UnsetFields { collection: String, filter: Filter, fields: Vec<String> },
    DeleteMany { collection: String, filter: Filter },
    RenameField { collection: String, from: String, to: String },
    Custom(CustomOperation),
    /// Run operations in order, stopping at the first failure
    Sequence(Vec<Operation>),
    /// Irreversible but harmless step
    Noop,
}

impl Operation {
    pub fn create_collection(name: impl Into<String>, unique: &[&str]) -> Self {
        Operation::CreateCollection {
            name: name.into(),
            unique: unique.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn drop_collection(name: impl Into<String>) -> Self {
        Operation::DropCollection { name: name.into() }
    }

    /// Wrap an async closure as a custom operation
    pub fn custom<F, Fut>(f: F) -> Self
    where
        F: Fn(StoreHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OrmResult<()>> + Send + 'static,
    {
        Operation::Custom(Arc::new(move |store| f(store).boxed()))
    }

    /// Short label for logs
    pub fn describe(&self) -> String {
        match self {
            Operation::CreateCollection { name, .. } => format!("create collection {}", name),
            Operation::DropCollection { name } => format!("drop collection {}", name),
            Operation::InsertMany { collection, documents } => {
                format!("insert {} documents into {}", documents.len(), collection)
            }
            Operation::UpdateMany { collection, .. } => format!("update {}", collection),
            Operation::UnsetFields { collection, fields, .. } => {
                format!("unset {} on {}", fields.join(", "), collection)
            }
            Operation::DeleteMany { collection, .. } => format!("delete from {}", collection),
            Operation::RenameField { collection, from, to } => {
                format!("rename {}.{} to {}", collection, from, to)
            }
            Operation::Custom(_) => "custom".to_string(),
            Operation::Sequence(steps) => format!("sequence of {} steps", steps.len()),
            Operation::Noop => "noop".to_string(),
        }
    }

    /// Execute against the store
    pub fn execute<'a>(&'a self, store: &'a StoreHandle) -> BoxFuture<'a, OrmResult<()>> {
        async move {
            match self {
                Operation::CreateCollection { name, unique } => {
                    store.ensure_collection(name, unique).await?;
                }
                Operation::DropCollection { name } => {
                    store.drop_collection(name).await?;
                }
                Operation::InsertMany { collection, documents } => {
                    store.insert_many(collection, documents.clone()).await?;
                }
                Operation::UpdateMany { collection, filter, set } => {
                    store.update_many(collection, filter, set.clone()).await?;
                }
                Operation::UnsetFields { collection, filter, fields } => {
                    store.unset_fields(collection, filter, fields).await?;
                }
                Operation::DeleteMany { collection, filter } => {
                    store.delete_many(collection, filter).await?;
                }
                Operation::RenameField { collection, from, to } => {
                    store.rename_field(collection, from, to).await?;
                }
                Operation::Custom(f) => f(Arc::clone(store)).await?,
                Operation::Sequence(steps) => {
                    for step in steps {
                        step.execute(store).await?;
                    }
                }
                Operation::Noop => {}
            }
            Ok(())
        }
        .boxed()
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Custom(_) => f.write_str("Custom(<fn>)"),
            Operation::Sequence(steps) => f.debug_tuple("Sequence").field(steps).finish(),
            other => f.write_str(&other.describe()),
        }
    }
}

/// A registered migration
#[derive(Debug, Clone)]
pub struct MigrationUnit {
    /// Unique, monotonic identifier (typically timestamp prefixed)
    pub id: String,
    /// Human-readable description
    pub description: String,
    pub up: Option<Operation>,
    pub down: Option<Operation>,
}

impl MigrationUnit {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            up: None,
            down: None,
        }
    }

    pub fn up(mut self, operation: Operation) -> Self {
        self.up = Some(operation);
        self
    }

    pub fn down(mut self, operation: Operation) -> Self {
        self.down = Some(operation);
        self
    }
}

/// Migration status in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Migration ID
    pub id: String,
    /// When the migration was applied
    pub applied_at: DateTime<Utc>,
    /// Batch number (for grouping migrations)
    pub batch: i32,
}

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Collection tracking applied migrations
    pub migrations_collection: String,
    /// Collection holding the run lock
    pub lock_collection: String,
    /// Take the lock around apply and rollback
    pub use_lock: bool,
    /// Age after which a held lock counts as abandoned and may be taken over
    pub lock_stale_after: Option<Duration>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_collection: "strata_migrations".to_string(),
            lock_collection: "strata_migrations_lock".to_string(),
            use_lock: true,
            lock_stale_after: Some(Duration::from_secs(15 * 60)),
        }
    }
}

/// Result of running migrations
#[derive(Debug, Clone, Default)]
pub struct MigrationRunResult {
    /// Number of migrations that were applied
    pub applied_count: usize,
    /// IDs of migrations that were applied
    pub applied_migrations: Vec<String>,
    /// Number of migrations that were skipped (already applied)
    pub skipped_count: usize,
    /// Batch used for this run, `None` when nothing was pending
    pub batch: Option<i32>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Result of rolling back migrations
#[derive(Debug, Clone, Default)]
pub struct RollbackResult {
    /// Number of migrations that were rolled back
    pub rolled_back_count: usize,
    /// IDs of migrations that were rolled back, in execution order
    pub rolled_back_migrations: Vec<String>,
    /// Number of distinct batches touched
    pub batches_rolled_back: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Apply the migration
    Up,
    /// Rollback the migration
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        /// When it was applied
        applied_at: DateTime<Utc>,
        /// Batch number
        batch: i32,
    },
    /// Recorded as applied but no longer registered
    Orphaned {
        applied_at: DateTime<Utc>,
        batch: i32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{DocumentStore, FindQuery, MemoryStore};
    use serde_json::json;

    #[tokio::test]
    async fn test_sequence_runs_in_order() {
        let store: StoreHandle = Arc::new(MemoryStore::new());
        let mut doc = Document::new();
        doc.insert("_id".into(), json!("a"));
        doc.insert("name".into(), json!("Ada Lovelace"));

        let op = Operation::Sequence(vec![
            Operation::create_collection("people", &["name"]),
            Operation::InsertMany {
                collection: "people".into(),
                documents: vec![doc],
            },
            Operation::RenameField {
                collection: "people".into(),
                from: "name".into(),
                to: "fullName".into(),
            },
            Operation::custom(|store: StoreHandle| async move {
                let mut set = Document::new();
                set.insert("tagged".into(), json!(true));
                store.update_many("people", &Filter::All, set).await.map(|_| ())
            }),
        ]);
        op.execute(&store).await.unwrap();

        let people = store.find("people", &FindQuery::all()).await.unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0]["fullName"], json!("Ada Lovelace"));
        assert_eq!(people[0]["tagged"], json!(true));
        assert!(people[0].get("name").is_none());
    }

    #[tokio::test]
    async fn test_sequence_stops_at_first_failure() {
        let memory = Arc::new(MemoryStore::new());
        let store: StoreHandle = memory.clone();
        let op = Operation::Sequence(vec![
            Operation::custom(|_| async {
                Err::<(), _>(crate::error::OrmError::Validation("nope".into()))
            }),
            Operation::create_collection("never", &[]),
        ]);
        assert!(op.execute(&store).await.is_err());
        assert!(!memory.has_collection("never"));
    }

    #[test]
    fn test_direction_and_debug() {
        assert_eq!(MigrationDirection::Up.to_string(), "up");
        assert_eq!(MigrationDirection::Down.to_string(), "down");
        assert_eq!(format!("{:?}", Operation::Noop), "noop");
        assert_eq!(format!("{:?}", Operation::custom(|_| async { Ok::<(), crate::error::OrmError>(()) })), "Custom(<fn>)");
    }
}
