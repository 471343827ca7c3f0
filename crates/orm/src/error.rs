//! Error types for the ORM system
//!
//! Covers migration discovery, ledger bookkeeping, seeding and the
//! underlying document store.

use thiserror::Error;

use crate::migrations::MigrationDirection;

/// ORM result type alias
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for ORM operations
#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// Migration definitions are malformed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Two migrations (or two ledger records) share an identifier
    #[error("Duplicate migration identifier: {0}")]
    DuplicateIdentifier(String),

    /// A recorded migration has no definition anymore
    #[error("Unknown migration '{0}': no definition is registered for this identifier")]
    UnknownMigration(String),

    /// Requested seeder or record absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// An up or down step failed
    #[error("Migration {identifier} failed while running {direction} (batch {batch}): {message}")]
    MigrationFailed {
        identifier: String,
        direction: MigrationDirection,
        batch: i32,
        message: String,
    },

    /// A seeder failed
    #[error("Seeder '{name}' failed: {message}")]
    SeedFailed { name: String, message: String },

    /// Driver level failure
    #[error("Database error: {0}")]
    Database(String),

    /// Unique index violation
    #[error("Duplicate key in collection '{collection}': {key}")]
    DuplicateKey { collection: String, key: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Input rejected before reaching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Another migration run holds the lock
    #[error("Migration lock is held: {0}")]
    Locked(String),
}

impl OrmError {
    /// Whether this error came out of executing an operation against the store
    /// (up/down step, seeder, or the driver itself).
    pub fn is_store_operation(&self) -> bool {
        matches!(
            self,
            OrmError::MigrationFailed { .. }
                | OrmError::SeedFailed { .. }
                | OrmError::Database(_)
                | OrmError::DuplicateKey { .. }
        )
    }

    /// Whether the whole command must stop because the migration set itself is broken
    pub fn is_discovery(&self) -> bool {
        matches!(self, OrmError::Discovery(_) | OrmError::DuplicateIdentifier(_))
    }
}

impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        OrmError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_operation_classification() {
        let failed = OrmError::MigrationFailed {
            identifier: "20240101000000_create_users".to_string(),
            direction: MigrationDirection::Up,
            batch: 3,
            message: "boom".to_string(),
        };
        assert!(failed.is_store_operation());
        assert!(!failed.is_discovery());

        let message = failed.to_string();
        assert!(message.contains("20240101000000_create_users"));
        assert!(message.contains("up"));
        assert!(message.contains("batch 3"));

        assert!(OrmError::DuplicateIdentifier("x".into()).is_discovery());
        assert!(!OrmError::NotFound("x".into()).is_store_operation());
    }
}
