//! Document Store Backends
//!
//! The migration engine and the repositories only ever talk to a
//! [`DocumentStore`]. Concrete drivers live next to it: an in-process
//! store for tests and throwaway runs, and a PostgreSQL store that keeps
//! each collection as a JSONB table.

pub mod core;
pub mod filter;
pub mod memory;
pub mod postgres;

pub use core::*;
pub use filter::{Filter, FindQuery, SortOrder};
pub use memory::MemoryStore;
pub use postgres::{PostgresDocumentStore, PostgresStoreConfig};

/// Store backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreBackendType {
    Memory,
    PostgreSQL,
}

impl std::fmt::Display for StoreBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackendType::Memory => write!(f, "memory"),
            StoreBackendType::PostgreSQL => write!(f, "postgresql"),
        }
    }
}

impl std::str::FromStr for StoreBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" | "in-memory" => Ok(StoreBackendType::Memory),
            "postgresql" | "postgres" | "pg" => Ok(StoreBackendType::PostgreSQL),
            _ => Err(format!("Unsupported store backend: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!("postgres".parse::<StoreBackendType>().unwrap(), StoreBackendType::PostgreSQL);
        assert_eq!("MEMORY".parse::<StoreBackendType>().unwrap(), StoreBackendType::Memory);
        assert!("mysql".parse::<StoreBackendType>().is_err());
        assert_eq!(StoreBackendType::PostgreSQL.to_string(), "postgresql");
    }
}
