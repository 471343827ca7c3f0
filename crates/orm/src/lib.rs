//! # strata-orm: Migration and repository layer for document stores
//!
//! Applies, tracks and reverses ordered structural and data changes
//! against a document store, runs environment-gated seeders, and exposes
//! per-entity repository contracts that keep domain code independent of the
//! store's query model.
//!
//! Every component takes a shared [`StoreHandle`] at construction; drivers
//! implement [`DocumentStore`].

pub mod backends;
pub mod error;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod security;
pub mod seeding;

// Re-export core traits and types
pub use backends::{
    Document, DocumentExt, DocumentStore, Filter, FindQuery, MemoryStore, PostgresDocumentStore,
    PostgresStoreConfig, SortOrder, StoreBackendType, StoreHandle,
};
pub use error::{OrmError, OrmResult};
pub use migrations::{
    MigrationConfig, MigrationDirection, MigrationLock, MigrationRecord, MigrationRecordStore,
    MigrationRegistry, MigrationRunResult, MigrationRunner, MigrationStatusReport, MigrationUnit,
    Operation, RollbackResult, StatusReporter,
};
pub use models::{CreateFile, CreateUser, StoredFile, UpdateFile, UpdateUser, User, UserRole};
pub use repository::{
    DocumentFileRepository, DocumentUserRepository, FileRepository, Page, PageRequest,
    UserRepository,
};
pub use seeding::{Environment, SeedFailurePolicy, SeedRunResult, SeedRunner, Seeder};
