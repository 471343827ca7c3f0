//! Migration Record Store - Ledger of applied migrations
//!
//! The ledger lives in its own collection, one document per applied
//! migration, uniquely indexed on `id`.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;

use super::definitions::MigrationRecord;
use crate::backends::{Document, Filter, FindQuery, SortOrder, StoreHandle, ID_FIELD};
use crate::error::{OrmError, OrmResult};

/// Persistence contract for applied-migration bookkeeping
#[async_trait]
pub trait MigrationRecordStore: Send + Sync {
    /// Create the ledger collection and its unique index (idempotent)
    async fn ensure_schema(&self) -> OrmResult<()>;

    /// Applied records, ascending by identifier
    async fn list_applied(&self) -> OrmResult<Vec<MigrationRecord>>;

    /// Record a migration as applied in `batch`
    async fn record_applied(&self, id: &str, batch: i32) -> OrmResult<MigrationRecord>;

    /// Forget an applied migration
    async fn remove_applied(&self, id: &str) -> OrmResult<()>;

    /// Highest recorded batch plus one, or 1 for an empty ledger
    async fn next_batch_number(&self) -> OrmResult<i32>;
}

/// [`MigrationRecordStore`] over any document store
pub struct DocumentRecordStore {
    store: StoreHandle,
    collection: String,
}

impl DocumentRecordStore {
    pub fn new(store: StoreHandle, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn to_document(record: &MigrationRecord) -> OrmResult<Document> {
        let mut document = match serde_json::to_value(record)? {
            JsonValue::Object(map) => map,
            _ => return Err(OrmError::Serialization("Migration record is not an object".into())),
        };
        document.insert(ID_FIELD.to_string(), JsonValue::String(record.id.clone()));
        Ok(document)
    }

    fn from_document(mut document: Document) -> OrmResult<MigrationRecord> {
        document.remove(ID_FIELD);
        Ok(serde_json::from_value(JsonValue::Object(document))?)
    }
}

#[async_trait]
impl MigrationRecordStore for DocumentRecordStore {
    async fn ensure_schema(&self) -> OrmResult<()> {
        self.store
            .ensure_collection(&self.collection, &["id".to_string()])
            .await
    }

    async fn list_applied(&self) -> OrmResult<Vec<MigrationRecord>> {
        let documents = self
            .store
            .find(&self.collection, &FindQuery::all().sort_by("id", SortOrder::Asc))
            .await?;

        let mut records = documents
            .into_iter()
            .map(Self::from_document)
            .collect::<OrmResult<Vec<_>>>()?;
        records.sort_by(|a, b| a.id.cmp(&b.id));

        if let Some(pair) = records.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(OrmError::DuplicateIdentifier(pair[0].id.clone()));
        }
        Ok(records)
    }

    async fn record_applied(&self, id: &str, batch: i32) -> OrmResult<MigrationRecord> {
        if self
            .store
            .find_one(&self.collection, &Filter::eq("id", id))
            .await?
            .is_some()
        {
            return Err(OrmError::DuplicateIdentifier(id.to_string()));
        }

        let record = MigrationRecord {
            id: id.to_string(),
            applied_at: Utc::now(),
            batch,
        };
        match self
            .store
            .insert_one(&self.collection, Self::to_document(&record)?)
            .await
        {
            Ok(()) => Ok(record),
            Err(OrmError::DuplicateKey { .. }) => Err(OrmError::DuplicateIdentifier(id.to_string())),
            Err(e) => Err(e),
        }
    }

    async fn remove_applied(&self, id: &str) -> OrmResult<()> {
        if self
            .store
            .delete_one(&self.collection, &Filter::eq("id", id))
            .await?
        {
            Ok(())
        } else {
            Err(OrmError::NotFound(format!("Migration record {}", id)))
        }
    }

    async fn next_batch_number(&self) -> OrmResult<i32> {
        let latest = self
            .store
            .find(
                &self.collection,
                &FindQuery::all().sort_by("batch", SortOrder::Desc).limit(1),
            )
            .await?;

        match latest.into_iter().next() {
            Some(document) => Ok(Self::from_document(document)?.batch + 1),
            None => Ok(1),
        }
    }
}
