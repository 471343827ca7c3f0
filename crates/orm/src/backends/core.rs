//! Core Document Store Traits
//!
//! This module defines the driver contract every backend implements:
//! CRUD by filter, counting, and a single-key grouping aggregate.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value as JsonValue};

use super::filter::{Filter, FindQuery};
use crate::error::OrmResult;

/// A store-native document
pub type Document = Map<String, JsonValue>;

/// Shared handle to a store. Components hold one of these, never own the driver.
pub type StoreHandle = Arc<dyn DocumentStore>;

/// Field holding the primary key of every document
pub const ID_FIELD: &str = "_id";

/// One bucket of a grouping aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBucket {
    /// Group key, `Null` when the field was absent
    pub key: JsonValue,
    /// Number of documents in the group
    pub count: u64,
    /// Sum of the numeric sum field, 0 when none was requested
    pub sum: f64,
}

/// Abstract document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Create a collection (if missing) and unique indexes on the given fields
    async fn ensure_collection(&self, collection: &str, unique_fields: &[String]) -> OrmResult<()>;

    /// Drop a collection, returning whether it existed
    async fn drop_collection(&self, collection: &str) -> OrmResult<bool>;

    /// Insert one document. The document must carry an `_id`.
    async fn insert_one(&self, collection: &str, document: Document) -> OrmResult<()>;

    /// Insert several documents in order, stopping at the first failure
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> OrmResult<u64> {
        let mut inserted = 0;
        for document in documents {
            self.insert_one(collection, document).await?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Find documents matching a query
    async fn find(&self, collection: &str, query: &FindQuery) -> OrmResult<Vec<Document>>;

    /// Find the first document matching a filter
    async fn find_one(&self, collection: &str, filter: &Filter) -> OrmResult<Option<Document>> {
        let query = FindQuery::new(filter.clone()).limit(1);
        Ok(self.find(collection, &query).await?.into_iter().next())
    }

    /// Merge `changes` into the first matching document and return the result
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Document,
    ) -> OrmResult<Option<Document>>;

    /// Merge `changes` into every matching document
    async fn update_many(&self, collection: &str, filter: &Filter, changes: Document) -> OrmResult<u64>;

    /// Remove fields from every matching document
    async fn unset_fields(&self, collection: &str, filter: &Filter, fields: &[String]) -> OrmResult<u64>;

    /// Rename a top-level field in every document that has it
    async fn rename_field(&self, collection: &str, from: &str, to: &str) -> OrmResult<u64>;

    /// Delete the first matching document
    async fn delete_one(&self, collection: &str, filter: &Filter) -> OrmResult<bool>;

    /// Delete every matching document
    async fn delete_many(&self, collection: &str, filter: &Filter) -> OrmResult<u64>;

    /// Count matching documents
    async fn count(&self, collection: &str, filter: &Filter) -> OrmResult<u64>;

    /// Group matching documents by one field, optionally summing a numeric field
    async fn group_by(
        &self,
        collection: &str,
        filter: &Filter,
        group_field: &str,
        sum_field: Option<&str>,
    ) -> OrmResult<Vec<GroupBucket>>;
}

/// Generate a fresh document id
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Typed accessors over raw documents. Absent and mistyped fields both read as `None`.
pub trait DocumentExt {
    fn get_str(&self, field: &str) -> Option<&str>;
    fn get_bool(&self, field: &str) -> Option<bool>;
    fn get_i64(&self, field: &str) -> Option<i64>;
    fn get_datetime(&self, field: &str) -> Option<DateTime<Utc>>;
}

impl DocumentExt for Document {
    fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(JsonValue::as_str)
    }

    fn get_bool(&self, field: &str) -> Option<bool> {
        match self.get(field)? {
            JsonValue::Bool(b) => Some(*b),
            // Older writers stored flags as 0/1
            JsonValue::Number(n) => n.as_i64().map(|n| n != 0),
            _ => None,
        }
    }

    fn get_i64(&self, field: &str) -> Option<i64> {
        match self.get(field)? {
            JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            JsonValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn get_datetime(&self, field: &str) -> Option<DateTime<Utc>> {
        match self.get(field)? {
            JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            JsonValue::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: JsonValue) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_document_accessors() {
        let d = doc(json!({
            "name": "Ada",
            "verified": 1,
            "size": "42",
            "created": "2024-01-02T03:04:05Z",
            "updated": 1704164645000i64,
        }));

        assert_eq!(d.get_str("name"), Some("Ada"));
        assert_eq!(d.get_bool("verified"), Some(true));
        assert_eq!(d.get_i64("size"), Some(42));
        assert_eq!(d.get_datetime("created").unwrap().to_rfc3339(), "2024-01-02T03:04:05+00:00");
        assert_eq!(d.get_datetime("updated"), d.get_datetime("created"));
        assert_eq!(d.get_str("missing"), None);
        assert_eq!(d.get_bool("name"), None);
    }
}
