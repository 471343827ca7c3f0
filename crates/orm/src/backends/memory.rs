//! In-process document store
//!
//! Collections live in a `DashMap`, one shard lock per collection. Every
//! mutating call bumps a write counter, which tests use to check that a
//! run touched nothing.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value as JsonValue;

use super::core::{Document, DocumentStore, GroupBucket, ID_FIELD};
use super::filter::{lookup, Filter, FindQuery};
use crate::error::{OrmError, OrmResult};

#[derive(Debug, Default, Clone)]
struct Collection {
    unique_fields: Vec<String>,
    documents: Vec<Document>,
}

impl Collection {
    /// Returns the offending key if `candidate` would break a unique index.
    /// `skip` is the position of the document being replaced, if any.
    fn unique_violation(&self, candidate: &Document, skip: Option<usize>) -> Option<String> {
        let keys = std::iter::once(ID_FIELD).chain(self.unique_fields.iter().map(String::as_str));
        for field in keys {
            let Some(value) = candidate.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = self
                .documents
                .iter()
                .enumerate()
                .any(|(i, existing)| Some(i) != skip && existing.get(field) == Some(value));
            if clash {
                return Some(format!("{}={}", field, value));
            }
        }
        None
    }
}

/// Thread-safe in-memory [`DocumentStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<String, Collection>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating operations performed so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(AtomicOrdering::SeqCst)
    }

    /// Whether a collection exists
    pub fn has_collection(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }

    /// Names of all collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn bump(&self) {
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);
    }

    fn matching(&self, collection: &str, filter: &Filter) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|d| filter.matches(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_collection(&self, collection: &str, unique_fields: &[String]) -> OrmResult<()> {
        let mut changed = !self.collections.contains_key(collection);
        let mut entry = self.collections.entry(collection.to_string()).or_default();
        for field in unique_fields {
            if entry.unique_fields.contains(field) {
                continue;
            }
            let mut seen = Vec::new();
            for document in &entry.documents {
                if let Some(value) = document.get(field).filter(|v| !v.is_null()) {
                    if seen.contains(&value) {
                        return Err(OrmError::DuplicateKey {
                            collection: collection.to_string(),
                            key: format!("{}={}", field, value),
                        });
                    }
                    seen.push(value);
                }
            }
            entry.unique_fields.push(field.clone());
            changed = true;
        }
        drop(entry);
        if changed {
            self.bump();
        }
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> OrmResult<bool> {
        let existed = self.collections.remove(collection).is_some();
        if existed {
            self.bump();
        }
        Ok(existed)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> OrmResult<()> {
        if !document.contains_key(ID_FIELD) {
            return Err(OrmError::Validation(format!(
                "Document inserted into '{}' has no {}",
                collection, ID_FIELD
            )));
        }

        let mut entry = self.collections.entry(collection.to_string()).or_default();
        if let Some(key) = entry.unique_violation(&document, None) {
            return Err(OrmError::DuplicateKey {
                collection: collection.to_string(),
                key,
            });
        }
        entry.documents.push(document);
        drop(entry);
        self.bump();
        Ok(())
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> OrmResult<Vec<Document>> {
        Ok(query.shape(self.matching(collection, &query.filter)))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Document,
    ) -> OrmResult<Option<Document>> {
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(position) = entry.documents.iter().position(|d| filter.matches(d)) else {
            return Ok(None);
        };

        let mut updated = entry.documents[position].clone();
        for (key, value) in changes {
            updated.insert(key, value);
        }
        if let Some(key) = entry.unique_violation(&updated, Some(position)) {
            return Err(OrmError::DuplicateKey {
                collection: collection.to_string(),
                key,
            });
        }
        entry.documents[position] = updated.clone();
        drop(entry);
        self.bump();
        Ok(Some(updated))
    }

    async fn update_many(&self, collection: &str, filter: &Filter, changes: Document) -> OrmResult<u64> {
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut next = entry.documents.clone();
        let mut touched = 0;
        for document in next.iter_mut().filter(|d| filter.matches(d)) {
            for (key, value) in &changes {
                document.insert(key.clone(), value.clone());
            }
            touched += 1;
        }
        if touched == 0 {
            return Ok(0);
        }

        let mut check = Collection {
            unique_fields: entry.unique_fields.clone(),
            documents: Vec::new(),
        };
        for document in &next {
            if let Some(key) = check.unique_violation(document, None) {
                return Err(OrmError::DuplicateKey {
                    collection: collection.to_string(),
                    key,
                });
            }
            check.documents.push(document.clone());
        }

        entry.documents = next;
        drop(entry);
        self.bump();
        Ok(touched)
    }

    async fn unset_fields(&self, collection: &str, filter: &Filter, fields: &[String]) -> OrmResult<u64> {
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut touched = 0;
        for document in entry.documents.iter_mut().filter(|d| filter.matches(d)) {
            let mut removed = false;
            for field in fields {
                removed |= document.remove(field).is_some();
            }
            if removed {
                touched += 1;
            }
        }
        drop(entry);
        if touched > 0 {
            self.bump();
        }
        Ok(touched)
    }

    async fn rename_field(&self, collection: &str, from: &str, to: &str) -> OrmResult<u64> {
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut touched = 0;
        for document in entry.documents.iter_mut() {
            if let Some(value) = document.remove(from) {
                document.insert(to.to_string(), value);
                touched += 1;
            }
        }
        for field in entry.unique_fields.iter_mut() {
            if field.as_str() == from {
                *field = to.to_string();
            }
        }
        drop(entry);
        if touched > 0 {
            self.bump();
        }
        Ok(touched)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> OrmResult<bool> {
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(position) = entry.documents.iter().position(|d| filter.matches(d)) else {
            return Ok(false);
        };
        entry.documents.remove(position);
        drop(entry);
        self.bump();
        Ok(true)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> OrmResult<u64> {
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = entry.documents.len();
        entry.documents.retain(|d| !filter.matches(d));
        let removed = (before - entry.documents.len()) as u64;
        drop(entry);
        if removed > 0 {
            self.bump();
        }
        Ok(removed)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> OrmResult<u64> {
        Ok(self
            .collections
            .get(collection)
            .map(|c| c.documents.iter().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn group_by(
        &self,
        collection: &str,
        filter: &Filter,
        group_field: &str,
        sum_field: Option<&str>,
    ) -> OrmResult<Vec<GroupBucket>> {
        let mut buckets: Vec<GroupBucket> = Vec::new();
        for document in self.matching(collection, filter) {
            let key = lookup(&document, group_field).cloned().unwrap_or(JsonValue::Null);
            let amount = sum_field
                .and_then(|f| lookup(&document, f))
                .and_then(numeric)
                .unwrap_or(0.0);
            match buckets.iter_mut().find(|b| b.key == key) {
                Some(bucket) => {
                    bucket.count += 1;
                    bucket.sum += amount;
                }
                None => buckets.push(GroupBucket {
                    key,
                    count: 1,
                    sum: amount,
                }),
            }
        }
        Ok(buckets)
    }
}

/// Numbers, and numeric strings written by older clients
fn numeric(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
