//! Migration Lock - One migration run at a time per store
//!
//! The lock is a single document with a fixed id. Acquiring it is a plain
//! insert, so the store's primary key uniqueness arbitrates between runs.
//! A lock older than the configured staleness window is treated as left
//! behind by a crashed run and taken over.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::backends::{Document, DocumentExt, Filter, StoreHandle, ID_FIELD};
use crate::error::{OrmError, OrmResult};

const LOCK_ID: &str = "migration_lock";

/// Advisory lock around apply and rollback
pub struct MigrationLock {
    store: StoreHandle,
    collection: String,
    owner: String,
    stale_after: Option<Duration>,
}

impl MigrationLock {
    pub fn new(store: StoreHandle, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            owner: format!("pid-{}-{}", std::process::id(), uuid::Uuid::new_v4().simple()),
            stale_after: None,
        }
    }

    /// Take over locks held for longer than `stale_after`
    pub fn with_stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Take the lock, failing with [`OrmError::Locked`] if another live run holds it
    pub async fn acquire(&self) -> OrmResult<()> {
        self.store.ensure_collection(&self.collection, &[]).await?;

        if self.try_insert().await? {
            return Ok(());
        }
        if self.take_over_stale().await? && self.try_insert().await? {
            return Ok(());
        }

        let holder = self.holder().await?.unwrap_or_else(|| "unknown".to_string());
        tracing::warn!(holder = %holder, "Migration lock is held by another run");
        Err(OrmError::Locked(format!(
            "held by {} (collection '{}'); run `strata unlock` if that run is gone",
            holder, self.collection
        )))
    }

    async fn try_insert(&self) -> OrmResult<bool> {
        let mut document = Document::new();
        document.insert(ID_FIELD.to_string(), json!(LOCK_ID));
        document.insert("owner".to_string(), json!(self.owner));
        document.insert("acquired_at".to_string(), json!(Utc::now().to_rfc3339()));

        match self.store.insert_one(&self.collection, document).await {
            Ok(()) => {
                tracing::debug!(owner = %self.owner, "Migration lock acquired");
                Ok(true)
            }
            Err(OrmError::DuplicateKey { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove the current lock if it is older than the staleness window
    async fn take_over_stale(&self) -> OrmResult<bool> {
        let Some(window) = self.stale_after.and_then(|d| chrono::Duration::from_std(d).ok()) else {
            return Ok(false);
        };
        let Some(current) = self
            .store
            .find_one(&self.collection, &Filter::by_id(LOCK_ID))
            .await?
        else {
            // released in between
            return Ok(true);
        };
        let (Some(owner), Some(acquired_at)) = (current.get_str("owner"), current.get_str("acquired_at")) else {
            return Ok(false);
        };
        let Some(since) = DateTime::parse_from_rfc3339(acquired_at).ok() else {
            return Ok(false);
        };
        if Utc::now().signed_duration_since(since.with_timezone(&Utc)) < window {
            return Ok(false);
        }

        // only delete the exact lock we judged stale
        let filter = Filter::all_of(vec![
            Filter::by_id(LOCK_ID),
            Filter::eq("owner", owner),
            Filter::eq("acquired_at", acquired_at),
        ]);
        let removed = self.store.delete_one(&self.collection, &filter).await?;
        if removed {
            tracing::warn!(
                stale_owner = %owner,
                acquired_at = %acquired_at,
                "Took over stale migration lock"
            );
        }
        Ok(removed)
    }

    /// Release the lock if this instance holds it
    pub async fn release(&self) -> OrmResult<()> {
        let filter = Filter::all_of(vec![Filter::by_id(LOCK_ID), Filter::eq("owner", self.owner.as_str())]);
        if self.store.delete_one(&self.collection, &filter).await? {
            tracing::debug!(owner = %self.owner, "Migration lock released");
        }
        Ok(())
    }

    /// Clear a lock left behind by a crashed run, regardless of owner
    pub async fn force_release(&self) -> OrmResult<bool> {
        let removed = self
            .store
            .delete_one(&self.collection, &Filter::by_id(LOCK_ID))
            .await?;
        if removed {
            tracing::warn!(collection = %self.collection, "Migration lock forcibly released");
        }
        Ok(removed)
    }

    /// Description of the current holder, if any
    pub async fn holder(&self) -> OrmResult<Option<String>> {
        let document = self
            .store
            .find_one(&self.collection, &Filter::by_id(LOCK_ID))
            .await?;
        Ok(document.map(|d| {
            format!(
                "{} since {}",
                d.get_str("owner").unwrap_or("unknown"),
                d.get_str("acquired_at").unwrap_or("unknown")
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryStore;
    use std::sync::Arc;

    const COLLECTION: &str = "strata_migrations_lock";

    async fn plant_lock(store: &StoreHandle, acquired_at: DateTime<Utc>) {
        let mut document = Document::new();
        document.insert(ID_FIELD.to_string(), json!(LOCK_ID));
        document.insert("owner".to_string(), json!("pid-1-crashed"));
        document.insert("acquired_at".to_string(), json!(acquired_at.to_rfc3339()));
        store.insert_one(COLLECTION, document).await.unwrap();
    }

    #[tokio::test]
    async fn test_second_holder_is_rejected() {
        let store: StoreHandle = Arc::new(MemoryStore::new());
        let first = MigrationLock::new(store.clone(), COLLECTION);
        let second = MigrationLock::new(store.clone(), COLLECTION);

        first.acquire().await.unwrap();
        assert!(matches!(second.acquire().await, Err(OrmError::Locked(_))));

        // releasing someone else's lock is a no-op
        second.release().await.unwrap();
        assert!(first.holder().await.unwrap().is_some());

        first.release().await.unwrap();
        second.acquire().await.unwrap();
        assert!(second.force_release().await.unwrap());
        assert!(first.holder().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_lock_is_taken_over() {
        let store: StoreHandle = Arc::new(MemoryStore::new());
        plant_lock(&store, Utc::now() - chrono::Duration::hours(2)).await;

        let lock = MigrationLock::new(store.clone(), COLLECTION)
            .with_stale_after(Some(Duration::from_secs(60)));
        lock.acquire().await.unwrap();

        let holder = lock.holder().await.unwrap().unwrap();
        assert!(holder.starts_with(lock.owner()));
    }

    #[tokio::test]
    async fn test_recent_lock_is_not_taken_over() {
        let store: StoreHandle = Arc::new(MemoryStore::new());
        plant_lock(&store, Utc::now()).await;

        let patient = MigrationLock::new(store.clone(), COLLECTION)
            .with_stale_after(Some(Duration::from_secs(3600)));
        assert!(matches!(patient.acquire().await, Err(OrmError::Locked(_))));

        let no_window = MigrationLock::new(store.clone(), COLLECTION);
        assert!(matches!(no_window.acquire().await, Err(OrmError::Locked(_))));
        assert!(no_window.holder().await.unwrap().unwrap().starts_with("pid-1-crashed"));
    }
}
