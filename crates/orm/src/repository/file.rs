//! File metadata repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use super::user::parse_id;
use super::{flag_filter, parse_flag, timestamp_value, Page, PageRequest};
use crate::backends::{Document, DocumentExt, Filter, StoreHandle, ID_FIELD};
use crate::error::{OrmError, OrmResult};
use crate::models::{StoredFile, UpdateFile};

pub const FILES_COLLECTION: &str = "files";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

const SORT_FIELDS: &[(&str, &str)] = &[
    ("originalName", "originalName"),
    ("original_name", "originalName"),
    ("mimeType", "mimeType"),
    ("mime_type", "mimeType"),
    ("sizeBytes", "sizeBytes"),
    ("size_bytes", "sizeBytes"),
    ("size", "sizeBytes"),
    ("createdAt", "createdAt"),
    ("created_at", "createdAt"),
    ("updatedAt", "updatedAt"),
    ("updated_at", "updatedAt"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MimeTypeStats {
    pub mime_type: String,
    pub count: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub total_files: u64,
    pub total_bytes: u64,
    /// Largest groups first
    pub by_mime_type: Vec<MimeTypeStats>,
}

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> OrmResult<Option<StoredFile>>;

    /// Paginated listing. Filters: `search`/`originalName`, `mimeType`, `ownerId`, `isPublic`.
    async fn find_files(&self, request: &PageRequest) -> OrmResult<Page<StoredFile>>;

    /// Paginated listing restricted to one owner
    async fn find_by_owner(&self, owner_id: Uuid, request: &PageRequest) -> OrmResult<Page<StoredFile>>;

    async fn save(&self, file: &StoredFile) -> OrmResult<StoredFile>;

    async fn update(&self, id: Uuid, changes: UpdateFile) -> OrmResult<Option<StoredFile>>;

    async fn delete(&self, id: Uuid) -> OrmResult<bool>;

    async fn exists(&self, id: Uuid) -> OrmResult<bool>;

    async fn stats(&self) -> OrmResult<FileStats>;
}

/// [`FileRepository`] over a document store
#[derive(Clone)]
pub struct DocumentFileRepository {
    store: StoreHandle,
    collection: String,
}

impl DocumentFileRepository {
    pub fn new(store: StoreHandle) -> Self {
        Self::with_collection(store, FILES_COLLECTION)
    }

    pub fn with_collection(store: StoreHandle, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    fn build_filter(request: &PageRequest) -> OrmResult<Filter> {
        let mut filters = Vec::new();

        for name in ["search", "originalName"] {
            if let Some(text) = request.filter_value(name) {
                filters.push(Filter::contains("originalName", text));
            }
        }
        if let Some(mime) = request.filter_value("mimeType") {
            filters.push(Filter::contains("mimeType", mime));
        }
        if let Some(owner) = request.filter_value("ownerId") {
            let owner = Uuid::parse_str(owner).map_err(|_| {
                OrmError::Validation(format!("Filter 'ownerId' expects a UUID, got '{}'", owner))
            })?;
            filters.push(Filter::eq("ownerId", owner.to_string()));
        }
        if let Some(raw) = request.filter_value("isPublic") {
            filters.push(flag_filter("isPublic", parse_flag("isPublic", raw)?));
        }

        Ok(Filter::all_of(filters))
    }

    async fn page(&self, filter: Filter, request: &PageRequest) -> OrmResult<Page<StoredFile>> {
        let total = self.store.count(&self.collection, &filter).await?;
        let documents = self
            .store
            .find(&self.collection, &request.to_find_query(filter, SORT_FIELDS))
            .await?;
        let items = documents
            .iter()
            .map(file_from_document)
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(Page::new(
            items,
            total,
            request.effective_page(),
            request.effective_limit(),
        ))
    }
}

/// Translate a stored document into file metadata, filling legacy gaps with defaults
pub fn file_from_document(document: &Document) -> OrmResult<StoredFile> {
    let owner_id = document
        .get_str("ownerId")
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .unwrap_or_else(Uuid::nil);

    Ok(StoredFile {
        id: parse_id(document)?,
        owner_id,
        original_name: document
            .get_str("originalName")
            .or_else(|| document.get_str("filename"))
            .unwrap_or("untitled")
            .to_string(),
        mime_type: document
            .get_str("mimeType")
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string(),
        size_bytes: document
            .get_i64("sizeBytes")
            .or_else(|| document.get_i64("size"))
            .unwrap_or(0)
            .max(0) as u64,
        storage_path: document
            .get_str("storagePath")
            .or_else(|| document.get_str("path"))
            .unwrap_or_default()
            .to_string(),
        is_public: document.get_bool("isPublic").unwrap_or(false),
        created_at: document.get_datetime("createdAt").unwrap_or_default(),
        updated_at: document.get_datetime("updatedAt").unwrap_or_default(),
    })
}

pub fn file_to_document(file: &StoredFile) -> Document {
    let mut document = Document::new();
    document.insert(ID_FIELD.to_string(), json!(file.id.to_string()));
    document.insert("ownerId".to_string(), json!(file.owner_id.to_string()));
    document.insert("originalName".to_string(), json!(file.original_name));
    document.insert("mimeType".to_string(), json!(file.mime_type));
    document.insert("sizeBytes".to_string(), json!(file.size_bytes));
    document.insert("storagePath".to_string(), json!(file.storage_path));
    document.insert("isPublic".to_string(), json!(file.is_public));
    document.insert("createdAt".to_string(), timestamp_value(&file.created_at));
    document.insert("updatedAt".to_string(), timestamp_value(&file.updated_at));
    document
}

fn changes_to_document(changes: UpdateFile, now: DateTime<Utc>) -> Document {
    let mut document = Document::new();
    if let Some(original_name) = changes.original_name {
        document.insert("originalName".to_string(), json!(original_name));
    }
    if let Some(mime_type) = changes.mime_type {
        document.insert("mimeType".to_string(), json!(mime_type));
    }
    if let Some(storage_path) = changes.storage_path {
        document.insert("storagePath".to_string(), json!(storage_path));
    }
    if let Some(is_public) = changes.is_public {
        document.insert("isPublic".to_string(), json!(is_public));
    }
    document.insert("updatedAt".to_string(), timestamp_value(&now));
    document
}

#[async_trait]
impl FileRepository for DocumentFileRepository {
    async fn find_by_id(&self, id: Uuid) -> OrmResult<Option<StoredFile>> {
        self.store
            .find_one(&self.collection, &Filter::by_id(id.to_string()))
            .await?
            .as_ref()
            .map(file_from_document)
            .transpose()
    }

    async fn find_files(&self, request: &PageRequest) -> OrmResult<Page<StoredFile>> {
        self.page(Self::build_filter(request)?, request).await
    }

    async fn find_by_owner(&self, owner_id: Uuid, request: &PageRequest) -> OrmResult<Page<StoredFile>> {
        let filter = Filter::all_of(vec![
            Filter::eq("ownerId", owner_id.to_string()),
            Self::build_filter(request)?,
        ]);
        self.page(filter, request).await
    }

    async fn save(&self, file: &StoredFile) -> OrmResult<StoredFile> {
        self.store
            .insert_one(&self.collection, file_to_document(file))
            .await?;
        tracing::debug!(file = %file.id, owner = %file.owner_id, "File saved");
        Ok(file.clone())
    }

    async fn update(&self, id: Uuid, changes: UpdateFile) -> OrmResult<Option<StoredFile>> {
        let updated = self
            .store
            .update_one(
                &self.collection,
                &Filter::by_id(id.to_string()),
                changes_to_document(changes, Utc::now()),
            )
            .await?;
        updated.as_ref().map(file_from_document).transpose()
    }

    async fn delete(&self, id: Uuid) -> OrmResult<bool> {
        self.store
            .delete_one(&self.collection, &Filter::by_id(id.to_string()))
            .await
    }

    async fn exists(&self, id: Uuid) -> OrmResult<bool> {
        Ok(self
            .store
            .count(&self.collection, &Filter::by_id(id.to_string()))
            .await?
            > 0)
    }

    async fn stats(&self) -> OrmResult<FileStats> {
        let total_files = self.store.count(&self.collection, &Filter::All).await?;
        let mut buckets = self
            .store
            .group_by(
                &self.collection,
                &Filter::exists("sizeBytes", true),
                "mimeType",
                Some("sizeBytes"),
            )
            .await?;
        // unmigrated documents still carry the legacy `size` field
        buckets.extend(
            self.store
                .group_by(
                    &self.collection,
                    &Filter::exists("sizeBytes", false),
                    "mimeType",
                    Some("size"),
                )
                .await?,
        );

        let mut by_mime_type: Vec<MimeTypeStats> = Vec::with_capacity(buckets.len());
        for bucket in buckets {
            let mime_type = match &bucket.key {
                JsonValue::String(s) => s.clone(),
                _ => DEFAULT_MIME_TYPE.to_string(),
            };
            let bytes = bucket.sum.max(0.0) as u64;
            match by_mime_type.iter_mut().find(|s| s.mime_type == mime_type) {
                Some(existing) => {
                    existing.count += bucket.count;
                    existing.bytes += bytes;
                }
                None => by_mime_type.push(MimeTypeStats {
                    mime_type,
                    count: bucket.count,
                    bytes,
                }),
            }
        }
        by_mime_type.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.mime_type.cmp(&b.mime_type)));

        Ok(FileStats {
            total_files,
            total_bytes: by_mime_type.iter().map(|s| s.bytes).sum(),
            by_mime_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_file_defaults() {
        let id = Uuid::new_v4();
        let document = json!({
            "_id": id.to_string(),
            "filename": "report.pdf",
            "size": "2048",
            "path": "uploads/report.pdf",
        });
        let file = file_from_document(document.as_object().unwrap()).unwrap();

        assert_eq!(file.id, id);
        assert_eq!(file.owner_id, Uuid::nil());
        assert_eq!(file.original_name, "report.pdf");
        assert_eq!(file.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(file.size_bytes, 2048);
        assert_eq!(file.storage_path, "uploads/report.pdf");
        assert!(!file.is_public);
        assert_eq!(file.extension().as_deref(), Some("pdf"));
    }

    #[test]
    fn test_owner_filter_requires_uuid() {
        let request = PageRequest::default().filter("ownerId", "bob");
        assert!(matches!(
            DocumentFileRepository::build_filter(&request),
            Err(OrmError::Validation(_))
        ));
    }
}
