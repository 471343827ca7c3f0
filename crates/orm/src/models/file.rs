use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata of an uploaded file. The bytes live elsewhere, at `storage_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub storage_path: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn new(data: CreateFile) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: data.owner_id,
            original_name: data.original_name,
            mime_type: data.mime_type,
            size_bytes: data.size_bytes,
            storage_path: data.storage_path,
            is_public: data.is_public.unwrap_or(false),
            created_at: now,
            updated_at: now,
        }
    }

    /// Extension of the original name, lowercased
    pub fn extension(&self) -> Option<String> {
        self.original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFile {
    pub owner_id: Uuid,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub storage_path: String,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFile {
    pub original_name: Option<String>,
    pub mime_type: Option<String>,
    pub storage_path: Option<String>,
    pub is_public: Option<bool>,
}

impl UpdateFile {
    pub fn is_empty(&self) -> bool {
        self.original_name.is_none()
            && self.mime_type.is_none()
            && self.storage_path.is_none()
            && self.is_public.is_none()
    }
}
