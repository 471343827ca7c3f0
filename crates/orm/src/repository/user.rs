//! User repository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use super::{flag_filter, parse_flag, timestamp_value, Page, PageRequest};
use crate::backends::{Document, DocumentExt, Filter, FindQuery, StoreHandle, ID_FIELD};
use crate::error::{OrmError, OrmResult};
use crate::models::{UpdateUser, User, UserRole};

pub const USERS_COLLECTION: &str = "users";

const SORT_FIELDS: &[(&str, &str)] = &[
    ("email", "email"),
    ("firstName", "firstName"),
    ("first_name", "firstName"),
    ("lastName", "lastName"),
    ("last_name", "lastName"),
    ("role", "role"),
    ("isVerified", "isVerified"),
    ("is_verified", "isVerified"),
    ("createdAt", "createdAt"),
    ("created_at", "createdAt"),
    ("updatedAt", "updatedAt"),
    ("updated_at", "updatedAt"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleCount {
    pub role: UserRole,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total: u64,
    pub verified: u64,
    pub unverified: u64,
    /// Every role, lowest privilege first
    pub by_role: Vec<RoleCount>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> OrmResult<Option<User>>;

    /// Case-insensitive exact match on email
    async fn find_by_email(&self, email: &str) -> OrmResult<Option<User>>;

    /// Paginated listing. Filters: `search`, `email`, `role`, `isVerified`.
    async fn find_users(&self, request: &PageRequest) -> OrmResult<Page<User>>;

    async fn save(&self, user: &User) -> OrmResult<User>;

    /// Merge the given fields and stamp `updated_at`. `None` when no such user.
    async fn update(&self, id: Uuid, changes: UpdateUser) -> OrmResult<Option<User>>;

    /// Returns whether a user existed
    async fn delete(&self, id: Uuid) -> OrmResult<bool>;

    async fn exists(&self, id: Uuid) -> OrmResult<bool>;

    async fn stats(&self) -> OrmResult<UserStats>;
}

/// [`UserRepository`] over a document store
#[derive(Clone)]
pub struct DocumentUserRepository {
    store: StoreHandle,
    collection: String,
}

impl DocumentUserRepository {
    pub fn new(store: StoreHandle) -> Self {
        Self::with_collection(store, USERS_COLLECTION)
    }

    pub fn with_collection(store: StoreHandle, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    fn build_filter(request: &PageRequest) -> OrmResult<Filter> {
        let mut filters = Vec::new();

        if let Some(search) = request.filter_value("search") {
            filters.push(Filter::any_of(
                ["email", "firstName", "lastName", "name"]
                    .iter()
                    .map(|field| Filter::contains(*field, search))
                    .collect(),
            ));
        }
        if let Some(email) = request.filter_value("email") {
            filters.push(Filter::contains("email", email));
        }
        if let Some(role) = request.filter_value("role") {
            filters.push(match role.parse::<UserRole>() {
                // documents without a role are plain users
                Ok(UserRole::User) => Filter::any_of(vec![
                    Filter::eq("role", UserRole::User.as_str()),
                    Filter::exists("role", false),
                ]),
                Ok(parsed) => Filter::eq("role", parsed.as_str()),
                Err(_) => Filter::eq("role", role.to_lowercase()),
            });
        }
        if let Some(raw) = request.filter_value("isVerified") {
            filters.push(flag_filter("isVerified", parse_flag("isVerified", raw)?));
        }

        Ok(Filter::all_of(filters))
    }
}

/// Translate a stored document into a user, filling legacy gaps with defaults
pub fn user_from_document(document: &Document) -> OrmResult<User> {
    let id = parse_id(document)?;

    let (first_name, last_name) = match (document.get_str("firstName"), document.get_str("lastName")) {
        (Some(first), Some(last)) => (first.to_string(), last.to_string()),
        (first, last) => {
            let (split_first, split_last) = split_name(document.get_str("name"));
            (
                first.map(str::to_string).unwrap_or(split_first),
                last.map(str::to_string).unwrap_or(split_last),
            )
        }
    };

    Ok(User {
        id,
        email: document.get_str("email").unwrap_or_default().to_string(),
        first_name,
        last_name,
        role: document
            .get_str("role")
            .map(UserRole::from_stored)
            .unwrap_or_default(),
        is_verified: document.get_bool("isVerified").unwrap_or(false),
        created_at: document.get_datetime("createdAt").unwrap_or_default(),
        updated_at: document.get_datetime("updatedAt").unwrap_or_default(),
    })
}

/// First whitespace token and the remainder of a combined name
pub fn split_name(name: Option<&str>) -> (String, String) {
    let name = name.map(str::trim).unwrap_or_default();
    let mut parts = name.splitn(2, char::is_whitespace);
    let first = parts.next().filter(|s| !s.is_empty()).unwrap_or("Unknown");
    let last = parts.next().map(str::trim).filter(|s| !s.is_empty()).unwrap_or("User");
    (first.to_string(), last.to_string())
}

pub(crate) fn parse_id(document: &Document) -> OrmResult<Uuid> {
    let raw = document
        .get_str(ID_FIELD)
        .ok_or_else(|| OrmError::Serialization("Stored document has no string _id".to_string()))?;
    Uuid::parse_str(raw)
        .map_err(|e| OrmError::Serialization(format!("Stored _id '{}' is not a UUID: {}", raw, e)))
}

pub fn user_to_document(user: &User) -> Document {
    let mut document = Document::new();
    document.insert(ID_FIELD.to_string(), json!(user.id.to_string()));
    document.insert("email".to_string(), json!(user.email));
    document.insert("firstName".to_string(), json!(user.first_name));
    document.insert("lastName".to_string(), json!(user.last_name));
    document.insert("role".to_string(), json!(user.role.as_str()));
    document.insert("isVerified".to_string(), json!(user.is_verified));
    document.insert("createdAt".to_string(), timestamp_value(&user.created_at));
    document.insert("updatedAt".to_string(), timestamp_value(&user.updated_at));
    document
}

fn changes_to_document(changes: UpdateUser, now: DateTime<Utc>) -> Document {
    let mut document = Document::new();
    if let Some(email) = changes.email {
        document.insert("email".to_string(), json!(email));
    }
    if let Some(first_name) = changes.first_name {
        document.insert("firstName".to_string(), json!(first_name));
    }
    if let Some(last_name) = changes.last_name {
        document.insert("lastName".to_string(), json!(last_name));
    }
    if let Some(role) = changes.role {
        document.insert("role".to_string(), json!(role.as_str()));
    }
    if let Some(is_verified) = changes.is_verified {
        document.insert("isVerified".to_string(), json!(is_verified));
    }
    document.insert("updatedAt".to_string(), timestamp_value(&now));
    document
}

#[async_trait]
impl UserRepository for DocumentUserRepository {
    async fn find_by_id(&self, id: Uuid) -> OrmResult<Option<User>> {
        self.store
            .find_one(&self.collection, &Filter::by_id(id.to_string()))
            .await?
            .as_ref()
            .map(user_from_document)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> OrmResult<Option<User>> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(None);
        }
        let candidates = self
            .store
            .find(
                &self.collection,
                &FindQuery::new(Filter::contains("email", email)),
            )
            .await?;

        for document in &candidates {
            let user = user_from_document(document)?;
            if user.email.eq_ignore_ascii_case(email) {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    async fn find_users(&self, request: &PageRequest) -> OrmResult<Page<User>> {
        let filter = Self::build_filter(request)?;
        let total = self.store.count(&self.collection, &filter).await?;
        let documents = self
            .store
            .find(&self.collection, &request.to_find_query(filter, SORT_FIELDS))
            .await?;
        let items = documents
            .iter()
            .map(user_from_document)
            .collect::<OrmResult<Vec<_>>>()?;

        Ok(Page::new(
            items,
            total,
            request.effective_page(),
            request.effective_limit(),
        ))
    }

    async fn save(&self, user: &User) -> OrmResult<User> {
        self.store
            .insert_one(&self.collection, user_to_document(user))
            .await?;
        tracing::debug!(user = %user.id, "User saved");
        Ok(user.clone())
    }

    async fn update(&self, id: Uuid, changes: UpdateUser) -> OrmResult<Option<User>> {
        let updated = self
            .store
            .update_one(
                &self.collection,
                &Filter::by_id(id.to_string()),
                changes_to_document(changes, Utc::now()),
            )
            .await?;
        updated.as_ref().map(user_from_document).transpose()
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

    async fn stats(&self) -> OrmResult<UserStats> {
        let total = self.store.count(&self.collection, &Filter::All).await?;
        let verified = self
            .store
            .count(&self.collection, &flag_filter("isVerified", true))
            .await?;

        let mut counts: HashMap<UserRole, u64> = HashMap::new();
        for bucket in self
            .store
            .group_by(&self.collection, &Filter::All, "role", None)
            .await?
        {
            let role = match &bucket.key {
                JsonValue::String(s) => UserRole::from_stored(s),
                _ => UserRole::User,
            };
            *counts.entry(role).or_default() += bucket.count;
        }

        Ok(UserStats {
            total,
            verified,
            unverified: total.saturating_sub(verified),
            by_role: UserRole::ALL
                .iter()
                .map(|role| RoleCount {
                    role: *role,
                    count: counts.get(role).copied().unwrap_or(0),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: JsonValue) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_legacy_name_is_split() {
        let id = Uuid::new_v4();
        let user = user_from_document(&doc(json!({
            "_id": id.to_string(),
            "email": "grace@example.com",
            "name": "Grace Brewster Hopper",
        })))
        .unwrap();

        assert_eq!(user.id, id);
        assert_eq!(user.first_name, "Grace");
        assert_eq!(user.last_name, "Brewster Hopper");
        assert_eq!(user.role, UserRole::User);
        assert!(!user.is_verified);
        assert_eq!(user.created_at.timestamp(), 0);
    }

    #[test]
    fn test_missing_names_fall_back() {
        let user = user_from_document(&doc(json!({ "_id": Uuid::new_v4().to_string() }))).unwrap();
        assert_eq!(user.first_name, "Unknown");
        assert_eq!(user.last_name, "User");

        let user = user_from_document(&doc(json!({
            "_id": Uuid::new_v4().to_string(),
            "name": "Cher",
            "role": "superuser",
            "isVerified": 1,
        })))
        .unwrap();
        assert_eq!(user.first_name, "Cher");
        assert_eq!(user.last_name, "User");
        assert_eq!(user.role, UserRole::User);
        assert!(user.is_verified);
    }

    #[test]
    fn test_document_roundtrip_keeps_fields() {
        let user = User::new(crate::models::CreateUser {
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            role: Some(UserRole::Admin),
            is_verified: Some(true),
        });
        let document = user_to_document(&user);
        assert_eq!(document["role"], json!("admin"));
        assert!(document["createdAt"].as_str().unwrap().ends_with('Z'));

        let back = user_from_document(&document).unwrap();
        assert_eq!(back.id, user.id);
        assert_eq!(back.role, UserRole::Admin);
        assert_eq!(back.created_at.timestamp_millis(), user.created_at.timestamp_millis());
    }

    #[test]
    fn test_bad_id_is_rejected() {
        assert!(matches!(
            user_from_document(&doc(json!({ "_id": "not-a-uuid" }))),
            Err(OrmError::Serialization(_))
        ));
    }
}
