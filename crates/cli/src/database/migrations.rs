//! Migrations shipped with the application, in identifier order

use serde_json::json;
use strata_orm::backends::{Document, DocumentExt, Filter, FindQuery, StoreHandle, ID_FIELD};
use strata_orm::repository::{split_name, FILES_COLLECTION, USERS_COLLECTION};
use strata_orm::{MigrationRegistry, MigrationUnit, Operation, OrmResult};

pub fn registry() -> MigrationRegistry {
    MigrationRegistry::new()
        .with(
            MigrationUnit::new("20240101000000_create_users", "Create the users collection")
                .up(Operation::create_collection(USERS_COLLECTION, &["email"]))
                .down(Operation::drop_collection(USERS_COLLECTION)),
        )
        .with(
            MigrationUnit::new("20240101000100_create_files", "Create the files collection")
                .up(Operation::create_collection(FILES_COLLECTION, &[]))
                .down(Operation::drop_collection(FILES_COLLECTION)),
        )
        .with(
            MigrationUnit::new(
                "20240301000000_split_user_names",
                "Split combined user names into firstName and lastName",
            )
            .up(Operation::custom(split_user_names))
            .down(Operation::custom(join_user_names)),
        )
        .with(
            MigrationUnit::new(
                "20240301000100_user_defaults",
                "Backfill isVerified and role on users missing them",
            )
            .up(Operation::Sequence(vec![
                Operation::UpdateMany {
                    collection: USERS_COLLECTION.to_string(),
                    filter: Filter::exists("isVerified", false),
                    set: single("isVerified", json!(false)),
                },
                Operation::UpdateMany {
                    collection: USERS_COLLECTION.to_string(),
                    filter: Filter::exists("role", false),
                    set: single("role", json!("user")),
                },
            ]))
            // backfilled values read the same as the translator defaults
            .down(Operation::Noop),
        )
        .with(
            MigrationUnit::new("20240410000000_rename_file_size", "Rename files.size to sizeBytes")
                .up(Operation::RenameField {
                    collection: FILES_COLLECTION.to_string(),
                    from: "size".to_string(),
                    to: "sizeBytes".to_string(),
                })
                .down(Operation::RenameField {
                    collection: FILES_COLLECTION.to_string(),
                    from: "sizeBytes".to_string(),
                    to: "size".to_string(),
                }),
        )
}

fn single(field: &str, value: serde_json::Value) -> Document {
    let mut document = Document::new();
    document.insert(field.to_string(), value);
    document
}

async fn split_user_names(store: StoreHandle) -> OrmResult<()> {
    let legacy = Filter::all_of(vec![
        Filter::exists("name", true),
        Filter::exists("firstName", false),
    ]);
    let documents = store.find(USERS_COLLECTION, &FindQuery::new(legacy)).await?;

    for document in &documents {
        let Some(id) = document.get_str(ID_FIELD) else {
            continue;
        };
        let (first, last) = split_name(document.get_str("name"));
        let mut changes = single("firstName", json!(first));
        changes.insert("lastName".to_string(), json!(last));
        store
            .update_one(USERS_COLLECTION, &Filter::by_id(id), changes)
            .await?;
    }

    let touched = store
        .unset_fields(
            USERS_COLLECTION,
            &Filter::all_of(vec![Filter::exists("name", true), Filter::exists("firstName", true)]),
            &["name".to_string()],
        )
        .await?;
    tracing::info!(users = touched, "Split legacy user names");
    Ok(())
}

async fn join_user_names(store: StoreHandle) -> OrmResult<()> {
    let split = Filter::all_of(vec![
        Filter::exists("firstName", true),
        Filter::exists("name", false),
    ]);
    let documents = store.find(USERS_COLLECTION, &FindQuery::new(split)).await?;

    for document in &documents {
        let Some(id) = document.get_str(ID_FIELD) else {
            continue;
        };
        let name = match (document.get_str("firstName"), document.get_str("lastName")) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.to_string(),
            _ => continue,
        };
        store
            .update_one(USERS_COLLECTION, &Filter::by_id(id), single("name", json!(name)))
            .await?;
    }

    // leave the legacy shape so the up step picks these users up again
    let touched = store
        .unset_fields(
            USERS_COLLECTION,
            &Filter::all_of(vec![Filter::exists("name", true), Filter::exists("firstName", true)]),
            &["firstName".to_string(), "lastName".to_string()],
        )
        .await?;
    tracing::info!(users = touched, "Joined split user names");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_orm::{DocumentStore, MemoryStore, MigrationConfig, MigrationRunner};

    fn legacy_user(id: &str, name: &str) -> Document {
        let mut document = single(ID_FIELD, json!(id));
        document.insert("email".to_string(), json!(format!("{}@example.com", id)));
        document.insert("name".to_string(), json!(name));
        document
    }

    #[test]
    fn test_registry_is_valid_and_ordered() {
        let units = registry().list_all().unwrap();
        let ids: Vec<_> = units.iter().map(|u| u.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert!(units.iter().all(|u| u.up.is_some() && u.down.is_some()));
    }

    #[tokio::test]
    async fn test_apply_migrates_legacy_users() {
        let memory = Arc::new(MemoryStore::new());
        memory
            .insert_one(USERS_COLLECTION, legacy_user("u1", "Grace Brewster Hopper"))
            .await
            .unwrap();
        memory
            .insert_one(USERS_COLLECTION, legacy_user("u2", "Prince"))
            .await
            .unwrap();

        let runner = MigrationRunner::new(memory.clone(), registry(), MigrationConfig::default());
        let result = runner.apply().await.unwrap();
        assert_eq!(result.applied_count, 5);

        let grace = memory
            .find_one(USERS_COLLECTION, &Filter::by_id("u1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grace.get_str("firstName"), Some("Grace"));
        assert_eq!(grace.get_str("lastName"), Some("Brewster Hopper"));
        assert!(grace.get("name").is_none());
        assert_eq!(grace.get_bool("isVerified"), Some(false));
        assert_eq!(grace.get_str("role"), Some("user"));

        let prince = memory
            .find_one(USERS_COLLECTION, &Filter::by_id("u2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(prince.get_str("lastName"), Some("User"));
    }

    #[tokio::test]
    async fn test_rollback_of_single_batch_drops_collections() {
        let memory = Arc::new(MemoryStore::new());
        let runner = MigrationRunner::new(memory.clone(), registry(), MigrationConfig::default());
        runner.apply().await.unwrap();

        // a fresh store applies everything in one batch
        let rolled_back = runner.rollback(1).await.unwrap();
        assert_eq!(rolled_back.rolled_back_count, 5);
        assert_eq!(rolled_back.rolled_back_migrations[0], "20240410000000_rename_file_size");
        assert!(!memory.has_collection(USERS_COLLECTION));
        assert!(!memory.has_collection(FILES_COLLECTION));
    }

    #[tokio::test]
    async fn test_join_user_names_rebuilds_combined_field() {
        let memory = Arc::new(MemoryStore::new());
        let mut user = single(ID_FIELD, json!("u4"));
        user.insert("firstName".to_string(), json!("Alan"));
        user.insert("lastName".to_string(), json!("Turing"));
        memory.insert_one(USERS_COLLECTION, user).await.unwrap();

        join_user_names(memory.clone()).await.unwrap();
        let stored = memory
            .find_one(USERS_COLLECTION, &Filter::by_id("u4"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.get_str("name"), Some("Alan Turing"));
        assert!(stored.get("firstName").is_none());
        assert!(stored.get("lastName").is_none());

        // the up step sees the user as legacy again
        split_user_names(memory.clone()).await.unwrap();
        let resplit = memory
            .find_one(USERS_COLLECTION, &Filter::by_id("u4"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resplit.get_str("firstName"), Some("Alan"));
        assert_eq!(resplit.get_str("lastName"), Some("Turing"));
        assert!(resplit.get("name").is_none());
    }
}
