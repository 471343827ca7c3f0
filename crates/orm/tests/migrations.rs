use std::sync::Arc;

use serde_json::json;
use strata_orm::{
    Document, DocumentStore, Filter, FindQuery, MemoryStore, MigrationConfig,
    MigrationRecordStore, MigrationRegistry, MigrationRunner, MigrationUnit, Operation, OrmError,
};

fn create(id: &str, collection: &str) -> MigrationUnit {
    MigrationUnit::new(id, format!("create {}", collection))
        .up(Operation::create_collection(collection, &[]))
        .down(Operation::drop_collection(collection))
}

fn runner(memory: &Arc<MemoryStore>, registry: MigrationRegistry) -> MigrationRunner {
    MigrationRunner::new(memory.clone(), registry, MigrationConfig::default())
}

async fn applied_ids(runner: &MigrationRunner) -> Vec<String> {
    runner
        .records()
        .list_applied()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect()
}

#[tokio::test]
async fn apply_records_every_identifier_in_order() {
    let memory = Arc::new(MemoryStore::new());
    let registry = MigrationRegistry::new()
        .with(create("20240103000000_c", "c"))
        .with(create("20240101000000_a", "a"))
        .with(create("20240102000000_b", "b"));
    let runner = runner(&memory, registry);

    let result = runner.apply().await.unwrap();
    assert_eq!(result.applied_count, 3);
    assert_eq!(
        applied_ids(&runner).await,
        vec!["20240101000000_a", "20240102000000_b", "20240103000000_c"]
    );

    let report = runner.status_reporter().report().await.unwrap();
    assert!(report.pending.is_empty());
    assert_eq!(report.applied.len(), 3);
}

#[tokio::test]
async fn second_apply_performs_no_writes() {
    let memory = Arc::new(MemoryStore::new());
    let runner = runner(&memory, MigrationRegistry::new().with(create("001", "a")));
    runner.apply().await.unwrap();

    let writes = memory.write_count();
    let result = runner.apply().await.unwrap();
    assert_eq!(result.applied_count, 0);
    assert_eq!(memory.write_count(), writes);
}

#[tokio::test]
async fn rollback_one_undoes_only_the_latest_batch() {
    let memory = Arc::new(MemoryStore::new());
    let first = runner(&memory, MigrationRegistry::new().with(create("001", "a")));
    first.apply().await.unwrap();

    let registry = MigrationRegistry::new()
        .with(create("001", "a"))
        .with(create("002", "b"))
        .with(create("003", "c"));
    let second = runner(&memory, registry);
    let result = second.apply().await.unwrap();
    assert_eq!(result.batch, Some(2));
    assert_eq!(result.applied_count, 2);

    let rolled_back = second.rollback(1).await.unwrap();
    assert_eq!(rolled_back.rolled_back_migrations, vec!["003", "002"]);
    assert_eq!(rolled_back.batches_rolled_back, 1);
    assert_eq!(applied_ids(&second).await, vec!["001"]);
    assert!(memory.has_collection("a"));
    assert!(!memory.has_collection("b"));
    assert!(!memory.has_collection("c"));
}

#[tokio::test]
async fn rollback_beyond_history_reports_actual_batches() {
    let memory = Arc::new(MemoryStore::new());
    runner(&memory, MigrationRegistry::new().with(create("001", "a")))
        .apply()
        .await
        .unwrap();
    let registry = MigrationRegistry::new().with(create("001", "a")).with(create("002", "b"));
    let runner = runner(&memory, registry);
    runner.apply().await.unwrap();

    let result = runner.rollback(5).await.unwrap();
    assert_eq!(result.batches_rolled_back, 2);
    assert_eq!(result.rolled_back_count, 2);
    assert!(applied_ids(&runner).await.is_empty());
}

#[tokio::test]
async fn duplicate_identifier_fails_before_any_mutation() {
    let memory = Arc::new(MemoryStore::new());
    let registry = MigrationRegistry::new().with(create("001", "a")).with(create("001", "b"));
    let runner = runner(&memory, registry);

    assert!(matches!(
        runner.apply().await,
        Err(OrmError::DuplicateIdentifier(id)) if id == "001"
    ));
    assert_eq!(memory.write_count(), 0);
    assert!(memory.collection_names().is_empty());
}

#[tokio::test]
async fn failed_down_keeps_earlier_rollbacks() {
    let memory = Arc::new(MemoryStore::new());
    let registry = MigrationRegistry::new()
        .with(
            MigrationUnit::new("001", "irreversible")
                .up(Operation::create_collection("a", &[]))
                .down(Operation::custom(|_| async {
                    Err::<(), _>(OrmError::Database("cannot drop".into()))
                })),
        )
        .with(create("002", "b"));
    let runner = runner(&memory, registry);
    runner.apply().await.unwrap();

    match runner.rollback(1).await {
        Err(OrmError::MigrationFailed { identifier, batch, .. }) => {
            assert_eq!(identifier, "001");
            assert_eq!(batch, 1);
        }
        other => panic!("unexpected outcome: {:?}", other.map(|r| r.rolled_back_count)),
    }
    assert_eq!(applied_ids(&runner).await, vec!["001"]);
    assert!(!memory.has_collection("b"));
}

#[tokio::test]
async fn data_migration_backfills_and_reverts() {
    let memory = Arc::new(MemoryStore::new());
    let mut legacy = Document::new();
    legacy.insert("_id".into(), json!("u1"));
    legacy.insert("email".into(), json!("old@example.com"));
    memory.insert_one("users", legacy).await.unwrap();

    let mut defaults = Document::new();
    defaults.insert("isVerified".into(), json!(false));
    let registry = MigrationRegistry::new().with(
        MigrationUnit::new("001_verification_default", "default isVerified")
            .up(Operation::UpdateMany {
                collection: "users".into(),
                filter: Filter::exists("isVerified", false),
                set: defaults,
            })
            .down(Operation::UnsetFields {
                collection: "users".into(),
                filter: Filter::All,
                fields: vec!["isVerified".into()],
            }),
    );
    let runner = runner(&memory, registry);

    runner.apply().await.unwrap();
    let users = memory.find("users", &FindQuery::all()).await.unwrap();
    assert_eq!(users[0]["isVerified"], json!(false));

    runner.rollback(1).await.unwrap();
    let users = memory.find("users", &FindQuery::all()).await.unwrap();
    assert!(users[0].get("isVerified").is_none());
}
