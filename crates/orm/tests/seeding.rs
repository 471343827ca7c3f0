use std::sync::Arc;

use async_trait::async_trait;
use strata_orm::seeding::CustomSeeder;
use strata_orm::{
    CreateUser, DocumentUserRepository, Environment, MemoryStore, OrmError, OrmResult,
    SeedFailurePolicy, SeedRunner, Seeder, StoreHandle, User, UserRepository, UserRole,
};

/// Inserts one admin unless it already exists
struct AdminSeeder;

#[async_trait]
impl Seeder for AdminSeeder {
    fn name(&self) -> &str {
        "admin_user"
    }

    async fn run(&self, store: &StoreHandle) -> OrmResult<()> {
        let repo = DocumentUserRepository::new(store.clone());
        if repo.find_by_email("admin@example.com").await?.is_some() {
            return Ok(());
        }
        repo.save(&User::new(CreateUser {
            email: "admin@example.com".into(),
            first_name: "Site".into(),
            last_name: "Admin".into(),
            role: Some(UserRole::Admin),
            is_verified: Some(true),
        }))
        .await?;
        Ok(())
    }
}

#[tokio::test]
async fn idempotent_seeder_can_run_twice() {
    let store: StoreHandle = Arc::new(MemoryStore::new());
    let runner = SeedRunner::new(store.clone()).add(AdminSeeder);

    runner.run_all().await.unwrap();
    runner.run_all().await.unwrap();

    let stats = DocumentUserRepository::new(store).stats().await.unwrap();
    assert_eq!(stats.total, 1);
}

#[tokio::test]
async fn run_one_by_name_and_unknown_name() {
    let store: StoreHandle = Arc::new(MemoryStore::new());
    let runner = SeedRunner::new(store.clone())
        .add(AdminSeeder)
        .add(CustomSeeder::new("noop", |_| async { Ok::<(), OrmError>(()) }));

    let result = runner.run_one("admin_user").await.unwrap();
    assert_eq!(result.ran, vec!["admin_user"]);
    assert!(matches!(
        runner.run_one("missing").await,
        Err(OrmError::NotFound(_))
    ));
}

#[tokio::test]
async fn seeder_disabled_for_environment() {
    let store: StoreHandle = Arc::new(MemoryStore::new());
    let runner = SeedRunner::new(store)
        .environment(Environment::Staging)
        .add(AdminSeeder);

    let result = runner.run_all().await.unwrap();
    assert!(result.ran.is_empty());
    assert_eq!(result.skipped, vec!["admin_user"]);
    assert!(matches!(
        runner.run_one("admin_user").await,
        Err(OrmError::Validation(_))
    ));
}

#[tokio::test]
async fn continue_on_error_still_seeds_the_rest() {
    let store: StoreHandle = Arc::new(MemoryStore::new());
    let runner = SeedRunner::new(store.clone())
        .policy(SeedFailurePolicy::ContinueOnError)
        .add(CustomSeeder::new("broken", |_| async {
            Err::<(), _>(OrmError::Database("offline".into()))
        }))
        .add(AdminSeeder);

    let err = runner.run_all().await.unwrap_err();
    assert!(err.is_store_operation());
    assert!(err.to_string().contains("broken"));

    let stats = DocumentUserRepository::new(store).stats().await.unwrap();
    assert_eq!(stats.total, 1);
}
