//! Seeders shipped with the application

use async_trait::async_trait;
use strata_orm::repository::{DocumentFileRepository, DocumentUserRepository};
use strata_orm::{
    CreateFile, CreateUser, Environment, FileRepository, OrmResult, Seeder, StoredFile,
    StoreHandle, User, UserRepository, UserRole,
};

pub const ADMIN_EMAIL: &str = "admin@strata.local";

/// Every seeder in the order `strata seed` runs them
pub fn all() -> Vec<Box<dyn Seeder>> {
    vec![Box::new(AdminUserSeeder), Box::new(DemoDataSeeder)]
}

/// One verified administrator account
pub struct AdminUserSeeder;

#[async_trait]
impl Seeder for AdminUserSeeder {
    fn name(&self) -> &str {
        "admin_user"
    }

    fn environments(&self) -> Vec<Environment> {
        vec![
            Environment::Development,
            Environment::Testing,
            Environment::Staging,
            Environment::Production,
        ]
    }

    async fn run(&self, store: &StoreHandle) -> OrmResult<()> {
        let users = DocumentUserRepository::new(store.clone());
        if users.find_by_email(ADMIN_EMAIL).await?.is_some() {
            tracing::debug!(seeder = self.name(), "Admin user already present");
            return Ok(());
        }

        users
            .save(&User::new(CreateUser {
                email: ADMIN_EMAIL.to_string(),
                first_name: "Strata".to_string(),
                last_name: "Admin".to_string(),
                role: Some(UserRole::Admin),
                is_verified: Some(true),
            }))
            .await?;
        Ok(())
    }
}

/// A handful of users with uploaded files, for local development
pub struct DemoDataSeeder;

const DEMO_USERS: &[(&str, &str, &str, UserRole)] = &[
    ("grace@strata.local", "Grace", "Hopper", UserRole::Moderator),
    ("alan@strata.local", "Alan", "Turing", UserRole::User),
    ("barbara@strata.local", "Barbara", "Liskov", UserRole::User),
];

const DEMO_FILES: &[(&str, &str, u64)] = &[
    ("avatar.png", "image/png", 24_576),
    ("notes.md", "text/markdown", 1_024),
];

#[async_trait]
impl Seeder for DemoDataSeeder {
    fn name(&self) -> &str {
        "demo_data"
    }

    fn environments(&self) -> Vec<Environment> {
        vec![Environment::Development]
    }

    async fn run(&self, store: &StoreHandle) -> OrmResult<()> {
        let users = DocumentUserRepository::new(store.clone());
        let files = DocumentFileRepository::new(store.clone());

        for (email, first_name, last_name, role) in DEMO_USERS {
            if users.find_by_email(email).await?.is_some() {
                continue;
            }
            let user = users
                .save(&User::new(CreateUser {
                    email: email.to_string(),
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                    role: Some(*role),
                    is_verified: Some(true),
                }))
                .await?;

            for (name, mime_type, size_bytes) in DEMO_FILES {
                files
                    .save(&StoredFile::new(CreateFile {
                        owner_id: user.id,
                        original_name: name.to_string(),
                        mime_type: mime_type.to_string(),
                        size_bytes: *size_bytes,
                        storage_path: format!("uploads/{}/{}", user.id, name),
                        is_public: Some(false),
                    }))
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_orm::{MemoryStore, SeedRunner};

    fn runner(store: StoreHandle, environment: Environment) -> SeedRunner {
        all()
            .into_iter()
            .fold(SeedRunner::new(store).environment(environment), |runner, seeder| {
                runner.add_boxed(seeder)
            })
    }

    #[tokio::test]
    async fn test_development_seeds_everything_once() {
        let store: StoreHandle = Arc::new(MemoryStore::new());
        let runner = runner(store.clone(), Environment::Development);

        runner.run_all().await.unwrap();
        let result = runner.run_all().await.unwrap();
        assert_eq!(result.ran, vec!["admin_user", "demo_data"]);

        let users = DocumentUserRepository::new(store.clone()).stats().await.unwrap();
        assert_eq!(users.total, 4);
        let files = DocumentFileRepository::new(store).stats().await.unwrap();
        assert_eq!(files.total_files, 6);
    }

    #[tokio::test]
    async fn test_staging_only_seeds_the_admin() {
        let store: StoreHandle = Arc::new(MemoryStore::new());
        let result = runner(store.clone(), Environment::Staging).run_all().await.unwrap();

        assert_eq!(result.ran, vec!["admin_user"]);
        assert_eq!(result.skipped, vec!["demo_data"]);
        let admin = DocumentUserRepository::new(store)
            .find_by_email(ADMIN_EMAIL)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, UserRole::Admin);
    }
}
