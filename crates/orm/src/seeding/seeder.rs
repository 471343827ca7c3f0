//! Seeder contract with environment controls

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use futures::future::{BoxFuture, FutureExt};

use crate::backends::StoreHandle;
use crate::error::OrmResult;

/// Environment types for seeding control
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Environment {
    Development,
    Testing,
    Staging,
    Production,
    Custom(String),
}

impl Environment {
    /// Get environment name as string
    pub fn as_str(&self) -> &str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Custom(name) => name,
        }
    }

    /// Whether seeding may run here without an explicit force
    pub fn is_safe_for_seeding(&self) -> bool {
        match self {
            Environment::Development | Environment::Testing | Environment::Staging => true,
            Environment::Production | Environment::Custom(_) => false,
        }
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(env: &str) -> Result<Self, Self::Err> {
        Ok(match env.to_lowercase().as_str() {
            "development" | "dev" | "local" => Environment::Development,
            "testing" | "test" => Environment::Testing,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            custom => Environment::Custom(custom.to_string()),
        })
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A data-seeding unit. Runs are expected to be idempotent; nothing records them.
#[async_trait::async_trait]
pub trait Seeder: Send + Sync {
    /// Get the seeder name for logging and selection
    fn name(&self) -> &str;

    /// Environments where this seeder runs
    fn environments(&self) -> Vec<Environment> {
        vec![Environment::Development, Environment::Testing]
    }

    /// Check if this seeder should run in the given environment
    fn should_run(&self, env: &Environment) -> bool {
        self.environments().contains(env)
    }

    /// Run the seeder
    async fn run(&self, store: &StoreHandle) -> OrmResult<()>;
}

type SeedFn = Box<dyn Fn(StoreHandle) -> BoxFuture<'static, OrmResult<()>> + Send + Sync>;

/// Seeder built from a closure
pub struct CustomSeeder {
    name: String,
    environments: Vec<Environment>,
    run_fn: SeedFn,
}

impl CustomSeeder {
    pub fn new<F, Fut>(name: impl Into<String>, run_fn: F) -> Self
    where
        F: Fn(StoreHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OrmResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            environments: vec![Environment::Development, Environment::Testing],
            run_fn: Box::new(move |store| run_fn(store).boxed()),
        }
    }

    pub fn environments(mut self, envs: Vec<Environment>) -> Self {
        self.environments = envs;
        self
    }
}

#[async_trait::async_trait]
impl Seeder for CustomSeeder {
    fn name(&self) -> &str {
        &self.name
    }

    fn environments(&self) -> Vec<Environment> {
        self.environments.clone()
    }

    async fn run(&self, store: &StoreHandle) -> OrmResult<()> {
        (self.run_fn)(store.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(s: &str) -> Environment {
        s.parse().unwrap()
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(env("development"), Environment::Development);
        assert_eq!(env("DEV"), Environment::Development);
        assert_eq!(env("test"), Environment::Testing);
        assert_eq!(env("prod"), Environment::Production);
        assert_eq!(env("qa"), Environment::Custom("qa".to_string()));
        assert_eq!(Environment::Staging.to_string(), "staging");
    }

    #[test]
    fn test_environment_safety() {
        assert!(Environment::Development.is_safe_for_seeding());
        assert!(Environment::Staging.is_safe_for_seeding());
        assert!(!Environment::Production.is_safe_for_seeding());
        assert!(!Environment::Custom("qa".to_string()).is_safe_for_seeding());
    }

    #[test]
    fn test_custom_seeder_defaults() {
        let seeder = CustomSeeder::new("noop", |_| async { Ok::<(), crate::error::OrmError>(()) });
        assert_eq!(seeder.name(), "noop");
        assert!(seeder.should_run(&Environment::Testing));
        assert!(!seeder.should_run(&Environment::Production));

        let seeder = seeder.environments(vec![Environment::Production]);
        assert!(seeder.should_run(&Environment::Production));
    }
}
