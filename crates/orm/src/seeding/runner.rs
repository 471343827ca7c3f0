//! Seed runner - executes registered seeders in declaration order

use std::time::Instant;

use super::seeder::{Environment, Seeder};
use crate::backends::StoreHandle;
use crate::error::{OrmError, OrmResult};

/// What to do when a seeder fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedFailurePolicy {
    /// Stop at the first failure
    #[default]
    FailFast,
    /// Run the remaining seeders and report every failure at the end
    ContinueOnError,
}

/// A seeder that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFailure {
    pub name: String,
    pub message: String,
}

/// Outcome of a seeding run
#[derive(Debug, Clone, Default)]
pub struct SeedRunResult {
    /// Seeders that completed, in order
    pub ran: Vec<String>,
    /// Seeders not enabled for the environment
    pub skipped: Vec<String>,
    pub failed: Vec<SeedFailure>,
    pub execution_time_ms: u128,
}

impl SeedRunResult {
    /// Turn collected failures into one error
    pub fn into_result(self) -> OrmResult<Self> {
        if self.failed.is_empty() {
            return Ok(self);
        }
        let names: Vec<&str> = self.failed.iter().map(|f| f.name.as_str()).collect();
        let details: Vec<String> = self
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.name, f.message))
            .collect();
        Err(OrmError::SeedFailed {
            name: names.join(", "),
            message: format!("{} seeder(s) failed; {}", self.failed.len(), details.join("; ")),
        })
    }
}

/// Runs seeders against one store for one environment
pub struct SeedRunner {
    store: StoreHandle,
    seeders: Vec<Box<dyn Seeder>>,
    environment: Environment,
    force: bool,
    policy: SeedFailurePolicy,
}

impl SeedRunner {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            store,
            seeders: Vec::new(),
            environment: Environment::Development,
            force: false,
            policy: SeedFailurePolicy::default(),
        }
    }

    /// Add a seeder to the runner
    pub fn add<S: Seeder + 'static>(mut self, seeder: S) -> Self {
        self.seeders.push(Box::new(seeder));
        self
    }

    pub fn add_boxed(mut self, seeder: Box<dyn Seeder>) -> Self {
        self.seeders.push(seeder);
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Allow environments that are not safe for seeding
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn policy(mut self, policy: SeedFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn seeder_names(&self) -> Vec<&str> {
        self.seeders.iter().map(|s| s.name()).collect()
    }

    /// Run every seeder enabled for the environment, in declaration order
    pub async fn run_all(&self) -> OrmResult<SeedRunResult> {
        let start_time = Instant::now();
        self.check_environment()?;

        let mut result = SeedRunResult::default();
        let mut selected = Vec::new();
        for seeder in &self.seeders {
            if seeder.should_run(&self.environment) {
                selected.push(seeder.as_ref());
            } else {
                tracing::debug!(seeder = seeder.name(), environment = %self.environment, "Skipping seeder");
                result.skipped.push(seeder.name().to_string());
            }
        }

        tracing::info!(
            count = selected.len(),
            environment = %self.environment,
            "Running seeders"
        );
        self.execute(selected, &mut result).await?;
        result.execution_time_ms = start_time.elapsed().as_millis();
        result.into_result()
    }

    /// Run one seeder by name
    pub async fn run_one(&self, name: &str) -> OrmResult<SeedRunResult> {
        let start_time = Instant::now();
        let seeder = self
            .seeders
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| OrmError::NotFound(format!("Seeder '{}'", name)))?;

        self.check_environment()?;
        if !seeder.should_run(&self.environment) {
            return Err(OrmError::Validation(format!(
                "Seeder '{}' is not enabled for environment '{}'",
                name, self.environment
            )));
        }

        let mut result = SeedRunResult::default();
        self.execute(vec![seeder.as_ref()], &mut result).await?;
        result.execution_time_ms = start_time.elapsed().as_millis();
        result.into_result()
    }

    fn check_environment(&self) -> OrmResult<()> {
        if self.environment.is_safe_for_seeding() {
            return Ok(());
        }
        if !self.force {
            return Err(OrmError::Validation(format!(
                "Environment '{}' is not safe for automatic seeding. Use --force to opt in.",
                self.environment
            )));
        }
        tracing::warn!(environment = %self.environment, "Force running seeders");
        Ok(())
    }

    async fn execute(&self, seeders: Vec<&dyn Seeder>, result: &mut SeedRunResult) -> OrmResult<()> {
        for seeder in seeders {
            let name = seeder.name();
            tracing::info!(seeder = name, "Seeding");
            match seeder.run(&self.store).await {
                Ok(()) => {
                    tracing::info!(seeder = name, "Seeded");
                    result.ran.push(name.to_string());
                }
                Err(e) => {
                    tracing::error!(seeder = name, error = %e, "Seeder failed");
                    match self.policy {
                        SeedFailurePolicy::FailFast => {
                            return Err(OrmError::SeedFailed {
                                name: name.to_string(),
                                message: e.to_string(),
                            })
                        }
                        SeedFailurePolicy::ContinueOnError => result.failed.push(SeedFailure {
                            name: name.to_string(),
                            message: e.to_string(),
                        }),
                    }
                }
            }
        }
        Ok(())
    }
}
