use anyhow::{Context, Result};
use strata_orm::{Environment, SeedFailurePolicy, SeedRunResult, SeedRunner, StoreHandle};

use crate::database::seeds;

#[derive(Debug, Clone)]
pub struct SeedOptions {
    /// Run only this seeder
    pub name: Option<String>,
    pub environment: Environment,
    /// Allow production and custom environments
    pub force: bool,
    pub continue_on_error: bool,
}

impl SeedOptions {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            name: None,
            environment,
            force: false,
            continue_on_error: false,
        }
    }
}

pub fn build_runner(store: StoreHandle, options: &SeedOptions) -> SeedRunner {
    let policy = if options.continue_on_error {
        SeedFailurePolicy::ContinueOnError
    } else {
        SeedFailurePolicy::FailFast
    };

    seeds::all().into_iter().fold(
        SeedRunner::new(store)
            .environment(options.environment.clone())
            .force(options.force)
            .policy(policy),
        |runner, seeder| runner.add_boxed(seeder),
    )
}

pub async fn run(store: StoreHandle, options: SeedOptions) -> Result<()> {
    let runner = build_runner(store, &options);
    let result = match &options.name {
        Some(name) => runner.run_one(name).await,
        None => runner.run_all().await,
    }
    .with_context(|| format!("Seeding failed in {} environment", options.environment))?;

    print_summary(&result);
    Ok(())
}

fn print_summary(result: &SeedRunResult) {
    for name in &result.ran {
        println!("Seeded:  {}", name);
    }
    for name in &result.skipped {
        println!("Skipped: {}", name);
    }
    println!(
        "Ran {} seeder(s), skipped {} ({} ms)",
        result.ran.len(),
        result.skipped.len(),
        result.execution_time_ms
    );
}
