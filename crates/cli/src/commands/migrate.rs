use anyhow::{Context, Result};
use strata_orm::{MigrationRunResult, MigrationRunner, RollbackResult};

/// Apply every pending migration as one batch
pub async fn run(runner: &MigrationRunner) -> Result<()> {
    let result = runner.apply().await.context("Migration failed")?;
    print_applied(&result);
    Ok(())
}

/// Roll back the last `steps` batches, or all of them when `steps` is `None`
pub async fn rollback(runner: &MigrationRunner, steps: Option<usize>) -> Result<()> {
    let result = match steps {
        Some(steps) => runner.rollback(steps).await,
        None => runner.rollback_all().await,
    }
    .context("Rollback failed")?;
    print_rolled_back(&result);
    Ok(())
}

pub async fn reset(runner: &MigrationRunner) -> Result<()> {
    let result = runner.reset().await.context("Reset failed")?;
    print_rolled_back(&result);
    Ok(())
}

pub async fn refresh(runner: &MigrationRunner) -> Result<()> {
    let (rolled_back, applied) = runner.refresh().await.context("Refresh failed")?;
    print_rolled_back(&rolled_back);
    print_applied(&applied);
    Ok(())
}

/// Clear a lock left behind by a migration run that died
pub async fn unlock(runner: &MigrationRunner) -> Result<()> {
    if runner.force_unlock().await.context("Unlock failed")? {
        println!("Migration lock released.");
    } else {
        println!("Migration lock was not held.");
    }
    Ok(())
}

fn print_applied(result: &MigrationRunResult) {
    match result.batch {
        None => println!("Nothing to migrate."),
        Some(batch) => {
            for id in &result.applied_migrations {
                println!("Migrated:    {}", id);
            }
            println!(
                "Applied {} migration(s) in batch {} ({} ms)",
                result.applied_count, batch, result.execution_time_ms
            );
        }
    }
}

fn print_rolled_back(result: &RollbackResult) {
    if result.rolled_back_count == 0 {
        println!("Nothing to roll back.");
        return;
    }
    for id in &result.rolled_back_migrations {
        println!("Rolled back: {}", id);
    }
    println!(
        "Rolled back {} migration(s) across {} batch(es) ({} ms)",
        result.rolled_back_count, result.batches_rolled_back, result.execution_time_ms
    );
}
