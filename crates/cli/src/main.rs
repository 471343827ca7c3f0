use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod database;
mod logging;

use commands::seed::SeedOptions;
use config::{AppConfig, ConfigOverrides};
use logging::LoggingConfig;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Apply, roll back, inspect and seed document store migrations", long_about = None)]
#[command(version)]
struct Cli {
    /// Store connection URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Store driver: memory or postgres
    #[arg(long, global = true)]
    driver: Option<String>,

    /// Log level or filter directive (overrides STRATA_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Defaults to `migrate`
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Apply all pending migrations
    Migrate,

    /// Roll back the most recent batches
    Rollback {
        /// Number of batches to roll back
        #[arg(default_value_t = 1)]
        steps: usize,

        /// Roll back every batch
        #[arg(long, conflicts_with = "steps")]
        all: bool,
    },

    /// Roll back every batch
    Reset,

    /// Roll back every batch, then apply everything again
    Refresh {
        /// Run seeders afterwards
        #[arg(long)]
        seed: bool,
    },

    /// Run seeders
    Seed {
        /// Run only this seeder
        name: Option<String>,

        /// Seeding environment (overrides STRATA_ENV / APP_ENV)
        #[arg(long)]
        env: Option<String>,

        /// Allow seeding production and custom environments
        #[arg(long)]
        force: bool,

        /// Keep going after a seeder fails
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Show applied and pending migrations
    Status,

    /// Release a migration lock left behind by a crashed run
    Unlock,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            database_url: self.database_url.clone(),
            driver: self.driver.clone(),
            log_level: self.log_level.clone(),
            json_logs: self.json_logs,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("strata: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = logging::init_logging(LoggingConfig::from_app_config(&config)) {
        eprintln!("strata: failed to initialize logging: {}", err);
        return ExitCode::FAILURE;
    }

    match run(cli.command.unwrap_or(Commands::Migrate), &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{:#}", err), "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let config = AppConfig::from_env()
        .and_then(|config| config.with_overrides(cli.overrides()))
        .context("Invalid configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(command: Commands, config: &AppConfig) -> Result<()> {
    let store = database::connect(config).await?;
    let runner = database::migration_runner(store.clone(), config);
    tracing::debug!(backend = store.backend_name(), command = ?command, "Running command");

    match command {
        Commands::Migrate => commands::migrate::run(&runner).await,
        Commands::Rollback { steps, all } => {
            commands::migrate::rollback(&runner, if all { None } else { Some(steps) }).await
        }
        Commands::Reset => commands::migrate::reset(&runner).await,
        Commands::Refresh { seed } => {
            commands::migrate::refresh(&runner).await?;
            if seed {
                commands::seed::run(store, SeedOptions::for_environment(config.environment.clone()))
                    .await?;
            }
            Ok(())
        }
        Commands::Seed {
            name,
            env,
            force,
            continue_on_error,
        } => {
            let environment = match env {
                Some(raw) => config::parse_environment(&raw)?,
                None => config.environment.clone(),
            };
            let options = SeedOptions {
                name,
                environment,
                force,
                continue_on_error,
            };
            commands::seed::run(store, options).await
        }
        Commands::Status => commands::status::run(&runner).await,
        Commands::Unlock => commands::migrate::unlock(&runner).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_migrate() {
        let cli = Cli::try_parse_from(["strata"]).unwrap();
        assert_eq!(cli.command.unwrap_or(Commands::Migrate), Commands::Migrate);
    }

    #[test]
    fn test_rollback_arguments() {
        let cli = Cli::try_parse_from(["strata", "rollback"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Rollback { steps: 1, all: false }));

        let cli = Cli::try_parse_from(["strata", "rollback", "3"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Rollback { steps: 3, all: false }));

        let cli = Cli::try_parse_from(["strata", "rollback", "--all"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Rollback { all: true, .. })));

        assert!(Cli::try_parse_from(["strata", "rollback", "2", "--all"]).is_err());
    }

    #[test]
    fn test_seed_and_global_flags() {
        let cli = Cli::try_parse_from([
            "strata",
            "seed",
            "admin_user",
            "--env",
            "production",
            "--force",
            "--driver",
            "memory",
            "--json-logs",
        ])
        .unwrap();

        assert_eq!(cli.driver.as_deref(), Some("memory"));
        assert!(cli.json_logs);
        assert_eq!(
            cli.command,
            Some(Commands::Seed {
                name: Some("admin_user".to_string()),
                env: Some("production".to_string()),
                force: true,
                continue_on_error: false,
            })
        );
    }

    #[tokio::test]
    async fn test_memory_driver_runs_every_command() {
        let config = AppConfig::from_lookup(|key| match key {
            "STRATA_DRIVER" => Some("memory".to_string()),
            _ => None,
        })
        .unwrap();

        run(Commands::Migrate, &config).await.unwrap();
        run(Commands::Status, &config).await.unwrap();
        run(Commands::Refresh { seed: true }, &config).await.unwrap();
        run(Commands::Rollback { steps: 1, all: false }, &config).await.unwrap();
        run(Commands::Reset, &config).await.unwrap();
        run(Commands::Unlock, &config).await.unwrap();
    }

    #[test]
    fn test_unlock_subcommand() {
        let cli = Cli::try_parse_from(["strata", "unlock"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Unlock));
    }
}
