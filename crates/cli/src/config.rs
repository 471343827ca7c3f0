use std::env;
use std::str::FromStr;
use std::time::Duration;

use strata_orm::{Environment, MigrationConfig, StoreBackendType};
use thiserror::Error;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Runtime configuration for the `strata` binary
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub database_url: Option<String>,
    pub driver: StoreBackendType,
    pub log_level: String,
    pub json_logs: bool,
    pub migrations_collection: String,
    pub use_migration_lock: bool,
    /// `None` never takes over a held lock
    pub lock_stale_after: Option<Duration>,
}

/// Values given on the command line; each one wins over its env counterpart
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub driver: Option<String>,
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("STRATA_ENV")
            .or_else(|| lookup("APP_ENV"))
            .map(|raw| parse_environment(&raw))
            .transpose()?
            .unwrap_or(Environment::Development);

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let driver = match lookup("STRATA_DRIVER") {
            Some(raw) => parse_driver(&raw)?,
            None if database_url.is_some() => StoreBackendType::PostgreSQL,
            None => StoreBackendType::Memory,
        };

        let json_logs = match lookup("STRATA_LOG_FORMAT") {
            Some(raw) => parse_log_format(&raw)?,
            None => false,
        };

        let use_migration_lock = match lookup("STRATA_MIGRATION_LOCK") {
            Some(raw) => parse_flag("migration_lock", &raw)?,
            None => true,
        };

        let lock_stale_after = match lookup("STRATA_MIGRATION_LOCK_STALE_SECS") {
            Some(raw) => parse_stale_secs(&raw)?,
            None => MigrationConfig::default().lock_stale_after,
        };

        Ok(AppConfig {
            environment,
            database_url,
            driver,
            log_level: lookup("STRATA_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            json_logs,
            migrations_collection: lookup("STRATA_MIGRATIONS_COLLECTION")
                .unwrap_or_else(|| MigrationConfig::default().migrations_collection),
            use_migration_lock,
            lock_stale_after,
        })
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(url) = overrides.database_url {
            self.database_url = Some(url);
            // an explicit URL without an explicit driver means postgres
            if overrides.driver.is_none() {
                self.driver = StoreBackendType::PostgreSQL;
            }
        }
        if let Some(driver) = overrides.driver {
            self.driver = parse_driver(&driver)?;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        self.json_logs |= overrides.json_logs;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver == StoreBackendType::PostgreSQL && self.database_url.is_none() {
            return Err(ConfigError::ValidationFailed {
                field: "database_url".to_string(),
                reason: "The postgres driver needs DATABASE_URL or --database-url".to_string(),
            });
        }

        if self.migrations_collection.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "migrations_collection".to_string(),
                reason: "Migrations collection name cannot be empty".to_string(),
            });
        }

        // plain levels, or full filter directives like "strata_orm=debug"
        let level = self.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) && !level.contains('=') {
            return Err(ConfigError::InvalidValue {
                field: "log_level".to_string(),
                value: self.log_level.clone(),
                expected: LOG_LEVELS.join(", "),
            });
        }

        Ok(())
    }

    pub fn migration_config(&self) -> MigrationConfig {
        MigrationConfig {
            migrations_collection: self.migrations_collection.clone(),
            use_lock: self.use_migration_lock,
            lock_stale_after: self.lock_stale_after,
            ..MigrationConfig::default()
        }
    }
}

pub fn parse_environment(raw: &str) -> Result<Environment, ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "environment".to_string(),
            value: raw.to_string(),
            expected: "development, testing, staging, production or a custom name".to_string(),
        });
    }
    // unrecognised names become custom environments
    match Environment::from_str(raw.trim()) {
        Ok(environment) => Ok(environment),
        Err(never) => match never {},
    }
}

fn parse_driver(raw: &str) -> Result<StoreBackendType, ConfigError> {
    raw.parse::<StoreBackendType>()
        .map_err(|_| ConfigError::InvalidValue {
            field: "driver".to_string(),
            value: raw.to_string(),
            expected: "memory or postgres".to_string(),
        })
}

fn parse_log_format(raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "json" => Ok(true),
        "plain" | "text" | "pretty" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: "log_format".to_string(),
            value: raw.to_string(),
            expected: "json or plain".to_string(),
        }),
    }
}

fn parse_flag(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            expected: "true or false".to_string(),
        }),
    }
}

/// Seconds before a held lock counts as stale; 0 never takes one over
fn parse_stale_secs(raw: &str) -> Result<Option<Duration>, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(secs) => Ok(Some(Duration::from_secs(secs))),
        Err(_) => Err(ConfigError::InvalidValue {
            field: "migration_lock_stale_secs".to_string(),
            value: raw.to_string(),
            expected: "a whole number of seconds".to_string(),
        }),
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue { field: String, value: String, expected: String },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}
