//! Structured logging setup for the `strata` binary.
//!
//! Logs go to stderr so that command output on stdout stays pipeable.

use std::io;

use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level or filter directive (e.g. "info", "strata_orm=debug")
    pub level: String,
    /// JSON lines instead of plain text
    pub json_format: bool,
    /// Include file and line number information
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            level: config.log_level.clone(),
            json_format: config.json_logs,
            include_location: config.log_level.eq_ignore_ascii_case("trace"),
        }
    }

    /// Filter used when RUST_LOG is not set
    pub fn filter_directive(&self) -> String {
        if self.level.contains('=') {
            self.level.clone()
        } else {
            format!("warn,strata_orm={level},strata={level}", level = self.level)
        }
    }
}

/// Install the global subscriber. RUST_LOG, when set, wins over the configured level.
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let directive = config.filter_directive();
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&directive))?;

    let layer = Layer::new()
        .with_writer(io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()?;
    }

    tracing::debug!(
        target: "strata::logging",
        "Logging initialized (filter: {}, format: {})",
        directive,
        if config.json_format { "JSON" } else { "text" }
    );
    Ok(())
}
