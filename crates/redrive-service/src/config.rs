//! Service configuration.
//!
//! Sources are applied in order, later sources overriding earlier ones:
//!
//! 1. `/etc/redrive/service.yaml`
//! 2. `./config/service.yaml`
//! 3. the file passed with `--config` or `REDRIVE_CONFIG_FILE`
//! 4. environment variables prefixed `REDRIVE__`, with `__` separating
//!    nested keys (`REDRIVE__LOGGING__LEVEL=debug` sets `logging.level`)
//!
//! The first two files are optional. An explicitly named file must exist.
//! Configuration is read once at startup; changing it requires a restart.

use redrive_core::{ConfigurationEntry, ConfigurationError, SqsQueueConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

pub const SYSTEM_CONFIG_FILE: &str = "/etc/redrive/service";
pub const LOCAL_CONFIG_FILE: &str = "config/service";
pub const CONFIG_FILE_ENV: &str = "REDRIVE_CONFIG_FILE";
pub const ENV_PREFIX: &str = "REDRIVE";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Queue alias '{alias}' is configured more than once")]
    DuplicateAlias { alias: String },

    #[error("Invalid queue configuration: {0}")]
    Queue(#[from] ConfigurationError),
}

/// Root service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// How long each processor gets to finish its current message on shutdown
    #[serde(default = "default_shutdown_timeout_seconds")]
    pub shutdown_timeout_seconds: u64,

    #[serde(default)]
    pub queues: Vec<QueueConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            shutdown_timeout_seconds: default_shutdown_timeout_seconds(),
            queues: Vec::new(),
        }
    }
}

fn default_shutdown_timeout_seconds() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON structured logging
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One queue to redrive: where messages come from and where they go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Inactive queues are kept in the file but get no processor
    #[serde(default = "default_active")]
    pub active: bool,

    pub source: SqsQueueConfig,

    #[serde(flatten)]
    pub redrive: ConfigurationEntry,
}

fn default_active() -> bool {
    true
}

impl QueueConfig {
    pub fn alias(&self) -> &str {
        &self.redrive.alias
    }
}

impl ServiceConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn active_queues(&self) -> impl Iterator<Item = &QueueConfig> {
        self.queues.iter().filter(|queue| queue.active)
    }

    pub fn inactive_queues(&self) -> impl Iterator<Item = &QueueConfig> {
        self.queues.iter().filter(|queue| !queue.active)
    }

    /// Check every queue entry and reject duplicate aliases.
    ///
    /// Inactive entries are validated too so that activating one later
    /// cannot surface a broken entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shutdown_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "shutdown_timeout_seconds must be greater than zero".to_string(),
            });
        }

        let mut aliases = HashSet::new();
        for queue in &self.queues {
            queue.redrive.validate()?;

            if queue.source.queue_url.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: format!("queue '{}' has an empty source.queue_url", queue.alias()),
                });
            }

            if !aliases.insert(queue.alias()) {
                return Err(ConfigError::DuplicateAlias {
                    alias: queue.alias().to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Build the service configuration from files and the environment.
///
/// `explicit_path` is the operator-supplied file; it is required to exist.
/// The result is not validated.
pub fn load(explicit_path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name(SYSTEM_CONFIG_FILE)
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name(LOCAL_CONFIG_FILE)
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(path) = explicit_path.filter(|p| !p.as_os_str().is_empty()) {
        info!(path = %path.display(), "Loading configuration from explicit path");
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let config = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
