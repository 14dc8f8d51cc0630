//! # Redrive Service
//!
//! Hosts one redrive processor per configured queue.
//!
//! - [`config`] - Layered service configuration
//! - [`logging`] - `tracing` subscriber setup
//! - [`supervisor`] - Processor construction and lifecycle

pub mod config;
pub mod logging;
pub mod supervisor;

use crate::config::{ConfigError, LoggingConfig, ServiceConfig};
use crate::supervisor::{QueueClientFactory, Supervisor, SupervisorError};
use clap::Parser;
use redrive_core::TracingEventSink;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Redrive queue messages to HTTP endpoints
#[derive(Debug, Parser)]
#[command(name = "redrive-service")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Redrives queued messages to HTTP endpoints")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "REDRIVE_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Logging level, overriding the configured one
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Apply command-line overrides to the configured logging settings
    pub fn logging(&self, configured: Option<&LoggingConfig>) -> LoggingConfig {
        let mut logging = configured.cloned().unwrap_or_default();

        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        logging.json_format |= self.json_logs;

        logging
    }
}

/// Errors that end the service
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

impl ServiceError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Supervisor(_) => 1,
            Self::Configuration(_) => 3,
        }
    }
}

/// Run every active queue until `shutdown` completes, then stop them all.
///
/// `config` must already be validated.
pub async fn run(
    config: ServiceConfig,
    factory: &dyn QueueClientFactory,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServiceError> {
    let supervisor = Supervisor::from_config(&config, factory, Arc::new(TracingEventSink)).await?;

    supervisor.start_all().await;
    info!(queues = ?supervisor.aliases(), "Redrive service started");

    shutdown.await;

    info!(
        timeout_seconds = config.shutdown_timeout_seconds,
        "Stopping queue processors"
    );
    supervisor.stop_all().await;

    for (alias, stats) in supervisor.stats() {
        info!(
            alias = %alias,
            received = stats.received,
            sent = stats.sent,
            failed = stats.failed,
            "Final totals"
        );
    }

    info!("Redrive service stopped");
    Ok(())
}
