//! Logging bootstrap.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;

const FALLBACK_FILTER: &str = "info";

/// Filter from `RUST_LOG` when set, otherwise from the configured level.
///
/// An unparseable level falls back to `info` rather than silencing output.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Install the global `tracing` subscriber
pub fn init(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let json = config.json_format;

    tracing_subscriber::registry()
        .with(build_filter(&config.level))
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init()
}
