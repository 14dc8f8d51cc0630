//! # Redrive Service
//!
//! Binary entry point: loads configuration, initialises logging, runs every
//! active queue processor and stops them on Ctrl+C or SIGTERM.

use anyhow::Context;
use clap::Parser;
use redrive_service::supervisor::SqsQueueClientFactory;
use redrive_service::{logging, run, Cli, ServiceError};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging is set up before the configuration is validated so that
    // configuration errors are reported through it.
    let loaded = redrive_service::config::load(cli.config.as_deref());
    logging::init(&cli.logging(loaded.as_ref().ok().map(|c| &c.logging)))
        .context("Failed to initialise logging")?;

    info!("Starting redrive service");

    let service_config = match loaded.and_then(|c| c.validate().map(|()| c)) {
        Ok(c) => c,
        Err(e) => {
            let e = ServiceError::from(e);
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(e.exit_code());
        }
    };

    if let Err(e) = run(service_config, &SqsQueueClientFactory, shutdown_signal()).await {
        error!(error = %e, "Redrive service failed");
        std::process::exit(e.exit_code());
    }

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating shutdown"),
    }
}
