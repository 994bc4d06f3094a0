//! # Analytics Migrator Server
//!
//! Loads layered configuration, bootstraps the broker, stores and worker
//! registry, then serves the HTTP control surface until Ctrl+C or SIGTERM.
//!
//! ```bash
//! MIGRATOR_ENV=production MIGRATOR__RABBITMQ__URL=amqp://... analytics-migrator
//! ```

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use analytics_migrator::logging::init_tracing;
use analytics_migrator::{MigratorBootstrap, MigratorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        build = if cfg!(debug_assertions) { "debug" } else { "release" },
        "🚀 Starting analytics migrator"
    );

    let config = MigratorConfig::load().context("failed to load configuration")?;
    let bind_address = config.web.bind_address.clone();

    let handle = MigratorBootstrap::bootstrap(config)
        .await
        .context("failed to bootstrap migration service")?;

    let started = handle.start_autostart_consumers().await;
    if !started.is_empty() {
        info!(configs = ?started, "Worker pools started");
    }

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(address = %bind_address, "🌐 Control surface listening");

    let served = axum::serve(listener, handle.app())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("🛑 Shutdown signal received, stopping worker pools");
    handle.stop().await;

    if let Err(e) = served {
        error!(error = %e, "HTTP server terminated with an error");
        return Err(e).context("HTTP server failed");
    }

    info!("👋 Analytics migrator shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
