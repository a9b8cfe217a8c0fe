//! Preflight Server - Main entry point
//!
//! Serves the health snapshot, liveness and readiness endpoints.

use std::future::IntoFuture;
use std::net::SocketAddr;

use preflight_core::{config::Config, telemetry, Preflight};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config: {}. Using defaults.", e);
            Config::default().with_conventional_env(|key| std::env::var(key).ok())
        }
    };

    telemetry::init_logging(&config.logging, &config.service.environment)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.service.environment,
        "Starting Preflight Server"
    );

    let addr: SocketAddr = config.bind_address().parse()?;
    let shutdown_grace = config.server.shutdown_grace;

    let preflight = Preflight::from_config(config)?;
    tracing::info!(
        probes = ?preflight.service().registry().names().collect::<Vec<_>>(),
        "Health service initialized"
    );

    let app = preflight.router();

    tracing::info!(address = %addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    tokio::select! {
        result = server => result?,
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(shutdown_grace).await;
        } => {
            tracing::warn!(grace_secs = shutdown_grace.as_secs(), "Shutdown grace period elapsed");
        }
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
