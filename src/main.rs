//! Beacon Proximity - debug service
//!
//! Runs the signal-stabilization pipeline behind an HTTP API that an
//! external scanner feeds with raw sightings.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beacon_proximity::api::{create_router, AppState};
use beacon_proximity::{spawn_sweep_task, BeaconAggregator, Config};

/// Main entry point for the beacon service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the aggregator with the configured scan settings
/// 4. Start background sweep task
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon_proximity=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting beacon proximity service");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_time={:?}, proximity_timeout={:?}, rssi={}..={}, port={}, cleanup_interval={}s",
        config.scan.cache_time,
        config.scan.proximity_timeout,
        config.scan.min_rssi,
        config.scan.max_rssi,
        config.server_port,
        config.cleanup_interval
    );

    let state = AppState::from_config(&config).context("invalid scan settings")?;
    info!("Beacon aggregator initialized");

    let sweep_handle = spawn_sweep_task(state.aggregator.clone(), config.cleanup_interval);
    info!("Background sweep task started");

    let aggregator = state.aggregator.clone();
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep_handle, aggregator))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the sweep task and every pending beacon timer.
async fn shutdown_signal(sweep_handle: tokio::task::JoinHandle<()>, aggregator: BeaconAggregator) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    sweep_handle.abort();
    aggregator.shutdown();
    warn!("Sweep task and beacon timers aborted");
}
