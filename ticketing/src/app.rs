//! Application lifecycle and graceful shutdown.
//!
//! 1. **Startup**: bind the listener and spawn the order sweeper
//! 2. **Runtime**: serve HTTP until a shutdown signal arrives
//! 3. **Shutdown**: stop accepting connections, tell the sweeper to stop and
//!    wait for it (bounded by `SHUTDOWN_TIMEOUT`)

use crate::server::{AppState, build_router};
use crate::sweeper::spawn_order_sweeper;
use anyhow::Context;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Run the service until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns error if the listener cannot be bound or the server fails.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let config = state.config.clone();
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let sweeper = spawn_order_sweeper(state.manager.clone(), config.orders.clone(), shutdown_rx);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped, initiating graceful shutdown...");
    let _ = shutdown_tx.send(());

    let timeout = Duration::from_secs(config.server.shutdown_timeout);
    match tokio::time::timeout(timeout, sweeper).await {
        Ok(Ok(())) => info!("Order sweeper stopped gracefully"),
        Ok(Err(e)) => warn!(error = %e, "Order sweeper task failed"),
        Err(_) => warn!("Order sweeper shutdown timed out"),
    }

    info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// A signal handler that cannot be installed never fires; the other one still
/// does.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(error = %error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                warn!(error = %error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
