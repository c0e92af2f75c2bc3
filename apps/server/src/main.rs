//! # Stockroom Server
//!
//! HTTP/WebSocket backend for offline-capable point-of-sale clients.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockroom Server                                 │
//! │                                                                         │
//! │  POS client ───► HTTP (8080) ───► Services ───► SQLite                 │
//! │      ▲                               │                                  │
//! │      │                               ▼                                  │
//! │      └──────── /ws ◄──────────── ChangeHub ◄── heartbeat task           │
//! │                                                                         │
//! │                    tombstone sweeper ───► SQLite                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stockroom_db::{Database, DbConfig};
use stockroom_server::{build_router, AppState, ServerConfig};
use stockroom_sync::{spawn_heartbeat, spawn_sweeper, ChangeHub, SyncConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting Stockroom server...");

    // Load configuration
    let config = ServerConfig::load()?;
    let sync_config = SyncConfig::load_or_default(config.sync_config_path.clone());
    let addr = config.socket_addr()?;
    info!(
        %addr,
        database = %config.database_path.display(),
        heartbeat_secs = sync_config.hub.heartbeat_interval_secs,
        retention_days = sync_config.retention.tombstone_retention_days,
        "Configuration loaded"
    );

    // Open the store (runs migrations)
    let db = Database::new(DbConfig::new(config.database_path.clone())).await?;
    info!("Database ready");

    let hub = Arc::new(ChangeHub::new(&sync_config.hub));
    let state = Arc::new(AppState::new(db.clone(), hub.clone(), config));

    // Background tasks
    let (stop_tx, stop_rx) = watch::channel(false);
    let heartbeat = spawn_heartbeat(hub.clone(), sync_config.hub.heartbeat_interval(), stop_rx.clone());
    let sweeper = spawn_sweeper(db.clone(), sync_config.retention.clone(), stop_rx);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    let shutdown_hub = hub.clone();
    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        // Open sockets would otherwise keep the server alive.
        let closed = shutdown_hub.shutdown().await;
        info!(closed, "Change broadcast connections closed");
        let _ = stop_tx.send(true);
    })
    .await?;

    for (name, task) in [("heartbeat", heartbeat), ("sweeper", sweeper)] {
        if let Err(e) = task.await {
            warn!(task = name, error = %e, "Background task ended abnormally");
        }
    }

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed never
/// fires instead of aborting the server.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
