//! Main entry point for the collaborative document server.
//!
//! Loads the last snapshot, then serves the websocket endpoint, a health check and the
//! static client assets until interrupted.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rga_collab::config::load_env_file;
use rga_collab::server::create_router;
use rga_collab::{Config, FileSnapshotStore, MemorySnapshotStore, SessionManager, SnapshotStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let env_file = load_env_file(None).context("failed to read .env file")?;
    let config = Config::parse();
    info!("Starting RGA collaborative document server...");
    if let Some(path) = env_file {
        info!("Loaded environment from {}", path.display());
    }

    let store: Arc<dyn SnapshotStore> = if config.ephemeral {
        warn!("Running with an in-memory document; nothing will be persisted");
        Arc::new(MemorySnapshotStore::new())
    } else {
        Arc::new(FileSnapshotStore::new(&config.document_path))
    };

    let manager = SessionManager::restore(store, config.manager_config())
        .await
        .with_context(|| {
            format!(
                "failed to load document snapshot from {}",
                config.document_path.display()
            )
        })?;

    let app = create_router(Arc::new(manager), Some(&config.static_dir));

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("WebSocket server running at ws://{}/ws", addr);
    info!("Serving static files from {}", config.static_dir.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
