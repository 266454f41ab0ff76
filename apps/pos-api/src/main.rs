//! # Pharmacy POS API Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  .env / environment ──► AppConfig ──► Database (migrate) ──► AppState   │
//! │                                                                  │      │
//! │                                     axum::serve(0.0.0.0:PORT) ◄──┘      │
//! │                                             │                           │
//! │                                  Ctrl+C / SIGTERM ──► graceful stop     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use pos_api::{build_router, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting pharmacy POS API...");

    let config = AppConfig::load()?;
    info!(
        port = config.port,
        database = %config.database_path().display(),
        static_dir = %config.static_dir.display(),
        "Configuration loaded"
    );

    let port = config.port;
    let state = Arc::new(AppState::connect(config).await?);
    info!("Database ready");

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
