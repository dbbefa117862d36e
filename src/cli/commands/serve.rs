use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::config;
use crate::database::DatabaseManager;
use crate::routes::{app, Service};
use crate::state::AppState;

/// Serve the selected modules until ctrl-c / SIGTERM; no modules means all of them
pub async fn handle(services: Vec<Service>, port: Option<u16>) -> anyhow::Result<()> {
    let config = config();
    config.validate().map_err(anyhow::Error::msg)?;

    let services = if services.is_empty() {
        Service::ALL.to_vec()
    } else {
        services
    };
    let port = port.unwrap_or(config.server.port);

    info!("Starting {} in {:?} mode", config.project, config.environment);

    let manager = Arc::new(DatabaseManager::new(config.database.clone()));
    let state = AppState::new(config, manager.clone()).context("failed to build application state")?;
    let router = app(state, &services, &config.server);

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(?services, "Listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    manager.close_all().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
