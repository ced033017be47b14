use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::Router;
use tracing::{error, info};

use crate::config::settings::{MetricsConfig, SettingsConfig};
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::resilience::fetch_coordinator::FetchCoordinator;
use crate::server::search_routes::SearchState;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub search_state: SearchState,
}

impl AppState {
    pub fn new(metrics: &Metrics, coordinator: Arc<FetchCoordinator>) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            search_state: SearchState::new(coordinator),
        }
    }
}

/// Routes of the service: search API, health probe and (optionally) metrics.
pub fn router(metrics_config: &MetricsConfig, state: AppState) -> Router {
    Router::new()
        .merge(state.metrics_state.router(metrics_config))
        .merge(state.search_state.router())
        .with_state(state)
}

/// Start one Axum server and serve until Ctrl-C.
pub async fn start(settings_config: &SettingsConfig, coordinator: Arc<FetchCoordinator>) -> Result<()> {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, coordinator);
    let app = router(&settings_config.metrics, state);

    let address = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| anyhow!("cannot bind {}: {}", address, e))?;
    info!("listening on {}", address);

    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    metrics.up.set(0);

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            error!("cannot listen for shutdown signal: {}", err);
            std::future::pending::<()>().await
        }
    }
}
