use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::settings::SettingsConfig;
use crate::manager::token_manager::TokenManager;
use crate::observability::metrics::Metrics;
use crate::observability::routes;
use crate::server::routes as status_routes;

#[derive(Clone)]
pub struct AppState {
    pub manager: TokenManager,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(manager: TokenManager, metrics: Arc<Metrics>) -> Self {
        Self { manager, metrics }
    }
}

pub fn app(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .merge(routes::router(&settings_config.metrics))
        .merge(status_routes::router())
        .with_state(state)
}

/// Bind the configured address. `None` when the server is disabled.
pub async fn bind(settings_config: &SettingsConfig) -> Result<Option<TcpListener>> {
    if !settings_config.server.is_enabled {
        info!("http server disabled");
        return Ok(None);
    }

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind http server on {}", bind_addr))?;
    info!("http server listening on {}", bind_addr);
    Ok(Some(listener))
}

/// Serve the inspection endpoints on an already bound listener until
/// `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    settings_config: &SettingsConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = app(settings_config, state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("http server stopped");
    Ok(())
}
