mod error;
mod health;
mod pack;
mod routes;
mod validate;

pub use error::ApiError;
pub use routes::router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::store::{Store, StoreManager};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<StoreManager>,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        Self {
            store: Arc::new(StoreManager::new(Arc::clone(&config))),
            config,
            started_at: Instant::now(),
        }
    }

    /// Acquire the ready store, joining the in-flight connection attempt
    /// if one is already running.
    pub(crate) async fn store(&self) -> Result<&Store, ApiError> {
        self.store.get().await.map_err(ApiError::Store)
    }
}

/// Build the application router with all middleware layers applied.
pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;
    router(&state.config)
        .layer(DefaultBodyLimit::max(body_limit))
        // The upstream consumers are static frontends on changing hosts,
        // so the API reflects any origin.
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or serve.
pub async fn serve(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.web_host, config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let state = AppState::new(config);

    // Best-effort warm-up. A failure here is not fatal: the connector
    // retries on the first incoming request.
    if let Err(e) = state.store.get().await {
        warn!("Store not reachable at startup, will retry per request: {e:#}");
    }

    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(listener, app).await.context("Web server error")?;

    Ok(())
}
