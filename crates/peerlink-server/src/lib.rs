//! PeerLink listener server library logic.

pub mod api;
pub mod api_dpac;
pub mod api_ping;
pub mod background;
pub mod config;
pub mod error;
pub mod fault;
pub mod middleware;
pub mod policy;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, put},
    Extension, Json, Router,
};
use config::{ConfigError, ListenerConfig};
use fault::FaultInjector;
use peerlink_correlation::Correlator;
use policy::TokenPolicy;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Issues the `MessageId` of every acknowledgement.
    pub correlator: Correlator,
    /// Bearer token acceptance policy.
    pub token_policy: Arc<TokenPolicy>,
    /// Simulated processing for `/ping`.
    pub ping_faults: FaultInjector,
    /// Simulated processing for `/dpac`.
    pub dpac_faults: FaultInjector,
    /// Turns true when the server begins shutting down.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Builds listener state from the `[listener]` section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the token policy cannot be constructed.
    pub fn from_config(
        config: &ListenerConfig,
        correlator: Correlator,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            correlator,
            token_policy: Arc::new(TokenPolicy::from_config(&config.token_policy)?),
            ping_faults: config.ping,
            dpac_faults: config.dpac,
            shutdown,
        })
    }
}

/// Maximum request body size (64 KiB). Probe and status bodies are small.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let peer_routes = Router::new()
        .route("/ping", put(api_ping::ping_handler))
        .route("/dpac", put(api_dpac::dpac_handler))
        .layer(axum::middleware::from_fn(middleware::peer_auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(peer_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
