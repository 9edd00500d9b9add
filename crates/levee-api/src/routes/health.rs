//! Health check endpoint

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cache: CacheHealth,
}

#[derive(Serialize)]
pub struct CacheHealth {
    pub backend: String,
    pub reachable: bool,
}

/// Health check handler
///
/// An unreachable cache only degrades the proxy: every lookup becomes a
/// miss, but requests are still served.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    metrics::counter!("levee_health_checks_total").increment(1);

    let store = state.resolver.store();
    let reachable = match store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Health check: {} cache unreachable: {}", store.name(), e);
            false
        }
    };

    Json(HealthResponse {
        status: if reachable { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: CacheHealth {
            backend: store.name().to_string(),
            reachable,
        },
    })
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/-/health", get(health))
}
