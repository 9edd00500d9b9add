//! API routes

mod health;
pub mod metrics;
mod registry;

use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let body_limit = state.max_body_size;

    let mut router = Router::new()
        // Service endpoints
        .merge(health::routes())
        // Package registry
        .merge(registry::routes())
        .fallback(registry::bypass)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit));

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}
