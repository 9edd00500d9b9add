//! Application state

use levee_core::Resolver;
use std::sync::Arc;
use std::time::Duration;

/// Prometheus handle rendering the `/-/metrics` page
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    /// Time to live of the registry metadata document
    pub metadata_ttl: Duration,
    /// Largest request body buffered for forwarding
    pub max_body_size: usize,
}

impl AppState {
    pub fn new(resolver: Arc<Resolver>, metadata_ttl: Duration, max_body_size: usize) -> Self {
        Self {
            resolver,
            metadata_ttl,
            max_body_size,
        }
    }
}
