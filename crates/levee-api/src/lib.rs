//! Levee HTTP API
//!
//! This crate provides the axum router that maps inbound registry requests
//! to cache policies and hands them to the resolver, plus the service
//! endpoints under `/-/`.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
