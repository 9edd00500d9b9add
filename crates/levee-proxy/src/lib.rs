//! Levee Upstream Proxy
//!
//! This crate provides the client for exchanging requests with upstream
//! package registries, plus the HTTP/1.1 wire form used to store whole
//! responses in the cache.

pub mod client;
pub mod error;
pub mod headers;
pub mod wire;

pub use client::{UpstreamClient, UpstreamClientConfig, UpstreamResponse, target_url};
pub use error::ProxyError;
