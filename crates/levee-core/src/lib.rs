//! Levee Core Business Logic
//!
//! This crate provides the request resolution engine: cache policies,
//! the ordered upstream tiers, and the logic deciding between replaying
//! the cache, answering a conditional request, and fetching upstream.

pub mod cache;
pub mod config;
pub mod error;
pub mod resolver;
pub mod upstream;

pub use cache::{CachePolicy, MismatchPolicy};
pub use config::{EngineConfig, validate_upstream_url};
pub use error::CoreError;
pub use resolver::{ProxyRequest, ProxyResponse, Resolver, ResponseSource};
pub use upstream::{Tier, UpstreamList};
