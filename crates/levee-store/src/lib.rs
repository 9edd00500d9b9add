//! Levee Cache Store
//!
//! This crate provides the key-value abstraction the resolver caches
//! responses in, with a Redis backend and an in-process backend.

pub mod backend;
pub mod error;
pub mod memory;
pub mod redis_store;

pub use backend::{CacheRecord, CacheStore};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use redis_store::{RedisStore, RedisStoreConfig};
