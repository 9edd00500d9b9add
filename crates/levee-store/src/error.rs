//! Store error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis {0} timed out")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
