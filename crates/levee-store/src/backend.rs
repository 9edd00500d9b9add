//! Cache store trait

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::StoreError;

/// Hash field holding the validator (ETag) of the cached representation
pub const VALIDATOR_FIELD: &str = "validator";

/// Hash field holding the full HTTP/1.1 response
pub const RESPONSE_FIELD: &str = "response";

/// A cached response for one request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// Validator of the stored representation, `None` when the upstream
    /// sent no ETag
    pub validator: Option<String>,
    /// The complete response as last fetched in full
    pub response: Bytes,
}

/// Cache store trait
///
/// Keys are request paths. Each key holds a record of two fields with an
/// optional key-level expiry. Implementations must be safe for concurrent
/// use; callers do no locking of their own.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the record for a key.
    ///
    /// A missing key, a key without fields, and a key without a stored
    /// response all yield `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, StoreError>;

    /// Write validator and response together.
    async fn set_full(
        &self,
        key: &str,
        validator: Option<&str>,
        response: Bytes,
    ) -> Result<(), StoreError>;

    /// Replace only the validator, leaving the stored response untouched.
    ///
    /// Does nothing when the key holds no response, so a validator can never
    /// exist without the body it describes.
    async fn set_validator(&self, key: &str, validator: &str) -> Result<(), StoreError>;

    /// Expire the key `ttl` from now.
    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name for logs and health output
    fn name(&self) -> &'static str;
}

/// Map a stored validator field to its record form; empty means absent.
pub(crate) fn validator_from_field(raw: Option<Vec<u8>>) -> Option<String> {
    raw.and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|v| !v.is_empty())
}
