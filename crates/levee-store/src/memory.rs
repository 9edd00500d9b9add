//! In-process cache store
//!
//! Mirrors the Redis semantics (hash per key, key-level expiry, expiry kept
//! across field writes) without a server. Expired keys are dropped lazily
//! on access.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::backend::{CacheRecord, CacheStore};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct MemoryEntry {
    validator: Option<String>,
    response: Bytes,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory cache store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time to live of a key, `None` if the key is absent or
    /// never expires
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Whether a live record exists for the key
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            debug!("Dropping expired key {}", key);
            entries.remove(key);
            return Ok(None);
        }

        Ok(entries.get(key).map(|e| CacheRecord {
            validator: e.validator.clone(),
            response: e.response.clone(),
        }))
    }

    async fn set_full(
        &self,
        key: &str,
        validator: Option<&str>,
        response: Bytes,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let validator = validator.filter(|v| !v.is_empty()).map(str::to_string);

        match entries.get_mut(key) {
            // Field writes keep the key's expiry, like HSET on Redis.
            Some(entry) if !entry.is_expired(now) => {
                entry.validator = validator;
                entry.response = response;
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    MemoryEntry {
                        validator,
                        response,
                        expires_at: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn set_validator(&self, key: &str, validator: &str) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.validator = Some(validator.to_string()).filter(|v| !v.is_empty());
            }
            _ => debug!("No stored response for {}, skipping validator update", key),
        }
        Ok(())
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.lock().get_mut(key) {
            // A deadline past what Instant can represent never arrives.
            entry.expires_at = now.checked_add(ttl);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
