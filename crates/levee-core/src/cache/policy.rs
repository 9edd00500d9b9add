//! Cache policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How a request interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Never read or write the cache; only internal upstreams are tried
    Bypass,
    /// Cache-aware, entries expire after the given time to live
    Bounded(Duration),
    /// Cache-aware, entries never expire on their own
    Unbounded,
}

impl CachePolicy {
    /// Whether the cache is consulted and written for this policy
    pub fn is_cache_aware(&self) -> bool {
        !matches!(self, CachePolicy::Bypass)
    }

    /// Expiry applied after each cache write, if any
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            CachePolicy::Bounded(ttl) => Some(*ttl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicy::Bypass => "bypass",
            CachePolicy::Bounded(_) => "bounded",
            CachePolicy::Unbounded => "unbounded",
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachePolicy::Bounded(ttl) => write!(f, "bounded({}s)", ttl.as_secs()),
            other => f.write_str(other.as_str()),
        }
    }
}

/// What to do on a cache hit whose validator does not match the client's
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Replay the stored response as is
    #[default]
    Replay,
    /// Fetch from upstream again, replaying the stored response only if
    /// every upstream fails
    Refetch,
}

impl MismatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MismatchPolicy::Replay => "replay",
            MismatchPolicy::Refetch => "refetch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_policy_ttl() {
        let day = Duration::from_secs(86400);
        assert_eq!(CachePolicy::Bounded(day).ttl(), Some(day));
        assert_eq!(CachePolicy::Unbounded.ttl(), None);
        assert_eq!(CachePolicy::Bypass.ttl(), None);
    }

    #[test]
    fn test_cache_policy_is_cache_aware() {
        assert!(CachePolicy::Bounded(Duration::from_secs(1)).is_cache_aware());
        assert!(CachePolicy::Unbounded.is_cache_aware());
        assert!(!CachePolicy::Bypass.is_cache_aware());
    }

    #[test]
    fn test_cache_policy_display() {
        assert_eq!(
            CachePolicy::Bounded(Duration::from_secs(60)).to_string(),
            "bounded(60s)"
        );
        assert_eq!(CachePolicy::Unbounded.to_string(), "unbounded");
    }
}
