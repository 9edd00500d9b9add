//! Cache write-back of upstream responses

use http::StatusCode;
use levee_proxy::UpstreamResponse;
use levee_store::CacheStore;
use metrics::counter;
use tracing::{debug, warn};

use super::policy::CachePolicy;

/// Which fields a commit wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    /// Validator and full response
    Full,
    /// Validator only
    Validator,
}

impl CommitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitKind::Full => "full",
            CommitKind::Validator => "validator",
        }
    }
}

/// Record an upstream response under `key`.
///
/// A 200 stores validator and response, a 304 refreshes the validator
/// only, and any other status writes nothing. A bounded policy then resets
/// the key's expiry. Store failures are logged and never surface to the
/// caller, so the response is served regardless.
pub async fn commit(
    store: &dyn CacheStore,
    key: &str,
    response: &UpstreamResponse,
    policy: CachePolicy,
) -> Option<CommitKind> {
    let (kind, result) = match response.status {
        StatusCode::OK => (
            CommitKind::Full,
            store
                .set_full(key, response.etag(), response.to_wire())
                .await,
        ),
        StatusCode::NOT_MODIFIED => (
            CommitKind::Validator,
            store
                .set_validator(key, response.etag().unwrap_or_default())
                .await,
        ),
        status => {
            debug!("Not caching {} response for {}", status, key);
            return None;
        }
    };

    if let Err(e) = result {
        warn!("Failed to write {} cache record for {}: {}", kind.as_str(), key, e);
        counter!("levee_cache_write_errors_total").increment(1);
        return None;
    }
    counter!("levee_cache_writes_total", "kind" => kind.as_str()).increment(1);

    if let Some(ttl) = policy.ttl()
        && let Err(e) = store.set_expiry(key, ttl).await
    {
        warn!("Failed to set expiry on {}: {}", key, e);
        counter!("levee_cache_write_errors_total").increment(1);
    }

    debug!("Cached {} ({}, policy {})", key, kind.as_str(), policy);
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::header::{self, HeaderMap, HeaderValue};
    use http::Version;
    use levee_store::MemoryStore;
    use std::time::Duration;

    fn response(status: StatusCode, etag: Option<&'static str>, body: &'static [u8]) -> UpstreamResponse {
        let mut headers = HeaderMap::new();
        if let Some(etag) = etag {
            headers.insert(header::ETAG, HeaderValue::from_static(etag));
        }
        UpstreamResponse {
            status,
            version: Version::HTTP_11,
            headers,
            body: Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn test_commit_ok_stores_full_record() {
        let store = MemoryStore::new();
        let kind = commit(
            &store,
            "/leftpad",
            &response(StatusCode::OK, Some("\"v1\""), b"{}"),
            CachePolicy::Unbounded,
        )
        .await;

        assert_eq!(kind, Some(CommitKind::Full));
        let record = store.get("/leftpad").await.unwrap().unwrap();
        assert_eq!(record.validator.as_deref(), Some("\"v1\""));
        assert!(record.response.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert_eq!(store.ttl("/leftpad"), None);
    }

    #[tokio::test]
    async fn test_commit_not_modified_updates_validator_only() {
        let store = MemoryStore::new();
        commit(
            &store,
            "/leftpad",
            &response(StatusCode::OK, Some("\"v1\""), b"{}"),
            CachePolicy::Unbounded,
        )
        .await;
        let before = store.get("/leftpad").await.unwrap().unwrap();

        let kind = commit(
            &store,
            "/leftpad",
            &response(StatusCode::NOT_MODIFIED, Some("\"v2\""), b""),
            CachePolicy::Unbounded,
        )
        .await;

        assert_eq!(kind, Some(CommitKind::Validator));
        let after = store.get("/leftpad").await.unwrap().unwrap();
        assert_eq!(after.validator.as_deref(), Some("\"v2\""));
        assert_eq!(after.response, before.response);
    }

    #[tokio::test]
    async fn test_commit_other_status_writes_nothing() {
        let store = MemoryStore::new();
        let kind = commit(
            &store,
            "/leftpad",
            &response(StatusCode::NOT_FOUND, None, b"missing"),
            CachePolicy::Bounded(Duration::from_secs(60)),
        )
        .await;

        assert_eq!(kind, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_commit_bounded_sets_expiry() {
        let store = MemoryStore::new();
        commit(
            &store,
            "/npm",
            &response(StatusCode::OK, None, b"{}"),
            CachePolicy::Bounded(Duration::from_secs(86400)),
        )
        .await;

        let ttl = store.ttl("/npm").unwrap();
        assert!(ttl > Duration::from_secs(86000));
    }

    #[tokio::test]
    async fn test_commit_with_unrepresentable_ttl_keeps_record() {
        let store = MemoryStore::new();
        let kind = commit(
            &store,
            "/npm",
            &response(StatusCode::OK, None, b"{}"),
            CachePolicy::Bounded(Duration::from_secs(u64::MAX)),
        )
        .await;

        assert_eq!(kind, Some(CommitKind::Full));
        assert!(store.contains("/npm"));
    }
}
