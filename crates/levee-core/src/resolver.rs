//! Request resolution
//!
//! Decides, per request and cache policy, whether to answer from the cache
//! or from an upstream, and which upstream. Upstream candidates are tried
//! strictly in configured order; every transport failure advances to the
//! next one.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue};
use http::{Method, StatusCode};
use levee_proxy::wire::decode_response;
use levee_proxy::{ProxyError, UpstreamClient, UpstreamResponse, target_url};
use levee_store::{CacheRecord, CacheStore};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CachePolicy, MismatchPolicy, commit};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::upstream::Tier;

/// A client request, fully buffered
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Request path, also the cache key
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// The client's `If-None-Match` value, if present and non-empty
    pub fn if_none_match(&self) -> Option<&str> {
        self.headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }

    /// Path with the query string appended, as forwarded by bypass requests
    pub fn path_and_query(&self) -> String {
        match self.query.as_deref().filter(|q| !q.is_empty()) {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Fetched from an upstream of the given tier
    Upstream(Tier),
    /// 304 answered from the stored validator
    CacheValidated,
    /// Stored response replayed
    CacheReplay,
}

/// Response to send back to the client
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl ProxyResponse {
    fn forwarded(response: &UpstreamResponse, tier: Tier) -> Self {
        Self {
            status: response.status,
            headers: response.client_headers(),
            body: response.body.clone(),
            source: ResponseSource::Upstream(tier),
        }
    }

    fn not_modified(validator: &str) -> Self {
        let mut headers = HeaderMap::new();
        insert_etag(&mut headers, validator);
        Self {
            status: StatusCode::NOT_MODIFIED,
            headers,
            body: Bytes::new(),
            source: ResponseSource::CacheValidated,
        }
    }

    fn replay(record: &CacheRecord, stored: &UpstreamResponse) -> Self {
        let mut headers = stored.client_headers();
        if let Some(validator) = record.validator.as_deref() {
            insert_etag(&mut headers, validator);
        }
        Self {
            status: stored.status,
            headers,
            body: stored.body.clone(),
            source: ResponseSource::CacheReplay,
        }
    }
}

fn insert_etag(headers: &mut HeaderMap, validator: &str) {
    match HeaderValue::from_str(validator) {
        Ok(value) => {
            headers.insert(header::ETAG, value);
        }
        Err(_) => warn!("Stored validator {:?} is not a valid header value", validator),
    }
}

/// A validator matches only when both sides carry one and they are equal
fn validators_match(stored: Option<&str>, presented: Option<&str>) -> bool {
    matches!((stored, presented), (Some(a), Some(b)) if a == b)
}

/// Request resolver
pub struct Resolver {
    config: EngineConfig,
    client: UpstreamClient,
    store: Arc<dyn CacheStore>,
}

impl Resolver {
    /// Create a new resolver
    pub fn new(config: EngineConfig, client: UpstreamClient, store: Arc<dyn CacheStore>) -> Self {
        info!(
            "Resolver ready: {} internal, {} external upstream(s), {} store, on mismatch: {}",
            config.upstreams.internal.len(),
            config.upstreams.external.len(),
            store.name(),
            config.on_mismatch.as_str()
        );
        Self {
            config,
            client,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Resolve a request under the given cache policy
    pub async fn resolve(
        &self,
        request: &ProxyRequest,
        policy: CachePolicy,
    ) -> Result<ProxyResponse, CoreError> {
        debug!("Resolving {} {} ({})", request.method, request.path, policy);

        if policy.is_cache_aware() {
            self.resolve_cached(request, policy).await
        } else {
            self.resolve_bypass(request).await
        }
    }

    /// Forward to internal upstreams only; the first one that answers at
    /// all wins, whatever its status.
    async fn resolve_bypass(&self, request: &ProxyRequest) -> Result<ProxyResponse, CoreError> {
        let internal = self.config.upstreams.tier(Tier::Internal);
        if internal.is_empty() {
            return Err(CoreError::NoUpstreams(Tier::Internal.as_str()));
        }

        let target = request.path_and_query();
        let mut last_error = None;

        for base in internal {
            match self.attempt(Tier::Internal, base, &target, request).await {
                Ok(response) => return Ok(ProxyResponse::forwarded(&response, Tier::Internal)),
                Err(e) => last_error = Some(e),
            }
        }

        Err(exhausted(last_error))
    }

    async fn resolve_cached(
        &self,
        request: &ProxyRequest,
        policy: CachePolicy,
    ) -> Result<ProxyResponse, CoreError> {
        let Some((record, stored)) = self.lookup(&request.path).await else {
            counter!("levee_cache_lookups_total", "result" => "miss").increment(1);
            info!("Cache miss for {}, fetching from upstream", request.path);
            return self.fetch_and_commit(request, policy).await;
        };

        if let Some(validator) = record.validator.as_deref()
            && validators_match(Some(validator), request.if_none_match())
        {
            counter!("levee_cache_lookups_total", "result" => "validated").increment(1);
            debug!("Validator match for {}, answering 304", request.path);
            return Ok(ProxyResponse::not_modified(validator));
        }

        match self.config.on_mismatch {
            MismatchPolicy::Replay => {
                counter!("levee_cache_lookups_total", "result" => "hit").increment(1);
                debug!("Cache hit for {}, replaying stored response", request.path);
                Ok(ProxyResponse::replay(&record, &stored))
            }
            MismatchPolicy::Refetch => {
                counter!("levee_cache_lookups_total", "result" => "refetch").increment(1);
                match self.fetch_and_commit(request, policy).await {
                    Ok(response) => Ok(response),
                    Err(e) => {
                        warn!(
                            "Refetch of {} failed, replaying stored response: {}",
                            request.path, e
                        );
                        Ok(ProxyResponse::replay(&record, &stored))
                    }
                }
            }
        }
    }

    /// Read and parse the stored record for a key.
    ///
    /// Store failures and unparsable records both count as a miss.
    async fn lookup(&self, key: &str) -> Option<(CacheRecord, UpstreamResponse)> {
        let record = match self.store.get(key).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache lookup for {} failed, treating as miss: {}", key, e);
                counter!("levee_cache_read_errors_total").increment(1);
                return None;
            }
        };

        match decode_response(record.response.clone()) {
            Ok(stored) => Some((record, stored)),
            Err(e) => {
                warn!("Stored response for {} is unreadable, treating as miss: {}", key, e);
                counter!("levee_cache_read_errors_total").increment(1);
                None
            }
        }
    }

    async fn fetch_and_commit(
        &self,
        request: &ProxyRequest,
        policy: CachePolicy,
    ) -> Result<ProxyResponse, CoreError> {
        let (tier, response) = self.fetch(request).await?;
        commit(self.store.as_ref(), &request.path, &response, policy).await;
        Ok(ProxyResponse::forwarded(&response, tier))
    }

    /// Walk internal then external candidates.
    ///
    /// An internal answer only counts when it is a 200; any external answer
    /// counts. If the internal tier answered but never with a 200 and no
    /// external upstream answered, the last internal answer is used.
    async fn fetch(&self, request: &ProxyRequest) -> Result<(Tier, UpstreamResponse), CoreError> {
        if self.config.upstreams.is_empty() {
            return Err(CoreError::NoUpstreams("internal or external"));
        }

        let target = request.path.as_str();
        let mut last_error = None;
        let mut fallback = None;

        for base in self.config.upstreams.tier(Tier::Internal) {
            match self.attempt(Tier::Internal, base, target, request).await {
                Ok(response) if response.status == StatusCode::OK => {
                    return Ok((Tier::Internal, response));
                }
                Ok(response) => {
                    debug!(
                        "Internal upstream {} answered {} for {}, trying next",
                        base, response.status, target
                    );
                    fallback = Some(response);
                }
                Err(e) => last_error = Some(e),
            }
        }

        for base in self.config.upstreams.tier(Tier::External) {
            match self.attempt(Tier::External, base, target, request).await {
                Ok(response) => return Ok((Tier::External, response)),
                Err(e) => last_error = Some(e),
            }
        }

        if let Some(response) = fallback {
            info!(
                "No upstream had {} with 200, forwarding internal {}",
                target, response.status
            );
            return Ok((Tier::Internal, response));
        }

        Err(exhausted(last_error))
    }

    /// One exchange with one upstream candidate
    async fn attempt(
        &self,
        tier: Tier,
        base: &str,
        target: &str,
        request: &ProxyRequest,
    ) -> Result<UpstreamResponse, ProxyError> {
        let url = target_url(base, target);

        match self
            .client
            .exchange(&request.method, &url, &request.headers, request.body.clone())
            .await
        {
            Ok(response) => {
                counter!(
                    "levee_upstream_requests_total",
                    "tier" => tier.as_str(),
                    "outcome" => "answered"
                )
                .increment(1);
                debug!("{} upstream answered {} for {}", tier, response.status, url);
                Ok(response)
            }
            Err(e) => {
                counter!(
                    "levee_upstream_requests_total",
                    "tier" => tier.as_str(),
                    "outcome" => "failed"
                )
                .increment(1);
                warn!("{} upstream {} failed: {}", tier, url, e);
                Err(e)
            }
        }
    }
}

fn exhausted(last_error: Option<ProxyError>) -> CoreError {
    counter!("levee_upstream_exhausted_total").increment(1);
    let message = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no upstream answered".to_string());
    warn!("All upstreams failed: {}", message);
    CoreError::UpstreamsExhausted { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validators_match_requires_both_sides() {
        assert!(validators_match(Some("\"a\""), Some("\"a\"")));
        assert!(!validators_match(Some("\"a\""), Some("\"b\"")));
        assert!(!validators_match(None, Some("\"a\"")));
        assert!(!validators_match(Some("\"a\""), None));
        assert!(!validators_match(None, None));
    }

    #[test]
    fn test_path_and_query() {
        let mut request = ProxyRequest::new(Method::GET, "/-/v1/search");
        assert_eq!(request.path_and_query(), "/-/v1/search");

        request.query = Some("text=leftpad&size=5".to_string());
        assert_eq!(request.path_and_query(), "/-/v1/search?text=leftpad&size=5");

        request.query = Some(String::new());
        assert_eq!(request.path_and_query(), "/-/v1/search");
    }

    #[test]
    fn test_if_none_match_ignores_empty() {
        let mut request = ProxyRequest::new(Method::GET, "/leftpad");
        assert_eq!(request.if_none_match(), None);

        request
            .headers
            .insert(header::IF_NONE_MATCH, HeaderValue::from_static(""));
        assert_eq!(request.if_none_match(), None);

        request
            .headers
            .insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"v1\""));
        assert_eq!(request.if_none_match(), Some("\"v1\""));
    }

    #[test]
    fn test_replay_sets_stored_validator() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ETAG, HeaderValue::from_static("\"stale\""));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let stored = UpstreamResponse {
            status: StatusCode::OK,
            version: http::Version::HTTP_11,
            headers,
            body: Bytes::from_static(b"{}"),
        };
        let record = CacheRecord {
            validator: Some("\"fresh\"".to_string()),
            response: stored.to_wire(),
        };

        let response = ProxyResponse::replay(&record, &stored);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers[header::ETAG], "\"fresh\"");
        assert_eq!(response.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.source, ResponseSource::CacheReplay);
    }
}
