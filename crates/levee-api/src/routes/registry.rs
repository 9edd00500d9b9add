//! Package registry routes
//!
//! The path shape picks the cache policy: the registry metadata document is
//! cached with a time to live, package documents and versions are cached
//! indefinitely, and everything else passes through uncached.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use levee_core::{CachePolicy, ProxyRequest, ProxyResponse};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /npm
async fn metadata(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let policy = CachePolicy::Bounded(state.metadata_ttl);
    proxy(&state, policy, method, uri, headers, body).await
}

/// GET /{package} and GET /{package}/{version}
async fn package(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    proxy(&state, CachePolicy::Unbounded, method, uri, headers, body).await
}

/// Any other method or path
pub(super) async fn bypass(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    proxy(&state, CachePolicy::Bypass, method, uri, headers, body).await
}

async fn proxy(
    state: &AppState,
    policy: CachePolicy,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let policy = effective_policy(policy, &method, uri.path());
    debug!("{} {} -> {}", method, uri, policy);
    metrics::counter!("levee_http_requests_total", "policy" => policy.as_str()).increment(1);

    let request = ProxyRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };

    let response = state.resolver.resolve(&request, policy).await?;
    Ok(into_response(response))
}

/// Only GET is cacheable, and paths under `/-/` are registry API calls
/// rather than packages even when they have a package-like shape.
fn effective_policy(policy: CachePolicy, method: &Method, path: &str) -> CachePolicy {
    if *method != Method::GET || path.starts_with("/-/") {
        CachePolicy::Bypass
    } else {
        policy
    }
}

fn into_response(response: ProxyResponse) -> Response {
    let mut out = (response.status, response.body).into_response();
    *out.headers_mut() = response.headers;
    out
}

/// Create registry routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/npm", get(metadata).fallback(bypass))
        .route("/{package}", get(package).fallback(bypass))
        .route("/{package}/{version}", get(package).fallback(bypass))
}
