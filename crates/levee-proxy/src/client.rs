//! Upstream registry client

use bytes::Bytes;
use http::header::{self, HeaderMap};
use http::{Method, StatusCode, Version};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ProxyError;
use crate::headers::{client_response_headers, upstream_request_headers};
use crate::wire;

/// Upstream client configuration
#[derive(Clone, Debug)]
pub struct UpstreamClientConfig {
    /// Upper bound for a single exchange (connect + response + body)
    pub timeout: Duration,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            skip_tls_verify: false,
        }
    }
}

/// A fully buffered upstream response.
///
/// `headers` keeps every value the upstream sent so the wire form stays
/// faithful; [`UpstreamResponse::client_headers`] applies the
/// first-value-only rule for forwarding.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// The validator (ETag) of this representation, if any
    pub fn etag(&self) -> Option<&str> {
        self.headers
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }

    /// Headers to forward to the client
    pub fn client_headers(&self) -> HeaderMap {
        client_response_headers(&self.headers)
    }

    /// Serialize as an HTTP/1.1 response for cache storage
    pub fn to_wire(&self) -> Bytes {
        wire::encode_response(self)
    }
}

/// Client performing single request/response exchanges against upstreams.
///
/// Retry and failover belong to the caller: the client never retries and
/// never follows redirects.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    /// Create a new upstream client
    pub fn new(config: UpstreamClientConfig) -> Result<Self, ProxyError> {
        let mut builder = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.timeout);

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(ProxyError::ClientBuild)?;

        info!(
            "Created upstream client (timeout: {:?}, skip_tls_verify: {})",
            config.timeout, config.skip_tls_verify
        );

        Ok(Self { client })
    }

    /// Forward one request to `url` and buffer the whole response.
    pub async fn exchange(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse, ProxyError> {
        debug!("Forwarding {} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(upstream_request_headers(headers));

        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!("{} {} -> {} ({} bytes)", method, url, status, body.len());

        Ok(UpstreamResponse {
            status,
            version,
            headers,
            body,
        })
    }
}

/// Join an upstream base URL and a request path (optionally with query).
pub fn target_url(base: &str, path_and_query: &str) -> String {
    let base = base.trim_end_matches('/');
    if path_and_query.starts_with('/') {
        format!("{}{}", base, path_and_query)
    } else {
        format!("{}/{}", base, path_and_query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, routing::any};

    #[test]
    fn test_target_url_joins_without_double_slash() {
        assert_eq!(
            target_url("http://registry.internal/", "/leftpad"),
            "http://registry.internal/leftpad"
        );
        assert_eq!(
            target_url("http://registry.internal/npm", "/leftpad/1.0.0"),
            "http://registry.internal/npm/leftpad/1.0.0"
        );
        assert_eq!(
            target_url("http://registry.internal", "-/v1/search?text=left"),
            "http://registry.internal/-/v1/search?text=left"
        );
    }

    #[test]
    fn test_etag_ignores_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ETAG, "".parse().unwrap());
        let response = UpstreamResponse {
            status: StatusCode::OK,
            version: Version::HTTP_11,
            headers,
            body: Bytes::new(),
        };
        assert_eq!(response.etag(), None);
    }

    async fn echo_upstream() -> String {
        let app = Router::new().route(
            "/{*path}",
            any(|method: Method, headers: HeaderMap, body: Bytes| async move {
                let agent = headers
                    .get("x-client")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                (
                    StatusCode::CREATED,
                    [("x-method", method.to_string()), ("x-client", agent)],
                    body,
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_exchange_forwards_method_headers_and_body() {
        let base = echo_upstream().await;
        let client = UpstreamClient::new(UpstreamClientConfig::default()).unwrap();

        let mut headers = HeaderMap::new();
        headers.append("x-client", "first".parse().unwrap());
        headers.append("x-client", "second".parse().unwrap());

        let response = client
            .exchange(
                &Method::PUT,
                &target_url(&base, "/leftpad"),
                &headers,
                Bytes::from_static(b"{\"name\":\"leftpad\"}"),
            )
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.headers["x-method"], "PUT");
        assert_eq!(response.headers["x-client"], "first");
        assert_eq!(&response.body[..], b"{\"name\":\"leftpad\"}");
    }

    #[tokio::test]
    async fn test_exchange_reports_transport_error_for_closed_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = UpstreamClient::new(UpstreamClientConfig::default()).unwrap();
        let err = client
            .exchange(
                &Method::GET,
                &format!("http://{}/leftpad", addr),
                &HeaderMap::new(),
                Bytes::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::Transport(_)));
        assert!(!err.to_string().is_empty());
    }
}
