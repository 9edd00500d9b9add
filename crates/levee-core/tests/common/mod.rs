//! Loopback upstreams and stores for resolver tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::IntoResponse;
use bytes::Bytes;
use levee_core::{EngineConfig, Resolver, UpstreamList};
use levee_proxy::{UpstreamClient, UpstreamClientConfig};
use levee_store::{CacheRecord, CacheStore, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a stub upstream saw
#[derive(Default)]
struct Seen {
    hits: AtomicUsize,
    last_uri: Mutex<Option<String>>,
    last_body: Mutex<Option<Bytes>>,
}

/// A loopback upstream answering every request with one fixed response
pub struct StubUpstream {
    pub base: String,
    seen: Arc<Seen>,
}

impl StubUpstream {
    pub async fn spawn(status: StatusCode, etag: Option<&'static str>, body: &'static str) -> Self {
        let seen = Arc::new(Seen::default());
        let recorder = seen.clone();

        let app = Router::new().fallback(move |uri: Uri, body_in: Bytes| {
            let recorder = recorder.clone();
            async move {
                recorder.hits.fetch_add(1, Ordering::SeqCst);
                *recorder.last_uri.lock().unwrap() = Some(uri.to_string());
                *recorder.last_body.lock().unwrap() = Some(body_in);

                let mut headers = HeaderMap::new();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                if let Some(etag) = etag {
                    headers.insert(header::ETAG, HeaderValue::from_static(etag));
                }
                (status, headers, body).into_response()
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            seen,
        }
    }

    pub fn hits(&self) -> usize {
        self.seen.hits.load(Ordering::SeqCst)
    }

    pub fn last_uri(&self) -> Option<String> {
        self.seen.last_uri.lock().unwrap().clone()
    }

    pub fn last_body(&self) -> Option<Bytes> {
        self.seen.last_body.lock().unwrap().clone()
    }
}

/// Base URL of a port nothing listens on
pub async fn dead_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn resolver(
    internal: &[&str],
    external: &[&str],
    store: Arc<dyn CacheStore>,
) -> Resolver {
    resolver_with(
        EngineConfig::new(UpstreamList::new(
            internal.iter().map(|s| s.to_string()).collect(),
            external.iter().map(|s| s.to_string()).collect(),
        )),
        store,
    )
}

pub fn resolver_with(config: EngineConfig, store: Arc<dyn CacheStore>) -> Resolver {
    let client = UpstreamClient::new(UpstreamClientConfig {
        timeout: Duration::from_secs(5),
        skip_tls_verify: false,
    })
    .unwrap();
    Resolver::new(config, client, store)
}

/// A store whose every operation fails
pub struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<CacheRecord>, StoreError> {
        Err(StoreError::Timeout("HGETALL".to_string()))
    }

    async fn set_full(
        &self,
        _key: &str,
        _validator: Option<&str>,
        _response: Bytes,
    ) -> Result<(), StoreError> {
        Err(StoreError::Timeout("HSET".to_string()))
    }

    async fn set_validator(&self, _key: &str, _validator: &str) -> Result<(), StoreError> {
        Err(StoreError::Timeout("EVALSHA".to_string()))
    }

    async fn set_expiry(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Timeout("EXPIRE".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Timeout("PING".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
