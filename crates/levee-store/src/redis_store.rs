//! Redis cache store
//!
//! Each cached path is a Redis hash with `validator` and `response` fields;
//! expiry is the key's TTL. Field-level atomicity of HSET is what keeps
//! concurrent writers from tearing a record.

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::backend::{
    CacheRecord, CacheStore, RESPONSE_FIELD, VALIDATOR_FIELD, validator_from_field,
};
use crate::error::StoreError;

/// Sets the validator only while the hash still holds a response.
const SET_VALIDATOR_SCRIPT: &str = r#"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 1 then
    return redis.call('HSET', KEYS[1], ARGV[2], ARGV[3])
end
return -1
"#;

/// Redis connection configuration
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// `host:port` or a full `redis://` / `rediss://` URL
    pub address: String,
    pub password: Option<String>,
    pub db: i64,
    /// Prefix prepended to every key
    pub key_prefix: String,
    /// Upper bound for a single Redis command
    pub operation_timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".to_string(),
            password: None,
            db: 0,
            key_prefix: String::new(),
            operation_timeout: Duration::from_secs(2),
        }
    }
}

impl RedisStoreConfig {
    /// Build the connection URL from address, password and database
    pub fn connection_url(&self) -> Result<Url, StoreError> {
        let raw = if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("redis://{}", self.address)
        };

        let mut url = Url::parse(&raw)
            .map_err(|e| StoreError::Configuration(format!("redis address {}: {}", raw, e)))?;

        if !matches!(url.scheme(), "redis" | "rediss") {
            return Err(StoreError::Configuration(format!(
                "unsupported redis scheme: {}",
                url.scheme()
            )));
        }

        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|_| StoreError::Configuration("cannot set redis password".to_string()))?;
        }

        if url.path().trim_start_matches('/').is_empty() {
            url.set_path(&format!("/{}", self.db));
        }

        Ok(url)
    }
}

/// Redis-backed cache store
pub struct RedisStore {
    conn: MultiplexedConnection,
    config: RedisStoreConfig,
    set_validator: Script,
}

impl RedisStore {
    /// Connect to Redis
    pub async fn connect(config: RedisStoreConfig) -> Result<Self, StoreError> {
        let url = config.connection_url()?;
        let client = Client::open(url.as_str())?;

        let conn = tokio::time::timeout(
            config.operation_timeout * 5,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| StoreError::Timeout("connect".to_string()))??;

        info!(
            "Connected to redis at {}:{}{} (key prefix: {:?})",
            url.host_str().unwrap_or("localhost"),
            url.port().unwrap_or(6379),
            url.path(),
            config.key_prefix
        );

        Ok(Self {
            conn,
            config,
            set_validator: Script::new(SET_VALIDATOR_SCRIPT),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        tokio::time::timeout(self.config.operation_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(op.to_string()))?
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let key = self.key(key);

        let mut fields: HashMap<String, Vec<u8>> =
            self.bounded("HGETALL", conn.hgetall(&key)).await?;

        let Some(response) = fields.remove(RESPONSE_FIELD) else {
            if !fields.is_empty() {
                debug!("Record {} has no response field, treating as miss", key);
            }
            return Ok(None);
        };

        Ok(Some(CacheRecord {
            validator: validator_from_field(fields.remove(VALIDATOR_FIELD)),
            response: Bytes::from(response),
        }))
    }

    async fn set_full(
        &self,
        key: &str,
        validator: Option<&str>,
        response: Bytes,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = self.key(key);
        let validator = validator.unwrap_or_default();

        let items: [(&str, &[u8]); 2] = [
            (VALIDATOR_FIELD, validator.as_bytes()),
            (RESPONSE_FIELD, &response[..]),
        ];
        let _: () = self
            .bounded("HSET", conn.hset_multiple(&key, &items))
            .await?;

        debug!("Stored {} ({} bytes)", key, response.len());
        Ok(())
    }

    async fn set_validator(&self, key: &str, validator: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = self.key(key);

        let mut invocation = self.set_validator.key(&key);
        invocation
            .arg(RESPONSE_FIELD)
            .arg(VALIDATOR_FIELD)
            .arg(validator);

        let outcome: i64 = self
            .bounded("EVALSHA", invocation.invoke_async(&mut conn))
            .await?;

        if outcome < 0 {
            debug!("No stored response for {}, skipping validator update", key);
        }
        Ok(())
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = self.key(key);
        let _: bool = self
            .bounded("EXPIRE", conn.expire(&key, expire_seconds(ttl)))
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = self
            .bounded("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// EXPIRE argument for a time to live.
///
/// Redis deletes the key on a non-positive EXPIRE, so the value is clamped
/// to at least one second and saturates instead of wrapping negative.
fn expire_seconds(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1)
}
