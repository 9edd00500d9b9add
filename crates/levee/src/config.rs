//! Configuration loading and validation

use anyhow::{Context, Result, bail};
use levee_core::{EngineConfig, MismatchPolicy, UpstreamList};
use levee_proxy::UpstreamClientConfig;
use levee_store::RedisStoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub upstreams: UpstreamsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest request body buffered for forwarding, in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

/// Cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// "redis" or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_redis_address")]
    pub address: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
    #[serde(default)]
    pub key_prefix: String,
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

/// Upstream registries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamsConfig {
    #[serde(default)]
    pub internal: Vec<String>,
    #[serde(default = "default_external")]
    pub external: Vec<String>,
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub skip_tls_verify: bool,
}

/// Cache behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_metadata_ttl_secs")]
    pub metadata_ttl_secs: u64,
    #[serde(default)]
    pub on_mismatch: MismatchPolicy,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            address: default_redis_address(),
            password: None,
            db: 0,
            key_prefix: String::new(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl Default for UpstreamsConfig {
    fn default() -> Self {
        Self {
            internal: Vec::new(),
            external: default_external(),
            timeout_secs: default_upstream_timeout_secs(),
            skip_tls_verify: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            metadata_ttl_secs: default_metadata_ttl_secs(),
            on_mismatch: MismatchPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4873
}

fn default_max_body_size() -> usize {
    50 * 1024 * 1024 // 50 MB
}

fn default_backend() -> String {
    "redis".to_string()
}

fn default_redis_address() -> String {
    "127.0.0.1:6379".to_string()
}

fn default_redis_timeout_ms() -> u64 {
    2000
}

fn default_external() -> Vec<String> {
    vec!["https://registry.npmjs.org".to_string()]
}

fn default_upstream_timeout_secs() -> u64 {
    30
}

fn default_metadata_ttl_secs() -> u64 {
    86400 // 24 hours
}

/// Upper bound for `cache.metadata_ttl_secs` (ten years)
const MAX_METADATA_TTL_SECS: u64 = 10 * 365 * 86400;

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Reject settings the proxy cannot start with
    pub fn validate(&self) -> Result<()> {
        self.engine_config().validate()?;
        if self.upstreams.timeout_secs == 0 {
            bail!("upstreams.timeout_secs must be greater than zero");
        }
        if self.cache.metadata_ttl_secs == 0 {
            bail!("cache.metadata_ttl_secs must be greater than zero");
        }
        if self.cache.metadata_ttl_secs > MAX_METADATA_TTL_SECS {
            bail!(
                "cache.metadata_ttl_secs must be at most {} (ten years), got {}",
                MAX_METADATA_TTL_SECS,
                self.cache.metadata_ttl_secs
            );
        }
        if self.redis.timeout_ms == 0 {
            bail!("redis.timeout_ms must be greater than zero");
        }
        if !matches!(self.redis.backend.as_str(), "redis" | "memory") {
            bail!(
                "redis.backend must be \"redis\" or \"memory\", got {:?}",
                self.redis.backend
            );
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            bail!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            );
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(UpstreamList::new(
            self.upstreams.internal.clone(),
            self.upstreams.external.clone(),
        ))
        .with_mismatch_policy(self.cache.on_mismatch)
    }

    pub fn client_config(&self) -> UpstreamClientConfig {
        UpstreamClientConfig {
            timeout: Duration::from_secs(self.upstreams.timeout_secs),
            skip_tls_verify: self.upstreams.skip_tls_verify,
        }
    }

    pub fn redis_store_config(&self) -> RedisStoreConfig {
        RedisStoreConfig {
            address: self.redis.address.clone(),
            password: self.redis.password.clone(),
            db: self.redis.db,
            key_prefix: self.redis.key_prefix.clone(),
            operation_timeout: Duration::from_millis(self.redis.timeout_ms),
        }
    }

    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.metadata_ttl_secs)
    }
}
