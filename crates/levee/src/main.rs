//! Levee - caching reverse proxy for package registries

use anyhow::{Context, Result};
use clap::Parser;
use levee_api::{AppState, create_router};
use levee_core::Resolver;
use levee_proxy::UpstreamClient;
use levee_store::{CacheStore, MemoryStore, RedisStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LoggingConfig};

/// Levee - caching reverse proxy for package registries
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/levee.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "LEVEE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "LEVEE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging);

    config.validate().context("Invalid configuration")?;

    info!("Starting Levee v{}", env!("CARGO_PKG_VERSION"));

    // Install the Prometheus recorder
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    // Initialize cache store
    let store = open_store(&config).await?;

    // Initialize upstream client
    let client =
        UpstreamClient::new(config.client_config()).context("Failed to build upstream client")?;

    // Initialize resolver
    let resolver = Arc::new(Resolver::new(config.engine_config(), client, store));

    // Create application state
    let state = AppState::new(
        resolver,
        config.metadata_ttl(),
        config.server.max_body_size,
    );

    // Create router
    let app = create_router(state, Some(Arc::new(metrics_handle)))
        .layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);
    info!(
        "Upstreams: internal {:?}, external {:?}",
        config.upstreams.internal, config.upstreams.external
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Open the configured cache store
async fn open_store(config: &Config) -> Result<Arc<dyn CacheStore>> {
    match config.redis.backend.as_str() {
        "memory" => {
            warn!("Using the in-process cache store; cached responses are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        _ => {
            let store = RedisStore::connect(config.redis_store_config())
                .await
                .with_context(|| format!("Failed to connect to redis at {}", config.redis.address))?;
            Ok(Arc::new(store))
        }
    }
}

/// Initialize logging
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
