//! Forecaster - next-hour temperature prediction service

use anyhow::Result;
use forecast_lib::observability::StructuredLogger;
use forecast_server::{api, build_state, config::ServerConfig};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting forecaster");

    let config = ServerConfig::load()?;
    info!(
        port = config.port,
        provider = ?config.provider.kind,
        cache_ttl_secs = config.cache_ttl_secs,
        "Forecaster configured"
    );

    let state = build_state(&config).await?;
    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(
        VERSION,
        state.service.cache().provider_name(),
        state.service.registry().list_available().len(),
    );

    // Drop stale observations so idle cities do not accumulate
    let cache = state.service.cache().clone();
    let purge_every = config.cache_ttl().max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_every);
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged = purged, "Purged expired observations");
            }
        }
    });

    state.health_registry.set_ready(true).await;

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    api::serve(config.port, state, shutdown).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");
    Ok(())
}
