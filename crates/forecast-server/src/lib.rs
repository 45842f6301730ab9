//! Forecast server: HTTP surface over the forecasting pipeline

pub mod api;
pub mod config;

use anyhow::{Context, Result};
use forecast_lib::{
    create_provider,
    health::{components, ComponentHealth, HealthRegistry},
    ForecastService, ModelRegistry, SqlitePredictionLog, WeatherCache,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Wire provider, cache, registry and log into shared state
///
/// Models are warmed up eagerly so health reflects which are servable;
/// a missing artifact degrades the service rather than failing start-up.
pub async fn build_state(config: &config::ServerConfig) -> Result<Arc<api::AppState>> {
    let health = HealthRegistry::new();

    let provider = create_provider(&config.provider_config())
        .context("Failed to create weather provider")?;
    if config.provider.api_key.is_empty() {
        warn!(provider = provider.name(), "No weather API key configured");
        health
            .set_degraded(components::PROVIDER, "no API key configured")
            .await;
    } else {
        health.register(components::PROVIDER).await;
    }
    let cache = Arc::new(WeatherCache::with_ttl(provider, config.cache_ttl()));

    let registry = Arc::new(ModelRegistry::new(config.model_paths()));
    let outcomes = registry.warm_up();
    health
        .update(components::REGISTRY, ComponentHealth::from_warm_up(&outcomes))
        .await;
    info!(
        configured = outcomes.len(),
        loaded = registry.loaded_count(),
        "Model registry warmed up"
    );

    let log = SqlitePredictionLog::open(&config.prediction_log)?;
    health.register(components::PREDICTION_LOG).await;

    let service = Arc::new(ForecastService::new(cache, registry, Arc::new(log)));
    Ok(Arc::new(api::AppState::new(service, health)))
}
