//! Server configuration

use anyhow::{Context, Result};
use forecast_lib::provider::{ProviderConfig, ProviderKind};
use forecast_lib::registry::default_model_paths;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
///
/// Read from an optional `forecaster.toml` in the working directory, then
/// from `FORECASTER_*` environment variables (nested keys joined by `__`,
/// e.g. `FORECASTER_PROVIDER__API_KEY`).
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    /// HTTP port for the prediction API, health and metrics
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub provider: ProviderSettings,

    /// Lifetime of a cached observation in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Directory holding the standard artifact files
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Explicit model list; overrides `model_dir` when non-empty
    #[serde(default)]
    pub models: Vec<ModelEntry>,

    #[serde(default = "default_prediction_log")]
    pub prediction_log: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub kind: ProviderKind,

    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Overrides the provider's public endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_key: default_api_key(),
            base_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "forecaster".to_string())
}

fn default_port() -> u16 {
    8080
}

/// Plain `WEATHER_API_KEY` is honoured when no prefixed key is set
fn default_api_key() -> String {
    std::env::var("WEATHER_API_KEY").unwrap_or_default()
}

fn default_timeout() -> u64 {
    10
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_prediction_log() -> PathBuf {
    PathBuf::from("predictions.db")
}

impl ServerConfig {
    /// Load configuration from the optional config file and environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("forecaster").required(false))
            .add_source(
                config::Environment::with_prefix("FORECASTER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid forecaster configuration")
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            kind: self.provider.kind,
            api_key: self.provider.api_key.clone(),
            base_url: self.provider.base_url.clone(),
            timeout: Duration::from_secs(self.provider.timeout_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Configured models, falling back to the standard names in `model_dir`
    pub fn model_paths(&self) -> BTreeMap<String, PathBuf> {
        if self.models.is_empty() {
            default_model_paths(&self.model_dir)
        } else {
            self.models
                .iter()
                .map(|m| (m.name.clone(), m.path.clone()))
                .collect()
        }
    }
}
