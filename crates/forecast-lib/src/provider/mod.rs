//! Weather provider adapters
//!
//! Each adapter turns one external weather API into the canonical
//! [`WeatherObservation`] schema. Wind speed is always m/s and condition
//! codes are always canonical, whichever provider produced them.

mod openweather;
mod weatherapi;

pub use openweather::OpenWeatherProvider;
pub use weatherapi::{WeatherApiProvider, KMH_PER_MS};

use crate::error::AcquisitionError;
use crate::models::WeatherObservation;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default request timeout for provider calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest provider error body echoed back in an error
const MAX_ERROR_BODY: usize = 200;

/// Contract shared by every weather provider
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch the current observation for a city
    async fn fetch(&self, city: &str) -> Result<WeatherObservation, AcquisitionError>;

    /// Short provider identifier for logs and metrics
    fn name(&self) -> &'static str;
}

/// Supported provider implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenWeather,
    WeatherApi,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openweather" | "openweathermap" => Ok(ProviderKind::OpenWeather),
            "weatherapi" => Ok(ProviderKind::WeatherApi),
            other => Err(format!("unknown weather provider '{}'", other)),
        }
    }
}

/// Provider connection settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    /// Overrides the provider's public endpoint (host root, e.g. for tests)
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_key: String::new(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Create the configured provider implementation
pub fn create_provider(
    config: &ProviderConfig,
) -> Result<Arc<dyn WeatherProvider>, AcquisitionError> {
    match config.kind {
        ProviderKind::OpenWeather => {
            tracing::info!("Using OpenWeatherMap provider");
            Ok(Arc::new(OpenWeatherProvider::new(config)?))
        }
        ProviderKind::WeatherApi => {
            tracing::info!("Using WeatherAPI.com provider");
            Ok(Arc::new(WeatherApiProvider::new(config)?))
        }
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, AcquisitionError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            AcquisitionError::NetworkFailure(format!("failed to create HTTP client: {}", e))
        })
}

pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url, AcquisitionError> {
    Url::parse(base)
        .and_then(|b| b.join(path))
        .map_err(|e| {
            AcquisitionError::NetworkFailure(format!("invalid provider URL {}: {}", base, e))
        })
}

/// GET a provider endpoint and decode its JSON body
///
/// Transport problems become `NetworkFailure`, non-2xx statuses become
/// `ProviderRejected`, undecodable bodies become `SchemaMismatch`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: Url,
) -> Result<T, AcquisitionError> {
    let response = client.get(url).send().await.map_err(network_failure)?;
    let status = response.status();
    let body = response.text().await.map_err(network_failure)?;

    if !status.is_success() {
        return Err(AcquisitionError::ProviderRejected {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| AcquisitionError::SchemaMismatch(e.to_string()))
}

fn network_failure(e: reqwest::Error) -> AcquisitionError {
    // The request URL carries the API key, keep it out of errors and logs
    let kind = if e.is_timeout() {
        "request timed out"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "transport error"
    };
    AcquisitionError::NetworkFailure(format!("{}: {}", kind, e.without_url()))
}

/// Pull a human-readable message out of a provider error body
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .get("message")
            .or_else(|| value.get("error").and_then(|e| e.get("message")))
            .and_then(|m| m.as_str());
        if let Some(m) = message {
            return m.to_string();
        }
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}
