//! WeatherAPI.com current-conditions adapter
//!
//! Reports wind in km/h and uses its own condition code vocabulary, both
//! normalized here.

use super::{build_client, endpoint, get_json, ProviderConfig, WeatherProvider};
use crate::condition::from_weatherapi_code;
use crate::error::AcquisitionError;
use crate::models::WeatherObservation;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// km/h in one m/s
pub const KMH_PER_MS: f64 = 3.6;

const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com";
const CURRENT_PATH: &str = "v1/current.json";

#[derive(Debug, Deserialize)]
struct WapiResponse {
    current: WapiCurrent,
}

#[derive(Debug, Deserialize)]
struct WapiCurrent {
    last_updated_epoch: i64,
    temp_c: f64,
    humidity: f64,
    pressure_mb: f64,
    wind_kph: f64,
    condition: WapiCondition,
}

#[derive(Debug, Deserialize)]
struct WapiCondition {
    code: i32,
}

/// Adapter for api.weatherapi.com
pub struct WeatherApiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl WeatherApiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, AcquisitionError> {
        Ok(Self {
            client: build_client(config.timeout)?,
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    fn normalize(city: &str, body: WapiResponse) -> Result<WeatherObservation, AcquisitionError> {
        let current = body.current;
        let observed_at = DateTime::from_timestamp(current.last_updated_epoch, 0).ok_or_else(|| {
            AcquisitionError::SchemaMismatch(format!(
                "invalid last_updated_epoch {}",
                current.last_updated_epoch
            ))
        })?;

        Ok(WeatherObservation {
            city: city.to_string(),
            temperature: current.temp_c,
            humidity: current.humidity,
            pressure: current.pressure_mb,
            wind_speed: current.wind_kph / KMH_PER_MS,
            condition_code: from_weatherapi_code(current.condition.code),
            observed_at,
        })
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn fetch(&self, city: &str) -> Result<WeatherObservation, AcquisitionError> {
        let mut url = endpoint(&self.base_url, CURRENT_PATH)?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("q", city)
            .append_pair("aqi", "no");

        debug!(city = %city, "Fetching WeatherAPI observation");
        let body: WapiResponse = get_json(&self.client, url).await?;
        Self::normalize(city, body)
    }

    fn name(&self) -> &'static str {
        "weatherapi"
    }
}
