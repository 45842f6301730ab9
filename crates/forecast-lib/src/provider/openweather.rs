//! OpenWeatherMap current-weather adapter
//!
//! Requested with `units=metric`, so temperature is already °C and wind
//! speed already m/s. Condition ids are the canonical vocabulary.

use super::{build_client, endpoint, get_json, ProviderConfig, WeatherProvider};
use crate::error::AcquisitionError;
use crate::models::WeatherObservation;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const WEATHER_PATH: &str = "data/2.5/weather";

#[derive(Debug, Deserialize)]
struct OwmResponse {
    weather: Vec<OwmCondition>,
    main: OwmMain,
    wind: OwmWind,
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    id: i32,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
}

/// Adapter for api.openweathermap.org
pub struct OpenWeatherProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenWeatherProvider {
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

    fn normalize(city: &str, body: OwmResponse) -> Result<WeatherObservation, AcquisitionError> {
        let condition = body
            .weather
            .first()
            .ok_or_else(|| AcquisitionError::SchemaMismatch("empty weather array".to_string()))?;
        let observed_at = DateTime::from_timestamp(body.dt, 0)
            .ok_or_else(|| AcquisitionError::SchemaMismatch(format!("invalid dt {}", body.dt)))?;

        Ok(WeatherObservation {
            city: city.to_string(),
            temperature: body.main.temp,
            humidity: body.main.humidity,
            pressure: body.main.pressure,
            wind_speed: body.wind.speed,
            condition_code: condition.id,
            observed_at,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch(&self, city: &str) -> Result<WeatherObservation, AcquisitionError> {
        let mut url = endpoint(&self.base_url, WEATHER_PATH)?;
        url.query_pairs_mut()
            .append_pair("q", city)
            .append_pair("appid", &self.api_key)
            .append_pair("units", "metric");

        debug!(city = %city, "Fetching OpenWeatherMap observation");
        let body: OwmResponse = get_json(&self.client, url).await?;
        Self::normalize(city, body)
    }

    fn name(&self) -> &'static str {
        "openweather"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const CHENNAI: &str = r#"{
        "coord": {"lon": 80.28, "lat": 13.09},
        "weather": [{"id": 800, "main": "Clear", "description": "clear sky"}],
        "main": {"temp": 30.0, "feels_like": 34.2, "humidity": 70, "pressure": 1008},
        "wind": {"speed": 3.5, "deg": 120},
        "dt": 1700000000,
        "name": "Chennai",
        "cod": 200
    }"#;

    fn provider(base_url: String) -> OpenWeatherProvider {
        OpenWeatherProvider::new(&ProviderConfig {
            api_key: "test-key".into(),
            base_url: Some(base_url),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_normalizes_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/data/2.5/weather")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "Chennai".into()),
                Matcher::UrlEncoded("appid".into(), "test-key".into()),
                Matcher::UrlEncoded("units".into(), "metric".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(CHENNAI)
            .create_async()
            .await;

        let obs = provider(server.url()).fetch("Chennai").await.unwrap();
        mock.assert_async().await;

        assert_eq!(obs.city, "Chennai");
        assert_eq!(obs.temperature, 30.0);
        assert_eq!(obs.humidity, 70.0);
        assert_eq!(obs.pressure, 1008.0);
        assert_eq!(obs.wind_speed, 3.5);
        assert_eq!(obs.condition_code, 800);
        assert_eq!(obs.observed_at.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_unknown_city_is_provider_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/data/2.5/weather")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"cod":"404","message":"city not found"}"#)
            .create_async()
            .await;

        let err = provider(server.url()).fetch("Nowhereville").await.unwrap_err();
        assert_eq!(
            err,
            AcquisitionError::ProviderRejected {
                status: 404,
                message: "city not found".into()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_fields_is_schema_mismatch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/data/2.5/weather")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"weather":[{"id":800}],"dt":1700000000}"#)
            .create_async()
            .await;

        let err = provider(server.url()).fetch("Chennai").await.unwrap_err();
        assert!(matches!(err, AcquisitionError::SchemaMismatch(_)));
    }

    #[tokio::test]
    async fn test_empty_weather_array_is_schema_mismatch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/data/2.5/weather")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"weather":[],"main":{"temp":1,"humidity":2,"pressure":3},
                    "wind":{"speed":4},"dt":1700000000}"#,
            )
            .create_async()
            .await;

        let err = provider(server.url()).fetch("Chennai").await.unwrap_err();
        assert_eq!(err, AcquisitionError::SchemaMismatch("empty weather array".into()));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_failure() {
        // Port 9 (discard) on localhost is not expected to accept connections
        let err = provider("http://127.0.0.1:9".into()).fetch("Chennai").await.unwrap_err();
        assert!(matches!(err, AcquisitionError::NetworkFailure(_)));
        assert!(!err.to_string().contains("test-key"));
    }
}
