//! Historical dataset download from Open-Meteo

use super::dataset::parse_dataset_value;
use crate::provider::{build_client, endpoint, get_json, DEFAULT_TIMEOUT};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com";

const HOURLY_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,surface_pressure,wind_speed_10m,weather_code";

/// Location and window of a history download
#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Days of past data to include, up to 92
    pub past_days: u32,
    pub base_url: String,
}

impl Default for HistoryRequest {
    /// Chennai, one week
    fn default() -> Self {
        Self {
            latitude: 13.0827,
            longitude: 80.2707,
            past_days: 7,
            base_url: OPEN_METEO_URL.to_string(),
        }
    }
}

/// Download an hourly dataset and write it to `output`
///
/// The payload is checked to parse as a training dataset before anything
/// is written. Returns the number of hourly rows.
pub async fn fetch_history(request: &HistoryRequest, output: &Path) -> Result<usize> {
    let client = build_client(DEFAULT_TIMEOUT)?;
    let mut url = endpoint(&request.base_url, "v1/forecast")?;
    url.query_pairs_mut()
        .append_pair("latitude", &request.latitude.to_string())
        .append_pair("longitude", &request.longitude.to_string())
        .append_pair("hourly", HOURLY_FIELDS)
        .append_pair("past_days", &request.past_days.min(92).to_string())
        .append_pair("forecast_days", "1");

    info!(
        latitude = request.latitude,
        longitude = request.longitude,
        past_days = request.past_days,
        "Fetching hourly history"
    );
    let payload: serde_json::Value = get_json(&client, url)
        .await
        .context("Failed to download hourly history")?;

    let rows = parse_dataset_value(payload.clone())
        .context("Downloaded history is not a usable dataset")?
        .len();

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create dataset directory {:?}", parent))?;
    }
    let temp_path = output.with_extension("tmp");
    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create {:?}", temp_path))?;
    serde_json::to_writer_pretty(&mut file, &payload).context("Failed to write dataset")?;
    file.flush().context("Failed to flush dataset")?;
    fs::rename(&temp_path, output)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, output))?;

    info!(rows = rows, path = %output.display(), "Saved hourly history");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::dataset::load_dataset;
    use mockito::Matcher;
    use tempfile::TempDir;

    const BODY: &str = r#"{
        "hourly_units": {"wind_speed_10m": "km/h"},
        "hourly": {
            "time": ["2024-05-01T00:00", "2024-05-01T01:00"],
            "temperature_2m": [28.0, 27.5],
            "relative_humidity_2m": [70, 72],
            "surface_pressure": [1008.0, 1008.4],
            "wind_speed_10m": [18.0, 14.4],
            "weather_code": [1, 2]
        }
    }"#;

    #[tokio::test]
    async fn test_fetch_history_writes_dataset() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("latitude".into(), "13.0827".into()),
                Matcher::UrlEncoded("past_days".into(), "3".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let output = dir.path().join("raw/weather.json");
        let request = HistoryRequest {
            past_days: 3,
            base_url: server.url(),
            ..Default::default()
        };

        let rows = fetch_history(&request, &output).await.unwrap();
        mock.assert_async().await;
        assert_eq!(rows, 2);
        assert_eq!(load_dataset(&output).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_history_rejects_unusable_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"reason": "nothing here"}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let output = dir.path().join("weather.json");
        let request = HistoryRequest {
            base_url: server.url(),
            ..Default::default()
        };

        assert!(fetch_history(&request, &output).await.is_err());
        assert!(!output.exists());
    }
}
