//! API client for the forecaster server

use anyhow::{Context, Result};
use forecast_lib::{PredictionResult, WeatherObservation};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// GET `path` with query parameters and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut url = self.base_url.join(path).context("Invalid path")?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to reach the forecaster API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => anyhow::bail!("{} ({} stage, {})", err.message, err.stage, status),
                Err(_) => anyhow::bail!("API error ({}): {}", status, body),
            }
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn predict(&self, city: &str, model: &str) -> Result<PredictionResult> {
        self.get("v1/predict", &[("city", city), ("model", model)]).await
    }

    pub async fn compare(&self, city: &str) -> Result<CompareResponse> {
        self.get("v1/compare", &[("city", city)]).await
    }

    pub async fn models(&self) -> Result<ModelsResponse> {
        self.get("v1/models", &[]).await
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub stage: String,
    pub code: String,
    pub message: String,
}

/// One model's entry in a comparison: a prediction or its failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComparisonEntry {
    Prediction(PredictionResult),
    Failure(ErrorResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareResponse {
    pub city: String,
    pub observation: WeatherObservation,
    pub predictions: BTreeMap<String, ComparisonEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub name: String,
    pub path: String,
    pub loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub provider: String,
    pub models: Vec<ModelStatus>,
}
