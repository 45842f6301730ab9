//! Core data models for the forecaster

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::features::FeatureVector;

/// A single point-in-time weather reading for a city, in canonical units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub city: String,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    /// Hectopascals
    pub pressure: f64,
    /// Metres per second, whatever unit the provider reported
    pub wind_speed: f64,
    /// Canonical condition code, see [`crate::condition`]
    pub condition_code: i32,
    pub observed_at: DateTime<Utc>,
}

/// Outcome of running one model on one observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub model_name: String,
    /// Next-hour temperature in degrees Celsius, unrounded
    pub predicted_temperature: f64,
    pub predicted_at: DateTime<Utc>,
    pub observation: Arc<WeatherObservation>,
    /// Time spent serving this model, acquisition excluded for comparisons
    #[serde(skip)]
    pub latency: Duration,
}

/// Row appended to the prediction log for every served prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub city: String,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub condition_code: i32,
    pub model_used: String,
    pub prediction: f64,
}

impl PredictionRecord {
    pub fn from_result(result: &PredictionResult) -> Self {
        let obs = &result.observation;
        Self {
            timestamp: result.predicted_at,
            city: obs.city.clone(),
            temperature: obs.temperature,
            humidity: obs.humidity,
            pressure: obs.pressure,
            wind_speed: obs.wind_speed,
            condition_code: obs.condition_code,
            model_used: result.model_name.clone(),
            prediction: result.predicted_temperature,
        }
    }
}

/// Supervised sample: features at hour t, temperature at hour t+1
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub features: FeatureVector,
    pub target: f64,
}

/// Held-out evaluation of one fitted model family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub model_name: String,
    pub family: String,
    pub mse: f64,
    pub r2: f64,
    pub train_samples: usize,
    pub test_samples: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_copies_observation_snapshot() {
        let observation = Arc::new(WeatherObservation {
            city: "Chennai".to_string(),
            temperature: 30.0,
            humidity: 70.0,
            pressure: 1008.0,
            wind_speed: 3.5,
            condition_code: 800,
            observed_at: Utc::now(),
        });
        let result = PredictionResult {
            model_name: "Linear Regression".to_string(),
            predicted_temperature: 29.4,
            predicted_at: Utc::now(),
            observation: observation.clone(),
            latency: Duration::ZERO,
        };

        let record = PredictionRecord::from_result(&result);
        assert_eq!(record.city, "Chennai");
        assert_eq!(record.pressure, 1008.0);
        assert_eq!(record.condition_code, 800);
        assert_eq!(record.model_used, "Linear Regression");
        assert_eq!(record.prediction, 29.4);
        assert_eq!(record.timestamp, result.predicted_at);
    }

    #[test]
    fn test_record_serializes_log_columns() {
        let record = PredictionRecord {
            timestamp: Utc::now(),
            city: "Oslo".to_string(),
            temperature: 4.0,
            humidity: 81.0,
            pressure: 1012.0,
            wind_speed: 6.0,
            condition_code: 500,
            model_used: "Decision Tree".to_string(),
            prediction: 3.7,
        };
        let value = serde_json::to_value(&record).unwrap();
        for column in [
            "timestamp",
            "city",
            "temperature",
            "humidity",
            "pressure",
            "wind_speed",
            "model_used",
            "prediction",
        ] {
            assert!(value.get(column).is_some(), "missing column {}", column);
        }
    }
}
