//! Open-Meteo hourly datasets
//!
//! Parses the hourly block of an Open-Meteo response into rows of
//! canonical observations and pairs each row with the next hour's
//! temperature.

use crate::condition::from_wmo_code;
use crate::error::TrainingError;
use crate::features::FeatureBuilder;
use crate::models::{TrainingSample, WeatherObservation};
use crate::provider::KMH_PER_MS;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Spacing in seconds between a feature row and its target row
pub const STEP_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    #[serde(default)]
    hourly_units: HashMap<String, String>,
    hourly: HourlySeries,
}

#[derive(Debug, Deserialize)]
struct HourlySeries {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    #[serde(alias = "relativehumidity_2m")]
    relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    surface_pressure: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pressure_msl: Option<Vec<Option<f64>>>,
    #[serde(alias = "windspeed_10m")]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(alias = "weathercode")]
    weather_code: Vec<Option<f64>>,
}

/// One hour of the dataset; `None` where the source had no value
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRow {
    pub time: NaiveDateTime,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    /// m/s
    pub wind_speed: Option<f64>,
    /// Canonical condition code
    pub condition_code: Option<i32>,
}

impl HourlyRow {
    /// The row as an observation, if every field is present
    fn observation(&self) -> Option<WeatherObservation> {
        Some(WeatherObservation {
            city: String::new(),
            temperature: self.temperature?,
            humidity: self.humidity?,
            pressure: self.pressure?,
            wind_speed: self.wind_speed?,
            condition_code: self.condition_code?,
            observed_at: DateTime::<Utc>::from_naive_utc_and_offset(self.time, Utc),
        })
    }
}

/// Read and parse a dataset file
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<HourlyRow>, TrainingError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| TrainingError::Dataset(format!("failed to read {}: {}", path.display(), e)))?;
    parse_dataset(&text)
}

pub fn parse_dataset(text: &str) -> Result<Vec<HourlyRow>, TrainingError> {
    let response: OpenMeteoResponse = serde_json::from_str(text)
        .map_err(|e| TrainingError::Dataset(format!("malformed dataset: {}", e)))?;
    rows_from_response(response)
}

pub(crate) fn parse_dataset_value(
    value: serde_json::Value,
) -> Result<Vec<HourlyRow>, TrainingError> {
    let response: OpenMeteoResponse = serde_json::from_value(value)
        .map_err(|e| TrainingError::Dataset(format!("malformed dataset: {}", e)))?;
    rows_from_response(response)
}

fn rows_from_response(response: OpenMeteoResponse) -> Result<Vec<HourlyRow>, TrainingError> {
    let OpenMeteoResponse {
        hourly_units,
        hourly,
    } = response;

    let pressure = hourly
        .surface_pressure
        .or(hourly.pressure_msl)
        .ok_or_else(|| {
            TrainingError::Dataset("no surface_pressure or pressure_msl series".into())
        })?;

    let wind_unit = hourly_units
        .get("wind_speed_10m")
        .or_else(|| hourly_units.get("windspeed_10m"))
        .map(String::as_str)
        .unwrap_or("km/h");
    let to_ms = wind_factor(wind_unit)?;

    let n = hourly.time.len();
    let lengths = [
        ("temperature_2m", hourly.temperature_2m.len()),
        ("relative_humidity_2m", hourly.relative_humidity_2m.len()),
        ("pressure", pressure.len()),
        ("wind_speed_10m", hourly.wind_speed_10m.len()),
        ("weather_code", hourly.weather_code.len()),
    ];
    if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != n) {
        return Err(TrainingError::Dataset(format!(
            "series {} has {} values but time has {}",
            name, len, n
        )));
    }

    hourly
        .time
        .iter()
        .enumerate()
        .map(|(i, t)| {
            Ok(HourlyRow {
                time: parse_time(t)?,
                temperature: hourly.temperature_2m[i],
                humidity: hourly.relative_humidity_2m[i],
                pressure: pressure[i],
                wind_speed: hourly.wind_speed_10m[i].map(|w| w * to_ms),
                condition_code: hourly.weather_code[i].map(|c| from_wmo_code(c as i32)),
            })
        })
        .collect()
}

/// Multiplier from the dataset's wind unit to m/s
fn wind_factor(unit: &str) -> Result<f64, TrainingError> {
    match unit {
        "km/h" | "kmh" => Ok(1.0 / KMH_PER_MS),
        "m/s" | "ms" => Ok(1.0),
        "mp/h" | "mph" => Ok(0.44704),
        "kn" => Ok(0.514444),
        other => Err(TrainingError::Dataset(format!("unsupported wind unit '{}'", other))),
    }
}

fn parse_time(value: &str) -> Result<NaiveDateTime, TrainingError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| TrainingError::Dataset(format!("invalid time '{}': {}", value, e)))
}

/// Pair each complete row with the temperature one hour later
///
/// The final row, rows with a missing value, and rows whose successor is
/// missing, lacks a temperature, or is not exactly one hour later are
/// dropped.
pub fn build_samples(rows: &[HourlyRow]) -> Vec<TrainingSample> {
    let builder = FeatureBuilder::new();
    rows.windows(2)
        .filter(|pair| (pair[1].time - pair[0].time).num_seconds() == STEP_SECS)
        .filter_map(|pair| {
            let target = pair[1].temperature?;
            let observation = pair[0].observation()?;
            Some(TrainingSample {
                features: builder.build(&observation),
                target,
            })
        })
        .collect()
}
