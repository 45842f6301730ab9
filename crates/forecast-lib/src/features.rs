//! Feature construction for ML inference and training
//!
//! The column order defined here is shared by the training pipeline, the
//! serving path and the artifact schema check. It must not be redefined
//! anywhere else.

use crate::models::WeatherObservation;
use serde::{Deserialize, Serialize};

/// Number of input features expected by every model
pub const NUM_FEATURES: usize = 5;

/// Feature column order used at training and serving time
pub const FEATURE_COLUMNS: [&str; NUM_FEATURES] = [
    "temperature",
    "humidity",
    "pressure",
    "wind_speed",
    "condition_code",
];

/// Bumped whenever [`FEATURE_COLUMNS`] changes meaning
pub const SCHEMA_VERSION: u32 = 2;

/// Fixed-order numeric encoding of an observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; NUM_FEATURES]);

impl FeatureVector {
    pub fn new(values: [f64; NUM_FEATURES]) -> Self {
        Self(values)
    }

    /// Build from an untyped row, rejecting any length other than
    /// [`NUM_FEATURES`]
    pub fn try_from_slice(values: &[f64]) -> Result<Self, SchemaError> {
        let array: [f64; NUM_FEATURES] = values.try_into().map_err(|_| SchemaError {
            expected: NUM_FEATURES,
            actual: values.len(),
        })?;
        Ok(Self(array))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, index: usize) -> f64 {
        self.0[index]
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

/// Wrong number of feature values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("expected {expected} features, got {actual}")]
pub struct SchemaError {
    pub expected: usize,
    pub actual: usize,
}

/// Versioned description of the feature columns, stamped into artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub columns: Vec<String>,
}

impl FeatureSchema {
    /// The schema this build trains and serves with
    pub fn current() -> Self {
        Self {
            version: SCHEMA_VERSION,
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Describe how `self` differs from the current schema, if it does
    pub fn mismatch(&self) -> Option<String> {
        let current = Self::current();
        if self.version != current.version {
            return Some(format!(
                "schema version {} but serving version {}",
                self.version, current.version
            ));
        }
        if self.columns != current.columns {
            return Some(format!(
                "columns [{}] but serving columns [{}]",
                self.columns.join(", "),
                current.columns.join(", ")
            ));
        }
        None
    }
}

/// Maps observations onto feature vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, observation: &WeatherObservation) -> FeatureVector {
        FeatureVector([
            observation.temperature,
            observation.humidity,
            observation.pressure,
            observation.wind_speed,
            f64::from(observation.condition_code),
        ])
    }
}
