//! Typed errors for each pipeline stage
//!
//! Every error can report the [`ErrorStage`] it came from so callers can
//! decide whether to retry, pick a different model, or report the city as
//! not found.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStage {
    Acquisition,
    Model,
    Inference,
    Persistence,
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorStage::Acquisition => "acquisition",
            ErrorStage::Model => "model",
            ErrorStage::Inference => "inference",
            ErrorStage::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

/// Failure to obtain an observation from a weather provider
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AcquisitionError {
    /// Timeout, DNS failure, connection reset or truncated body
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The provider answered with a non-2xx status (including unknown city)
    #[error("Provider rejected request ({status}): {message}")]
    ProviderRejected { status: u16, message: String },

    /// The provider payload did not have the expected shape
    #[error("Provider schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl AcquisitionError {
    /// True for errors a caller may reasonably retry later
    pub fn is_transient(&self) -> bool {
        match self {
            AcquisitionError::NetworkFailure(_) => true,
            AcquisitionError::ProviderRejected { status, .. } => *status >= 500 || *status == 429,
            AcquisitionError::SchemaMismatch(_) => false,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            AcquisitionError::NetworkFailure(_) => {
                "Unable to reach the weather provider. Please try again."
            }
            AcquisitionError::ProviderRejected { status: 400 | 404, .. } => {
                "City not found. Check the spelling and try again."
            }
            AcquisitionError::ProviderRejected { .. } => {
                "The weather provider rejected the request."
            }
            AcquisitionError::SchemaMismatch(_) => {
                "The weather provider returned an unexpected response."
            }
        }
    }
}

/// Failure to resolve a model artifact
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("Model artifact not found: {name} ({reason})")]
    ArtifactNotFound { name: String, reason: String },

    #[error("Model artifact corrupt: {name} ({reason})")]
    ArtifactCorrupt { name: String, reason: String },

    #[error("Feature schema mismatch for {name}: {reason}")]
    SchemaMismatch { name: String, reason: String },
}

impl ModelError {
    pub fn model_name(&self) -> &str {
        match self {
            ModelError::ArtifactNotFound { name, .. }
            | ModelError::ArtifactCorrupt { name, .. }
            | ModelError::SchemaMismatch { name, .. } => name,
        }
    }
}

/// Failure to append to the prediction log
#[derive(Debug, Error)]
#[error("Prediction log write failed: {0}")]
pub struct LogWriteError(pub String);

impl From<rusqlite::Error> for LogWriteError {
    fn from(e: rusqlite::Error) -> Self {
        LogWriteError(e.to_string())
    }
}

/// Failure of a single prediction request
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PredictionError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// The model produced a value that cannot be served
    #[error("Inference failed for {model}: {reason}")]
    Inference { model: String, reason: String },
}

impl PredictionError {
    pub fn stage(&self) -> ErrorStage {
        match self {
            PredictionError::Acquisition(_) => ErrorStage::Acquisition,
            PredictionError::Model(_) => ErrorStage::Model,
            PredictionError::Inference { .. } => ErrorStage::Inference,
        }
    }

    /// Short machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            PredictionError::Acquisition(AcquisitionError::NetworkFailure(_)) => "network_failure",
            PredictionError::Acquisition(AcquisitionError::ProviderRejected { .. }) => {
                "provider_rejected"
            }
            PredictionError::Acquisition(AcquisitionError::SchemaMismatch(_)) => "schema_mismatch",
            PredictionError::Model(ModelError::ArtifactNotFound { .. }) => "artifact_not_found",
            PredictionError::Model(ModelError::ArtifactCorrupt { .. }) => "artifact_corrupt",
            PredictionError::Model(ModelError::SchemaMismatch { .. }) => "schema_mismatch",
            PredictionError::Inference { .. } => "inference_failed",
        }
    }
}

/// Failure of an offline training run or of one model family within it
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Missing or malformed dataset; aborts the whole run
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Insufficient data: {available} samples, need at least {required}")]
    InsufficientData { available: usize, required: usize },

    #[error("Failed to fit {family}: {reason}")]
    Fit { family: String, reason: String },

    #[error("Failed to persist artifact {path}: {reason}")]
    Persist { path: String, reason: String },
}
