//! Core library for next-hour temperature forecasting
//!
//! This crate provides:
//! - Weather acquisition from interchangeable providers, behind a TTL cache
//! - Deterministic feature construction
//! - Regression model families and a lazily loading model registry
//! - The prediction orchestrator and an append-only prediction log
//! - The offline training pipeline that produces model artifacts
//! - Health checks and observability

pub mod cache;
pub mod condition;
pub mod error;
pub mod features;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod provider;
pub mod registry;
pub mod regressor;
pub mod rng;
pub mod store;
pub mod training;

pub use cache::WeatherCache;
pub use error::{
    AcquisitionError, ErrorStage, LogWriteError, ModelError, PredictionError, TrainingError,
};
pub use features::{FeatureBuilder, FeatureSchema, FeatureVector, FEATURE_COLUMNS};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ForecastMetrics, StructuredLogger};
pub use predictor::{ComparisonEntry, ForecastService, ModelComparison};
pub use provider::{create_provider, ProviderConfig, ProviderKind, WeatherProvider};
pub use registry::{ModelArtifact, ModelRegistry};
pub use store::{MemoryPredictionLog, PredictionLog, SqlitePredictionLog};
pub use training::{TrainingConfig, TrainingPipeline, TrainingReport};
