//! Offline training pipeline
//!
//! dataset → samples → seeded split → fit each family → evaluate → persist.
//! The same seed and dataset always produce the same partitions and the
//! same artifacts.

pub mod dataset;
pub mod fetch;
pub mod split;

pub use dataset::{build_samples, load_dataset, parse_dataset, HourlyRow};
pub use fetch::{fetch_history, HistoryRequest, OPEN_METEO_URL};
pub use split::train_test_split;

use crate::error::TrainingError;
use crate::features::{FeatureSchema, FeatureVector};
use crate::models::{EvaluationResult, TrainingSample};
use crate::observability::{ForecastMetrics, StructuredLogger};
use crate::regressor::{Estimator, ModelFamily, Regressor};
use crate::registry::ArtifactFile;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Fewest usable samples a run will accept
pub const MIN_SAMPLES: usize = 10;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_TEST_RATIO: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Artifacts are written here as `<file_stem>.json`
    pub model_dir: PathBuf,
    pub seed: u64,
    pub test_ratio: f64,
    pub families: Vec<ModelFamily>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            seed: DEFAULT_SEED,
            test_ratio: DEFAULT_TEST_RATIO,
            families: ModelFamily::ALL.to_vec(),
        }
    }
}

/// Per-family outcome of a training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    pub results: BTreeMap<String, Result<EvaluationResult, String>>,
}

impl TrainingReport {
    /// Successfully trained model with the lowest held-out MSE
    pub fn best(&self) -> Option<&EvaluationResult> {
        self.results
            .values()
            .filter_map(|r| r.as_ref().ok())
            .min_by(|a, b| a.mse.total_cmp(&b.mse))
    }

    pub fn failed(&self) -> usize {
        self.results.values().filter(|r| r.is_err()).count()
    }
}

pub struct TrainingPipeline {
    config: TrainingConfig,
    metrics: ForecastMetrics,
    logger: StructuredLogger,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            metrics: ForecastMetrics::new(),
            logger: StructuredLogger::new("training"),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train every configured family on the dataset at `dataset_path`
    pub fn train(&self, dataset_path: impl AsRef<Path>) -> Result<TrainingReport, TrainingError> {
        let dataset_path = dataset_path.as_ref();
        let rows = load_dataset(dataset_path)?;
        let samples = build_samples(&rows);
        info!(
            path = %dataset_path.display(),
            rows = rows.len(),
            samples = samples.len(),
            "Loaded training dataset"
        );
        self.train_on_samples(&samples)
    }

    /// Fitting or persisting one family may fail without aborting the
    /// others; too few samples aborts the run.
    pub fn train_on_samples(
        &self,
        samples: &[TrainingSample],
    ) -> Result<TrainingReport, TrainingError> {
        if samples.len() < MIN_SAMPLES {
            return Err(TrainingError::InsufficientData {
                available: samples.len(),
                required: MIN_SAMPLES,
            });
        }

        let (train, test) = train_test_split(samples, self.config.test_ratio, self.config.seed);
        let (x_train, y_train) = unzip(&train);
        let (x_test, y_test) = unzip(&test);

        let mut results = BTreeMap::new();
        for &family in &self.config.families {
            let outcome = self
                .train_family(family, &x_train, &y_train, &x_test, &y_test)
                .map_err(|e| {
                    warn!(model = %family, error = %e, "Training failed for model");
                    e.to_string()
                });
            results.insert(family.display_name().to_string(), outcome);
        }

        let report = TrainingReport {
            samples: samples.len(),
            train_samples: train.len(),
            test_samples: test.len(),
            results,
        };
        self.logger.log_training_completed(
            report.samples,
            report.results.len() - report.failed(),
            report.failed(),
        );
        Ok(report)
    }

    fn train_family(
        &self,
        family: ModelFamily,
        x_train: &[FeatureVector],
        y_train: &[f64],
        x_test: &[FeatureVector],
        y_test: &[f64],
    ) -> Result<EvaluationResult, TrainingError> {
        let name = family.display_name();
        let estimator =
            Estimator::fit(family, x_train, y_train, self.config.seed).map_err(|e| {
                TrainingError::Fit {
                    family: name.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let predicted: Vec<f64> = x_test.iter().map(|f| estimator.predict(f)).collect();
        let path = self.config.model_dir.join(format!("{}.json", family.file_stem()));
        let mut evaluation = EvaluationResult {
            model_name: name.to_string(),
            family: family.file_stem().to_string(),
            mse: mean_squared_error(y_test, &predicted),
            r2: r2_score(y_test, &predicted),
            train_samples: x_train.len(),
            test_samples: x_test.len(),
            artifact_path: None,
        };

        let artifact = ArtifactFile {
            name: name.to_string(),
            schema: FeatureSchema::current(),
            trained_at: Utc::now(),
            evaluation: Some(evaluation.clone()),
            estimator,
        };
        let checksum = artifact.save(&path).map_err(|e| TrainingError::Persist {
            path: path.display().to_string(),
            reason: format!("{:#}", e),
        })?;

        evaluation.artifact_path = Some(path.display().to_string());
        self.metrics.set_training_mse(name, evaluation.mse);
        self.logger
            .log_training_result(name, evaluation.mse, evaluation.r2, evaluation.test_samples);
        info!(model = %name, path = %path.display(), checksum = %checksum, "Saved model artifact");

        Ok(evaluation)
    }
}

fn unzip(samples: &[TrainingSample]) -> (Vec<FeatureVector>, Vec<f64>) {
    samples.iter().map(|s| (s.features, s.target)).unzip()
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// Coefficient of determination; 1.0 for a perfect fit of constant data
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return f64::NAN;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
