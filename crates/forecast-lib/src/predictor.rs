//! Prediction orchestrator
//!
//! acquire → build features → resolve model → infer → wrap → log

use crate::cache::WeatherCache;
use crate::error::{ErrorStage, PredictionError};
use crate::features::{FeatureBuilder, FeatureVector};
use crate::models::{PredictionRecord, PredictionResult, WeatherObservation};
use crate::observability::{ForecastMetrics, StructuredLogger};
use crate::registry::{ModelArtifact, ModelRegistry};
use crate::store::PredictionLog;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Outcome of running every configured model on one observation
#[derive(Debug, Clone)]
pub struct ModelComparison {
    pub city: String,
    pub observation: Arc<WeatherObservation>,
    pub predictions: BTreeMap<String, Result<PredictionResult, PredictionError>>,
}

impl ModelComparison {
    pub fn successes(&self) -> impl Iterator<Item = &PredictionResult> {
        self.predictions.values().filter_map(|r| r.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&String, &PredictionError)> {
        self.predictions
            .iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| (name, e)))
    }
}

/// Serializable view of one entry in a [`ModelComparison`]
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ComparisonEntry {
    Ok(PredictionResult),
    Err {
        error: String,
        stage: ErrorStage,
        code: &'static str,
    },
}

impl From<&Result<PredictionResult, PredictionError>> for ComparisonEntry {
    fn from(result: &Result<PredictionResult, PredictionError>) -> Self {
        match result {
            Ok(p) => ComparisonEntry::Ok(p.clone()),
            Err(e) => ComparisonEntry::Err {
                error: e.to_string(),
                stage: e.stage(),
                code: e.code(),
            },
        }
    }
}

/// Real-time forecasting pipeline over injected caches and log
pub struct ForecastService {
    cache: Arc<WeatherCache>,
    registry: Arc<ModelRegistry>,
    log: Arc<dyn PredictionLog>,
    features: FeatureBuilder,
    metrics: ForecastMetrics,
    logger: StructuredLogger,
}

impl ForecastService {
    pub fn new(
        cache: Arc<WeatherCache>,
        registry: Arc<ModelRegistry>,
        log: Arc<dyn PredictionLog>,
    ) -> Self {
        Self {
            cache,
            registry,
            log,
            features: FeatureBuilder::new(),
            metrics: ForecastMetrics::new(),
            logger: StructuredLogger::new("forecast"),
        }
    }

    pub fn cache(&self) -> &Arc<WeatherCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Next-hour temperature for `city` from one named model
    pub async fn predict(
        &self,
        city: &str,
        model: &str,
    ) -> Result<PredictionResult, PredictionError> {
        let start = Instant::now();
        let mut outcome = self.predict_inner(city, model).await;

        match &mut outcome {
            Ok(result) => self.served(result, start),
            Err(e) => self.failed(city, model, e),
        }
        outcome
    }

    async fn predict_inner(
        &self,
        city: &str,
        model: &str,
    ) -> Result<PredictionResult, PredictionError> {
        let observation = self.cache.get(city).await?;
        let features = self.features.build(&observation);
        let artifact = self.registry.get(model)?;
        infer(&artifact, &features, observation)
    }

    /// Run every configured model on a single acquisition
    ///
    /// Acquisition failure fails the whole call; model failures are
    /// reported per model.
    pub async fn predict_all(&self, city: &str) -> Result<ModelComparison, PredictionError> {
        let observation = match self.cache.get(city).await {
            Ok(obs) => obs,
            Err(e) => {
                let e = PredictionError::from(e);
                self.failed(city, "*", &e);
                return Err(e);
            }
        };
        let features = self.features.build(&observation);

        let mut predictions = BTreeMap::new();
        for name in self.registry.list_available() {
            let start = Instant::now();
            let mut outcome = self
                .registry
                .get(&name)
                .map_err(PredictionError::from)
                .and_then(|artifact| infer(&artifact, &features, observation.clone()));

            match &mut outcome {
                Ok(result) => self.served(result, start),
                Err(e) => self.failed(city, &name, e),
            }
            predictions.insert(name, outcome);
        }

        Ok(ModelComparison {
            city: observation.city.clone(),
            observation,
            predictions,
        })
    }

    fn served(&self, result: &mut PredictionResult, start: Instant) {
        let elapsed = start.elapsed();
        result.latency = elapsed;
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());
        self.metrics.inc_predictions_served(&result.model_name);
        self.logger.log_prediction(
            &result.observation.city,
            &result.model_name,
            result.observation.temperature,
            result.predicted_temperature,
            elapsed.as_secs_f64() * 1000.0,
        );

        if let Err(e) = self.log.append(&PredictionRecord::from_result(result)) {
            self.metrics.inc_log_write_failures();
            warn!(
                city = %result.observation.city,
                model = %result.model_name,
                error = %e,
                "Failed to record prediction, serving it anyway"
            );
        }
    }

    fn failed(&self, city: &str, model: &str, error: &PredictionError) {
        let stage = error.stage().to_string();
        self.metrics.inc_prediction_errors(&stage);
        self.logger
            .log_prediction_failure(city, model, &stage, &error.to_string());
    }
}

fn infer(
    artifact: &ModelArtifact,
    features: &FeatureVector,
    observation: Arc<WeatherObservation>,
) -> Result<PredictionResult, PredictionError> {
    let value = artifact.model().predict(features);
    if !value.is_finite() {
        return Err(PredictionError::Inference {
            model: artifact.name.clone(),
            reason: format!("model produced non-finite value {value}"),
        });
    }
    Ok(PredictionResult {
        model_name: artifact.name.clone(),
        predicted_temperature: value,
        predicted_at: Utc::now(),
        observation,
        latency: Duration::ZERO,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AcquisitionError, LogWriteError, ModelError};
    use crate::features::FeatureSchema;
    use crate::provider::WeatherProvider;
    use crate::regressor::{DecisionTree, Estimator, LinearModel, TreeParams};
    use crate::registry::{default_model_paths, ArtifactFile};
    use crate::store::MemoryPredictionLog;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const LINEAR: [f64; 5] = [0.9, -0.02, 0.001, -0.1, 0.0];

    struct StubProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherProvider for StubProvider {
        async fn fetch(&self, city: &str) -> Result<WeatherObservation, AcquisitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if city.eq_ignore_ascii_case("nowhereville") {
                return Err(AcquisitionError::ProviderRejected {
                    status: 404,
                    message: "city not found".to_string(),
                });
            }
            Ok(WeatherObservation {
                city: city.to_string(),
                temperature: 30.0,
                humidity: 70.0,
                pressure: 1008.0,
                wind_speed: 3.5,
                condition_code: 800,
                observed_at: Utc::now(),
            })
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    struct FailingLog;

    impl PredictionLog for FailingLog {
        fn append(&self, _: &PredictionRecord) -> Result<(), LogWriteError> {
            Err(LogWriteError("disk full".to_string()))
        }
    }

    /// Log whose writes take a noticeable amount of time
    struct SlowLog;

    impl PredictionLog for SlowLog {
        fn append(&self, _: &PredictionRecord) -> Result<(), LogWriteError> {
            std::thread::sleep(Duration::from_millis(60));
            Ok(())
        }
    }

    fn save(path: &std::path::Path, name: &str, estimator: Estimator) {
        ArtifactFile {
            name: name.to_string(),
            schema: FeatureSchema::current(),
            trained_at: Utc::now(),
            evaluation: None,
            estimator,
        }
        .save(path)
        .unwrap();
    }

    /// Linear and tree artifacts present, random forest missing
    fn fixture(log: Arc<dyn PredictionLog>) -> (TempDir, Arc<StubProvider>, ForecastService) {
        let dir = TempDir::new().unwrap();
        let paths = default_model_paths(dir.path());
        save(
            &paths["Linear Regression"],
            "Linear Regression",
            Estimator::Linear(LinearModel::new(2.0, LINEAR)),
        );
        let x: Vec<FeatureVector> = (0..6)
            .map(|i| FeatureVector::new([28.0 + i as f64, 70.0, 1008.0, 3.5, 800.0]))
            .collect();
        let tree = DecisionTree::fit(&x, &[29.0; 6], &TreeParams::default()).unwrap();
        save(&paths["Decision Tree"], "Decision Tree", Estimator::DecisionTree(tree));

        let provider = Arc::new(StubProvider {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(WeatherCache::new(provider.clone()));
        let registry = Arc::new(ModelRegistry::new(paths));
        (dir, provider, ForecastService::new(cache, registry, log))
    }

    #[tokio::test]
    async fn test_chennai_linear_prediction() {
        let log = Arc::new(MemoryPredictionLog::new());
        let (_dir, _provider, service) = fixture(log.clone());

        let result = service.predict("Chennai", "Linear Regression").await.unwrap();

        let expected = 2.0 + 0.9 * 30.0 - 0.02 * 70.0 + 0.001 * 1008.0 - 0.1 * 3.5;
        assert!((result.predicted_temperature - expected).abs() < 1e-9);
        assert_eq!(result.model_name, "Linear Regression");
        assert_eq!(result.observation.city, "Chennai");

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].city, "Chennai");
        assert_eq!(records[0].model_used, "Linear Regression");
        assert_eq!(records[0].prediction, result.predicted_temperature);
    }

    #[tokio::test]
    async fn test_unknown_city_is_acquisition_error_and_not_logged() {
        let log = Arc::new(MemoryPredictionLog::new());
        let (_dir, _provider, service) = fixture(log.clone());

        let err = service.predict("Nowhereville", "Linear Regression").await.unwrap_err();
        assert_eq!(err.stage(), ErrorStage::Acquisition);
        assert!(matches!(
            err,
            PredictionError::Acquisition(AcquisitionError::ProviderRejected { status: 404, .. })
        ));
        assert!(log.is_empty());

        assert!(service.predict_all("Nowhereville").await.is_err());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_predict_all_fetches_once() {
        let log = Arc::new(MemoryPredictionLog::new());
        let (_dir, provider, service) = fixture(log.clone());

        let comparison = service.predict_all("Chennai").await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(comparison.predictions.len(), 3);
        assert_eq!(comparison.successes().count(), 2);
        assert!(matches!(
            comparison.predictions["Random Forest"],
            Err(PredictionError::Model(ModelError::ArtifactNotFound { .. }))
        ));
        let tree = comparison.predictions["Decision Tree"].as_ref().unwrap();
        assert_eq!(tree.predicted_temperature, 29.0);
        for result in comparison.successes() {
            assert!(Arc::ptr_eq(&result.observation, &comparison.observation));
        }
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_model_leaves_others_servable() {
        let log = Arc::new(MemoryPredictionLog::new());
        let (_dir, provider, service) = fixture(log.clone());

        let err = service.predict("Chennai", "Gradient Boosting").await.unwrap_err();
        assert!(matches!(err, PredictionError::Model(ModelError::ArtifactNotFound { .. })));
        assert!(service.predict("Chennai", "Linear Regression").await.is_ok());
        // Second request is served from the acquisition cache
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_non_finite_output_is_inference_error() {
        let log = Arc::new(MemoryPredictionLog::new());
        let (dir, _provider, service) = fixture(log.clone());
        save(
            &dir.path().join("random_forest.json"),
            "Random Forest",
            Estimator::Linear(LinearModel::new(0.0, [f64::MAX, 0.0, 0.0, 0.0, 0.0])),
        );

        let err = service.predict("Chennai", "Random Forest").await.unwrap_err();
        assert_eq!(err.stage(), ErrorStage::Inference);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_log_failure_does_not_fail_prediction() {
        let (_dir, _provider, service) = fixture(Arc::new(FailingLog));
        assert!(service.predict("Chennai", "Linear Regression").await.is_ok());
    }

    #[tokio::test]
    async fn test_comparison_latency_is_measured_per_model() {
        let (_dir, _provider, service) = fixture(Arc::new(SlowLog));
        let comparison = service.predict_all("Chennai").await.unwrap();

        // The first model's log write must not count against the second
        assert_eq!(comparison.successes().count(), 2);
        for result in comparison.successes() {
            assert!(
                result.latency < Duration::from_millis(60),
                "{} took {:?}",
                result.model_name,
                result.latency
            );
        }
    }

    #[tokio::test]
    async fn test_comparison_entry_serialization() {
        let log = Arc::new(MemoryPredictionLog::new());
        let (_dir, _provider, service) = fixture(log);
        let comparison = service.predict_all("Chennai").await.unwrap();

        let linear = &comparison.predictions["Linear Regression"];
        let ok = serde_json::to_value(ComparisonEntry::from(linear)).unwrap();
        assert_eq!(ok["model_name"], "Linear Regression");
        let forest = &comparison.predictions["Random Forest"];
        let err = serde_json::to_value(ComparisonEntry::from(forest)).unwrap();
        assert_eq!(err["stage"], "model");
        assert_eq!(err["code"], "artifact_not_found");
    }
}
