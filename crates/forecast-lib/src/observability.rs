//! Observability infrastructure for the forecaster
//!
//! Provides:
//! - Prometheus metrics (prediction latency, served predictions, errors by stage,
//!   cache effectiveness, model loads, training scores)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for end-to-end prediction latency (in seconds)
///
/// Wider than pure inference: a cache miss includes a provider round trip.
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ForecastMetricsInner> = OnceLock::new();

struct ForecastMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_served: IntCounterVec,
    prediction_errors: IntCounterVec,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    model_loads: IntCounterVec,
    log_write_failures: IntCounter,
    training_mse: GaugeVec,
}

impl ForecastMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "forecaster_prediction_latency_seconds",
                "Time from request to served prediction, including acquisition",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_served: register_int_counter_vec!(
                "forecaster_predictions_served_total",
                "Predictions returned to callers",
                &["model"]
            )
            .expect("Failed to register predictions_served"),

            prediction_errors: register_int_counter_vec!(
                "forecaster_prediction_errors_total",
                "Failed predictions by pipeline stage",
                &["stage"]
            )
            .expect("Failed to register prediction_errors"),

            cache_hits: register_int_counter!(
                "forecaster_weather_cache_hits_total",
                "Observations served from the acquisition cache"
            )
            .expect("Failed to register cache_hits"),

            cache_misses: register_int_counter!(
                "forecaster_weather_cache_misses_total",
                "Observations fetched from the weather provider"
            )
            .expect("Failed to register cache_misses"),

            model_loads: register_int_counter_vec!(
                "forecaster_model_loads_total",
                "Model artifact load attempts by outcome",
                &["model", "outcome"]
            )
            .expect("Failed to register model_loads"),

            log_write_failures: register_int_counter!(
                "forecaster_prediction_log_failures_total",
                "Prediction log appends that failed"
            )
            .expect("Failed to register log_write_failures"),

            training_mse: register_gauge_vec!(
                "forecaster_training_mse",
                "Held-out mean squared error from the last training run",
                &["model"]
            )
            .expect("Failed to register training_mse"),
        }
    }
}

/// Forecaster metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ForecastMetrics {
    _private: (),
}

impl Default for ForecastMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ForecastMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ForecastMetricsInner {
        GLOBAL_METRICS.get_or_init(ForecastMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions_served(&self, model: &str) {
        self.inner()
            .predictions_served
            .with_label_values(&[model])
            .inc();
    }

    pub fn inc_prediction_errors(&self, stage: &str) {
        self.inner()
            .prediction_errors
            .with_label_values(&[stage])
            .inc();
    }

    pub fn inc_cache_hit(&self) {
        self.inner().cache_hits.inc();
    }

    pub fn inc_cache_miss(&self) {
        self.inner().cache_misses.inc();
    }

    /// `outcome` is "ok" or an error code
    pub fn inc_model_load(&self, model: &str, outcome: &str) {
        self.inner()
            .model_loads
            .with_label_values(&[model, outcome])
            .inc();
    }

    pub fn inc_log_write_failures(&self) {
        self.inner().log_write_failures.inc();
    }

    pub fn set_training_mse(&self, model: &str, mse: f64) {
        self.inner().training_mse.with_label_values(&[model]).set(mse);
    }
}

/// Structured logger for forecaster events
///
/// Consistent event-style logging for predictions, model loads and
/// training runs.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_prediction(
        &self,
        city: &str,
        model: &str,
        observed_temperature: f64,
        predicted_temperature: f64,
        latency_ms: f64,
    ) {
        info!(
            event = "prediction_served",
            instance = %self.instance,
            city = %city,
            model = %model,
            observed_temperature = observed_temperature,
            predicted_temperature = predicted_temperature,
            latency_ms = latency_ms,
            "Served temperature prediction"
        );
    }

    pub fn log_prediction_failure(&self, city: &str, model: &str, stage: &str, error: &str) {
        warn!(
            event = "prediction_failed",
            instance = %self.instance,
            city = %city,
            model = %model,
            stage = %stage,
            error = %error,
            "Prediction failed"
        );
    }

    pub fn log_model_loaded(&self, model: &str, family: &str, path: &str, checksum: &str) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            model = %model,
            family = %family,
            path = %path,
            checksum = %checksum,
            "Model artifact loaded"
        );
    }

    pub fn log_model_load_failed(&self, model: &str, error: &str) {
        warn!(
            event = "model_load_failed",
            instance = %self.instance,
            model = %model,
            error = %error,
            "Model artifact unavailable, other models remain servable"
        );
    }

    pub fn log_training_result(&self, model: &str, mse: f64, r2: f64, test_samples: usize) {
        info!(
            event = "model_trained",
            instance = %self.instance,
            model = %model,
            mse = mse,
            r2 = r2,
            test_samples = test_samples,
            "Model trained and evaluated"
        );
    }

    pub fn log_training_completed(&self, samples: usize, succeeded: usize, failed: usize) {
        if failed == 0 {
            info!(
                event = "training_completed",
                instance = %self.instance,
                samples = samples,
                succeeded = succeeded,
                "Training run completed"
            );
        } else {
            warn!(
                event = "training_completed",
                instance = %self.instance,
                samples = samples,
                succeeded = succeeded,
                failed = failed,
                "Training run completed with failures"
            );
        }
    }

    pub fn log_startup(&self, version: &str, provider: &str, models: usize) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            provider = %provider,
            models = models,
            "Forecaster started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Forecaster shutting down"
        );
    }
}
