//! HTTP API: predictions, model listing, health checks and Prometheus metrics

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use forecast_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::ForecastMetrics,
    registry::ModelStatus,
    AcquisitionError, ComparisonEntry, ForecastService, ModelError, PredictionError,
    PredictionResult, WeatherObservation,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

/// Model used by `/v1/predict` when the request names none
pub const DEFAULT_MODEL: &str = "Linear Regression";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ForecastService>,
    pub health_registry: HealthRegistry,
    pub metrics: ForecastMetrics,
}

impl AppState {
    pub fn new(service: Arc<ForecastService>, health_registry: HealthRegistry) -> Self {
        Self {
            service,
            health_registry,
            metrics: ForecastMetrics::new(),
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub stage: String,
    pub code: String,
    /// Short explanation suitable for end users
    pub message: String,
}

/// A pipeline failure rendered as an HTTP response
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: message.clone(),
                stage: "request".to_string(),
                code: "bad_request".to_string(),
                message,
            },
        }
    }
}

impl From<PredictionError> for ApiError {
    fn from(e: PredictionError) -> Self {
        let status = status_for(&e);
        let message = match &e {
            PredictionError::Acquisition(a) => a.user_message().to_string(),
            PredictionError::Model(m) => format!("Model '{}' is not available.", m.model_name()),
            PredictionError::Inference { .. } => {
                "The model could not produce a forecast.".to_string()
            }
        };
        Self {
            status,
            body: ErrorBody {
                error: e.to_string(),
                stage: e.stage().to_string(),
                code: e.code().to_string(),
                message,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// HTTP status for each pipeline failure
pub fn status_for(e: &PredictionError) -> StatusCode {
    match e {
        PredictionError::Acquisition(AcquisitionError::ProviderRejected { status, .. }) => {
            match *status {
                404 => StatusCode::NOT_FOUND,
                400 => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            }
        }
        PredictionError::Acquisition(AcquisitionError::NetworkFailure(_)) => {
            StatusCode::GATEWAY_TIMEOUT
        }
        PredictionError::Acquisition(AcquisitionError::SchemaMismatch(_)) => {
            StatusCode::BAD_GATEWAY
        }
        PredictionError::Model(ModelError::ArtifactNotFound { .. }) => StatusCode::NOT_FOUND,
        PredictionError::Model(_) | PredictionError::Inference { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictParams {
    pub city: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub city: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub provider: &'static str,
    pub models: Vec<ModelStatus>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub city: String,
    pub observation: Arc<WeatherObservation>,
    pub predictions: BTreeMap<String, ComparisonEntry>,
}

fn required_city(city: Option<String>) -> Result<String, ApiError> {
    match city {
        Some(c) if !c.trim().is_empty() => Ok(c),
        _ => Err(ApiError::bad_request("query parameter 'city' is required")),
    }
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PredictParams>,
) -> Result<Json<PredictionResult>, ApiError> {
    let city = required_city(params.city)?;
    let model = params.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let result = state.service.predict(&city, &model).await?;
    Ok(Json(result))
}

async fn compare(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CompareParams>,
) -> Result<Json<CompareResponse>, ApiError> {
    let city = required_city(params.city)?;
    let comparison = state.service.predict_all(&city).await?;

    Ok(Json(CompareResponse {
        city: comparison.city.clone(),
        observation: comparison.observation.clone(),
        predictions: comparison
            .predictions
            .iter()
            .map(|(name, outcome)| (name.clone(), ComparisonEntry::from(outcome)))
            .collect(),
    }))
}

async fn models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        provider: state.service.cache().provider_name(),
        models: state.service.registry().status(),
    })
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/predict", get(predict))
        .route("/v1/compare", get(compare))
        .route("/v1/models", get(models))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let rejected = |status| {
            PredictionError::Acquisition(AcquisitionError::ProviderRejected {
                status,
                message: String::new(),
            })
        };
        assert_eq!(status_for(&rejected(404)), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&rejected(400)), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&rejected(401)), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&rejected(503)), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&AcquisitionError::NetworkFailure("timeout".into()).into()),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(
                &ModelError::ArtifactCorrupt {
                    name: "Decision Tree".into(),
                    reason: "eof".into()
                }
                .into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_carries_stage_and_code() {
        let err = ApiError::from(PredictionError::Model(ModelError::ArtifactNotFound {
            name: "Gradient Boosting".into(),
            reason: "no such model configured".into(),
        }));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.body.stage, forecast_lib::ErrorStage::Model.to_string());
        assert_eq!(err.body.code, "artifact_not_found");
        assert!(err.body.message.contains("Gradient Boosting"));
    }
}
