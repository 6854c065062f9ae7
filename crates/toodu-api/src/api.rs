//! HTTP API: prediction, summarization, health checks and Prometheus metrics

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use toodu_lib::{
    chat::{summary_message, ChatClient, SamplingParams},
    health::{ComponentStatus, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    predictor::{PredictError, PredictRequest, PredictionService},
    ErrorResponse, PredictionResponse, ServiceInfo, SummaryData, SummaryResponse, Variant,
};

const ERROR_MESSAGE: &str = "An error occurred while processing the request.";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub predictions: PredictionService,
    pub chat: ChatClient,
    /// Sampling parameters used when the request leaves them out
    pub default_sampling: SamplingParams,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
    pub version: String,
}

impl AppState {
    pub fn new(
        predictions: PredictionService,
        chat: ChatClient,
        default_sampling: SamplingParams,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
    ) -> Self {
        Self {
            predictions,
            chat,
            default_sampling,
            health_registry,
            metrics,
            logger: StructuredLogger::new("toodu-api"),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn error_response(status: u16, error: impl Into<String>, model: Option<String>) -> Response {
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Json(ErrorResponse::new(status, ERROR_MESSAGE, error, model))).into_response()
}

/// Parse a request body; an empty body is no JSON at all
fn parse_body(body: &Bytes) -> Result<Option<Value>, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| format!("The request body is not valid JSON: {e}"))
}

/// Service banner, used as a liveness check by clients
async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("SERVE: /api/v1/ GET route");
    Json(ServiceInfo {
        status: 200,
        message: "Theft Over Open Data Prediction API is running.".to_string(),
        data: None,
        version: state.version.clone(),
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Deserialize)]
struct PredictQuery {
    model_name: Option<String>,
}

async fn predict_smote(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PredictQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    predict(&state, Variant::Smote, query, body).await
}

async fn predict_smotenc(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PredictQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    predict(&state, Variant::Smotenc, query, body).await
}

async fn predict(
    state: &AppState,
    variant: Variant,
    query: Result<Query<PredictQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            state.metrics.inc_prediction_errors();
            state
                .logger
                .log_prediction_error(None, 400, &rejection.body_text());
            return error_response(400, rejection.body_text(), None);
        }
    };

    let model_name = query.model_name;
    let start = Instant::now();

    let result = match parse_body(&body) {
        Ok(body) => {
            state
                .predictions
                .predict_async(PredictRequest {
                    variant,
                    model_name: model_name.as_deref(),
                    body: body.as_ref(),
                })
                .await
        }
        Err(e) => Err(PredictError::InvalidPayload(e)),
    };

    state
        .metrics
        .observe_prediction_latency(start.elapsed().as_secs_f64());
    state
        .metrics
        .set_models_loaded(state.predictions.store().loaded_count());

    match result {
        Ok(served) => {
            state.metrics.inc_predictions();
            state.logger.log_prediction(
                &served.model,
                served.records,
                &served.prediction.values,
                served.prediction.confidence,
            );
            Json(PredictionResponse {
                status: 200,
                prediction: served.prediction,
                model: served.model,
                timestamp: Utc::now(),
            })
            .into_response()
        }
        Err(e) => {
            state.metrics.inc_prediction_errors();
            state
                .logger
                .log_prediction_error(model_name.as_deref(), e.status(), &e.to_string());
            error_response(e.status(), e.to_string(), model_name)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SummarizeQuery {
    variant: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<i64>,
    top_p: Option<f64>,
    frequency_penalty: Option<f64>,
    presence_penalty: Option<f64>,
}

impl SummarizeQuery {
    fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
        }
    }
}

async fn summarize(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SummarizeQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return error_response(400, rejection.body_text(), None),
    };

    let variant = match query.variant.as_deref().map(str::parse::<Variant>).transpose() {
        Ok(variant) => variant,
        Err(e) => return error_response(400, e.to_string(), None),
    };

    let payload = match parse_body(&body) {
        Ok(Some(payload)) => payload,
        Ok(None) => return error_response(400, PredictError::NoJson.to_string(), None),
        Err(e) => return error_response(400, e, None),
    };

    let sampling = query.sampling().or(state.default_sampling);
    let message = summary_message(&payload, variant);
    let start = Instant::now();

    let result = state.chat.complete(&[message], &sampling).await;
    state
        .metrics
        .observe_chat_latency(start.elapsed().as_secs_f64());

    match result {
        Ok(summary) => {
            state.metrics.inc_summaries();
            state
                .logger
                .log_summary(state.chat.model(), summary.len(), start.elapsed().as_millis());
            Json(SummaryResponse {
                status: 200,
                data: SummaryData { summary },
            })
            .into_response()
        }
        Err(e) => {
            state.metrics.inc_chat_errors();
            state.logger.log_summary_error(e.status(), &e.to_string());
            error_response(e.status(), e.to_string(), None)
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
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
        .route("/api/v1", get(index))
        .route("/api/v1/", get(index))
        .route("/api/v1/predict", get(predict_smote).post(predict_smote))
        .route(
            "/api/v1/predict/smotenc",
            get(predict_smotenc).post(predict_smotenc),
        )
        .route("/api/v1/summarize", post(summarize))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn serve(addr: String, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
