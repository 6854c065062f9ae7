//! Observability for the prediction service
//!
//! Provides:
//! - Prometheus metrics (prediction and chat latency, request outcomes, loaded models)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for in-process inference (seconds)
const PREDICTION_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Histogram buckets for upstream chat calls (seconds)
const CHAT_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    chat_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors_total: IntCounter,
    summaries_total: IntCounter,
    chat_errors_total: IntCounter,
    models_loaded: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "toodu_prediction_latency_seconds",
                "Time spent encoding inputs and running model inference",
                PREDICTION_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            chat_latency_seconds: register_histogram!(
                "toodu_chat_latency_seconds",
                "Time spent waiting for the chat completion API",
                CHAT_BUCKETS.to_vec()
            )
            .expect("Failed to register chat_latency_seconds"),

            predictions_total: register_int_counter!(
                "toodu_predictions_total",
                "Total number of successful prediction requests"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter!(
                "toodu_prediction_errors_total",
                "Total number of failed prediction requests"
            )
            .expect("Failed to register prediction_errors_total"),

            summaries_total: register_int_counter!(
                "toodu_summaries_total",
                "Total number of generated summaries"
            )
            .expect("Failed to register summaries_total"),

            chat_errors_total: register_int_counter!(
                "toodu_chat_errors_total",
                "Total number of failed chat completion calls"
            )
            .expect("Failed to register chat_errors_total"),

            models_loaded: register_int_gauge!(
                "toodu_models_loaded",
                "Number of model artifacts currently cached"
            )
            .expect("Failed to register models_loaded"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_chat_latency(&self, duration_secs: f64) {
        self.inner().chat_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors_total.inc();
    }

    pub fn inc_summaries(&self) {
        self.inner().summaries_total.inc();
    }

    pub fn inc_chat_errors(&self) {
        self.inner().chat_errors_total.inc();
    }

    pub fn set_models_loaded(&self, count: usize) {
        self.inner().models_loaded.set(count as i64);
    }
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, addr: &str, models_loaded: usize) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            addr = %addr,
            models_loaded = models_loaded,
            "Prediction API started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Prediction API shutting down"
        );
    }

    pub fn log_prediction(&self, model: &str, records: usize, values: &str, confidence: f64) {
        info!(
            event = "prediction_served",
            service = %self.service,
            model = %model,
            records = records,
            values = %values,
            confidence = confidence,
            "Prediction served"
        );
    }

    pub fn log_prediction_error(&self, model: Option<&str>, status: u16, error: &str) {
        warn!(
            event = "prediction_failed",
            service = %self.service,
            model = ?model,
            status = status,
            error = %error,
            "Error processing request"
        );
    }

    pub fn log_summary(&self, chat_model: &str, chars: usize, elapsed_ms: u128) {
        info!(
            event = "summary_generated",
            service = %self.service,
            chat_model = %chat_model,
            chars = chars,
            elapsed_ms = elapsed_ms as u64,
            "Summary generated"
        );
    }

    pub fn log_summary_error(&self, status: u16, error: &str) {
        warn!(
            event = "summary_failed",
            service = %self.service,
            status = status,
            error = %error,
            "Error generating summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_registry() {
        let metrics = ServiceMetrics::new();
        let other = metrics.clone();

        metrics.observe_prediction_latency(0.002);
        metrics.observe_chat_latency(1.2);
        metrics.inc_predictions();
        other.inc_prediction_errors();
        other.set_models_loaded(6);

        let families = prometheus::gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"toodu_prediction_latency_seconds"));
        assert!(names.contains(&"toodu_models_loaded"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("toodu-api");
        assert_eq!(logger.service, "toodu-api");
    }
}
