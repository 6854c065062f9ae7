//! Request-level prediction service
//!
//! Validates a prediction request in the order the API documents it (body,
//! then model name, then the rest), resolves the artifact and runs it.

use super::output::prediction_values;
use super::{PredictError, Predictor};
use crate::models::{Algorithm, FeatureRecord, ModelKey, PredictionValues, Variant};
use crate::store::{ModelArtifact, ModelStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// A prediction request as received by the API
#[derive(Debug, Clone, Copy)]
pub struct PredictRequest<'a> {
    pub variant: Variant,
    pub model_name: Option<&'a str>,
    pub body: Option<&'a Value>,
}

/// A successful prediction
#[derive(Debug, Clone)]
pub struct ServedPrediction {
    pub key: ModelKey,
    /// Artifact file the prediction came from
    pub model: String,
    pub prediction: PredictionValues,
    pub records: usize,
}

#[derive(Debug, Clone)]
pub struct PredictionService {
    store: Arc<ModelStore>,
}

impl PredictionService {
    pub fn new(store: Arc<ModelStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    /// Validate and score a request, loading the model inline if needed
    pub fn predict(&self, request: PredictRequest<'_>) -> Result<ServedPrediction, PredictError> {
        let (key, records) = resolve(request)?;
        serve(key, &records, self.store.get(key))
    }

    /// Same as [`PredictionService::predict`], with a first-time model load
    /// moved off the async runtime
    pub async fn predict_async(
        &self,
        request: PredictRequest<'_>,
    ) -> Result<ServedPrediction, PredictError> {
        let (key, records) = resolve(request)?;
        let artifact = self.store.get_async(key).await;
        serve(key, &records, artifact)
    }
}

/// Check the request in documented order and extract its records
fn resolve(request: PredictRequest<'_>) -> Result<(ModelKey, Vec<FeatureRecord>), PredictError> {
    let body = request
        .body
        .filter(|b| !is_empty_json(b))
        .ok_or(PredictError::NoJson)?;

    let model_name = request
        .model_name
        .filter(|m| !m.is_empty())
        .ok_or(PredictError::MissingModelName)?;

    let algorithm = Algorithm::from_selector(model_name)
        .ok_or_else(|| PredictError::UnsupportedModel(model_name.to_string()))?;
    let key = ModelKey::new(algorithm, request.variant);

    let records = records_from_body(body)?;
    info!(model = %key, records = records.len(), "Received prediction request");

    Ok((key, records))
}

fn serve(
    key: ModelKey,
    records: &[FeatureRecord],
    artifact: Option<Arc<ModelArtifact>>,
) -> Result<ServedPrediction, PredictError> {
    let artifact = artifact.ok_or_else(|| PredictError::ModelUnavailable(key.file_name()))?;
    let batch = artifact.predict_batch(records)?;

    Ok(ServedPrediction {
        key,
        model: key.file_name(),
        prediction: prediction_values(&batch.labels, &batch.probabilities),
        records: records.len(),
    })
}

/// `null`, `false`, `0`, `""`, `[]` and `{}` all count as no input
fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Interpret a request body as feature records.
///
/// Accepts an array of objects, or a single object as a one-record batch.
pub fn records_from_body(body: &Value) -> Result<Vec<FeatureRecord>, PredictError> {
    match body {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_object().cloned().ok_or_else(|| {
                    PredictError::InvalidPayload(format!("Record {i} is not a JSON object."))
                })
            })
            .collect(),
        Value::Object(record) => Ok(vec![record.clone()]),
        _ => Err(PredictError::InvalidPayload(
            "Expected a JSON array of feature records.".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sigmoid, write_linear_classifier};
    use serde_json::json;

    fn write_lr(dir: &std::path::Path) {
        // P(1) = sigmoid(0.12 * LOCATION_TYPE - 0.3 * PREMISES_TYPE - 2)
        write_linear_classifier(&dir.join("lr_model.onnx"), &[0.12, -0.3], -2.0).unwrap();
    }

    fn service(dir: &std::path::Path) -> PredictionService {
        PredictionService::new(Arc::new(ModelStore::new(dir)))
    }

    #[test]
    fn test_successful_prediction() {
        let dir = tempfile::tempdir().unwrap();
        write_lr(dir.path());

        let body = json!([{"LOCATION_TYPE": 35, "PREMISES_TYPE": 1}, {"LOCATION_TYPE": 2, "PREMISES_TYPE": 6}]);
        let served = service(dir.path())
            .predict(PredictRequest {
                variant: Variant::Smote,
                model_name: Some("LogisticRegression"),
                body: Some(&body),
            })
            .unwrap();

        assert_eq!(served.model, "lr_model.onnx");
        assert_eq!(served.records, 2);
        assert_eq!(served.prediction.values, "1, 0");
        // Confidence comes from the first record: 0.12 * 35 - 0.3 - 2 = 1.9
        assert!((served.prediction.confidence - sigmoid(1.9)).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_async_prediction_loads_model() {
        let dir = tempfile::tempdir().unwrap();
        write_lr(dir.path());
        let svc = service(dir.path());
        assert_eq!(svc.store().loaded_count(), 0);

        let body = json!({"LOCATION_TYPE": 2, "PREMISES_TYPE": 6});
        let served = svc
            .predict_async(PredictRequest {
                variant: Variant::Smote,
                model_name: Some("LogisticRegression"),
                body: Some(&body),
            })
            .await
            .unwrap();

        assert_eq!(served.prediction.values, "0");
        assert_eq!(svc.store().loaded_count(), 1);

        let err = svc
            .predict_async(PredictRequest {
                variant: Variant::Smotenc,
                model_name: Some("LogisticRegression"),
                body: Some(&body),
            })
            .await
            .unwrap_err();
        assert_eq!(err, PredictError::ModelUnavailable("lr_model_smotenc.onnx".into()));
    }

    #[test]
    fn test_validation_order() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let body = json!([{"LOCATION_TYPE": 1, "PREMISES_TYPE": 1}]);
        let empty = json!([]);

        let err = svc
            .predict(PredictRequest { variant: Variant::Smote, model_name: None, body: Some(&empty) })
            .unwrap_err();
        assert_eq!(err, PredictError::NoJson);

        let err = svc
            .predict(PredictRequest { variant: Variant::Smote, model_name: Some(""), body: Some(&body) })
            .unwrap_err();
        assert_eq!(err, PredictError::MissingModelName);

        let err = svc
            .predict(PredictRequest { variant: Variant::Smote, model_name: Some("SVC"), body: Some(&body) })
            .unwrap_err();
        assert_eq!(err.to_string(), "Model name 'SVC' is not supported.");
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_missing_artifact_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = json!([{"LOCATION_TYPE": 1, "PREMISES_TYPE": 1}]);
        let err = service(dir.path())
            .predict(PredictRequest {
                variant: Variant::Smotenc,
                model_name: Some("DecisionTreeClassifier"),
                body: Some(&body),
            })
            .unwrap_err();

        assert_eq!(err, PredictError::ModelUnavailable("dt_model_smotenc.onnx".into()));
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_records_from_body() {
        assert_eq!(records_from_body(&json!({"A": 1})).unwrap().len(), 1);
        assert_eq!(records_from_body(&json!([{"A": 1}, {"A": 2}])).unwrap().len(), 2);
        assert!(matches!(
            records_from_body(&json!([1, 2])),
            Err(PredictError::InvalidPayload(_))
        ));
        assert!(matches!(
            records_from_body(&json!("text")),
            Err(PredictError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_empty_json_values() {
        assert!(is_empty_json(&json!(null)));
        assert!(is_empty_json(&json!({})));
        assert!(is_empty_json(&json!([])));
        assert!(is_empty_json(&json!(0)));
        assert!(!is_empty_json(&json!([{}])));
    }
}
