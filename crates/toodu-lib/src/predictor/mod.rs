//! Prediction engine: feature extraction, ONNX inference and result packaging

mod features;
mod inference;
mod output;
mod service;

pub use features::{EncodeError, FeatureEncoder};
pub use inference::{BatchPrediction, InferenceError, MAX_INFERENCE_MS};
pub use output::{format_labels, positive_confidence};
pub use service::{records_from_body, PredictRequest, PredictionService, ServedPrediction};

use crate::models::FeatureRecord;
use thiserror::Error;

/// Failures of the prediction path, split by who is at fault
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PredictError {
    #[error("No JSON was provided in the request.")]
    NoJson,

    #[error("No model name was provided in the request.")]
    MissingModelName,

    #[error("Model name '{0}' is not supported.")]
    UnsupportedModel(String),

    #[error("{0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Model artifact '{0}' could not be loaded.")]
    ModelUnavailable(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PredictError {
    /// HTTP status this error is reported with
    pub fn status(&self) -> u16 {
        match self {
            PredictError::NoJson
            | PredictError::MissingModelName
            | PredictError::UnsupportedModel(_)
            | PredictError::InvalidPayload(_)
            | PredictError::Encode(_) => 400,
            PredictError::ModelUnavailable(_) | PredictError::Inference(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status() < 500
    }
}

/// Trait for anything that can score a batch of feature records
pub trait Predictor: Send + Sync {
    fn predict_batch(&self, records: &[FeatureRecord]) -> Result<BatchPrediction, PredictError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(PredictError::NoJson.status(), 400);
        assert_eq!(PredictError::UnsupportedModel("SVC".into()).status(), 400);
        assert_eq!(PredictError::ModelUnavailable("lr_model.onnx".into()).status(), 500);
        assert_eq!(
            PredictError::Inference(InferenceError::InvalidProbabilities).status(),
            500
        );
        assert!(PredictError::MissingModelName.is_client_error());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            PredictError::UnsupportedModel("SVC".into()).to_string(),
            "Model name 'SVC' is not supported."
        );
        assert_eq!(PredictError::NoJson.to_string(), "No JSON was provided in the request.");
    }
}
