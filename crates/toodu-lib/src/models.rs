//! Core data models for the prediction service
//!
//! Covers the request side (feature records, model selectors) and the JSON
//! envelopes returned by the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single input row: feature name to value
pub type FeatureRecord = serde_json::Map<String, serde_json::Value>;

/// Fields of the 2-feature schema
pub const SMOTE_FEATURES: &[&str] = &["LOCATION_TYPE", "PREMISES_TYPE"];

/// Fields of the 7-feature schema
pub const SMOTENC_FEATURES: &[&str] = &[
    "LOCATION_TYPE",
    "PREMISES_TYPE",
    "HOOD_158",
    "LONG_WGS84",
    "LAT_WGS84",
    "OCC_HOUR",
    "REPORT_HOUR",
];

/// Fields holding label-encoded categories rather than measurements
pub const CATEGORICAL_FEATURES: &[&str] = &["LOCATION_TYPE", "PREMISES_TYPE", "HOOD_158"];

/// Oversampling technique the model was trained with.
///
/// Only used at inference time to pick the artifact and the input schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Smote,
    Smotenc,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Smote, Variant::Smotenc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Smote => "smote",
            Variant::Smotenc => "smotenc",
        }
    }

    pub fn feature_names(&self) -> &'static [&'static str] {
        match self {
            Variant::Smote => SMOTE_FEATURES,
            Variant::Smotenc => SMOTENC_FEATURES,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown oversampling variant '{0}', expected 'smote' or 'smotenc'.")]
pub struct UnknownVariant(pub String);

impl FromStr for Variant {
    type Err = UnknownVariant;

    /// Accepts the lowercase and uppercase spellings only ("smote", "SMOTE", ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smote" | "SMOTE" => Ok(Variant::Smote),
            "smotenc" | "SMOTENC" => Ok(Variant::Smotenc),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Classifier family, addressed by its scikit-learn class name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    LogisticRegression,
    #[serde(rename = "DecisionTreeClassifier")]
    DecisionTree,
    #[serde(rename = "RandomForestClassifier")]
    RandomForest,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::LogisticRegression,
        Algorithm::DecisionTree,
        Algorithm::RandomForest,
    ];

    /// Value accepted by the `model_name` query parameter
    pub fn selector(&self) -> &'static str {
        match self {
            Algorithm::LogisticRegression => "LogisticRegression",
            Algorithm::DecisionTree => "DecisionTreeClassifier",
            Algorithm::RandomForest => "RandomForestClassifier",
        }
    }

    pub fn from_selector(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.selector() == name)
    }

    fn file_prefix(&self) -> &'static str {
        match self {
            Algorithm::LogisticRegression => "lr",
            Algorithm::DecisionTree => "dt",
            Algorithm::RandomForest => "rf",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

/// Identifies one of the six artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub algorithm: Algorithm,
    pub variant: Variant,
}

impl ModelKey {
    pub fn new(algorithm: Algorithm, variant: Variant) -> Self {
        Self { algorithm, variant }
    }

    pub fn all() -> impl Iterator<Item = ModelKey> {
        Variant::ALL.into_iter().flat_map(|variant| {
            Algorithm::ALL
                .into_iter()
                .map(move |algorithm| ModelKey::new(algorithm, variant))
        })
    }

    /// Artifact file name, e.g. `lr_model.onnx` or `rf_model_smotenc.onnx`
    pub fn file_name(&self) -> String {
        match self.variant {
            Variant::Smote => format!("{}_model.onnx", self.algorithm.file_prefix()),
            Variant::Smotenc => format!("{}_model_smotenc.onnx", self.algorithm.file_prefix()),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.algorithm, self.variant)
    }
}

/// Predicted labels and positive-class probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionValues {
    pub values: String,
    pub confidence: f64,
}

/// Successful `/predict` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub status: u16,
    pub prediction: PredictionValues,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub error: String,
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Error envelope shared by all API routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
    pub data: ErrorData,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(
        status: u16,
        message: impl Into<String>,
        error: impl Into<String>,
        model: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            status,
            message: message.into(),
            data: ErrorData {
                error: error.into(),
                model,
                timestamp: now,
            },
            timestamp: now,
        }
    }
}

/// `GET /api/v1/` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub status: u16,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryData {
    pub summary: String,
}

/// Successful `/summarize` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub status: u16,
    pub data: SummaryData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_parsing_accepts_both_cases() {
        assert_eq!("smote".parse::<Variant>().unwrap(), Variant::Smote);
        assert_eq!("SMOTE".parse::<Variant>().unwrap(), Variant::Smote);
        assert_eq!("smotenc".parse::<Variant>().unwrap(), Variant::Smotenc);
        assert_eq!("SMOTENC".parse::<Variant>().unwrap(), Variant::Smotenc);
        assert!("Smote".parse::<Variant>().is_err());
        assert!("adasyn".parse::<Variant>().is_err());
    }

    #[test]
    fn test_algorithm_selectors() {
        assert_eq!(
            Algorithm::from_selector("LogisticRegression"),
            Some(Algorithm::LogisticRegression)
        );
        assert_eq!(
            Algorithm::from_selector("RandomForestClassifier"),
            Some(Algorithm::RandomForest)
        );
        assert_eq!(Algorithm::from_selector("SVC"), None);
        assert_eq!(Algorithm::from_selector("logisticregression"), None);
    }

    #[test]
    fn test_artifact_file_names() {
        let names: Vec<String> = ModelKey::all().map(|k| k.file_name()).collect();
        assert_eq!(
            names,
            vec![
                "lr_model.onnx",
                "dt_model.onnx",
                "rf_model.onnx",
                "lr_model_smotenc.onnx",
                "dt_model_smotenc.onnx",
                "rf_model_smotenc.onnx",
            ]
        );
    }

    #[test]
    fn test_schema_widths() {
        assert_eq!(Variant::Smote.feature_names().len(), 2);
        assert_eq!(Variant::Smotenc.feature_names().len(), 7);
    }

    #[test]
    fn test_error_envelope_shape() {
        let envelope = ErrorResponse::new(400, "failed", "boom", None);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], 400);
        assert_eq!(json["data"]["error"], "boom");
        assert!(json["data"]["model"].is_null());
        assert!(json["timestamp"].is_string());
    }
}
