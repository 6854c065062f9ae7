//! ONNX model artifacts
//!
//! Each artifact is an exported pipeline (encoder, scaler and classifier)
//! taking one float row of raw schema fields. It must expose a float
//! probability output of shape `[1, n_classes]` and may expose an int64
//! label output; without one the label is the most probable class index.

use crate::models::{ModelKey, Variant};
use crate::predictor::FeatureEncoder;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tract_onnx::prelude::*;

pub(crate) type TractModel =
    SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to read model artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load ONNX model {path:?}: {message}")]
    Model { path: PathBuf, message: String },

    #[error("Invalid model artifact: {0}")]
    Invalid(String),
}

/// Positions of the label and probability tensors among the model outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutputLayout {
    pub label: Option<usize>,
    pub probabilities: usize,
}

/// A loaded, optimized classifier pipeline for one model key
pub struct ModelArtifact {
    pub key: ModelKey,
    pub(crate) model: TractModel,
    pub(crate) outputs: OutputLayout,
}

impl fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelArtifact")
            .field("key", &self.key)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl ModelArtifact {
    pub fn from_path(path: &Path, key: ModelKey) -> Result<Self, ArtifactError> {
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_bytes(&bytes, key).map_err(|e| match e {
            ArtifactError::Model { message, .. } => ArtifactError::Model {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse, shape and optimize an ONNX model for `key`'s input schema
    pub fn from_bytes(bytes: &[u8], key: ModelKey) -> Result<Self, ArtifactError> {
        let width = key.variant.feature_names().len();
        let model_error = |stage: &str, e: TractError| ArtifactError::Model {
            path: PathBuf::from(key.file_name()),
            message: format!("{stage}: {e:#}"),
        };

        let optimized = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(bytes))
            .map_err(|e| model_error("failed to parse ONNX model", e))?
            .with_input_fact(0, f32::fact([1, width]).into())
            .map_err(|e| model_error("failed to set input shape", e))?
            .into_optimized()
            .map_err(|e| model_error("failed to optimize model", e))?;

        let outputs = output_layout(&optimized)?;

        let model = optimized
            .into_runnable()
            .map_err(|e| model_error("failed to create runnable model", e))?;

        Ok(Self { key, model, outputs })
    }

    pub fn variant(&self) -> Variant {
        self.key.variant
    }

    pub fn encoder(&self) -> FeatureEncoder {
        FeatureEncoder::new(self.key.variant)
    }
}

/// Find the probability and label outputs by element type and rank
fn output_layout(model: &TypedModel) -> Result<OutputLayout, ArtifactError> {
    let invalid = |e: TractError| ArtifactError::Invalid(format!("{e:#}"));
    let outlets = model.output_outlets().map_err(invalid)?;

    let mut label = None;
    let mut probabilities = None;
    for (i, outlet) in outlets.iter().enumerate() {
        let fact = model.outlet_fact(*outlet).map_err(invalid)?;
        match fact.datum_type {
            DatumType::F32 if fact.shape.rank() == 2 && probabilities.is_none() => probabilities = Some(i),
            DatumType::I64 if label.is_none() => label = Some(i),
            _ => {}
        }
    }

    let probabilities = probabilities.ok_or_else(|| {
        ArtifactError::Invalid("model has no float32 [1, n_classes] probability output".into())
    })?;

    Ok(OutputLayout { label, probabilities })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Algorithm;
    use crate::testing::linear_classifier;

    fn smote_key() -> ModelKey {
        ModelKey::new(Algorithm::LogisticRegression, Variant::Smote)
    }

    #[test]
    fn test_outputs_located() {
        let artifact = ModelArtifact::from_bytes(&linear_classifier(&[0.5, -0.5], 0.0), smote_key()).unwrap();
        assert_eq!(artifact.outputs, OutputLayout { label: Some(0), probabilities: 1 });
        assert_eq!(artifact.variant(), Variant::Smote);
        assert_eq!(artifact.encoder().width(), 2);
    }

    #[test]
    fn test_schema_width_mismatch_rejected() {
        // A 7-input model cannot be shaped for the 2-field schema
        let bytes = linear_classifier(&[0.1; 7], 0.0);
        assert!(matches!(
            ModelArtifact::from_bytes(&bytes, smote_key()),
            Err(ArtifactError::Model { .. })
        ));

        let key = ModelKey::new(Algorithm::LogisticRegression, Variant::Smotenc);
        assert!(ModelArtifact::from_bytes(&bytes, key).is_ok());
    }

    #[test]
    fn test_from_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.onnx");
        assert!(matches!(
            ModelArtifact::from_path(&missing, smote_key()),
            Err(ArtifactError::Io { .. })
        ));

        let corrupt = dir.path().join("lr_model.onnx");
        std::fs::write(&corrupt, b"\x80\x04\x95pickle").unwrap();
        match ModelArtifact::from_path(&corrupt, smote_key()) {
            Err(ArtifactError::Model { path, .. }) => assert_eq!(path, corrupt),
            other => panic!("expected a model error, got {other:?}"),
        }
    }
}
