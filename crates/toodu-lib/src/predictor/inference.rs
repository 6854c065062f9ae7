//! ONNX inference using tract
//!
//! Records are scored one row at a time against the `[1, n_features]` input
//! the model was shaped for at load time.

use super::{PredictError, Predictor};
use crate::models::FeatureRecord;
use crate::store::ModelArtifact;
use std::time::Instant;
use thiserror::Error;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Batch latency above which a warning is logged
pub const MAX_INFERENCE_MS: u128 = 50;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InferenceError {
    #[error("Failed to build model input: {0}")]
    Input(String),

    #[error("Model execution failed: {0}")]
    Execution(String),

    #[error("Model produced an invalid probability distribution.")]
    InvalidProbabilities,
}

/// Raw output of a batch prediction
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPrediction {
    pub labels: Vec<i64>,
    pub probabilities: Vec<Vec<f64>>,
}

impl ModelArtifact {
    /// Run the model on one encoded row, returning its label and class
    /// probabilities
    pub fn run_row(&self, row: Vec<f32>) -> Result<(i64, Vec<f64>), InferenceError> {
        let width = row.len();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, width), row)
            .map_err(|e| InferenceError::Input(e.to_string()))?
            .into();

        let result = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Execution(format!("{e:#}")))?;

        let probabilities: Vec<f64> = result
            .get(self.outputs.probabilities)
            .ok_or(InferenceError::InvalidProbabilities)?
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Execution(format!("{e:#}")))?
            .iter()
            .map(|p| *p as f64)
            .collect();

        if probabilities.is_empty() || probabilities.iter().any(|p| !p.is_finite()) {
            return Err(InferenceError::InvalidProbabilities);
        }

        let label = match self.outputs.label {
            Some(index) => result
                .get(index)
                .ok_or(InferenceError::InvalidProbabilities)?
                .to_array_view::<i64>()
                .map_err(|e| InferenceError::Execution(format!("{e:#}")))?
                .iter()
                .next()
                .copied()
                .ok_or(InferenceError::InvalidProbabilities)?,
            None => argmax(&probabilities).ok_or(InferenceError::InvalidProbabilities)? as i64,
        };

        Ok((label, probabilities))
    }
}

/// Index of the largest value, first one on ties
fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
            Some((_, b)) if *v <= b => best,
            _ => Some((i, *v)),
        })
        .map(|(i, _)| i)
}

impl Predictor for ModelArtifact {
    fn predict_batch(&self, records: &[FeatureRecord]) -> Result<BatchPrediction, PredictError> {
        let start = Instant::now();
        let rows = self.encoder().encode_batch(records)?;

        let mut labels = Vec::with_capacity(rows.len());
        let mut probabilities = Vec::with_capacity(rows.len());
        for row in rows {
            let (label, proba) = self.run_row(row)?;
            labels.push(label);
            probabilities.push(proba);
        }

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(
                model = %self.key,
                elapsed_ms = elapsed.as_millis(),
                rows = labels.len(),
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(model = %self.key, elapsed_us = elapsed.as_micros(), rows = labels.len(), "Inference completed");
        }

        Ok(BatchPrediction { labels, probabilities })
    }
}
