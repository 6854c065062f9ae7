//! Prediction output formatting

use crate::models::PredictionValues;

/// Index of the positive class in `predict_proba` output
const POSITIVE_CLASS: usize = 1;

/// Join predicted labels the way the API reports them: `"1, 0, 1"`
pub fn format_labels(labels: &[i64]) -> String {
    labels
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Probability of the positive class for one row, clamped to [0, 1]
pub fn positive_confidence(probabilities: &[f64]) -> f64 {
    probabilities
        .get(POSITIVE_CLASS)
        .copied()
        .filter(|p| p.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}

/// Package labels and the first row's probabilities
pub fn prediction_values(labels: &[i64], probabilities: &[Vec<f64>]) -> PredictionValues {
    PredictionValues {
        values: format_labels(labels),
        confidence: probabilities
            .first()
            .map(|p| positive_confidence(p))
            .unwrap_or(0.0),
    }
}
