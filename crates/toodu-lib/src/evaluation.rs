//! Offline evaluation of an artifact against labelled records
//!
//! Computes the metrics the dashboard showed: accuracy, binary precision,
//! recall and F1 for the positive label, the confusion matrix, and a
//! classification report with per-class rows plus macro and weighted
//! averages. Divisions by zero score 0.

use crate::models::FeatureRecord;
use crate::predictor::{PredictError, Predictor};
use crate::store::ModelArtifact;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Label the binary metrics treat as positive
pub const POSITIVE_LABEL: i64 = 1;

/// One labelled sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelledRecord {
    pub features: FeatureRecord,
    pub label: i64,
}

/// 2x2 confusion matrix, rows = actual, columns = predicted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
    pub true_positive: u64,
}

impl ConfusionMatrix {
    pub fn from_labels(actual: &[i64], predicted: &[i64], positive: i64) -> Self {
        let mut m = ConfusionMatrix::default();
        for (a, p) in actual.iter().zip(predicted) {
            match (*a == positive, *p == positive) {
                (false, false) => m.true_negative += 1,
                (false, true) => m.false_positive += 1,
                (true, false) => m.false_negative += 1,
                (true, true) => m.true_positive += 1,
            }
        }
        m
    }

    pub fn total(&self) -> u64 {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_negative + self.true_positive, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn f1(&self) -> f64 {
        f1_score(self.precision(), self.recall())
    }
}

/// Zero when the denominator is zero
fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// One row of the classification report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: i64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of samples whose actual label is this class
    pub support: u64,
}

/// Averaged precision, recall and F1 over all classes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u64,
}

/// Per-class metrics with macro and support-weighted averages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
}

impl ClassificationReport {
    /// Build the report over every label seen in either sequence, in
    /// ascending order
    pub fn from_labels(actual: &[i64], predicted: &[i64]) -> Self {
        let labels: BTreeSet<i64> = actual.iter().chain(predicted).copied().collect();

        let classes: Vec<ClassMetrics> = labels
            .into_iter()
            .map(|label| {
                let m = ConfusionMatrix::from_labels(actual, predicted, label);
                ClassMetrics {
                    label,
                    precision: m.precision(),
                    recall: m.recall(),
                    f1: m.f1(),
                    support: m.true_positive + m.false_negative,
                }
            })
            .collect();

        let support: u64 = classes.iter().map(|c| c.support).sum();
        let n = classes.len() as f64;
        let mean = |metric: fn(&ClassMetrics) -> f64| {
            if classes.is_empty() {
                0.0
            } else {
                classes.iter().map(metric).sum::<f64>() / n
            }
        };
        let weighted = |metric: fn(&ClassMetrics) -> f64| {
            if support == 0 {
                0.0
            } else {
                classes
                    .iter()
                    .map(|c| metric(c) * c.support as f64)
                    .sum::<f64>()
                    / support as f64
            }
        };

        let macro_avg = AveragedMetrics {
            precision: mean(|c| c.precision),
            recall: mean(|c| c.recall),
            f1: mean(|c| c.f1),
            support,
        };
        let weighted_avg = AveragedMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
            support,
        };

        Self {
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub samples: usize,
    pub positive_label: i64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
}

/// Score `artifact` on `records`
pub fn evaluate(
    artifact: &ModelArtifact,
    records: &[LabelledRecord],
) -> Result<EvaluationReport, PredictError> {
    let features: Vec<FeatureRecord> = records.iter().map(|r| r.features.clone()).collect();
    let actual: Vec<i64> = records.iter().map(|r| r.label).collect();

    let batch = artifact.predict_batch(&features)?;
    Ok(report_for(&actual, &batch.labels))
}

fn report_for(actual: &[i64], predicted: &[i64]) -> EvaluationReport {
    let confusion = ConfusionMatrix::from_labels(actual, predicted, POSITIVE_LABEL);
    let correct = actual.iter().zip(predicted).filter(|(a, p)| a == p).count() as u64;

    EvaluationReport {
        samples: actual.len(),
        positive_label: POSITIVE_LABEL,
        accuracy: ratio(correct, actual.len() as u64),
        precision: confusion.precision(),
        recall: confusion.recall(),
        f1: confusion.f1(),
        confusion,
        report: ClassificationReport::from_labels(actual, predicted),
    }
}

/// Parse a JSON-lines dataset, skipping blank lines
pub fn parse_jsonl(input: &str) -> Result<Vec<LabelledRecord>, serde_json::Error> {
    input
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}
