//! Commands that work on artifacts directly, without a running API

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;
use toodu_lib::{
    evaluation::{evaluate, parse_jsonl, ClassificationReport, EvaluationReport},
    store::ModelStore,
    Algorithm, ModelKey, Variant,
};

use crate::output::{color_score, color_status, print_info, print_rows, print_warning, OutputFormat};

#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Variant")]
    variant: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

#[derive(Serialize)]
struct ArtifactSummary {
    file: String,
    model: Algorithm,
    variant: Variant,
    loaded: bool,
    error: Option<String>,
}

/// List the six artifacts and whether each one loads
pub fn list_models(models_dir: &Path, format: OutputFormat) -> Result<()> {
    let store = ModelStore::new(models_dir);
    let statuses = store.statuses();

    let summaries: Vec<ArtifactSummary> = statuses
        .iter()
        .map(|s| ArtifactSummary {
            file: s.key.file_name(),
            model: s.key.algorithm,
            variant: s.key.variant,
            loaded: s.error.is_none(),
            error: s.error.clone(),
        })
        .collect();

    let rows: Vec<ArtifactRow> = statuses
        .iter()
        .map(|s| {
            let status = match &s.error {
                None => "loaded",
                Some(_) if !s.path.exists() => "missing",
                Some(_) => "invalid",
            };
            ArtifactRow {
                file: s.key.file_name(),
                model: s.key.algorithm.to_string(),
                variant: s.key.variant.to_string(),
                status: color_status(status),
                detail: s.error.clone().unwrap_or_default(),
            }
        })
        .collect();

    let loaded = summaries.iter().filter(|s| s.loaded).count();
    print_rows(rows, &summaries, format)?;
    if let OutputFormat::Table = format {
        if loaded < summaries.len() {
            print_warning(&format!(
                "{}/{} artifacts load from {}",
                loaded,
                summaries.len(),
                models_dir.display()
            ));
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "")]
    class: String,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "F1")]
    f1: String,
    #[tabled(rename = "Support")]
    support: u64,
}

impl ReportRow {
    fn new(class: String, precision: f64, recall: f64, f1: f64, support: u64) -> Self {
        Self {
            class,
            precision: format!("{:.2}", precision),
            recall: format!("{:.2}", recall),
            f1: format!("{:.2}", f1),
            support,
        }
    }
}

/// Rows of the classification report: one per class, then the averages
fn report_rows(report: &ClassificationReport) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = report
        .classes
        .iter()
        .map(|c| ReportRow::new(c.label.to_string(), c.precision, c.recall, c.f1, c.support))
        .collect();

    for (name, avg) in [("macro avg", report.macro_avg), ("weighted avg", report.weighted_avg)] {
        rows.push(ReportRow::new(name.to_string(), avg.precision, avg.recall, avg.f1, avg.support));
    }
    rows
}

#[derive(Tabled)]
struct ConfusionRow {
    #[tabled(rename = "")]
    actual: &'static str,
    #[tabled(rename = "Predicted negative")]
    negative: u64,
    #[tabled(rename = "Predicted positive")]
    positive: u64,
}

/// Evaluate one artifact on a labelled JSON-lines dataset
pub fn evaluate_model(
    models_dir: &Path,
    key: ModelKey,
    dataset: &Path,
    format: OutputFormat,
) -> Result<EvaluationReport> {
    let store = ModelStore::new(models_dir);
    let artifact = store
        .try_load(key)
        .with_context(|| format!("Failed to load {}", key))?;

    let contents = std::fs::read_to_string(dataset)
        .with_context(|| format!("Failed to read {}", dataset.display()))?;
    let records = parse_jsonl(&contents)
        .with_context(|| format!("{} is not a valid JSON-lines dataset", dataset.display()))?;
    if records.is_empty() {
        anyhow::bail!("{} contains no records", dataset.display());
    }

    let report = evaluate(&artifact, &records)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            print_info(&format!(
                "{} on {} samples (positive label {})",
                key, report.samples, report.positive_label
            ));
            let metrics = vec![
                MetricRow { metric: "Accuracy", value: color_score(report.accuracy) },
                MetricRow { metric: "Precision", value: color_score(report.precision) },
                MetricRow { metric: "Recall", value: color_score(report.recall) },
                MetricRow { metric: "F1", value: color_score(report.f1) },
            ];
            print_rows(metrics, &report, format)?;

            let c = report.confusion;
            let confusion = vec![
                ConfusionRow { actual: "Actual negative", negative: c.true_negative, positive: c.false_positive },
                ConfusionRow { actual: "Actual positive", negative: c.false_negative, positive: c.true_positive },
            ];
            print_rows(confusion, &c, format)?;

            print_rows(report_rows(&report.report), &report.report, format)?;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use toodu_lib::testing::write_linear_classifier;

    fn write_lr(dir: &Path) {
        write_linear_classifier(&dir.join("lr_model.onnx"), &[1.0, 0.0], -5.0).unwrap();
    }

    #[test]
    fn test_evaluate_model() {
        let dir = tempfile::tempdir().unwrap();
        write_lr(dir.path());

        // Predicts 1 when LOCATION_TYPE > 5
        let dataset = dir.path().join("holdout.jsonl");
        let lines = [
            json!({"features": {"LOCATION_TYPE": 9, "PREMISES_TYPE": 1}, "label": 1}),
            json!({"features": {"LOCATION_TYPE": 8, "PREMISES_TYPE": 1}, "label": 0}),
            json!({"features": {"LOCATION_TYPE": 1, "PREMISES_TYPE": 1}, "label": 0}),
            json!({"features": {"LOCATION_TYPE": 2, "PREMISES_TYPE": 1}, "label": 1}),
        ];
        let body: Vec<String> = lines.iter().map(Value::to_string).collect();
        std::fs::write(&dataset, body.join("\n")).unwrap();

        let key = ModelKey::new(Algorithm::LogisticRegression, Variant::Smote);
        let report = evaluate_model(dir.path(), key, &dataset, OutputFormat::Json).unwrap();

        assert_eq!(report.samples, 4);
        assert_eq!(report.confusion.true_positive, 1);
        assert_eq!(report.confusion.false_positive, 1);
        assert_eq!(report.confusion.true_negative, 1);
        assert_eq!(report.confusion.false_negative, 1);
        assert_eq!(report.accuracy, 0.5);
        assert_eq!(report.report.classes.len(), 2);
    }

    #[test]
    fn test_report_rows() {
        let report = ClassificationReport::from_labels(&[0, 0, 0, 0, 1], &[0, 0, 0, 1, 1]);
        let rows = report_rows(&report);

        let names: Vec<&str> = rows.iter().map(|r| r.class.as_str()).collect();
        assert_eq!(names, vec!["0", "1", "macro avg", "weighted avg"]);
        assert_eq!(rows[0].precision, "1.00");
        assert_eq!(rows[0].recall, "0.75");
        assert_eq!(rows[1].f1, "0.67");
        assert_eq!(rows[1].support, 1);
        assert_eq!(rows[2].precision, "0.75");
        assert_eq!(rows[3].support, 5);
    }

    #[test]
    fn test_evaluate_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("holdout.jsonl");
        std::fs::write(&dataset, "").unwrap();

        let key = ModelKey::new(Algorithm::RandomForest, Variant::Smotenc);
        let err = evaluate_model(dir.path(), key, &dataset, OutputFormat::Json).unwrap_err();
        assert!(err.to_string().contains("RandomForestClassifier (smotenc)"));
    }

    #[test]
    fn test_list_models_with_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_models(dir.path(), OutputFormat::Json).is_ok());
    }
}
