//! Prediction and summary commands against a running API

use anyhow::{bail, Context, Result};
use serde_json::{Map, Number, Value};
use std::path::Path;
use tabled::Tabled;
use toodu_lib::{
    chat::SamplingParams, Algorithm, PredictionResponse, SummaryResponse, Variant,
};

use crate::client::ApiClient;
use crate::output::{color_confidence, print_info, print_rows, OutputFormat};

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Predicted")]
    values: String,
    #[tabled(rename = "P(auto theft)")]
    confidence: String,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
}

/// Route serving a variant's schema
pub fn predict_path(variant: Variant) -> &'static str {
    match variant {
        Variant::Smote => "api/v1/predict",
        Variant::Smotenc => "api/v1/predict/smotenc",
    }
}

/// Parse `KEY=VALUE,KEY=VALUE` into a feature record.
///
/// Values that parse as integers or floats are sent as numbers.
pub fn parse_record(input: &str) -> Result<Map<String, Value>> {
    let mut record = Map::new();

    for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{}'", pair))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("Empty feature name in '{}'", pair);
        }
        record.insert(key.to_string(), parse_value(value.trim()));
    }

    if record.is_empty() {
        bail!("Record '{}' has no features", input);
    }
    Ok(record)
}

fn parse_value(value: &str) -> Value {
    if let Ok(i) = value.parse::<i64>() {
        return Value::from(i);
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Build the request body from a JSON file or `--record` flags
pub fn request_body(file: Option<&Path>, records: &[String]) -> Result<Value> {
    match (file, records.is_empty()) {
        (Some(path), true) => read_json(path),
        (None, false) => records
            .iter()
            .map(|r| parse_record(r).map(Value::Object))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        (Some(_), false) => bail!("Use either --file or --record, not both"),
        (None, true) => bail!("Provide feature records with --file or --record"),
    }
}

pub async fn predict(
    client: &ApiClient,
    model: Algorithm,
    variant: Variant,
    body: &Value,
    format: OutputFormat,
) -> Result<()> {
    let response: PredictionResponse = client
        .post(
            predict_path(variant),
            &[("model_name", model.selector().to_string())],
            body,
        )
        .await?;

    let rows = vec![PredictionRow {
        model: response.model.clone(),
        values: response.prediction.values.clone(),
        confidence: color_confidence(response.prediction.confidence),
        timestamp: response.timestamp.to_rfc3339(),
    }];
    print_rows(rows, &response, format)
}

/// Query parameters for `/summarize`; unset values use the server defaults
pub fn summarize_query(variant: Option<Variant>, sampling: &SamplingParams) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(variant) = variant {
        query.push(("variant", variant.to_string()));
    }
    let floats = [
        ("temperature", sampling.temperature),
        ("top_p", sampling.top_p),
        ("frequency_penalty", sampling.frequency_penalty),
        ("presence_penalty", sampling.presence_penalty),
    ];
    for (name, value) in floats {
        if let Some(value) = value {
            query.push((name, value.to_string()));
        }
    }
    if let Some(max_tokens) = sampling.max_tokens {
        query.push(("max_tokens", max_tokens.to_string()));
    }
    query
}

pub async fn summarize(
    client: &ApiClient,
    file: &Path,
    variant: Option<Variant>,
    sampling: &SamplingParams,
    format: OutputFormat,
) -> Result<()> {
    let payload = read_json(file)?;
    let response: SummaryResponse = client
        .post("api/v1/summarize", &summarize_query(variant, sampling), &payload)
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Table => {
            print_info("Summary");
            println!("{}", response.data.summary);
        }
    }
    Ok(())
}
