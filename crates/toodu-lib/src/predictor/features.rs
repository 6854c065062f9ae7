//! Feature extraction for ML inference
//!
//! Turns JSON feature records into the dense float rows the exported models
//! take: one value per schema field, in schema order. Categorical fields
//! carry their label-encoded integer; one-hot encoding and scaling happen
//! inside the model graph.

use crate::models::{FeatureRecord, Variant, CATEGORICAL_FEATURES};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EncodeError {
    #[error("Record {index} is missing feature '{name}'.")]
    MissingField { index: usize, name: String },

    #[error("Record {index} has a non-numeric value for feature '{name}': {value}")]
    NotNumeric {
        index: usize,
        name: String,
        value: String,
    },

    #[error("Record {index} has a non-integer category for feature '{name}': {value}")]
    NotCategorical {
        index: usize,
        name: String,
        value: String,
    },
}

/// Extracts model input rows for one schema variant
#[derive(Debug, Clone, Copy)]
pub struct FeatureEncoder {
    fields: &'static [&'static str],
}

impl FeatureEncoder {
    pub fn new(variant: Variant) -> Self {
        Self {
            fields: variant.feature_names(),
        }
    }

    /// Number of values produced per record
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn encode(&self, index: usize, record: &FeatureRecord) -> Result<Vec<f32>, EncodeError> {
        self.fields
            .iter()
            .map(|&name| {
                let value = record.get(name).ok_or_else(|| EncodeError::MissingField {
                    index,
                    name: name.to_string(),
                })?;

                if CATEGORICAL_FEATURES.contains(&name) {
                    categorical_value(index, name, value).map(|v| v as f32)
                } else {
                    numeric_value(index, name, value).map(|v| v as f32)
                }
            })
            .collect()
    }

    pub fn encode_batch(&self, records: &[FeatureRecord]) -> Result<Vec<Vec<f32>>, EncodeError> {
        records
            .iter()
            .enumerate()
            .map(|(i, r)| self.encode(i, r))
            .collect()
    }
}

fn numeric_value(index: usize, name: &str, value: &Value) -> Result<f64, EncodeError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| EncodeError::NotNumeric {
            index,
            name: name.to_string(),
            value: value.to_string(),
        })
}

fn categorical_value(index: usize, name: &str, value: &Value) -> Result<i64, EncodeError> {
    let not_categorical = || EncodeError::NotCategorical {
        index,
        name: name.to_string(),
        value: value.to_string(),
    };

    match value {
        Value::Number(n) => match n.as_i64() {
            Some(v) => Ok(v),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
                .ok_or_else(not_categorical),
        },
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| not_categorical()),
        _ => Err(not_categorical()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> FeatureRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_smote_row_in_schema_order() {
        let encoder = FeatureEncoder::new(Variant::Smote);
        let row = encoder
            .encode(0, &record(json!({"PREMISES_TYPE": 1, "LOCATION_TYPE": 3, "EXTRA": "ignored"})))
            .unwrap();
        assert_eq!(row, vec![3.0, 1.0]);
        assert_eq!(encoder.width(), 2);
    }

    #[test]
    fn test_smotenc_row() {
        let encoder = FeatureEncoder::new(Variant::Smotenc);
        let row = encoder
            .encode(
                0,
                &record(json!({
                    "LOCATION_TYPE": 4, "PREMISES_TYPE": 2, "HOOD_158": 77,
                    "LONG_WGS84": -79.5, "LAT_WGS84": 43.75, "OCC_HOUR": 14, "REPORT_HOUR": 16
                })),
            )
            .unwrap();
        assert_eq!(row, vec![4.0, 2.0, 77.0, -79.5, 43.75, 14.0, 16.0]);
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        let encoder = FeatureEncoder::new(Variant::Smote);

        let missing = encoder.encode(2, &record(json!({"LOCATION_TYPE": 1}))).unwrap_err();
        assert_eq!(
            missing,
            EncodeError::MissingField { index: 2, name: "PREMISES_TYPE".into() }
        );

        let fractional = encoder
            .encode(0, &record(json!({"LOCATION_TYPE": 1.5, "PREMISES_TYPE": 1})))
            .unwrap_err();
        assert!(matches!(fractional, EncodeError::NotCategorical { .. }));

        let encoder = FeatureEncoder::new(Variant::Smotenc);
        let not_numeric = encoder
            .encode(
                0,
                &record(json!({
                    "LOCATION_TYPE": 4, "PREMISES_TYPE": 2, "HOOD_158": 77,
                    "LONG_WGS84": -79.5, "LAT_WGS84": 43.75, "OCC_HOUR": "noon", "REPORT_HOUR": 16
                })),
            )
            .unwrap_err();
        assert!(matches!(not_numeric, EncodeError::NotNumeric { ref name, .. } if name == "OCC_HOUR"));
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let encoder = FeatureEncoder::new(Variant::Smote);
        let row = encoder
            .encode(0, &record(json!({"LOCATION_TYPE": "7", "PREMISES_TYPE": " 2 "})))
            .unwrap();
        assert_eq!(row, vec![7.0, 2.0]);

        let batch = encoder
            .encode_batch(&[
                record(json!({"LOCATION_TYPE": 1, "PREMISES_TYPE": 2})),
                record(json!({"LOCATION_TYPE": 3, "PREMISES_TYPE": 4})),
            ])
            .unwrap();
        assert_eq!(batch, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }
}
