//! Prompts for prediction summaries

use super::{ChatMessage, Role};
use crate::models::Variant;
use serde_json::Value;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a data analyst helping the public understand \
predictions about theft incidents in Toronto. You will be given the output of a classifier \
that predicts whether an incident is an auto theft, based on where it happened. Explain the \
prediction and its confidence in two or three short paragraphs of plain language. Do not \
invent data that is not in the input.";

/// User message asking for a summary of `payload`.
///
/// The model name is taken from the payload's `model` field when present.
pub fn summary_message(payload: &Value, variant: Option<Variant>) -> ChatMessage {
    let model = payload
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let data = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());

    let mut content = format!(
        "The predictive model used is `{model}`.\n\n\
         Here is the JSON data you will make an analysis on:\n{data}\n"
    );
    if let Some(variant) = variant {
        content.push_str(&format!(
            "\nThe oversampling technique that was used for this analysis is `{variant}`.\n"
        ));
    }

    ChatMessage::new(Role::User, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_message_mentions_model_and_variant() {
        let payload = json!({"status": 200, "model": "rf_model_smotenc.onnx", "prediction": {"values": "1", "confidence": 0.83}});
        let message = summary_message(&payload, Some(Variant::Smotenc));

        assert_eq!(message.role, Role::User);
        assert!(message.content.contains("`rf_model_smotenc.onnx`"));
        assert!(message.content.contains("\"confidence\": 0.83"));
        assert!(message.content.contains("`smotenc`"));
    }

    #[test]
    fn test_summary_message_without_model() {
        let message = summary_message(&json!([1, 2, 3]), None);
        assert!(message.content.contains("`unknown`"));
        assert!(!message.content.contains("oversampling"));
    }
}
