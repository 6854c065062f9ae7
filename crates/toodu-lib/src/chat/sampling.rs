//! Sampling parameters for chat completions

use super::ChatError;
use serde::{Deserialize, Serialize};

/// Optional sampling parameters.
///
/// A value of exactly zero means "unset" and is left out of the outbound
/// request. Negative and non-finite values are rejected by
/// [`SamplingParams::validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
}

impl SamplingParams {
    /// Fill fields missing here from `defaults`
    pub fn or(self, defaults: SamplingParams) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature.or(defaults.temperature),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            top_p: self.top_p.or(defaults.top_p),
            frequency_penalty: self.frequency_penalty.or(defaults.frequency_penalty),
            presence_penalty: self.presence_penalty.or(defaults.presence_penalty),
        }
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        let fields = [
            ("temperature", self.temperature),
            ("max_tokens", self.max_tokens.map(|v| v as f64)),
            ("top_p", self.top_p),
            ("frequency_penalty", self.frequency_penalty),
            ("presence_penalty", self.presence_penalty),
        ];

        for (name, value) in fields {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(ChatError::InvalidParameter { name, value });
                }
            }
        }
        Ok(())
    }

    /// Copy with zero-valued fields removed
    pub fn without_zeros(self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature.filter(|v| *v != 0.0),
            max_tokens: self.max_tokens.filter(|v| *v != 0),
            top_p: self.top_p.filter(|v| *v != 0.0),
            frequency_penalty: self.frequency_penalty.filter(|v| *v != 0.0),
            presence_penalty: self.presence_penalty.filter(|v| *v != 0.0),
        }
    }
}
