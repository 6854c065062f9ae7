//! Service configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use toodu_lib::chat::{ChatConfig, SamplingParams, DEFAULT_SYSTEM_PROMPT};

/// Service configuration, read from `TOODU_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the six model artifacts
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Load all artifacts at start-up instead of on first use
    #[serde(default = "default_preload_models")]
    pub preload_models: bool,

    /// Base URL of the OpenAI-compatible chat API
    #[serde(default = "default_chat_api_url")]
    pub chat_api_url: String,

    #[serde(default = "default_chat_api_key")]
    pub chat_api_key: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_chat_timeout_secs")]
    pub chat_timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default)]
    pub frequency_penalty: f64,

    #[serde(default)]
    pub presence_penalty: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    std::env::var("FLASK_RUN_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000)
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("server/models")
}

fn default_preload_models() -> bool {
    true
}

fn default_chat_api_url() -> String {
    std::env::var("OPENROUTER_API_URL").unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string())
}

fn default_chat_api_key() -> String {
    std::env::var("OPENROUTER_API_KEY").unwrap_or_default()
}

fn default_chat_model() -> String {
    std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| "google/gemini-flash-1.5-exp".to_string())
}

fn default_chat_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f64 {
    1.0
}

fn default_max_tokens() -> i64 {
    256
}

fn default_top_p() -> f64 {
    1.0
}

impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix("TOODU"))
    }

    /// Load configuration from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix("TOODU").source(Some(vars)))
    }

    fn from_environment(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let config: ServiceConfig = config
            .try_deserialize()
            .context("Invalid TOODU_* configuration")?;

        config
            .default_sampling()
            .validate()
            .context("Invalid default sampling parameters")?;

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            base_url: self.chat_api_url.clone(),
            api_key: self.chat_api_key.clone(),
            model: self.chat_model.clone(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout: Duration::from_secs(self.chat_timeout_secs),
        }
    }

    /// Sampling parameters used when a request does not override them
    pub fn default_sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            top_p: Some(self.top_p),
            frequency_penalty: Some(self.frequency_penalty),
            presence_penalty: Some(self.presence_penalty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_vars(HashMap::new()).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.models_dir, PathBuf::from("server/models"));
        assert!(config.preload_models);
        assert_eq!(config.chat_timeout_secs, 60);

        let sampling = config.default_sampling();
        assert_eq!(sampling.temperature, Some(1.0));
        assert_eq!(sampling.max_tokens, Some(256));
        assert_eq!(sampling.frequency_penalty, Some(0.0));
    }

    #[test]
    fn test_prefixed_overrides() {
        let config = ServiceConfig::from_vars(vars(&[
            ("TOODU_PORT", "8088"),
            ("TOODU_MODELS_DIR", "/srv/models"),
            ("TOODU_PRELOAD_MODELS", "false"),
            ("TOODU_CHAT_API_URL", "http://localhost:9000/v1"),
            ("TOODU_CHAT_MODEL", "local/model"),
            ("TOODU_TEMPERATURE", "0.2"),
            ("TOODU_MAX_TOKENS", "512"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:8088");
        assert_eq!(config.models_dir, PathBuf::from("/srv/models"));
        assert!(!config.preload_models);
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_tokens, 512);

        let chat = config.chat_config();
        assert_eq!(chat.base_url, "http://localhost:9000/v1");
        assert_eq!(chat.model, "local/model");
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        assert!(ServiceConfig::from_vars(vars(&[("TOODU_PORT", "not-a-port")])).is_err());
    }

    #[test]
    fn test_invalid_default_sampling_rejected() {
        let err = ServiceConfig::from_vars(vars(&[("TOODU_TEMPERATURE", "-0.5")])).unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("Invalid default sampling parameters"), "{chain}");
        assert!(chain.contains("temperature"), "{chain}");

        assert!(ServiceConfig::from_vars(vars(&[("TOODU_TOP_P", "inf")])).is_err());
        assert!(ServiceConfig::from_vars(vars(&[("TOODU_MAX_TOKENS", "-1")])).is_err());
    }
}
