//! HTTP client for the chat completion endpoint

use super::{ChatError, SamplingParams, DEFAULT_SYSTEM_PROMPT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Chat client configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the API, e.g. `https://openrouter.ai/api/v1`
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            model: "google/gemini-flash-1.5-exp".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Body of `POST {base}/chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub sampling: SamplingParams,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for an OpenAI-compatible chat completion API
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        let http = Client::builder().timeout(config.timeout).build()?;

        let mut base = Url::parse(&config.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("chat/completions")?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key,
            model: config.model,
            system_prompt: config.system_prompt,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Build the outbound request: system prompt first, zero parameters dropped
    pub fn build_request(
        &self,
        messages: &[ChatMessage],
        sampling: &SamplingParams,
    ) -> Result<ChatCompletionRequest, ChatError> {
        sampling.validate()?;

        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(ChatMessage::new(Role::System, self.system_prompt.clone()));
        all.extend_from_slice(messages);

        Ok(ChatCompletionRequest {
            model: self.model.clone(),
            messages: all,
            sampling: sampling.without_zeros(),
        })
    }

    /// Request a completion and return the text of the first choice
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        sampling: &SamplingParams,
    ) -> Result<String, ChatError> {
        let request = self.build_request(messages, sampling)?;
        let start = Instant::now();

        let mut builder = self.http.post(self.endpoint.clone()).json(&request);
        if self.has_api_key() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            error!(error = %e, endpoint = %self.endpoint, "Error creating chat completion");
            ChatError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            error!(status = status.as_u16(), message = %message, "Chat API returned an error");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        if let Some(err) = completion.error {
            error!(message = %err.message, "Chat API reported an error");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: err.message,
            });
        }

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ChatError::EmptyResponse)?;

        debug!(
            elapsed_ms = start.elapsed().as_millis(),
            model = %self.model,
            "Chat completion received"
        );
        Ok(content)
    }
}
