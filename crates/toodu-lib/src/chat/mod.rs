//! Client for OpenAI-compatible chat completion APIs
//!
//! Used to turn prediction results into short natural-language summaries.

mod client;
mod prompt;
mod sampling;

pub use client::{ChatClient, ChatCompletionRequest, ChatConfig, ChatMessage, Role};
pub use prompt::{summary_message, DEFAULT_SYSTEM_PROMPT};
pub use sampling::SamplingParams;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Invalid value for '{name}': {value}. Sampling parameters must be finite and non-negative.")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Invalid chat API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Error creating chat completion: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Chat API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Chat API returned no completion choices")]
    EmptyResponse,
}

impl ChatError {
    /// HTTP status this error is reported with
    pub fn status(&self) -> u16 {
        match self {
            ChatError::InvalidParameter { .. } => 400,
            _ => 500,
        }
    }
}
