//! Common types for LLM providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when interacting with a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed stream: {0}")]
    Stream(String),

    #[error("API key not set: environment variable {0} is missing")]
    MissingApiKey(String),
}

impl ProviderError {
    /// Whether a retry could plausibly succeed (model warming up, rate
    /// limiting, transient connectivity).
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Api { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            ProviderError::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Provider trait for hosted LLM backends.
///
/// Implementations stream chat completions and generate embeddings.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stream a chat completion.
    ///
    /// The callback is invoked once per incremental text fragment, in
    /// arrival order.
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        callback: Box<dyn for<'b> FnMut(&'b str) + Send + 'a>,
    ) -> Result<()>;

    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>>;
}

/// Request for chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.5,
            max_tokens: 1024,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}
