//! OpenAI-compatible provider implementation.
//!
//! Speaks the OpenAI wire protocol: streaming chat completions over SSE and
//! the `/embeddings` endpoint. Groq and Hugging Face both serve this
//! protocol, so one client covers chat and embedding backends.

use super::types::*;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// HTTP client for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Creates a provider for the given base URL, reading the API key from
    /// the named environment variable.
    pub fn from_env(base_url: impl Into<String>, api_key_env: &str) -> Result<Self> {
        let api_key = std::env::var(api_key_env)
            .map_err(|_| ProviderError::MissingApiKey(api_key_env.to_string()))?;
        Ok(Self::new(base_url, Some(api_key)))
    }

    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            http_client: reqwest::Client::new(),
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http_client.post(url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.trim());
        }
        builder
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn for<'b> FnMut(&'b str) + Send + 'a>,
    ) -> Result<()> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = CompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        };

        debug!(model = %request.model, messages = request.messages.len(), "Opening chat stream");
        let response = self.request(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message });
        }

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.drain(..=newline_pos).collect::<Vec<_>>();
                let line_str = String::from_utf8_lossy(&line);
                let line_str = line_str.trim();

                // SSE framing: payload lines carry a "data:" prefix,
                // everything else (blank separators, comments) is skipped.
                let Some(data) = line_str.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();

                if data == "[DONE]" {
                    return Ok(());
                }

                let parsed: CompletionChunk = serde_json::from_str(data)
                    .map_err(|e| ProviderError::Stream(format!("bad SSE payload: {e}")))?;

                if let Some(content) = parsed
                    .choices
                    .first()
                    .and_then(|c| c.delta.content.as_deref())
                {
                    if !content.is_empty() {
                        trace!(len = content.len(), "Received stream fragment");
                        callback(content);
                    }
                }
            }
        }

        Ok(())
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);

        let body = EmbeddingRequest { model, input: text };

        let response = self.request(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message });
        }

        let parsed: EmbeddingResponse = response.json().await?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::Stream("no embeddings returned".to_string()))
    }
}

// OpenAI wire types (internal)

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_chunk() {
        let data = r#"{"choices":[{"delta":{"content":"hi"},"finish_reason":null}]}"#;
        let parsed: CompletionChunk = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("hi"));
    }

    #[test]
    fn test_parse_empty_delta() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let parsed: CompletionChunk = serde_json::from_str(data).unwrap();
        assert!(parsed.choices[0].delta.content.is_none());
    }

    #[test]
    fn test_parse_embedding_response() {
        let data = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }

    #[test]
    fn test_transient_errors() {
        let err = ProviderError::Api {
            status: 503,
            message: "model is loading".to_string(),
        };
        assert!(err.is_transient());

        let err = ProviderError::Api {
            status: 401,
            message: "bad key".to_string(),
        };
        assert!(!err.is_transient());
    }
}
