use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid chunk window: chunk_size {chunk_size} must be greater than chunk_overlap {chunk_overlap}")]
    InvalidChunkWindow {
        chunk_size: usize,
        chunk_overlap: usize,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole engine.
///
/// This covers the chat model, the embedding backend, retrieval behavior and
/// where the vector snapshot lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Configuration for the chat completion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Default model id, used when a request does not name one.
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completion API.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Configuration for the embedding backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Base URL of an OpenAI-compatible embeddings API.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

/// Configuration for chunking and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Chunk window size in characters.
    pub chunk_size: usize,
    /// Characters shared between successive chunks.
    pub chunk_overlap: usize,
    /// Trimmed chunks shorter than this are dropped as noise.
    #[serde(default = "default_min_chunk_len")]
    pub min_chunk_len: usize,
    /// Number of results returned from similarity searches.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Results scoring below this are not retrieved.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    /// Sources are only attributed when the best score reaches this.
    #[serde(default = "default_source_confidence")]
    pub source_confidence: f32,
    /// Raw input larger than this is rejected before chunking.
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,
}

/// Configuration for conversation handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base persona instruction, overridable per request.
    pub system_prompt: String,
    /// Number of trailing history messages included in the prompt.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

/// Storage configuration for the vector snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the serialized chunk snapshot.
    pub snapshot_path: String,
}

/// Configuration for the Unix socket server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub socket_path: String,
}

fn default_min_chunk_len() -> usize {
    10
}

fn default_top_k() -> usize {
    5
}

fn default_min_score() -> f32 {
    0.45
}

fn default_source_confidence() -> f32 {
    0.6
}

fn default_max_source_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_history_limit() -> usize {
    10
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b-versatile".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.5,
            max_tokens: 1024,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            base_url: "https://router.huggingface.co/v1".to_string(),
            api_key_env: "HF_API_KEY".to_string(),
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            min_chunk_len: default_min_chunk_len(),
            top_k: default_top_k(),
            min_score: default_min_score(),
            source_confidence: default_source_confidence(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful and factual assistant.".to_string(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "./data/vector_store.json".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/askdocs.sock".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            rag: RagConfig::default(),
            chat: ChatConfig::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }

    /// Reject configurations that cannot produce a terminating chunker.
    pub fn validate(&self) -> Result<()> {
        if self.rag.chunk_size == 0 || self.rag.chunk_size <= self.rag.chunk_overlap {
            return Err(ConfigError::InvalidChunkWindow {
                chunk_size: self.rag.chunk_size,
                chunk_overlap: self.rag.chunk_overlap,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_config_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.min_chunk_len, 10);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.max_source_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_chat_config_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.history_limit, 10);
        assert!(!config.system_prompt.is_empty());
    }

    #[test]
    fn test_validate_rejects_overlap_ge_chunk_size() {
        let mut config = Config::default();
        config.rag.chunk_size = 50;
        config.rag.chunk_overlap = 50;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChunkWindow { .. })
        ));

        config.rag.chunk_overlap = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.llm.model, config.llm.model);
        assert_eq!(parsed.rag.chunk_size, config.rag.chunk_size);
    }
}
