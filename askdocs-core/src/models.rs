use serde::{Deserialize, Serialize};

/// A chat completion model the engine accepts requests for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatModel {
    pub id: String,
    pub name: String,
    pub context_length: usize,
    pub description: String,
}

/// An embedding model together with its output dimensionality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModel {
    pub id: String,
    pub name: String,
    pub dimension: usize,
    pub description: String,
}

/// Registry of supported model identifiers.
///
/// Per-request model ids are resolved against this registry; an unknown id
/// falls back to the configured default rather than failing the request.
pub struct ModelRegistry {
    chat_models: Vec<ChatModel>,
    embedding_models: Vec<EmbeddingModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            chat_models: default_chat_models(),
            embedding_models: default_embedding_models(),
        }
    }

    pub fn get_chat(&self, id: &str) -> Option<&ChatModel> {
        self.chat_models.iter().find(|m| m.id == id)
    }

    pub fn get_embedding(&self, id: &str) -> Option<&EmbeddingModel> {
        self.embedding_models.iter().find(|m| m.id == id)
    }

    /// Resolve a requested chat model id, falling back to the default.
    pub fn resolve_chat<'a>(&self, requested: Option<&'a str>, default: &'a str) -> &'a str {
        match requested {
            Some(id) if self.get_chat(id).is_some() => id,
            _ => default,
        }
    }

    pub fn chat_models(&self) -> &[ChatModel] {
        &self.chat_models
    }

    pub fn embedding_models(&self) -> &[EmbeddingModel] {
        &self.embedding_models
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_chat_models() -> Vec<ChatModel> {
    vec![
        ChatModel {
            id: "llama-3.3-70b-versatile".to_string(),
            name: "Llama 3.3 70B Versatile".to_string(),
            context_length: 131072,
            description: "General purpose answer generation".to_string(),
        },
        ChatModel {
            id: "llama-3.1-8b-instant".to_string(),
            name: "Llama 3.1 8B Instant".to_string(),
            context_length: 131072,
            description: "Faster, lower-quality completions".to_string(),
        },
    ]
}

pub fn default_embedding_models() -> Vec<EmbeddingModel> {
    vec![EmbeddingModel {
        id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
        name: "all-MiniLM-L6-v2".to_string(),
        dimension: 384,
        description: "Compact general purpose sentence embeddings".to_string(),
    }]
}
