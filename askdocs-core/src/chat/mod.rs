//! Conversational question answering over the document index.
//!
//! [`ChatEngine`] runs one request end to end: retrieve context, attribute
//! sources, assemble the prompt, stream the completion. Output is a sequence
//! of [`StreamEvent`]s on an mpsc channel: chunk events in order, then
//! exactly one terminal metadata or error event. The transport layer
//! serializes events; it never inspects them.

pub mod generation;
pub mod history;
pub mod prompt;

pub use generation::{GenerationEngine, GenerationError};
pub use history::{ChatMessage, Role};
pub use prompt::PromptAssembler;

use crate::config::Config;
use crate::models::ModelRegistry;
use crate::provider::{ChatRequest, Provider};
use crate::rag::RagEngine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Channel the engine emits stream events on.
pub type EventSender = mpsc::UnboundedSender<StreamEvent>;

/// One event of a streamed answer.
///
/// Serialized one JSON object per line on the wire, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Chunk {
        text: String,
    },
    Metadata {
        answer: String,
        sources: Vec<String>,
        followups: Vec<String>,
    },
    Error {
        error: String,
    },
}

impl StreamEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk { text: text.into() }
    }

    pub fn metadata(
        answer: impl Into<String>,
        sources: Vec<String>,
        followups: Vec<String>,
    ) -> Self {
        Self::Metadata {
            answer: answer.into(),
            sources,
            followups,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }
}

/// Per-request configuration supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Chat model id; unknown or absent ids resolve to the default.
    #[serde(default)]
    pub model: Option<String>,
    /// Replaces the persona part of the system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Restricts retrieval to these sources; empty means all.
    #[serde(default)]
    pub active_documents: Vec<String>,
}

/// Answers questions with retrieved context and conversational memory.
pub struct ChatEngine {
    rag: Arc<RagEngine>,
    assembler: PromptAssembler,
    generation: GenerationEngine,
    registry: ModelRegistry,
    default_model: String,
    temperature: f64,
    max_tokens: u32,
}

impl ChatEngine {
    /// Builds a complete engine from configuration: providers from the
    /// environment, the vector snapshot from disk.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        use crate::provider::OpenAiCompatProvider;
        use crate::rag::SnapshotStore;

        config.validate()?;

        let chat_provider = Arc::new(OpenAiCompatProvider::from_env(
            &config.llm.base_url,
            &config.llm.api_key_env,
        )?);
        let embed_provider = Arc::new(OpenAiCompatProvider::from_env(
            &config.embedding.base_url,
            &config.embedding.api_key_env,
        )?);
        let store = Arc::new(SnapshotStore::open(&config.storage.snapshot_path).await?);
        let rag = Arc::new(RagEngine::new(config, embed_provider, store)?);

        Ok(Self::new(config, chat_provider, rag))
    }

    /// The retrieval engine behind this chat engine.
    pub fn rag(&self) -> &Arc<RagEngine> {
        &self.rag
    }

    pub fn new(config: &Config, provider: Arc<dyn Provider>, rag: Arc<RagEngine>) -> Self {
        Self {
            rag,
            assembler: PromptAssembler::new(
                config.chat.system_prompt.clone(),
                config.chat.history_limit,
            ),
            generation: GenerationEngine::new(provider),
            registry: ModelRegistry::new(),
            default_model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        }
    }

    /// Answers one question, streaming events to the sender.
    ///
    /// The stream always terminates: retrieval failure or provider failure
    /// produce the terminal error event, success produces metadata after the
    /// final chunk. Cancelling stops the stream with no further events.
    pub async fn answer_stream(
        &self,
        query: &str,
        history: &[ChatMessage],
        settings: &ChatSettings,
        cancel: CancellationToken,
        events: &EventSender,
    ) {
        info!(query_len = query.len(), "Answering question");

        let context = match self.rag.retrieve(query, &settings.active_documents).await {
            Ok(context) => context,
            Err(e) => {
                let _ = events.send(StreamEvent::error(e.to_string()));
                return;
            }
        };

        let sources = self.rag.attribute_sources(&context);
        debug!(
            chunks = context.len(),
            sources = sources.len(),
            "Context retrieved"
        );

        let messages = self.assembler.assemble(
            query,
            &context,
            history,
            settings.system_prompt.as_deref(),
        );

        let model = self
            .registry
            .resolve_chat(settings.model.as_deref(), &self.default_model);

        let request = ChatRequest::new(model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        self.generation
            .generate_stream(request, sources, cancel, events)
            .await;
    }
}
