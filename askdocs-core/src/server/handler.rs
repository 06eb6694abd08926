use super::types::{Reply, Request};
use crate::chat::{ChatEngine, ChatMessage, ChatSettings, EventSender};
use crate::rag::RagEngine;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Routes requests to the engines and shapes their replies.
pub struct RequestHandler {
    chat: Arc<ChatEngine>,
    rag: Arc<RagEngine>,
}

impl RequestHandler {
    pub fn new(chat: Arc<ChatEngine>, rag: Arc<RagEngine>) -> Self {
        Self { chat, rag }
    }

    /// Runs a chat request, streaming events to the sender.
    pub async fn handle_chat(
        &self,
        query: &str,
        history: &[ChatMessage],
        settings: &ChatSettings,
        cancel: CancellationToken,
        events: &EventSender,
    ) {
        self.chat
            .answer_stream(query, history, settings, cancel, events)
            .await;
    }

    /// Handles a non-streaming request with a single terminal reply.
    pub async fn manage(&self, request: Request) -> Reply {
        match request {
            Request::Ingest { text, source } => match self.rag.ingest(&text, &source).await {
                Ok(report) => Reply::done(serde_json::json!({
                    "source": report.source,
                    "chunk_count": report.chunk_count,
                })),
                Err(e) => Reply::error(e.to_string()),
            },
            Request::Sources => match self.rag.sources().await {
                Ok(sources) => Reply::done(serde_json::json!({ "sources": sources })),
                Err(e) => Reply::error(e.to_string()),
            },
            Request::Delete { source } => match self.rag.delete_source(&source).await {
                Ok(removed) => Reply::done(serde_json::json!({ "removed": removed })),
                Err(e) => Reply::error(e.to_string()),
            },
            Request::Count => match self.rag.count().await {
                Ok(count) => Reply::done(serde_json::json!({ "count": count })),
                Err(e) => Reply::error(e.to_string()),
            },
            Request::Chat { .. } => {
                warn!("Chat request routed to the non-streaming handler");
                Reply::error("chat requests are answered as an event stream")
            }
        }
    }
}
