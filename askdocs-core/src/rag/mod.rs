//! Retrieval pipeline: chunking, embeddings, similarity search.
//!
//! # Overview
//!
//! Ingestion runs text through the chunker, embeds every chunk, and appends
//! the batch to the vector index in one operation. Query-time retrieval
//! embeds the question and ranks stored chunks by cosine similarity,
//! optionally restricted to an active document subset.
//!
//! The pieces:
//!
//! - [`chunker`]: overlapping character windows with word-boundary care
//! - [`embedder`]: provider-backed embeddings, normalized, dimension-pinned
//! - [`index`]: the vector store and its durable snapshot
//! - [`retriever`]: query embedding + filtered search + attribution
//! - [`RagEngine`]: ties them together behind one API

pub mod chunker;
pub mod embedder;
pub mod index;
pub mod retriever;
mod types;

pub use chunker::{Chunker, ChunkerError, Chunks};
pub use embedder::{Embedder, EmbedderError};
pub use index::{cosine_similarity, IndexError, SnapshotStore, VectorStore};
pub use retriever::{Retriever, RetrieverOptions};
pub use types::{ChunkRecord, RetrievedChunk, ScoredChunk};

use crate::config::Config;
use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Chunker error: {0}")]
    Chunker(#[from] ChunkerError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Source too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, RagError>;

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub source: String,
    pub chunk_count: usize,
}

/// The retrieval engine: ingestion and query-time search over one index.
///
/// # Thread Safety
///
/// The engine is cheap to share: the index serializes its own writers and
/// the embedder guards its one-time model probe, so concurrent ingestion
/// and retrieval need no external locking.
pub struct RagEngine {
    embedder: Arc<Embedder>,
    store: Arc<dyn VectorStore>,
    chunker: Chunker,
    retriever: Retriever,
    max_source_bytes: usize,
}

impl RagEngine {
    /// Creates an engine from configuration, an embedding provider and an
    /// opened vector store.
    ///
    /// Fails fast on a chunk window that could never terminate.
    pub fn new(
        config: &Config,
        provider: Arc<dyn Provider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let chunker = Chunker::new(config.rag.chunk_size, config.rag.chunk_overlap)?
            .with_min_len(config.rag.min_chunk_len);

        let embedder = Arc::new(Embedder::new(provider, config.embedding.model.clone()));

        let retriever = Retriever::new(
            embedder.clone(),
            store.clone(),
            RetrieverOptions {
                top_k: config.rag.top_k,
                min_score: config.rag.min_score,
                source_confidence: config.rag.source_confidence,
            },
        );

        Ok(Self {
            embedder,
            store,
            chunker,
            retriever,
            max_source_bytes: config.rag.max_source_bytes,
        })
    }

    /// Ingests one document's extracted text under a source name.
    ///
    /// All-or-nothing: every chunk is embedded into a buffer before the
    /// single index append, so a failure partway through commits nothing.
    ///
    /// # Errors
    ///
    /// - [`RagError::PayloadTooLarge`] when the raw text exceeds the
    ///   configured byte limit (checked before any work)
    /// - [`RagError::Embedding`] when any chunk fails to embed
    pub async fn ingest(&self, raw_text: &str, source: &str) -> Result<IngestReport> {
        if raw_text.len() > self.max_source_bytes {
            return Err(RagError::PayloadTooLarge {
                size: raw_text.len(),
                limit: self.max_source_bytes,
            });
        }

        info!(source, bytes = raw_text.len(), "Ingesting document");

        let mut records = Vec::new();
        for chunk in self.chunker.split(raw_text) {
            let embedding = self.embedder.embed(&chunk).await?;
            records.push(ChunkRecord::new(chunk, source, embedding));
        }

        let chunk_count = records.len();
        if chunk_count > 0 {
            self.store.add_documents(records).await?;
        }

        info!(source, chunk_count, "Ingestion complete");
        Ok(IngestReport {
            source: source.to_string(),
            chunk_count,
        })
    }

    /// Retrieves ranked context for a query. See [`Retriever::retrieve`].
    pub async fn retrieve(
        &self,
        query: &str,
        active_documents: &[String],
    ) -> Result<Vec<RetrievedChunk>> {
        self.retriever.retrieve(query, active_documents).await
    }

    /// Deduplicated source attribution for a retrieval result.
    pub fn attribute_sources(&self, chunks: &[RetrievedChunk]) -> Vec<String> {
        self.retriever.sources_of(chunks)
    }

    /// Removes every chunk of a source. Returns how many were removed; an
    /// unknown source removes nothing.
    pub async fn delete_source(&self, source: &str) -> Result<usize> {
        let removed = self.store.delete_by_source(source).await?;
        debug!(source, removed, "Delete by source");
        Ok(removed)
    }

    /// Distinct ingested source names.
    pub async fn sources(&self) -> Result<Vec<String>> {
        Ok(self.store.list_sources().await?)
    }

    /// Total number of stored chunks.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.store.count().await?)
    }
}
