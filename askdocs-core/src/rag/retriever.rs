//! Query-time retrieval.
//!
//! Embeds the query, searches the index (optionally restricted to an active
//! document subset) and shapes the results for prompt assembly and source
//! attribution.

use super::embedder::Embedder;
use super::index::VectorStore;
use super::types::RetrievedChunk;
use super::RagError;
use std::sync::Arc;
use tracing::debug;

/// Tuning knobs for retrieval and attribution.
#[derive(Debug, Clone)]
pub struct RetrieverOptions {
    /// Number of chunks retrieved per query.
    pub top_k: usize,
    /// Chunks scoring below this are discarded.
    pub min_score: f32,
    /// Sources are only reported when the best chunk reaches this score.
    pub source_confidence: f32,
}

/// Retrieves ranked context for a query.
pub struct Retriever {
    embedder: Arc<Embedder>,
    store: Arc<dyn VectorStore>,
    options: RetrieverOptions,
}

impl Retriever {
    pub fn new(
        embedder: Arc<Embedder>,
        store: Arc<dyn VectorStore>,
        options: RetrieverOptions,
    ) -> Self {
        Self {
            embedder,
            store,
            options,
        }
    }

    /// Retrieves the top-k chunks for a query.
    ///
    /// `active_documents` restricts the search to those sources; an empty
    /// slice searches everything. An empty index yields an empty result, not
    /// an error.
    pub async fn retrieve(
        &self,
        query: &str,
        active_documents: &[String],
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        if self.store.count().await? == 0 {
            debug!("Index is empty, skipping retrieval");
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;

        let filter = if active_documents.is_empty() {
            None
        } else {
            Some(active_documents)
        };

        let results = self
            .store
            .search(&query_embedding, self.options.top_k, filter)
            .await?;

        debug!(
            results = results.len(),
            top_score = results.first().map(|r| r.score).unwrap_or(0.0),
            "Similarity search complete"
        );

        Ok(results
            .into_iter()
            .filter(|r| r.score >= self.options.min_score)
            .map(|r| RetrievedChunk {
                text: r.record.text,
                source: r.record.source,
                score: r.score,
            })
            .collect())
    }

    /// Deduplicated source attribution for a retrieval result.
    ///
    /// A source cited by several chunks is reported once, in first-seen
    /// order. When even the best chunk scores below the confidence bar the
    /// list is empty; the chunks still condition the answer, but the engine
    /// does not claim them as citations.
    pub fn sources_of(&self, chunks: &[RetrievedChunk]) -> Vec<String> {
        let best = chunks.iter().map(|c| c.score).fold(f32::MIN, f32::max);
        if chunks.is_empty() || best < self.options.source_confidence {
            return Vec::new();
        }

        let mut sources: Vec<String> = Vec::new();
        for chunk in chunks {
            if !sources.contains(&chunk.source) {
                sources.push(chunk.source.clone());
            }
        }
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retriever_for_attribution() -> Retriever {
        // The embedder/store are unused by sources_of; build the cheapest
        // possible instances.
        use crate::provider::{ChatRequest, Provider, Result as ProviderResult};
        use async_trait::async_trait;

        struct NoopProvider;

        #[async_trait]
        impl Provider for NoopProvider {
            async fn chat<'a>(
                &'a self,
                _request: ChatRequest,
                _callback: Box<dyn for<'b> FnMut(&'b str) + Send + 'a>,
            ) -> ProviderResult<()> {
                Ok(())
            }

            async fn embed(&self, _text: &str, _model: &str) -> ProviderResult<Vec<f32>> {
                Ok(vec![1.0])
            }
        }

        struct EmptyStore;

        #[async_trait]
        impl VectorStore for EmptyStore {
            async fn add_documents(
                &self,
                _records: Vec<crate::rag::types::ChunkRecord>,
            ) -> Result<(), crate::rag::index::IndexError> {
                Ok(())
            }

            async fn search(
                &self,
                _query: &[f32],
                _k: usize,
                _sources: Option<&[String]>,
            ) -> Result<Vec<crate::rag::types::ScoredChunk>, crate::rag::index::IndexError>
            {
                Ok(Vec::new())
            }

            async fn delete_by_source(
                &self,
                _source: &str,
            ) -> Result<usize, crate::rag::index::IndexError> {
                Ok(0)
            }

            async fn list_sources(&self) -> Result<Vec<String>, crate::rag::index::IndexError> {
                Ok(Vec::new())
            }

            async fn count(&self) -> Result<usize, crate::rag::index::IndexError> {
                Ok(0)
            }
        }

        Retriever::new(
            Arc::new(Embedder::new(Arc::new(NoopProvider), "m")),
            Arc::new(EmptyStore),
            RetrieverOptions {
                top_k: 5,
                min_score: 0.45,
                source_confidence: 0.6,
            },
        )
    }

    fn chunk(source: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            text: "text".to_string(),
            source: source.to_string(),
            score,
        }
    }

    #[test]
    fn test_sources_deduplicated_in_first_seen_order() {
        let retriever = retriever_for_attribution();
        let chunks = vec![
            chunk("doc1", 0.9),
            chunk("doc2", 0.8),
            chunk("doc1", 0.7),
            chunk("doc1", 0.65),
        ];
        assert_eq!(
            retriever.sources_of(&chunks),
            vec!["doc1".to_string(), "doc2".to_string()]
        );
    }

    #[test]
    fn test_low_confidence_hides_sources() {
        let retriever = retriever_for_attribution();
        let chunks = vec![chunk("doc1", 0.55), chunk("doc2", 0.5)];
        assert!(retriever.sources_of(&chunks).is_empty());
    }

    #[test]
    fn test_no_chunks_no_sources() {
        let retriever = retriever_for_attribution();
        assert!(retriever.sources_of(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_short_circuits() {
        let retriever = retriever_for_attribution();
        let results = retriever.retrieve("anything", &[]).await.unwrap();
        assert!(results.is_empty());
    }
}
