//! Embedding generation.
//!
//! Wraps a provider's embedding endpoint with the guarantees retrieval
//! depends on: unit-length output, a fixed dimension for the lifetime of the
//! embedder, and no silent zero vectors.

use crate::provider::{Provider, ProviderError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The API returned an empty or all-zero vector.
    #[error("Embedding response was empty or zero")]
    EmptyEmbedding,

    /// The API returned a vector of the wrong dimension.
    #[error("Embedding dimension changed: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates unit-length embedding vectors via a provider model.
///
/// The first call probes the model once to pin the output dimension; hosted
/// embedding models may need a warm-up request before they respond (the
/// probe also absorbs that). Concurrent first callers wait on the same
/// probe, so the model is never warmed twice.
pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimension: OnceCell<usize>,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            dimension: OnceCell::new(),
        }
    }

    /// The pinned output dimension, probing the model on first use.
    pub async fn dimension(&self) -> Result<usize> {
        self.dimension
            .get_or_try_init(|| async {
                debug!(model = %self.model, "Probing embedding model");
                let probe = self.embed_raw("embedding warm-up probe").await?;
                Ok(probe.len())
            })
            .await
            .copied()
    }

    /// Generates a unit-length embedding for the given text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let expected = self.dimension().await?;
        let vector = self.embed_raw(text).await?;

        if vector.len() != expected {
            return Err(EmbedderError::DimensionMismatch {
                expected,
                got: vector.len(),
            });
        }

        Ok(vector)
    }

    /// One embedding call with bounded retry on transient failures, plus
    /// normalization.
    async fn embed_raw(&self, text: &str) -> Result<Vec<f32>> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;

        let raw = loop {
            match self.provider.embed(text, &self.model).await {
                Ok(vector) => break vector,
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %e, "Transient embedding failure, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        normalize(raw)
    }
}

/// Scales a vector to unit length. Empty and zero vectors are errors: a
/// caller must never receive a degenerate embedding in place of a failure.
fn normalize(mut vector: Vec<f32>) -> Result<Vec<f32>> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if vector.is_empty() || norm == 0.0 || !norm.is_finite() {
        return Err(EmbedderError::EmptyEmbedding);
    }
    for x in &mut vector {
        *x /= norm;
    }
    Ok(vector)
}
