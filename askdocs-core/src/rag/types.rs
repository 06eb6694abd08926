use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chunk stored in the vector index.
///
/// Chunks are the fundamental unit of storage: a bounded fragment of a source
/// document together with its embedding. Records are immutable once appended;
/// the only mutation the index supports is bulk deletion by source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub source: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl ChunkRecord {
    pub fn new(text: impl Into<String>, source: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            source: source.into(),
            embedding,
            created_at: Utc::now(),
        }
    }
}

/// A search result with its similarity score.
///
/// Returned by vector search operations, ordered by descending score. Cosine
/// scores range from -1.0 to 1.0; in practice text embeddings land between
/// 0.0 and 1.0.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    pub score: f32,
}

/// A retrieved chunk stripped to the fields the prompt and caller need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    pub score: f32,
}
