//! Vector index with durable snapshot persistence.
//!
//! The index holds every chunk record in memory and answers k-nearest-
//! neighbor queries by brute-force cosine similarity. At the corpus sizes
//! this engine targets (thousands of chunks) a linear scan per query is
//! fast enough. The [`VectorStore`] trait is the seam for swapping in an
//! approximate index when a corpus outgrows that.
//!
//! Persistence is a single JSON snapshot of the record array, rewritten
//! after every mutation: serialize, write a sibling temp file, rename over
//! the old snapshot. A crash mid-write leaves the previous snapshot intact.

use super::types::{ChunkRecord, ScoredChunk};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Errors that can occur in the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Embedding dimension mismatch: index holds {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Interface for vector index operations.
///
/// The shipped implementation is [`SnapshotStore`]; the trait preserves the
/// search contract (descending score, stable ties, empty result for empty
/// index or unmatched filter) for alternative backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Appends records and persists. Concurrent appends are serialized, not
    /// lost or interleaved.
    async fn add_documents(&self, records: Vec<ChunkRecord>) -> Result<()>;

    /// Returns up to `k` records by descending cosine similarity. `sources`
    /// restricts the scan; an empty or absent filter scans everything.
    async fn search(
        &self,
        query: &[f32],
        k: usize,
        sources: Option<&[String]>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Removes all records of a source, persists, and returns how many were
    /// removed. An unknown source removes nothing and is not an error.
    async fn delete_by_source(&self, source: &str) -> Result<usize>;

    /// Distinct source names, in first-insertion order.
    async fn list_sources(&self) -> Result<Vec<String>>;

    /// Total number of records.
    async fn count(&self) -> Result<usize>;
}

/// Cosine similarity of two vectors.
///
/// A zero-norm vector has similarity 0 to everything, never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Vector index persisted as one JSON snapshot file.
pub struct SnapshotStore {
    path: PathBuf,
    records: RwLock<Vec<ChunkRecord>>,
    /// Serializes mutations so only one persist is ever in flight.
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    /// Opens the store, loading an existing snapshot.
    ///
    /// A missing file is an empty index. A snapshot that exists but fails to
    /// parse is an error: silently discarding it would lose the corpus.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let records: Vec<ChunkRecord> = serde_json::from_slice(&bytes)?;
                info!(count = records.len(), path = %path.display(), "Loaded vector snapshot");
                records
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            records: RwLock::new(records),
            write_lock: Mutex::new(()),
        })
    }

    /// Writes the snapshot: temp file first, then an atomic rename.
    ///
    /// Callers must hold `write_lock`.
    async fn persist(&self) -> Result<()> {
        let bytes = {
            let records = self.records.read().await;
            serde_json::to_vec(&*records)?
        };

        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(bytes = bytes.len(), path = %self.path.display(), "Persisted vector snapshot");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn matches_filter(record: &ChunkRecord, sources: Option<&[String]>) -> bool {
    match sources {
        None => true,
        Some(s) if s.is_empty() => true,
        Some(s) => s.iter().any(|name| name == &record.source),
    }
}

#[async_trait]
impl VectorStore for SnapshotStore {
    async fn add_documents(&self, records: Vec<ChunkRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;

        {
            let mut existing = self.records.write().await;
            let expected = existing
                .first()
                .map(|r| r.embedding.len())
                .unwrap_or_else(|| records[0].embedding.len());

            for record in &records {
                if record.embedding.len() != expected {
                    return Err(IndexError::DimensionMismatch {
                        expected,
                        got: record.embedding.len(),
                    });
                }
            }

            existing.extend(records);
        }

        self.persist().await
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        sources: Option<&[String]>,
    ) -> Result<Vec<ScoredChunk>> {
        let records = self.records.read().await;

        let mut scored: Vec<ScoredChunk> = records
            .iter()
            .filter(|r| matches_filter(r, sources))
            .map(|r| ScoredChunk {
                record: r.clone(),
                score: cosine_similarity(query, &r.embedding),
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let removed = {
            let mut records = self.records.write().await;
            let before = records.len();
            records.retain(|r| r.source != source);
            before - records.len()
        };

        if removed > 0 {
            self.persist().await?;
            info!(source, removed, "Deleted records by source");
        }

        Ok(removed)
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let mut sources: Vec<String> = Vec::new();
        for record in records.iter() {
            if !sources.contains(&record.source) {
                sources.push(record.source.clone());
            }
        }
        Ok(sources)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, source: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord::new(text, source, embedding)
    }

    async fn temp_store() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(dir.path().join("vector_store.json"))
            .await
            .unwrap();
        (dir, store)
    }

    #[test]
    fn test_cosine_self_similarity() {
        let a = vec![0.3, -0.7, 0.2];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = vec![1.0, 2.0, 3.0];
        let zero = vec![0.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let (_dir, store) = temp_store().await;
        let results = store.search(&[1.0, 0.0], 5, None).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_orders_by_descending_score() {
        let (_dir, store) = temp_store().await;
        store
            .add_documents(vec![
                record("far", "doc", vec![0.0, 1.0]),
                record("near", "doc", vec![1.0, 0.0]),
                record("mid", "doc", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 3, None).await.unwrap();
        assert_eq!(results[0].record.text, "near");
        assert_eq!(results[1].record.text, "mid");
        assert_eq!(results[2].record.text, "far");
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_respects_k() {
        let (_dir, store) = temp_store().await;
        let records = (0..10)
            .map(|i| record(&format!("r{i}"), "doc", vec![1.0, i as f32 / 10.0]))
            .collect();
        store.add_documents(records).await.unwrap();

        let results = store.search(&[1.0, 0.0], 3, None).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_search_ties_keep_insertion_order() {
        let (_dir, store) = temp_store().await;
        store
            .add_documents(vec![
                record("first", "doc", vec![1.0, 0.0]),
                record("second", "doc", vec![2.0, 0.0]),
                record("third", "doc", vec![3.0, 0.0]),
            ])
            .await
            .unwrap();

        // All three are colinear with the query: identical scores.
        let results = store.search(&[1.0, 0.0], 3, None).await.unwrap();
        assert_eq!(results[0].record.text, "first");
        assert_eq!(results[1].record.text, "second");
        assert_eq!(results[2].record.text, "third");
    }

    #[tokio::test]
    async fn test_search_with_source_filter() {
        let (_dir, store) = temp_store().await;
        store
            .add_documents(vec![
                record("a", "doc1", vec![1.0, 0.0]),
                record("b", "doc2", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let filter = vec!["doc2".to_string()];
        let results = store.search(&[1.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.source, "doc2");

        // Empty filter means no filter.
        let results = store.search(&[1.0, 0.0], 5, Some(&[])).await.unwrap();
        assert_eq!(results.len(), 2);

        // A filter matching nothing is an empty result, not an error.
        let filter = vec!["doc3".to_string()];
        let results = store.search(&[1.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_list_sources_and_delete_round_trip() {
        let (_dir, store) = temp_store().await;
        store
            .add_documents(vec![
                record("a", "doc1", vec![1.0, 0.0]),
                record("b", "doc2", vec![0.0, 1.0]),
                record("c", "doc1", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(
            store.list_sources().await.unwrap(),
            vec!["doc1".to_string(), "doc2".to_string()]
        );

        let removed = store.delete_by_source("doc1").await.unwrap();
        assert_eq!(removed, 2);

        let results = store.search(&[1.0, 0.0], 10, None).await.unwrap();
        assert!(results.iter().all(|r| r.record.source != "doc1"));

        // Second delete is a no-op, not an error.
        assert_eq!(store.delete_by_source("doc1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector_store.json");

        {
            let store = SnapshotStore::open(&path).await.unwrap();
            store
                .add_documents(vec![record("persisted", "doc1", vec![1.0, 0.0])])
                .await
                .unwrap();
        }

        let store = SnapshotStore::open(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.list_sources().await.unwrap(), vec!["doc1".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector_store.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        assert!(matches!(
            SnapshotStore::open(&path).await,
            Err(IndexError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let (_dir, store) = temp_store().await;
        store
            .add_documents(vec![record("a", "doc", vec![1.0, 0.0])])
            .await
            .unwrap();

        let result = store
            .add_documents(vec![record("b", "doc", vec![1.0, 0.0, 0.0])])
            .await;
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
        // Nothing committed.
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(
            SnapshotStore::open(dir.path().join("vector_store.json"))
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add_documents(vec![record(&format!("r{i}"), "doc", vec![1.0, 0.0])])
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 8);
    }
}
