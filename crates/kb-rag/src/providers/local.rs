//! In-process vector index: brute-force cosine search with an optional JSON snapshot

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::vector_store::{IndexFilter, IndexHit, IndexRecord, VectorStoreProvider};

#[derive(Clone, Serialize, Deserialize)]
struct StoredVector {
    record: IndexRecord,
    vector: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    collection: String,
    entries: Vec<StoredVector>,
}

/// Vector index held in memory, embedding records with the given provider
pub struct MemoryVectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    collection: String,
    snapshot_path: Option<PathBuf>,
    entries: RwLock<Vec<StoredVector>>,
}

impl MemoryVectorStore {
    /// Empty store that is never persisted
    pub fn in_memory(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            collection: "kb_docs".to_string(),
            snapshot_path: None,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Open the store, loading the snapshot when one exists
    pub fn open(embedder: Arc<dyn EmbeddingProvider>, config: &VectorDbConfig) -> Result<Self> {
        let mut entries = Vec::new();
        if let Some(path) = config.snapshot_path.as_deref().filter(|p| p.exists()) {
            let raw = std::fs::read(path)?;
            let snapshot: Snapshot = serde_json::from_slice(&raw).map_err(|e| {
                Error::index(format!("corrupt snapshot {}: {}", path.display(), e))
            })?;
            if snapshot.collection != config.collection {
                tracing::warn!(
                    "Snapshot {} holds collection '{}', expected '{}'",
                    path.display(),
                    snapshot.collection,
                    config.collection
                );
            }
            entries = snapshot.entries;
            tracing::info!("Loaded {} indexed records from {}", entries.len(), path.display());
        }

        Ok(Self {
            embedder,
            collection: config.collection.clone(),
            snapshot_path: config.snapshot_path.clone(),
            entries: RwLock::new(entries),
        })
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Write `bytes` next to `path` and atomically rename over it
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl VectorStoreProvider for MemoryVectorStore {
    async fn add(&self, record: IndexRecord) -> Result<()> {
        let vector = self
            .embedder
            .embed(&record.document)
            .await
            .map_err(|e| Error::index(format!("embedding record {}: {}", record.id, e)))?;
        self.entries.write().push(StoredVector { record, vector });
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| Error::index(format!("embedding query: {}", e)))?;

        let mut hits: Vec<IndexHit> = self
            .entries
            .read()
            .iter()
            .map(|entry| IndexHit {
                record: entry.record.clone(),
                distance: 1.0 - cosine_similarity(&query, &entry.vector),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(&self, filter: &IndexFilter) -> Result<Vec<IndexRecord>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|entry| filter.matches(&entry.record))
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    async fn flush(&self) -> Result<()> {
        let Some(path) = self.snapshot_path.clone() else {
            return Ok(());
        };
        let bytes = {
            let entries = self.entries.read();
            serde_json::to_vec(&Snapshot {
                collection: self.collection.clone(),
                entries: entries.clone(),
            })?
        };
        let count = bytes.len();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;
        tracing::debug!("Index snapshot written ({} bytes)", count);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::KeywordEmbedder;
    use crate::types::Chunk;

    fn store() -> MemoryVectorStore {
        MemoryVectorStore::in_memory(Arc::new(KeywordEmbedder))
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let store = store();
        for (text, source) in [
            ("revenue revenue growth", "a.pdf"),
            ("staff holiday calendar", "b.docx"),
            ("revenue forecast", "c.xlsx"),
        ] {
            store
                .add(IndexRecord::from(&Chunk::new(text, source, 1)))
                .await
                .unwrap();
        }

        let hits = store.query("revenue", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits
            .iter()
            .all(|h| h.record.metadata.source != "b.docx"));
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_with_filter() {
        let store = store();
        store.add(IndexRecord::from(&Chunk::new("one", "a.pdf", 1))).await.unwrap();
        store.add(IndexRecord::from(&Chunk::new("two", "a.pdf", 2))).await.unwrap();
        store.add(IndexRecord::from(&Chunk::new("three", "b.pdf", 1))).await.unwrap();

        assert_eq!(store.get(&IndexFilter::all()).await.unwrap().len(), 3);
        let only_a = store.get(&IndexFilter::source("a.pdf")).await.unwrap();
        assert_eq!(only_a.len(), 2);
        assert_eq!(only_a[1].metadata.page, 2);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectorDbConfig {
            snapshot_path: Some(dir.path().join("index").join("kb.json")),
            collection: "kb_docs".to_string(),
        };

        let store = MemoryVectorStore::open(Arc::new(KeywordEmbedder), &config).unwrap();
        store
            .add(IndexRecord::from(&Chunk::new("revenue grew", "q3.pdf", 4)))
            .await
            .unwrap();
        store.flush().await.unwrap();

        let reopened = MemoryVectorStore::open(Arc::new(KeywordEmbedder), &config).unwrap();
        let records = reopened.get(&IndexFilter::all()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].document, "q3.pdf | page 4\nrevenue grew");
    }

    #[tokio::test]
    async fn test_concurrent_adds() {
        let store = Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let chunk = Chunk::new(format!("chunk {}", i), "bulk.pdf", 1);
                store.add(IndexRecord::from(&chunk)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 16);
    }
}
