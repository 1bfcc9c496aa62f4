//! Vector index trait: append records, query by text, enumerate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Chunk;

/// Metadata stored next to every indexed document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Source file name
    pub source: String,
    /// Page number within the source
    pub page: u32,
}

/// One indexed record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Record id (the chunk id)
    pub id: String,
    /// Text that is embedded and returned by queries
    pub document: String,
    pub metadata: RecordMetadata,
}

impl From<&Chunk> for IndexRecord {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.to_string(),
            document: chunk.document_text(),
            metadata: RecordMetadata {
                source: chunk.source_filename.clone(),
                page: chunk.page_number,
            },
        }
    }
}

/// A query match
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub record: IndexRecord,
    /// Cosine distance, `1 - cosine similarity`
    pub distance: f32,
}

/// Filter for [`VectorStoreProvider::get`]
#[derive(Debug, Clone, Default)]
pub struct IndexFilter {
    /// Only records from this source
    pub source: Option<String>,
}

impl IndexFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
        }
    }

    pub fn matches(&self, record: &IndexRecord) -> bool {
        self.source
            .as_deref()
            .map_or(true, |s| record.metadata.source == s)
    }
}

/// Trait for vector storage and similarity search.
///
/// The index owns its embedding function: callers hand it text, never vectors.
/// Implementations must accept concurrent `add` calls.
///
/// Implementations:
/// - `MemoryVectorStore`: brute-force cosine over an in-memory list with a JSON snapshot
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Append one record
    async fn add(&self, record: IndexRecord) -> Result<()>;

    /// Nearest `k` records to `text`, closest first
    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>>;

    /// Records matching `filter`, in insertion order
    async fn get(&self, filter: &IndexFilter) -> Result<Vec<IndexRecord>>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;

    /// Persist buffered state, if the store has any
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Get provider name for logging
    fn name(&self) -> &str;
}
