//! Top-k retrieval over the vector index

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::providers::vector_store::{IndexFilter, IndexHit, VectorStoreProvider};
use crate::types::RetrievedChunk;

/// Query-side view of the index
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorStoreProvider>,
    default_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorStoreProvider>, default_k: usize) -> Self {
        Self {
            index,
            default_k: default_k.max(1),
        }
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Nearest chunks for `query`; `k` falls back to the configured top_k
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> Result<Vec<RetrievedChunk>> {
        let k = k.filter(|k| *k > 0).unwrap_or(self.default_k);
        let hits = self.index.query(query, k).await?;
        tracing::debug!("Retrieved {} chunks for k={}", hits.len(), k);
        Ok(hits.into_iter().map(to_retrieved).collect())
    }

    /// Distinct indexed source names, sorted
    pub async fn sources(&self) -> Result<Vec<String>> {
        let records = self.index.get(&IndexFilter::all()).await?;
        let sources: BTreeSet<String> = records
            .into_iter()
            .map(|r| r.metadata.source)
            .filter(|s| !s.is_empty())
            .collect();
        Ok(sources.into_iter().collect())
    }
}

fn to_retrieved(hit: IndexHit) -> RetrievedChunk {
    RetrievedChunk {
        text: hit.record.document,
        source: hit.record.metadata.source,
        page: hit.record.metadata.page,
        score: 1.0 - hit.distance,
    }
}
