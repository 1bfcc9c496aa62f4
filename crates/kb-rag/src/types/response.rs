//! Result types returned by ingestion and question answering

use serde::{Deserialize, Serialize};

/// A file the pipeline did not index, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    /// Chunks handed to the index
    pub chunks_added: usize,
    /// Informational note (e.g. missing data directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Upload names, for upload-triggered runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<Vec<String>>,
    /// Files that were not indexed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFile>,
}

/// Source reference attached to an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub page: u32,
}

/// A chunk returned by retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Indexed document text
    pub text: String,
    /// Source file name
    pub source: String,
    /// Page number
    pub page: u32,
    /// Similarity score, `1 - distance`
    pub score: f32,
}

impl RetrievedChunk {
    pub fn citation(&self) -> Citation {
        Citation {
            source: self.source.clone(),
            page: self.page,
        }
    }
}

/// Grounded answer with citations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
}

/// Debug retrieval listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub query: String,
    pub k: usize,
    pub results: Vec<RetrievedChunk>,
}

/// Distinct indexed sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesResponse {
    pub total_sources: usize,
    pub sources: Vec<String>,
}
