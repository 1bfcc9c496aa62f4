//! Request bodies for the question-answering endpoints

use serde::{Deserialize, Serialize};

/// Chat request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's question
    #[serde(default)]
    pub query: String,
}

impl ChatRequest {
    /// Trimmed, non-empty question
    pub fn question(&self) -> Option<&str> {
        let q = self.query.trim();
        (!q.is_empty()).then_some(q)
    }
}

/// Debug retrieval request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrieveRequest {
    #[serde(default)]
    pub query: String,
    /// Number of results (defaults to the configured top_k)
    #[serde(default)]
    pub k: Option<usize>,
}
