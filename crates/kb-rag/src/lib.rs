//! kb-rag: knowledge-base RAG service with durable ingestion jobs and cited answers
//!
//! Documents (PDF with OCR fallback, DOCX, XLSX, legacy Word via LibreOffice) are
//! parsed into pages, chunked with overlap and indexed with source/page metadata.
//! Uploads are ingested by background jobs whose state is persisted per job;
//! questions are answered by the configured LLM over the top-k retrieved chunks.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use processing::{Job, JobManager, JobStatus};
pub use types::{
    document::{Chunk, FileKind, PageUnit},
    response::{Citation, IngestResult, QueryResponse},
};
