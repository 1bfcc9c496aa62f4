//! Core types for the knowledge-base service

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, FileKind, PageUnit};
pub use query::{ChatRequest, RetrieveRequest};
pub use response::{
    Citation, IngestResult, QueryResponse, RetrieveResponse, RetrievedChunk, SkippedFile,
    SourcesResponse,
};
