//! Error types for the knowledge-base service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::processing::JobStatus;

/// Result type alias for kb-rag operations
pub type Result<T> = std::result::Result<T, Error>;

/// kb-rag errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File parsing error (per-file, never fatal to a batch)
    #[error("Failed to parse file '{filename}': {message}")]
    Parse { filename: String, message: String },

    /// Legacy format conversion error (converter missing or failing)
    #[error("Failed to convert file '{filename}': {message}")]
    Conversion { filename: String, message: String },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// OCR engine or page renderer error
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Vector index error (add/query/get)
    #[error("Vector index error: {0}")]
    Index(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Completion/LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Unknown job id
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// Job id that is not even a UUID
    #[error("Job not found: {0}")]
    UnknownJobId(String),

    /// Attempted to move a job backwards or out of a terminal state
    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// Malformed client request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body over the configured limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file parse error
    pub fn parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a conversion error
    pub fn conversion(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an index error
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an OCR error
    pub fn ocr(message: impl Into<String>) -> Self {
        Self::Ocr(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error only affects a single file of a batch
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Error::Parse { .. } | Error::Conversion { .. } | Error::UnsupportedFileType(_)
        )
    }

    /// Render the error and its source chain, one cause per line
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str("\ncaused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

/// Text of a panic payload (`&str` or `String`)
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Parse { .. } => (StatusCode::BAD_REQUEST, "parse_error"),
            Error::Conversion { .. } => (StatusCode::BAD_REQUEST, "conversion_error"),
            Error::UnsupportedFileType(_) => (StatusCode::BAD_REQUEST, "unsupported_type"),
            Error::Ocr(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ocr_error"),
            Error::Index(_) => (StatusCode::INTERNAL_SERVER_ERROR, "index_error"),
            Error::Embedding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error"),
            Error::Llm(_) => (StatusCode::SERVICE_UNAVAILABLE, "llm_error"),
            Error::JobNotFound(_) | Error::UnknownJobId(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
