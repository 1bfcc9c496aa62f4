//! API routes for the knowledge-base server

pub mod ingest;
pub mod jobs;
pub mod query;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Ingestion - uploads carry their own body limit
        .route(
            "/ingest/upload",
            post(ingest::upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/ingest/status/:job_id", get(ingest::status))
        .route("/ingest/rebuild", post(ingest::rebuild))
        .route("/jobs", get(jobs::list_jobs))
        // Query
        .route("/chat", post(query::chat))
        .route("/debug/retrieve", post(query::debug_retrieve))
        .route("/debug/sources", get(query::debug_sources))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "kb-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /api/ingest/upload": "Upload documents for background ingestion",
            "GET /api/ingest/status/:job_id": "Job status",
            "POST /api/ingest/rebuild": "Re-ingest the data directory",
            "GET /api/jobs": "List ingestion jobs",
            "POST /api/chat": "Grounded answer with citations",
            "POST /api/debug/retrieve": "Raw retrieval results",
            "GET /api/debug/sources": "Indexed source files"
        }
    }))
}
