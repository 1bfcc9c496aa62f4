//! Question answering and retrieval inspection endpoints

use axum::{extract::State, Json};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{ChatRequest, QueryResponse, RetrieveRequest, RetrieveResponse, SourcesResponse};

/// POST /api/chat - grounded answer with citations
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<QueryResponse>> {
    let question = request
        .question()
        .ok_or_else(|| Error::BadRequest("Missing query".to_string()))?;

    tracing::info!("Query: \"{}\"", question);
    let response = state.composer().answer(question).await?;
    tracing::info!("Answered with {} citations", response.citations.len());
    Ok(Json(response))
}

/// POST /api/debug/retrieve - raw retrieval results
pub async fn debug_retrieve(
    State(state): State<AppState>,
    Json(request): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(Error::BadRequest("Missing query".to_string()));
    }

    let k = request
        .k
        .filter(|k| *k > 0)
        .unwrap_or_else(|| state.retriever().default_k());
    let results = state.retriever().retrieve(query, Some(k)).await?;
    Ok(Json(RetrieveResponse {
        query: query.to_string(),
        k,
        results,
    }))
}

/// GET /api/debug/sources - distinct indexed file names
pub async fn debug_sources(State(state): State<AppState>) -> Result<Json<SourcesResponse>> {
    let sources = state.retriever().sources().await?;
    Ok(Json(SourcesResponse {
        total_sources: sources.len(),
        sources,
    }))
}
