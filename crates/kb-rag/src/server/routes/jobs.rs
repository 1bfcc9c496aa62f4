//! Job listing endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::processing::Job;
use crate::server::state::AppState;

/// GET /api/jobs - every ingestion job, newest first
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<Job>>> {
    Ok(Json(state.jobs().list_jobs().await?))
}
