//! Upload, job status and rebuild endpoints

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::processing::{Job, JobStatus, UploadedFile};
use crate::server::state::AppState;
use crate::types::IngestResult;

/// Body of a 202 upload response
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// POST /api/ingest/upload - queue uploaded files for background ingestion
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<JobAccepted>)> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart field", e))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(&format!("Failed to read {}", filename), e))?;

        tracing::info!("Received upload: {} ({} bytes)", filename, data.len());
        files.push(UploadedFile { filename, data });
    }

    let job = state.jobs().submit(files).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

/// Bodies cut off by the upload limit are 413, anything else malformed is 400
fn multipart_error(context: &str, err: MultipartError) -> Error {
    let message = format!("{}: {}", context, err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(message)
    } else {
        Error::BadRequest(message)
    }
}

/// GET /api/ingest/status/:job_id - any id that names no job is a 404
pub async fn status(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<Json<Job>> {
    let job_id = Uuid::parse_str(&job_id).map_err(|_| Error::UnknownJobId(job_id))?;
    Ok(Json(state.jobs().get_status(job_id).await?))
}

/// POST /api/ingest/rebuild - re-ingest the whole data directory
pub async fn rebuild(State(state): State<AppState>) -> Result<Json<IngestResult>> {
    tracing::info!("Rebuilding index from {}", state.pipeline().data_dir().display());
    Ok(Json(state.pipeline().rebuild().await?))
}
