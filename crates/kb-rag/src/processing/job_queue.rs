//! Job submission, status with watchdog, and listing

use bytes::Bytes;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::JobsConfig;
use crate::error::{Error, Result};
use crate::ingestion::IngestPipeline;

use super::blocking;
use super::job::{Job, JobStatus};
use super::job_store::JobStore;
use super::worker::JobWorker;

/// One uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

/// Largest idle limit `chrono::Duration` represents in seconds
const MAX_WATCHDOG_SECS: u64 = (i64::MAX / 1000) as u64;

/// Owns the job lifecycle: accepts uploads, starts workers, reports status
pub struct JobManager {
    store: Arc<dyn JobStore>,
    pipeline: Arc<IngestPipeline>,
    upload_root: PathBuf,
    watchdog_idle: chrono::Duration,
}

impl JobManager {
    pub fn new(store: Arc<dyn JobStore>, pipeline: Arc<IngestPipeline>, config: &JobsConfig) -> Self {
        let idle_secs = config.watchdog_idle_secs.min(MAX_WATCHDOG_SECS);
        if idle_secs < config.watchdog_idle_secs {
            tracing::warn!(
                "Watchdog limit {}s is out of range, using {}s",
                config.watchdog_idle_secs,
                idle_secs
            );
        }
        Self {
            store,
            pipeline,
            upload_root: config.upload_root.clone(),
            watchdog_idle: chrono::Duration::seconds(idle_secs as i64),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Save the batch into a fresh job directory, persist a queued record and start the worker
    pub async fn submit(&self, files: Vec<UploadedFile>) -> Result<Job> {
        if files.is_empty() {
            return Err(Error::BadRequest("No files provided".to_string()));
        }

        let job_id = Uuid::new_v4();
        let job_dir = self.upload_root.join(format!("ingest_{}", job_id));
        tokio::fs::create_dir_all(&job_dir).await?;

        let uploaded = match save_uploads(&job_dir, &files).await {
            Ok(names) => names,
            Err(e) => {
                remove_job_dir(&job_dir).await;
                return Err(e);
            }
        };

        let job = Job::queued(job_id, uploaded.clone());
        let store = Arc::clone(&self.store);
        let record = job.clone();
        if let Err(e) = blocking(move || store.insert(&record)).await {
            remove_job_dir(&job_dir).await;
            return Err(e);
        }

        tracing::info!("Job {} queued with {} files", job_id, uploaded.len());
        let worker = JobWorker::new(Arc::clone(&self.store), Arc::clone(&self.pipeline));
        tokio::spawn(worker.run(job_id, job_dir, uploaded));

        Ok(job)
    }

    /// Current record; a running job idle past the watchdog limit is failed and persisted
    pub async fn get_status(&self, job_id: Uuid) -> Result<Job> {
        let store = Arc::clone(&self.store);
        let idle = self.watchdog_idle;

        blocking(move || {
            let job = store.load(job_id)?.ok_or(Error::JobNotFound(job_id))?;
            apply_watchdog(store.as_ref(), job, idle)
        })
        .await
    }

    /// All job records with the watchdog applied, newest first
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let store = Arc::clone(&self.store);
        let idle = self.watchdog_idle;
        blocking(move || {
            store
                .list()?
                .into_iter()
                .map(|job| apply_watchdog(store.as_ref(), job, idle))
                .collect()
        })
        .await
    }
}

/// Fail a stale record; returns the record as it now stands
fn apply_watchdog(store: &dyn JobStore, job: Job, idle: chrono::Duration) -> Result<Job> {
    if !job.is_stale(Utc::now(), idle) {
        return Ok(job);
    }

    let note = watchdog_note(idle);
    store.update(job.id, &mut |job| {
        // Re-checked under the record lock: a worker may have finished meanwhile
        if !job.is_stale(Utc::now(), idle) {
            return Ok(false);
        }
        tracing::warn!("Job {} exceeded the watchdog limit in step {}", job.id, job.step);
        job.status = JobStatus::Error;
        job.note = note.clone();
        job.error = Some(note.clone());
        Ok(true)
    })
}

fn watchdog_note(idle: chrono::Duration) -> String {
    format!(
        "Watchdog timeout (> {} min without progress).",
        idle.num_minutes()
    )
}

/// Reduce a client-supplied name to its final component
fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

async fn save_uploads(job_dir: &Path, files: &[UploadedFile]) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(files.len());
    for file in files {
        let name = sanitize_filename(&file.filename)
            .ok_or_else(|| Error::BadRequest(format!("Invalid file name: {:?}", file.filename)))?;
        tokio::fs::write(job_dir.join(&name), &file.data).await?;
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

pub(crate) async fn remove_job_dir(job_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(job_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Could not clean up {}: {}", job_dir.display(), e);
        }
    }
}
