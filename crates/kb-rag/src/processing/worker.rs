//! Background worker driving one ingestion job to a terminal state

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{panic_message, Result};
use crate::ingestion::{IngestPipeline, IngestProgress};
use crate::types::IngestResult;

use super::blocking;
use super::job::{notes, steps, Job, JobStatus};
use super::job_queue::remove_job_dir;
use super::job_store::JobStore;

/// Runs the ingestion for a submitted job and records every step
pub struct JobWorker {
    store: Arc<dyn JobStore>,
    pipeline: Arc<IngestPipeline>,
}

impl JobWorker {
    pub fn new(store: Arc<dyn JobStore>, pipeline: Arc<IngestPipeline>) -> Self {
        Self { store, pipeline }
    }

    /// Process the job to `done` or `error`. Never panics; the job directory is always removed.
    pub async fn run(self, job_id: Uuid, job_dir: PathBuf, uploaded: Vec<String>) {
        tracing::info!("Processing job {} with {} files", job_id, uploaded.len());

        let outcome = AssertUnwindSafe(self.process(job_id, &job_dir, &uploaded))
            .catch_unwind()
            .await;
        remove_job_dir(&job_dir).await;

        let recorded = match outcome {
            Ok(Ok(result)) => {
                tracing::info!(
                    "Job {} completed: {} chunks added",
                    job_id,
                    result.chunks_added
                );
                self.record(job_id, move |job| {
                    job.transition(JobStatus::Done, steps::COMPLETE, notes::COMPLETED)?;
                    job.result = Some(result.clone());
                    Ok(())
                })
                .await
            }
            Ok(Err(e)) => {
                tracing::error!("Job {} failed: {}", job_id, e);
                self.fail(job_id, e.to_string(), e.chain()).await
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Job {} panicked: {}", job_id, message);
                self.fail(
                    job_id,
                    "Ingestion worker panicked".to_string(),
                    format!("panicked: {}", message),
                )
                .await
            }
        };

        if let Err(e) = recorded {
            tracing::warn!("Final state of job {} not recorded: {}", job_id, e);
        }
    }

    async fn process(&self, job_id: Uuid, job_dir: &Path, uploaded: &[String]) -> Result<IngestResult> {
        self.record(job_id, |job| {
            job.transition(JobStatus::Processing, steps::OPENING_FILES, notes::PARSING)
        })
        .await?;

        let mut files = Vec::with_capacity(uploaded.len());
        for name in uploaded {
            let path = job_dir.join(name);
            tokio::fs::metadata(&path).await?;
            files.push(path);
        }

        self.record(job_id, |job| {
            job.transition(JobStatus::Processing, steps::INGEST_START, notes::INDEXING)
        })
        .await?;

        let progress = StepReporter { worker: self, job_id };
        self.pipeline.ingest_uploads_with_progress(&files, &progress).await
    }

    async fn fail(&self, job_id: Uuid, error: String, traceback: String) -> Result<Job> {
        self.record(job_id, move |job| {
            job.transition(JobStatus::Error, steps::EXCEPTION, notes::FAILED)?;
            job.error = Some(error.clone());
            job.traceback = Some(traceback.clone());
            Ok(())
        })
        .await
    }

    /// Apply a change to the stored record under its lock
    async fn record<F>(&self, job_id: Uuid, mut apply: F) -> Result<Job>
    where
        F: FnMut(&mut Job) -> Result<()> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        blocking(move || {
            store.update(job_id, &mut |job| {
                apply(job)?;
                Ok(true)
            })
        })
        .await
    }
}

/// Writes a per-file step, which also keeps the record clear of the watchdog
struct StepReporter<'a> {
    worker: &'a JobWorker,
    job_id: Uuid,
}

#[async_trait]
impl IngestProgress for StepReporter<'_> {
    async fn file_started(&self, position: usize, total: usize, filename: &str) {
        let step = steps::ingesting(position, total, filename);
        let recorded = self
            .worker
            .record(self.job_id, move |job| {
                job.transition(JobStatus::Processing, &step, notes::INDEXING)
            })
            .await;
        if let Err(e) = recorded {
            tracing::warn!("Progress of job {} not recorded: {}", self.job_id, e);
        }
    }
}
