//! Background ingestion jobs with durable status records

mod job;
mod job_queue;
mod job_store;
mod worker;

pub use job::{notes, steps, Job, JobStatus};
pub use job_queue::{JobManager, UploadedFile};
pub use job_store::{FileJobStore, JobStore};
pub use worker::JobWorker;

use crate::error::{Error, Result};

/// Run blocking record I/O off the async runtime
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
}
