//! Ingestion job record and its forward-only state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::IngestResult;

/// Step labels written into the job record
pub mod steps {
    pub const QUEUED: &str = "queued";
    pub const OPENING_FILES: &str = "opening-files";
    pub const INGEST_START: &str = "ingest-start";
    pub const COMPLETE: &str = "complete";
    pub const EXCEPTION: &str = "exception";

    /// Per-file step while the batch is ingested, e.g. `ingesting 2/5: q3.pdf`
    pub fn ingesting(position: usize, total: usize, filename: &str) -> String {
        format!("ingesting {}/{}: {}", position, total, filename)
    }
}

/// Human-readable notes written into the job record
pub mod notes {
    pub const QUEUED: &str = "Queued. Will start shortly…";
    pub const PARSING: &str = "Parsing and indexing…";
    pub const INDEXING: &str = "Indexing uploaded files…";
    pub const COMPLETED: &str = "Completed.";
    pub const FAILED: &str = "Failed during ingestion.";
}

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    fn rank(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Done | JobStatus::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Forward moves only; same-status rewrites are allowed until terminal
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of one upload-triggered ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    /// Uploaded file names
    pub uploaded: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Machine-readable progress label
    pub step: String,
    /// Human-readable progress note
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<IngestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

impl Job {
    /// A freshly submitted job
    pub fn queued(id: Uuid, uploaded: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            uploaded,
            started_at: now,
            updated_at: now,
            step: steps::QUEUED.to_string(),
            note: notes::QUEUED.to_string(),
            result: None,
            error: None,
            traceback: None,
        }
    }

    /// Move to `status` with a new step and note
    pub fn transition(&mut self, status: JobStatus, step: &str, note: &str) -> Result<()> {
        if !self.status.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.step = step.to_string();
        self.note = note.to_string();
        Ok(())
    }

    /// Non-terminal and without progress for longer than `idle`
    pub fn is_stale(&self, now: DateTime<Utc>, idle: chrono::Duration) -> bool {
        !self.status.is_terminal() && now.signed_duration_since(self.updated_at) > idle
    }
}
