//! Durable job records: one JSON file per job, atomic replace, per-job write lock

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::job::Job;

/// Keyed job persistence. All methods block; call them off the async runtime.
pub trait JobStore: Send + Sync {
    /// Persist a new record as given
    fn insert(&self, job: &Job) -> Result<()>;

    /// Load a record, `None` if absent
    fn load(&self, id: Uuid) -> Result<Option<Job>>;

    /// Guarded read-modify-write. `apply` returns whether to persist; a persisted
    /// record gets a fresh `updated_at`. Errors from `apply` leave the record untouched.
    fn update(&self, id: Uuid, apply: &mut dyn FnMut(&mut Job) -> Result<bool>) -> Result<Job>;

    /// Every record, newest first
    fn list(&self) -> Result<Vec<Job>>;
}

/// `<dir>/<id>.json` records written through a temp file and an atomic rename
pub struct FileJobStore {
    dir: PathBuf,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl FileJobStore {
    /// Open (creating) the jobs directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry of a finished or missing job unless another caller holds it.
    /// Call while holding the guard taken from `lock`.
    fn release(&self, id: Uuid) {
        self.locks.remove_if(&id, |_, lock| Arc::strong_count(lock) <= 2);
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }

    fn read(&self, id: Uuid) -> Result<Option<Job>> {
        let path = self.path(id);
        match std::fs::read(&path) {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, job: &Job) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, job)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path(job.id))
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl JobStore for FileJobStore {
    fn insert(&self, job: &Job) -> Result<()> {
        let lock = self.lock(job.id);
        let _guard = lock.lock();
        self.write(job)?;
        if job.status.is_terminal() {
            self.release(job.id);
        }
        Ok(())
    }

    fn load(&self, id: Uuid) -> Result<Option<Job>> {
        self.read(id)
    }

    fn update(&self, id: Uuid, apply: &mut dyn FnMut(&mut Job) -> Result<bool>) -> Result<Job> {
        let lock = self.lock(id);
        let _guard = lock.lock();

        let Some(mut job) = self.read(id)? else {
            self.release(id);
            return Err(Error::JobNotFound(id));
        };
        let finished = job.status.is_terminal();
        let outcome = apply(&mut job).and_then(|persist| {
            if persist {
                job.updated_at = Utc::now();
                self.write(&job)?;
            }
            Ok(())
        });
        if finished || job.status.is_terminal() {
            self.release(id);
        }
        outcome.map(|()| job)
    }

    fn list(&self) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read(&path)
                .map_err(Error::from)
                .and_then(|raw| serde_json::from_slice::<Job>(&raw).map_err(Error::from))
            {
                Ok(job) => jobs.push(job),
                Err(e) => tracing::warn!("Skipping unreadable job record {}: {}", path.display(), e),
            }
        }
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(jobs)
    }
}
