//! In-memory job table.
//!
//! The store is created once at startup and shared (`Arc<JobStore>`) between
//! the submission surface and the worker. It is never persisted: a restart
//! forgets every job.
//!
//! # Transitions
//!
//! ```text
//! queued  -> running -> completed | failed
//! queued  -> canceled | aborted
//! running -> aborted              (cooperative: the pipeline notices at the next chapter)
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::error::JobError;
use super::model::{Job, JobRequest, JobResult, JobStatus};

/// Error text recorded on user aborts.
pub const ABORTED_BY_USER: &str = "Aborted by user";

#[derive(Debug)]
struct JobRecord {
    job: Job,
    cancel: CancellationToken,
}

/// Shared job table.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl JobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Every update is a plain field write, so a poisoned table is still consistent.
    fn table(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a new queued job.
    #[instrument(skip(self))]
    pub fn create(&self, request: JobRequest) -> Job {
        let job = Job::queued(request);
        debug!(job_id = %job.id, "job created");
        self.table().insert(
            job.id.clone(),
            JobRecord {
                job: job.clone(),
                cancel: CancellationToken::new(),
            },
        );
        job
    }

    /// Snapshot of one job.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Job> {
        self.table().get(id).map(|record| record.job.clone())
    }

    /// Snapshot of every job, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .table()
            .values()
            .map(|record| record.job.clone())
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Moves a queued job to running and hands out its request and
    /// cancellation token. `None` when the job is unknown or no longer
    /// queued (aborted or canceled while waiting).
    pub fn start(&self, id: &str) -> Option<(JobRequest, CancellationToken)> {
        let mut table = self.table();
        let record = table.get_mut(id)?;
        if record.job.status != JobStatus::Queued {
            debug!(job_id = id, status = %record.job.status, "job not runnable");
            return None;
        }
        record.job.status = JobStatus::Running;
        record.job.started_at = Some(Utc::now());
        Some((record.job.request.clone(), record.cancel.clone()))
    }

    /// Attaches the pipeline result. The job becomes `completed`, unless it
    /// was aborted while running, in which case it stays `aborted`.
    pub fn complete(&self, id: &str, result: JobResult) {
        let mut table = self.table();
        let Some(record) = table.get_mut(id) else {
            return;
        };
        if record.job.status != JobStatus::Aborted {
            record.job.status = JobStatus::Completed;
        }
        record.job.result = Some(result);
        record.job.finished_at = Some(Utc::now());
        info!(job_id = id, status = %record.job.status, "job finished");
    }

    /// Marks the job failed with `error`; no result is attached.
    pub fn fail(&self, id: &str, error: impl Into<String>) {
        let mut table = self.table();
        let Some(record) = table.get_mut(id) else {
            return;
        };
        record.job.status = JobStatus::Failed;
        record.job.error = Some(error.into());
        record.job.result = None;
        record.job.finished_at = Some(Utc::now());
        info!(job_id = id, error = ?record.job.error, "job failed");
    }

    /// Aborts a queued or running job and returns its new status.
    ///
    /// A running job keeps executing until the pipeline observes its
    /// cancellation token at the next chapter boundary.
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`] for an unknown id, [`JobError::NotAbortable`]
    /// for a job already in a terminal state.
    #[instrument(skip(self))]
    pub fn abort(&self, id: &str) -> Result<JobStatus, JobError> {
        let mut table = self.table();
        let record = table.get_mut(id).ok_or_else(|| JobError::not_found(id))?;
        match record.job.status {
            JobStatus::Queued => {
                record.job.finished_at = Some(Utc::now());
            }
            JobStatus::Running => {}
            status => {
                return Err(JobError::NotAbortable {
                    id: id.to_string(),
                    status,
                });
            }
        }
        record.job.status = JobStatus::Aborted;
        record.job.error = Some(ABORTED_BY_USER.to_string());
        record.cancel.cancel();
        info!(job_id = id, "job aborted");
        Ok(JobStatus::Aborted)
    }

    /// Cancels a job that has not started.
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`] for an unknown id, [`JobError::NotCancelable`]
    /// unless the job is queued.
    #[instrument(skip(self))]
    pub fn cancel(&self, id: &str) -> Result<(), JobError> {
        let mut table = self.table();
        let record = table.get_mut(id).ok_or_else(|| JobError::not_found(id))?;
        if record.job.status != JobStatus::Queued {
            return Err(JobError::NotCancelable {
                id: id.to_string(),
                status: record.job.status,
            });
        }
        record.job.status = JobStatus::Canceled;
        record.job.finished_at = Some(Utc::now());
        record.cancel.cancel();
        info!(job_id = id, "job canceled");
        Ok(())
    }
}
