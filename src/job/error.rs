//! Error types for job control.

use thiserror::Error;

use super::model::JobStatus;

/// Errors returned by job store and queue operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    /// No job with this id exists.
    #[error("job {id} not found")]
    NotFound {
        /// Requested id.
        id: String,
    },

    /// Only queued jobs can be canceled.
    #[error("job {id} cannot be canceled in status {status}")]
    NotCancelable {
        /// Job id.
        id: String,
        /// Status at the time of the request.
        status: JobStatus,
    },

    /// The job already reached a terminal state.
    #[error("job {id} cannot be aborted in status {status}")]
    NotAbortable {
        /// Job id.
        id: String,
        /// Status at the time of the request.
        status: JobStatus,
    },

    /// The worker is gone; no new jobs can be accepted.
    #[error("job queue is closed")]
    QueueClosed,
}

impl JobError {
    /// Creates a not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}
