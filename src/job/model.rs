//! Job records and their serialized shape.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ChapterFilter;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the queue.
    Queued,
    /// Being executed by the worker.
    Running,
    /// Finished normally.
    Completed,
    /// Stopped by an unexpected error.
    Failed,
    /// Withdrawn before it started.
    Canceled,
    /// Stopped on user request (queued or running).
    Aborted,
}

impl JobStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Canceled | Self::Aborted
        )
    }

    /// Wire name (`queued`, `running`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to download.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRequest {
    /// Title identifier.
    pub manga_id: String,
    /// Translation language; the configured default when absent.
    #[serde(default)]
    pub language: Option<String>,
    /// Volume labels to keep (empty keeps all).
    #[serde(default)]
    pub volumes: Vec<String>,
    /// Chapter labels, or a two-number inclusive range (empty keeps all).
    #[serde(default)]
    pub chapters: Vec<String>,
}

impl JobRequest {
    /// A request for every chapter of a title in the default language.
    #[must_use]
    pub fn new(manga_id: impl Into<String>) -> Self {
        Self {
            manga_id: manga_id.into(),
            ..Self::default()
        }
    }

    /// Chapter filter described by this request.
    #[must_use]
    pub fn filter(&self) -> ChapterFilter {
        ChapterFilter::new(&self.volumes, &self.chapters)
    }
}

/// Counters reported when a job's pipeline finishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobResult {
    /// Chapters examined after filtering.
    pub chapters_processed: usize,
    /// Chapters written as archives.
    pub chapters_packaged: usize,
    /// Archive paths, in packaging order.
    pub files_created: Vec<PathBuf>,
    /// Chapters skipped for any reason.
    pub skipped_chapters: usize,
    /// Skipped because the listing had no chapter id.
    pub skipped_no_id: usize,
    /// Skipped because the chapter is hosted elsewhere.
    pub skipped_external: usize,
    /// Skipped because no image source or no image could be obtained.
    pub skipped_no_images: usize,
    /// Image and resolution failures.
    pub errors: u32,
}

/// A job and its current state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    /// Job identifier (UUID v4).
    pub id: String,
    /// Current state.
    pub status: JobStatus,
    /// Original request.
    pub request: JobRequest,
    /// Counters, attached when the pipeline finishes (also for aborted jobs).
    pub result: Option<JobResult>,
    /// Failure or abort description.
    pub error: Option<String>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Time the worker picked the job up.
    pub started_at: Option<DateTime<Utc>>,
    /// Time the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A freshly queued job.
    #[must_use]
    pub fn queued(request: JobRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            request,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}
