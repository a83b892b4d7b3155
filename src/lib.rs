//! mangadl core library
//!
//! Downloads manga chapters from a MangaDex-compatible API and packages
//! each one as a CBZ archive with an embedded `ComicInfo.xml`, ready for a
//! comics library server such as Komga.
//!
//! # Architecture
//!
//! - [`api`] - Rate-limited, auth-refreshing HTTP client and payload models
//! - [`catalog`] - Chapter discovery (adaptive pagination) and filtering
//! - [`download`] - Per-chapter image acquisition with tier fallback
//! - [`archive`] - `ComicInfo.xml`, JPEG normalization, CBZ packaging
//! - [`library`] - Series assets and library scan notification
//! - [`job`] - Job records, in-memory store, FIFO single-worker queue
//! - [`pipeline`] - [`DownloadManager`], the per-job pipeline
//! - [`config`] - [`Settings`] from environment and secret files

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod archive;
pub mod catalog;
pub mod config;
pub mod download;
pub mod job;
pub mod library;
pub mod pipeline;
pub mod user_agent;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, ClientConfig, Credentials, RateLimiter, RetryPolicy};
pub use archive::{ArchiveError, ArchivePackager, ComicInfo};
pub use catalog::{Chapter, ChapterFilter, ChapterLister};
pub use config::{ConfigError, Settings};
pub use download::{ChapterFetch, FetchSettings, ImageFetcher, ImageTier};
pub use job::{Job, JobError, JobHandler, JobQueue, JobRequest, JobResult, JobStatus, JobStore};
pub use library::{KomgaConfig, KomgaNotifier, LibraryNotifier, NoopNotifier, ScanOutcome};
pub use pipeline::{DownloadManager, PipelineOptions};
