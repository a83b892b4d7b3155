//! Job lifecycle: records, the in-memory store, and the single-worker queue.

mod error;
mod model;
mod queue;
mod store;

pub use error::JobError;
pub use model::{Job, JobRequest, JobResult, JobStatus};
pub use queue::{JobHandler, JobQueue, JobWorker};
pub use store::{ABORTED_BY_USER, JobStore};
