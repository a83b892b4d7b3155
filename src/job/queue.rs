//! FIFO job queue with a single worker.
//!
//! Jobs run one at a time in submission order. Submission only records the
//! job and pushes its id onto a channel; the [`JobWorker`] pops ids, skips
//! jobs that were aborted or canceled while waiting, and drives the rest
//! through a [`JobHandler`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::error::JobError;
use super::model::{Job, JobRequest, JobResult, JobStatus};
use super::store::JobStore;

/// Executes one job request.
///
/// Implementations check `cancel` at safe points and return the partial
/// result when it fires. An `Err` marks the job failed.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Runs `request` to completion or until `cancel` fires.
    async fn run(
        &self,
        request: JobRequest,
        cancel: CancellationToken,
    ) -> anyhow::Result<JobResult>;
}

/// Submission side of the queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobQueue {
    store: Arc<JobStore>,
    sender: mpsc::UnboundedSender<String>,
}

/// Consumer side of the queue.
pub struct JobWorker {
    store: Arc<JobStore>,
    handler: Arc<dyn JobHandler>,
    receiver: mpsc::UnboundedReceiver<String>,
}

impl std::fmt::Debug for JobWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobWorker").finish_non_exhaustive()
    }
}

impl JobQueue {
    /// Creates a queue backed by `store` and the worker that drains it.
    #[must_use]
    pub fn new(store: Arc<JobStore>, handler: Arc<dyn JobHandler>) -> (Self, JobWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            store: Arc::clone(&store),
            sender,
        };
        let worker = JobWorker {
            store,
            handler,
            receiver,
        };
        (queue, worker)
    }

    /// Records a queued job and schedules it.
    ///
    /// # Errors
    ///
    /// [`JobError::QueueClosed`] when the worker has shut down; the job is
    /// recorded as failed.
    #[instrument(skip(self, request), fields(manga_id = %request.manga_id))]
    pub fn submit(&self, request: JobRequest) -> Result<Job, JobError> {
        let job = self.store.create(request);
        if self.sender.send(job.id.clone()).is_err() {
            self.store.fail(&job.id, JobError::QueueClosed.to_string());
            return Err(JobError::QueueClosed);
        }
        info!(job_id = %job.id, "job queued");
        Ok(job)
    }

    /// Snapshot of one job.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Job> {
        self.store.get(id)
    }

    /// Snapshot of every job, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<Job> {
        self.store.list()
    }

    /// Cancels a queued job.
    ///
    /// # Errors
    ///
    /// See [`JobStore::cancel`].
    pub fn cancel(&self, id: &str) -> Result<(), JobError> {
        self.store.cancel(id)
    }

    /// Aborts a queued or running job.
    ///
    /// # Errors
    ///
    /// See [`JobStore::abort`].
    pub fn abort(&self, id: &str) -> Result<JobStatus, JobError> {
        self.store.abort(id)
    }

    /// Shared job table.
    #[must_use]
    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }
}

impl JobWorker {
    /// Processes jobs until every [`JobQueue`] handle is dropped.
    pub async fn run(mut self) {
        while let Some(id) = self.receiver.recv().await {
            self.process(&id).await;
        }
        debug!("job queue closed, worker exiting");
    }

    /// Spawns [`JobWorker::run`] on the current runtime.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    #[instrument(skip(self))]
    async fn process(&self, id: &str) {
        let Some((request, cancel)) = self.store.start(id) else {
            debug!("discarding job that is no longer queued");
            return;
        };
        info!("job started");

        // A handler panic fails the job; the worker keeps draining.
        let handler = Arc::clone(&self.handler);
        let task = tokio::spawn(async move { handler.run(request, cancel).await });
        match task.await {
            Ok(Ok(result)) => self.store.complete(id, result),
            Ok(Err(err)) => self.store.fail(id, format!("{err:#}")),
            Err(join_error) => {
                error!(error = %join_error, "job task panicked");
                self.store.fail(id, format!("job task failed: {join_error}"));
            }
        }
    }
}
