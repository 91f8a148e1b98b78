//! Job executor: a fixed number of slots, one job per slot.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use sticker_media::StickerEngine;
use sticker_models::{ConversionRequest, FileConfig, Job, JobEvent, JobId, JobStatus};
use sticker_queue::{
    JobHandle, JobRegistry, ProgressPublisher, QueueError, SubscriberId, Subscription, Target,
};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::metrics;
use crate::processor::{process_job, JobTask, ProcessingContext};

/// Runs accepted jobs on a bounded pool.
///
/// `submit` returns as soon as the job is registered. A dispatcher hands jobs
/// to free slots in submission order; jobs beyond the pool size wait for a
/// slot.
pub struct JobExecutor {
    config: WorkerConfig,
    registry: Arc<JobRegistry>,
    publisher: Arc<ProgressPublisher>,
    submit_tx: Mutex<Option<mpsc::UnboundedSender<JobTask>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl JobExecutor {
    /// Start the dispatcher. Must be called from within a Tokio runtime.
    pub fn start(config: WorkerConfig, engine: StickerEngine) -> WorkerResult<Self> {
        config.validate()?;

        let registry = Arc::new(JobRegistry::new());
        let publisher = Arc::new(ProgressPublisher::new(config.subscriber_buffer));
        let ctx = Arc::new(ProcessingContext::new(
            engine,
            Arc::clone(&publisher),
            config.output_dir.clone(),
        ));

        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));

        info!(
            max_concurrent_jobs = config.max_concurrent_jobs,
            output_dir = %config.output_dir.display(),
            "Starting job executor"
        );
        let dispatcher = tokio::spawn(dispatch(ctx, semaphore, submit_rx));

        Ok(Self {
            config,
            registry,
            publisher,
            submit_tx: Mutex::new(Some(submit_tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// Validate and accept a batch. No job is created if any entry is invalid.
    pub fn submit(
        &self,
        files: Vec<FileConfig>,
        subscriber: Option<SubscriberId>,
    ) -> WorkerResult<JobId> {
        let requests = files
            .into_iter()
            .map(ConversionRequest::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(QueueError::from)?;
        self.submit_requests(requests, subscriber)
    }

    /// Accept an already-validated batch.
    pub fn submit_requests(
        &self,
        requests: Vec<ConversionRequest>,
        subscriber: Option<SubscriberId>,
    ) -> WorkerResult<JobId> {
        if requests.is_empty() {
            return Err(QueueError::EmptyBatch.into());
        }

        let sender = self.submit_tx.lock();
        let sender = sender.as_ref().ok_or(QueueError::Closed)?;

        let total_files = requests.len() as u32;
        let handle = self.registry.create(total_files);
        let job_id = handle.id().clone();

        let task = JobTask {
            handle,
            requests,
            target: Target::from(subscriber),
        };
        if sender.send(task).is_err() {
            self.registry.remove(&job_id);
            return Err(QueueError::Closed.into());
        }

        metrics::record_job_submitted(total_files);
        info!(job_id = %job_id, total_files, "Job submitted");
        Ok(job_id)
    }

    /// Snapshot of a job.
    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.registry.get(job_id)
    }

    /// Request cooperative cancellation. False if the job is unknown.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let found = self.registry.cancel(job_id);
        if found {
            info!(job_id = %job_id, "Cancellation requested");
        }
        found
    }

    /// Forget finished jobs older than `max_age`, keeping a long-lived worker bounded.
    pub fn evict_finished(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        self.registry.evict_finished(max_age)
    }

    pub fn subscribe(&self) -> Subscription {
        self.publisher.subscribe()
    }

    pub fn publisher(&self) -> &Arc<ProgressPublisher> {
        &self.publisher
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Poll until the job is terminal or `timeout` elapses.
    pub async fn wait_for(&self, job_id: &JobId, timeout: Duration) -> Option<Job> {
        let poll = async {
            loop {
                match self.registry.get(job_id) {
                    Some(job) if job.is_terminal() => return Some(job),
                    Some(_) => tokio::time::sleep(Duration::from_millis(20)).await,
                    None => return None,
                }
            }
        };
        tokio::time::timeout(timeout, poll).await.ok().flatten()
    }

    /// Stop accepting jobs and wait for queued and running ones to finish.
    pub async fn shutdown(&self) {
        drop(self.submit_tx.lock().take());

        let dispatcher = self.dispatcher.lock().take();
        let Some(dispatcher) = dispatcher else {
            return;
        };

        info!("Waiting for in-flight jobs to complete...");
        match tokio::time::timeout(self.config.shutdown_timeout, dispatcher).await {
            Ok(_) => info!("Job executor stopped"),
            Err(_) => warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "Shutdown timed out with jobs still running"
            ),
        }
    }
}

/// Hand queued jobs to free slots until the submit channel closes, then drain.
async fn dispatch(
    ctx: Arc<ProcessingContext>,
    semaphore: Arc<Semaphore>,
    mut submit_rx: mpsc::UnboundedReceiver<JobTask>,
) {
    let mut running = JoinSet::new();

    while let Some(task) = submit_rx.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("Job semaphore closed");
                break;
            }
        };
        debug!(job_id = %task.handle.id(), "Job assigned to worker slot");
        running.spawn(execute_job(Arc::clone(&ctx), task, permit));

        while running.try_join_next().is_some() {}
    }

    while running.join_next().await.is_some() {}
}

/// Run one job, isolating errors and panics from the pool.
async fn execute_job(ctx: Arc<ProcessingContext>, task: JobTask, permit: OwnedSemaphorePermit) {
    let _permit = permit;
    let handle = Arc::clone(&task.handle);
    let target = task.target.clone();
    let job_id = handle.id().clone();

    let job_ctx = Arc::clone(&ctx);
    let outcome = tokio::spawn(async move { process_job(&job_ctx, &task).await }).await;

    match outcome {
        Ok(Ok(status)) => {
            info!(job_id = %job_id, status = %status, "Job finished");
            metrics::record_job_finished(status.as_str());
        }
        Ok(Err(e)) => {
            error!(job_id = %job_id, error = %e, "Job failed");
            abort_job(&ctx, &handle, &target, format!("Processing failed: {}", e));
        }
        Err(join_err) => {
            error!(job_id = %job_id, error = %join_err, "Job task panicked");
            abort_job(&ctx, &handle, &target, "Internal error while processing job");
        }
    }
}

/// Force a job that died mid-run into the error state.
fn abort_job(
    ctx: &ProcessingContext,
    handle: &JobHandle,
    target: &Target,
    message: impl Into<String>,
) {
    let message = message.into();

    if handle.status() == JobStatus::Pending {
        let _ = handle.start();
    }
    if handle.status().is_terminal() {
        return;
    }
    if let Err(e) = handle.fail(message.clone()) {
        warn!(job_id = %handle.id(), error = %e, "Could not record job failure");
        return;
    }

    metrics::record_job_finished(JobStatus::Error.as_str());
    ctx.publisher
        .publish(target, JobEvent::job_failed(handle.id(), message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use sticker_models::{ImageEncoding, Variant};

    fn detached_executor() -> (JobExecutor, mpsc::UnboundedReceiver<JobTask>) {
        let config = WorkerConfig::default();
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let executor = JobExecutor {
            publisher: Arc::new(ProgressPublisher::new(config.subscriber_buffer)),
            config,
            registry: Arc::new(JobRegistry::new()),
            submit_tx: Mutex::new(Some(submit_tx)),
            dispatcher: Mutex::new(None),
        };
        (executor, submit_rx)
    }

    fn request() -> ConversionRequest {
        ConversionRequest::image("f1", "a.png", ImageEncoding::Lossy, Variant::Standard)
    }

    #[test]
    fn test_failed_handoff_leaves_no_job() {
        let (executor, submit_rx) = detached_executor();
        drop(submit_rx);

        let err = executor.submit_requests(vec![request()], None).unwrap_err();

        assert!(err.is_rejected_submission());
        assert!(executor.registry.is_empty());
    }

    #[test]
    fn test_accepted_job_is_pending_until_dispatched() {
        let (executor, mut submit_rx) = detached_executor();

        let job_id = executor.submit_requests(vec![request()], None).unwrap();

        assert_eq!(executor.get(&job_id).unwrap().status, JobStatus::Pending);
        let task = submit_rx.try_recv().unwrap();
        assert_eq!(task.handle.id(), &job_id);
        assert_eq!(task.target, Target::Broadcast);
    }
}
