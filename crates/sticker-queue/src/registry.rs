//! Job registry and per-job state.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use sticker_models::{FileResult, Job, JobId, JobStatus};

use crate::error::{QueueError, QueueResult};

/// Shared state of one job.
///
/// The owning worker mutates the record through the lifecycle methods; any
/// caller may read a snapshot or raise the cancellation flag.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    cancel: AtomicBool,
    state: Mutex<Job>,
}

impl JobHandle {
    fn new(id: JobId, total_files: u32) -> Self {
        Self {
            state: Mutex::new(Job::new(id.clone(), total_files)),
            cancel: AtomicBool::new(false),
            id,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn total_files(&self) -> u32 {
        self.state.lock().total_files
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    /// Raise the cooperative cancellation flag.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Point-in-time copy of the job record.
    pub fn snapshot(&self) -> Job {
        let mut job = self.state.lock().clone();
        job.cancel_requested = self.is_cancel_requested();
        job
    }

    /// Successful outputs so far, in submission order.
    pub fn file_results(&self) -> Vec<FileResult> {
        self.state.lock().file_results.clone()
    }

    /// `pending -> processing`.
    pub fn start(&self) -> QueueResult<()> {
        self.transition(JobStatus::Processing, |_| {})
    }

    /// Count one more file as handled, appending its result when it succeeded.
    ///
    /// Returns the new completion percentage.
    pub fn record_file(&self, result: Option<FileResult>) -> QueueResult<u8> {
        let mut job = self.state.lock();
        if job.status != JobStatus::Processing {
            return Err(QueueError::not_processing(&self.id, job.status));
        }

        if job.processed_files < job.total_files {
            job.processed_files += 1;
        }
        if let Some(result) = result {
            job.file_results.push(result);
        }
        job.progress = Job::percentage(job.processed_files, job.total_files);
        job.updated_at = Utc::now();

        Ok(job.progress)
    }

    /// `processing -> complete`, recording the archive.
    pub fn complete(&self, archive_path: PathBuf) -> QueueResult<()> {
        self.transition(JobStatus::Complete, |job| {
            job.archive_path = Some(archive_path);
        })
    }

    /// `processing -> error` with an aggregate message.
    pub fn fail(&self, message: impl Into<String>) -> QueueResult<()> {
        let message = message.into();
        self.transition(JobStatus::Error, |job| {
            job.error_message = message;
        })
    }

    /// `processing -> cancelled`.
    pub fn mark_cancelled(&self) -> QueueResult<()> {
        self.transition(JobStatus::Cancelled, |_| {})
    }

    fn transition(&self, next: JobStatus, apply: impl FnOnce(&mut Job)) -> QueueResult<()> {
        let mut job = self.state.lock();
        let from = job.status;
        job.status = from.transition(next)?;
        apply(&mut job);
        job.updated_at = Utc::now();
        debug!(job_id = %self.id, from = %from, to = %next, "Job status changed");
        Ok(())
    }
}

/// In-memory map of every job submitted to this process.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<JobHandle>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending job with a fresh id.
    pub fn create(&self, total_files: u32) -> Arc<JobHandle> {
        let handle = Arc::new(JobHandle::new(JobId::new(), total_files));
        self.jobs
            .write()
            .insert(handle.id().clone(), Arc::clone(&handle));
        handle
    }

    /// Snapshot of a job, if known.
    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.handle(job_id).map(|h| h.snapshot())
    }

    pub fn handle(&self, job_id: &JobId) -> Option<Arc<JobHandle>> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Raise the cancellation flag. Returns false for unknown jobs.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        match self.handle(job_id) {
            Some(handle) => {
                handle.request_cancel();
                true
            }
            None => false,
        }
    }

    /// Drop a job from the registry regardless of its status.
    pub fn remove(&self, job_id: &JobId) -> Option<Arc<JobHandle>> {
        self.jobs.write().remove(job_id)
    }

    /// Drop terminal jobs last updated more than `max_age` ago. Returns how many went.
    pub fn evict_finished(&self, max_age: chrono::Duration) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            return 0;
        };
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, handle| {
            let job = handle.state.lock();
            !(job.status.is_terminal() && job.updated_at <= cutoff)
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!(evicted, remaining = jobs.len(), "Evicted finished jobs");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}
