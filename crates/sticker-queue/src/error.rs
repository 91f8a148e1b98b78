//! Queue error types.

use sticker_models::{JobId, JobStatus, ModelError};
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Batch contains no files")]
    EmptyBatch,

    #[error("Job {job_id} is {status}, expected processing")]
    NotProcessing { job_id: JobId, status: JobStatus },

    #[error("Worker pool is shut down")]
    Closed,
}

impl QueueError {
    pub fn not_processing(job_id: &JobId, status: JobStatus) -> Self {
        Self::NotProcessing {
            job_id: job_id.clone(),
            status,
        }
    }
}
