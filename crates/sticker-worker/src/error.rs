//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Packaging failed: {0}")]
    PackagingFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] sticker_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] sticker_queue::QueueError),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn packaging_failed(msg: impl Into<String>) -> Self {
        Self::PackagingFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the submission itself was rejected, as opposed to a failure while running.
    pub fn is_rejected_submission(&self) -> bool {
        matches!(
            self,
            WorkerError::Queue(
                sticker_queue::QueueError::EmptyBatch
                    | sticker_queue::QueueError::Model(_)
                    | sticker_queue::QueueError::Closed
            )
        )
    }
}
