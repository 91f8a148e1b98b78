//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use sticker_models::StickerLimits;
use sticker_queue::DEFAULT_SUBSCRIBER_BUFFER;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Directory uploads are read from
    pub upload_dir: PathBuf,
    /// Directory converted stickers and archives are written to
    pub output_dir: PathBuf,
    /// Wall-clock limit for one FFmpeg invocation
    pub video_timeout: Duration,
    /// Progress events buffered per subscriber
    pub subscriber_buffer: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Platform size and encoding limits
    pub limits: StickerLimits,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            upload_dir: PathBuf::from("./uploads"),
            output_dir: PathBuf::from("./output"),
            video_timeout: Duration::from_secs(120),
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            shutdown_timeout: Duration::from_secs(60),
            limits: StickerLimits::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            upload_dir: std::env::var("STICKER_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            output_dir: std::env::var("STICKER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./output")),
            video_timeout: Duration::from_secs(
                std::env::var("STICKER_VIDEO_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            subscriber_buffer: std::env::var("STICKER_SUBSCRIBER_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SUBSCRIBER_BUFFER),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            limits: StickerLimits::default(),
        }
    }

    /// Reject settings the pool cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(WorkerError::config_error(
                "max_concurrent_jobs must be at least 1",
            ));
        }
        if self.video_timeout.is_zero() {
            return Err(WorkerError::config_error("video_timeout must be positive"));
        }
        Ok(())
    }
}
