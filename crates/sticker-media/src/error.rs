//! Conversion errors.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// Why one file could not be converted.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    /// Non-zero exit; `stderr` holds the diagnostic tail
    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The child was killed
    #[error("Encoder timed out after {0} seconds")]
    Timeout(u64),

    /// Video search ran out of attempts
    #[error("Output is {size} bytes after {attempts} attempts, budget is {budget} bytes")]
    BudgetExceeded { size: u64, budget: u64, attempts: u32 },

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Not a usable video: {0}")]
    InvalidVideo(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error came from the size search rather than a tool or codec failure.
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, MediaError::BudgetExceeded { .. })
    }
}
