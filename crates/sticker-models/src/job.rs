//! Job definitions and lifecycle status.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used to keep output names unique across jobs.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle status.
///
/// `Pending -> Processing -> {Complete, Error, Cancelled}`. Terminal states
/// are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for a worker slot
    #[default]
    Pending,
    /// Owned by a worker, files being converted
    Processing,
    /// At least one file converted and archived
    Complete,
    /// No file converted
    Error,
    /// Stopped at a file boundary on request
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Error | JobStatus::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (
                    JobStatus::Processing,
                    JobStatus::Complete | JobStatus::Error | JobStatus::Cancelled
                )
        )
    }

    /// Validate a transition, returning the target status.
    pub fn transition(self, next: JobStatus) -> ModelResult<JobStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ModelError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of one successfully converted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FileResult {
    /// Caller-supplied file identifier
    pub file_id: String,
    /// Source file name
    pub original: String,
    /// Output file name (also the archive entry name)
    pub processed: String,
    /// Output location
    pub path: PathBuf,
    /// Output size in bytes
    pub size: u64,
}

/// Point-in-time view of a job, as returned by status queries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub job_id: JobId,

    /// Lifecycle status
    pub status: JobStatus,

    /// Number of files submitted
    pub total_files: u32,

    /// Number of files resolved so far (success or failure)
    pub processed_files: u32,

    /// Completion percentage (0-100)
    pub progress: u8,

    /// Successful outputs, in submission order
    #[serde(default)]
    pub file_results: Vec<FileResult>,

    /// Aggregate error message (empty unless status is error)
    #[serde(default)]
    pub error_message: String,

    /// Archive location, set only on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,

    /// Whether cancellation has been requested
    #[serde(default)]
    pub cancel_requested: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a fresh pending job.
    pub fn new(job_id: JobId, total_files: u32) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Pending,
            total_files,
            processed_files: 0,
            progress: 0,
            file_results: Vec::new(),
            error_message: String::new(),
            archive_path: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Integer completion percentage.
    pub fn percentage(processed_files: u32, total_files: u32) -> u8 {
        if total_files == 0 {
            return 0;
        }
        ((u64::from(processed_files) * 100) / u64::from(total_files)).min(100) as u8
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
