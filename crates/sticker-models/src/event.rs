//! Progress event payloads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::{FileResult, JobId};

/// Structured progress event for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Worker picked the job up
    JobStarted {
        job_id: JobId,
        total_files: u32,
        message: String,
        progress: u8,
    },

    /// A file is about to be converted
    FileStarted {
        job_id: JobId,
        file_id: String,
        message: String,
        progress: u8,
    },

    /// A file finished converting
    FileFinished {
        job_id: JobId,
        file_id: String,
        outcome: FileOutcome,
    },

    /// The job reached a terminal state
    JobFinished { job_id: JobId, outcome: JobOutcome },
}

/// Result of a single file conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Success { processed_name: String, size: u64 },
    Failure { message: String },
}

/// Terminal result of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Success {
        message: String,
        archive_name: String,
        archive_path: PathBuf,
        files: Vec<FileResult>,
    },
    Failure {
        message: String,
    },
    Cancelled {
        message: String,
        progress: u8,
    },
}

impl JobEvent {
    pub fn job_started(job_id: &JobId, total_files: u32) -> Self {
        JobEvent::JobStarted {
            job_id: job_id.clone(),
            total_files,
            message: format!("Starting processing of {} files...", total_files),
            progress: 0,
        }
    }

    pub fn file_started(
        job_id: &JobId,
        file_id: impl Into<String>,
        source_name: &str,
        progress: u8,
    ) -> Self {
        JobEvent::FileStarted {
            job_id: job_id.clone(),
            file_id: file_id.into(),
            message: format!("Processing {}...", source_name),
            progress: progress.min(100),
        }
    }

    pub fn file_succeeded(
        job_id: &JobId,
        file_id: impl Into<String>,
        processed_name: impl Into<String>,
        size: u64,
    ) -> Self {
        JobEvent::FileFinished {
            job_id: job_id.clone(),
            file_id: file_id.into(),
            outcome: FileOutcome::Success {
                processed_name: processed_name.into(),
                size,
            },
        }
    }

    pub fn file_failed(
        job_id: &JobId,
        file_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        JobEvent::FileFinished {
            job_id: job_id.clone(),
            file_id: file_id.into(),
            outcome: FileOutcome::Failure {
                message: message.into(),
            },
        }
    }

    pub fn job_succeeded(
        job_id: &JobId,
        archive_name: impl Into<String>,
        archive_path: impl Into<PathBuf>,
        files: Vec<FileResult>,
    ) -> Self {
        JobEvent::JobFinished {
            job_id: job_id.clone(),
            outcome: JobOutcome::Success {
                message: format!("Successfully processed {} files!", files.len()),
                archive_name: archive_name.into(),
                archive_path: archive_path.into(),
                files,
            },
        }
    }

    pub fn job_failed(job_id: &JobId, message: impl Into<String>) -> Self {
        JobEvent::JobFinished {
            job_id: job_id.clone(),
            outcome: JobOutcome::Failure {
                message: message.into(),
            },
        }
    }

    pub fn job_cancelled(job_id: &JobId, progress: u8) -> Self {
        JobEvent::JobFinished {
            job_id: job_id.clone(),
            outcome: JobOutcome::Cancelled {
                message: "Processing cancelled".to_string(),
                progress,
            },
        }
    }

    /// Job this event belongs to.
    pub fn job_id(&self) -> &JobId {
        match self {
            JobEvent::JobStarted { job_id, .. }
            | JobEvent::FileStarted { job_id, .. }
            | JobEvent::FileFinished { job_id, .. }
            | JobEvent::JobFinished { job_id, .. } => job_id,
        }
    }

    /// Whether no further events will follow for this job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::JobFinished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let job_id = JobId::from_string("job-1");
        let event = JobEvent::file_succeeded(&job_id, "f1", "sticker_1.webp", 1234);
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains("\"type\":\"file_finished\""));
        assert!(json.contains("\"status\":\"success\""));
        assert!(json.contains("\"processed_name\":\"sticker_1.webp\""));
        assert!(json.contains("\"job_id\":\"job-1\""));
    }

    #[test]
    fn test_job_succeeded_message() {
        let job_id = JobId::from_string("job-1");
        let files = vec![FileResult {
            file_id: "f1".to_string(),
            original: "cat.png".to_string(),
            processed: "sticker_1.webp".to_string(),
            path: PathBuf::from("/out/sticker_1.webp"),
            size: 10,
        }];
        let event = JobEvent::job_succeeded(&job_id, "a.zip", "/out/a.zip", files);

        match &event {
            JobEvent::JobFinished {
                outcome: JobOutcome::Success { message, .. },
                ..
            } => assert_eq!(message, "Successfully processed 1 files!"),
            other => panic!("Expected job success, got {:?}", other),
        }
        assert!(event.is_terminal());
    }

    #[test]
    fn test_file_started_clamps_progress() {
        let job_id = JobId::new();
        let event = JobEvent::file_started(&job_id, "f1", "cat.png", 150);
        if let JobEvent::FileStarted {
            progress, message, ..
        } = event
        {
            assert_eq!(progress, 100);
            assert_eq!(message, "Processing cat.png...");
        } else {
            panic!("Expected FileStarted");
        }
    }

    #[test]
    fn test_event_roundtrip_through_json() {
        let job_id = JobId::new();
        let event = JobEvent::job_cancelled(&job_id, 50);
        let json = serde_json::to_string(&event).unwrap();
        let back: JobEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.job_id(), &job_id);
    }
}
