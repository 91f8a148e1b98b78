//! Worker metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter is up to the
//! embedding process.

use metrics::{counter, histogram};
use std::time::Duration;

/// Metric name constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "sticker_jobs_submitted_total";
    /// Files per submitted job.
    pub const JOB_FILES: &str = "sticker_job_files";
    /// Finished jobs, labelled by final status.
    pub const JOBS_FINISHED_TOTAL: &str = "sticker_jobs_finished_total";
    /// Converted files, labelled by media kind and outcome.
    pub const FILES_PROCESSED_TOTAL: &str = "sticker_files_processed_total";
    /// Encodes performed per successful file.
    pub const ENCODE_ATTEMPTS: &str = "sticker_encode_attempts";
    pub const CONVERSION_DURATION_SECONDS: &str = "sticker_conversion_duration_seconds";
    pub use sticker_queue::EVENTS_DROPPED_METRIC as PROGRESS_EVENTS_DROPPED_TOTAL;
}

pub fn record_job_submitted(total_files: u32) {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
    histogram!(names::JOB_FILES).record(f64::from(total_files));
}

/// Record a job reaching a terminal status (`complete`, `error`, `cancelled`).
pub fn record_job_finished(status: &str) {
    counter!(names::JOBS_FINISHED_TOTAL, "status" => status.to_string()).increment(1);
}

pub fn record_file_success(kind: &str, attempts: u32, elapsed: Duration) {
    counter!(
        names::FILES_PROCESSED_TOTAL,
        "kind" => kind.to_string(),
        "outcome" => "success"
    )
    .increment(1);
    histogram!(names::ENCODE_ATTEMPTS, "kind" => kind.to_string()).record(f64::from(attempts));
    histogram!(names::CONVERSION_DURATION_SECONDS, "kind" => kind.to_string())
        .record(elapsed.as_secs_f64());
}

/// `reason` is `budget` when the size search ran out of attempts, `error` otherwise.
pub fn record_file_failure(kind: &str, reason: &str, elapsed: Duration) {
    counter!(
        names::FILES_PROCESSED_TOTAL,
        "kind" => kind.to_string(),
        "outcome" => "failure",
        "reason" => reason.to_string()
    )
    .increment(1);
    histogram!(names::CONVERSION_DURATION_SECONDS, "kind" => kind.to_string())
        .record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::JOBS_SUBMITTED_TOTAL.starts_with("sticker_"));
        assert!(names::FILES_PROCESSED_TOTAL.ends_with("_total"));
        assert!(names::PROGRESS_EVENTS_DROPPED_TOTAL.contains("dropped"));
    }

    #[test]
    fn test_recording_without_exporter() {
        record_job_submitted(3);
        record_file_success("image", 2, Duration::from_millis(40));
        record_file_failure("video", "budget", Duration::from_secs(1));
        record_job_finished("complete");
    }
}
