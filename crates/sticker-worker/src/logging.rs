//! Structured job logging utilities.

use tracing::{error, info, warn, Span};

use sticker_models::JobId;

/// Job logger carrying the job id and operation on every record.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, total_files: u32) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            total_files,
            "Job started"
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    /// A file converted successfully.
    pub fn log_file_success(&self, file_id: &str, output: &str, size: u64, attempts: u32) {
        info!(
            job_id = %self.job_id,
            file_id,
            output,
            size,
            attempts,
            "File converted"
        );
    }

    /// A file failed; the job continues with the next one.
    pub fn log_file_failure(&self, file_id: &str, error: &str) {
        warn!(
            job_id = %self.job_id,
            file_id,
            error,
            "File conversion failed"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span wrapping the whole job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "sticker_conversion");

        assert_eq!(logger.job_id(), job_id.as_str());
        assert_eq!(logger.operation(), "sticker_conversion");
    }

    #[test]
    fn test_logging_without_subscriber() {
        let logger = JobLogger::new(&JobId::from_string("job-1"), "sticker_conversion");
        logger.log_start(3);
        logger.log_file_success("f1", "sticker_1.webp", 2048, 1);
        logger.log_file_failure("f2", "Image codec error");
        logger.log_completion("done");
        let _span = logger.create_span().entered();
    }
}
