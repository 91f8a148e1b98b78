//! Per-job processing loop.
//!
//! One task owns a job from start to finish. Files are converted strictly in
//! submission order; each file is fully resolved, with its finished event
//! published, before the next one starts. Cancellation is sampled only
//! before a file starts, so a cancel that lands during the last file does
//! not stop the job from packaging.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use sticker_media::StickerEngine;
use sticker_models::{ConversionRequest, FileResult, Job, JobEvent, JobId, JobStatus};
use sticker_queue::{JobHandle, ProgressPublisher, Target};

use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;
use crate::packager::{archive_name, package};

/// Message recorded when no file in the batch converted.
pub const NO_SUCCESS_MESSAGE: &str = "No files were successfully processed.";

/// Shared services every job task uses.
pub struct ProcessingContext {
    pub engine: StickerEngine,
    pub publisher: Arc<ProgressPublisher>,
    pub output_dir: PathBuf,
}

impl ProcessingContext {
    pub fn new(engine: StickerEngine, publisher: Arc<ProgressPublisher>, output_dir: PathBuf) -> Self {
        Self {
            engine,
            publisher,
            output_dir,
        }
    }

    fn publish(&self, target: &Target, event: JobEvent) {
        self.publisher.publish(target, event);
    }
}

/// An accepted job waiting for, or holding, a worker slot.
pub struct JobTask {
    pub handle: Arc<JobHandle>,
    pub requests: Vec<ConversionRequest>,
    pub target: Target,
}

/// Output name stem: `sticker_<1-based index>_<unix ts>_<job id prefix>`.
pub fn output_stem(index: usize, job_id: &JobId) -> String {
    format!(
        "sticker_{}_{}_{}",
        index + 1,
        chrono::Utc::now().timestamp(),
        job_id.short()
    )
}

/// Run a job to a terminal status.
pub async fn process_job(ctx: &ProcessingContext, task: &JobTask) -> WorkerResult<JobStatus> {
    let job_id = task.handle.id().clone();
    let logger = JobLogger::new(&job_id, "sticker_conversion");
    let span = logger.create_span();

    run_job(ctx, task, &logger).instrument(span).await
}

async fn run_job(
    ctx: &ProcessingContext,
    task: &JobTask,
    logger: &JobLogger,
) -> WorkerResult<JobStatus> {
    let handle = &task.handle;
    let job_id = handle.id();
    let total = task.requests.len() as u32;

    handle.start()?;
    logger.log_start(total);
    ctx.publish(&task.target, JobEvent::job_started(job_id, total));

    tokio::fs::create_dir_all(&ctx.output_dir).await?;

    for (index, request) in task.requests.iter().enumerate() {
        if handle.is_cancel_requested() {
            return finish_cancelled(ctx, task, logger);
        }

        let source_name = request.source_name();
        let progress = Job::percentage(index as u32, total);
        logger.log_progress(&format!("file {}/{}: {}", index + 1, total, source_name));
        ctx.publish(
            &task.target,
            JobEvent::file_started(job_id, request.file_id(), &source_name, progress),
        );

        let kind = request.media_kind().as_str();
        let started = Instant::now();
        let stem = output_stem(index, job_id);

        match ctx.engine.convert(request, &ctx.output_dir, &stem).await {
            Ok(converted) => {
                logger.log_file_success(
                    request.file_id(),
                    &converted.file_name,
                    converted.size,
                    converted.attempts,
                );
                metrics::record_file_success(kind, converted.attempts, started.elapsed());

                let result = FileResult {
                    file_id: request.file_id().to_string(),
                    original: source_name,
                    processed: converted.file_name.clone(),
                    path: converted.path,
                    size: converted.size,
                };
                handle.record_file(Some(result))?;
                ctx.publish(
                    &task.target,
                    JobEvent::file_succeeded(
                        job_id,
                        request.file_id(),
                        converted.file_name,
                        converted.size,
                    ),
                );
            }
            Err(e) => {
                let message = format!("Error processing {}: {}", source_name, e);
                logger.log_file_failure(request.file_id(), &message);
                let reason = if e.is_budget_exceeded() { "budget" } else { "error" };
                metrics::record_file_failure(kind, reason, started.elapsed());

                handle.record_file(None)?;
                ctx.publish(
                    &task.target,
                    JobEvent::file_failed(job_id, request.file_id(), message),
                );
            }
        }
    }

    let results = handle.file_results();
    if results.is_empty() {
        handle.fail(NO_SUCCESS_MESSAGE)?;
        logger.log_error(NO_SUCCESS_MESSAGE);
        ctx.publish(&task.target, JobEvent::job_failed(job_id, NO_SUCCESS_MESSAGE));
        return Ok(JobStatus::Error);
    }

    match package(ctx.output_dir.clone(), job_id.clone(), results.clone()).await {
        Ok(archive_path) => {
            handle.complete(archive_path.clone())?;
            logger.log_completion(&format!(
                "{} of {} files packaged",
                results.len(),
                total
            ));
            ctx.publish(
                &task.target,
                JobEvent::job_succeeded(job_id, archive_name(job_id), archive_path, results),
            );
            Ok(JobStatus::Complete)
        }
        Err(e) => {
            let message = format!("Failed to create archive: {}", e);
            handle.fail(message.clone())?;
            logger.log_error(&message);
            ctx.publish(&task.target, JobEvent::job_failed(job_id, message));
            Ok(JobStatus::Error)
        }
    }
}

fn finish_cancelled(
    ctx: &ProcessingContext,
    task: &JobTask,
    logger: &JobLogger,
) -> WorkerResult<JobStatus> {
    let handle = &task.handle;
    handle.mark_cancelled()?;

    let snapshot = handle.snapshot();
    logger.log_warning(&format!(
        "Cancelled after {} of {} files",
        snapshot.processed_files, snapshot.total_files
    ));
    ctx.publish(
        &task.target,
        JobEvent::job_cancelled(handle.id(), snapshot.progress),
    );
    Ok(JobStatus::Cancelled)
}
