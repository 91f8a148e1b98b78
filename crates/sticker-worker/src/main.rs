//! Sticker conversion worker binary.

use anyhow::Context;
use clap::Parser;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sticker_media::{
    format_size, validate_upload, FfmpegTranscoder, MediaCapabilities, NoBackgroundRemover,
    StickerEngine,
};
use sticker_models::{FileConfig, JobEvent, JobStatus};
use sticker_worker::{JobExecutor, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "sticker-worker", version, about = "Convert media files into sticker packs")]
struct Cli {
    /// Images, GIFs or videos to convert, processed in the given order
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Output profile: sticker, icon or emoji
    #[arg(long, env = "STICKER_MODE", default_value = "sticker")]
    mode: String,
    /// Image encoding: webp or png
    #[arg(long, env = "STICKER_FORMAT", default_value = "webp")]
    format: String,
    #[arg(long, env = "STICKER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
    #[arg(long, env = "WORKER_MAX_JOBS")]
    workers: Option<usize>,
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("sticker=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// Build per-file configs, skipping files of unsupported types.
///
/// Relative paths that do not exist are looked up in the upload directory.
fn file_configs(cli: &Cli, upload_dir: &Path) -> Vec<FileConfig> {
    let mut configs = Vec::new();

    for (index, path) in cli.files.iter().enumerate() {
        let path = if path.is_relative() && !path.exists() {
            upload_dir.join(path)
        } else {
            path.clone()
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

        match validate_upload(&name, size) {
            Ok(check) => {
                for warning in &check.warnings {
                    warn!(file = %path.display(), "{}", warning);
                }
                configs.push(FileConfig {
                    file_id: format!("file_{}", index + 1),
                    upload_path: path.clone(),
                    file_type: check.kind.as_str().to_string(),
                    output_format: Some(cli.format.clone()),
                    mode: Some(cli.mode.clone()),
                });
            }
            Err(e) => error!(file = %path.display(), error = %e, "Skipping file"),
        }
    }

    configs
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();

    let mut config = WorkerConfig::from_env();
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(workers) = cli.workers {
        config.max_concurrent_jobs = workers;
    }
    info!("Worker config: {:?}", config);

    let caps = MediaCapabilities::detect(&NoBackgroundRemover);
    let transcoder = FfmpegTranscoder::from_capabilities(&caps, config.video_timeout)
        .unwrap_or_else(|_| FfmpegTranscoder::new(config.video_timeout));
    let engine = StickerEngine::new(Arc::new(transcoder), config.limits.clone());

    let files = file_configs(&cli, &config.upload_dir);
    let executor = JobExecutor::start(config, engine).context("Failed to start job executor")?;

    let subscription = executor.subscribe();
    let job_id = executor
        .submit(files, Some(subscription.id().clone()))
        .context("Job rejected")?;

    let mut events = Box::pin(subscription.into_stream());
    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                println!("{}", serde_json::to_string(&event)?);
                if matches!(&event.event, JobEvent::JobFinished { job_id: id, .. } if *id == job_id) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, cancelling job");
                executor.cancel(&job_id);
            }
        }
    }

    executor.shutdown().await;

    let job = executor
        .get(&job_id)
        .context("Job disappeared from registry")?;
    for result in &job.file_results {
        info!(
            original = %result.original,
            output = %result.processed,
            size = %format_size(result.size),
            "Sticker ready"
        );
    }
    if let Some(archive) = &job.archive_path {
        info!(archive = %archive.display(), "Archive written");
    }
    info!(
        job_id = %job_id,
        status = %job.status,
        processed = job.processed_files,
        total = job.total_files,
        "Worker shutdown complete"
    );

    if job.status != JobStatus::Complete {
        std::process::exit(1);
    }
    Ok(())
}
