//! Seam between the conversion algorithms and the external FFmpeg tools.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::trace;

use crate::capabilities::MediaCapabilities;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video_with, VideoInfo};

/// Executes probe and encode invocations.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Inspect a source file.
    async fn probe(&self, source: &Path) -> MediaResult<VideoInfo>;

    /// Run one encode to completion, writing `cmd.output_path()`.
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()>;
}

/// Transcoder backed by the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
    ffprobe: PathBuf,
}

impl FfmpegTranscoder {
    /// Resolve both tools from PATH at invocation time.
    pub fn new(timeout: Duration) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(timeout),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    /// Use the executables found by a capability probe.
    ///
    /// Fails when FFmpeg is missing. A missing FFprobe is tolerated: every
    /// probe then fails and callers fall back to default dimensions.
    pub fn from_capabilities(caps: &MediaCapabilities, timeout: Duration) -> MediaResult<Self> {
        let ffmpeg = caps.ffmpeg.clone().ok_or(MediaError::FfmpegNotFound)?;
        Ok(Self {
            runner: FfmpegRunner::new()
                .with_program(ffmpeg)
                .with_timeout(timeout),
            ffprobe: caps
                .ffprobe
                .clone()
                .unwrap_or_else(|| PathBuf::from("ffprobe")),
        })
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe(&self, source: &Path) -> MediaResult<VideoInfo> {
        probe_video_with(&self.ffprobe, source).await
    }

    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let cap_ms = cmd
            .output_value("-t")
            .and_then(|t| t.parse::<i64>().ok())
            .map_or(0, |secs| secs * 1000);
        let output = cmd.output_path().display().to_string();

        self.runner
            .run_with_progress(cmd, move |progress| {
                trace!(
                    output = %output,
                    percent = progress.percentage(cap_ms),
                    bytes = progress.total_size,
                    done = progress.is_complete,
                    "Encode progress"
                );
            })
            .await
    }
}
