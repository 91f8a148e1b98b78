//! Shared fixtures for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use sticker_media::{FfmpegCommand, MediaError, MediaResult, StickerEngine, Transcoder, VideoInfo};
use sticker_models::{FileConfig, StickerLimits};
use sticker_queue::{ProgressEvent, Subscription};
use sticker_worker::{JobExecutor, WorkerConfig};

/// Stand-in for FFmpeg: writes an output whose size depends on the bitrate.
pub struct FakeTranscoder {
    size_for_kbps: Box<dyn Fn(u32) -> u64 + Send + Sync>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    panic_on_run: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTranscoder {
    pub fn new(size_for_kbps: impl Fn(u32) -> u64 + Send + Sync + 'static) -> Self {
        Self {
            size_for_kbps: Box::new(size_for_kbps),
            delay: Duration::ZERO,
            gate: None,
            panic_on_run: false,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Output always fits the standard video budget.
    pub fn fitting() -> Self {
        Self::new(|_| 10 * 1024)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every run waits for a permit on `gate`.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn panicking() -> Self {
        let mut fake = Self::fitting();
        fake.panic_on_run = true;
        fake
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn probe(&self, _source: &Path) -> MediaResult<VideoInfo> {
        Ok(VideoInfo {
            duration: 5.0,
            width: 1280,
            height: 720,
            fps: 30.0,
            frames: 150,
            codec: "h264".to_string(),
        })
    }

    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panic_on_run {
            panic!("encoder crashed");
        }

        let kbps = cmd
            .output_value("-b:v")
            .and_then(|v| v.trim_end_matches('k').parse().ok())
            .ok_or_else(|| MediaError::internal("missing bitrate"))?;
        let size = (self.size_for_kbps)(kbps);
        std::fs::write(cmd.output_path(), vec![0u8; size as usize])?;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn start_executor(output_dir: &Path, transcoder: Arc<FakeTranscoder>, workers: usize) -> JobExecutor {
    let config = WorkerConfig {
        max_concurrent_jobs: workers,
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    };
    let engine = StickerEngine::new(transcoder, StickerLimits::default());
    JobExecutor::start(config, engine).unwrap()
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
    .save(&path)
    .unwrap();
    path
}

pub fn write_bytes(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

pub fn image_config(file_id: &str, path: &Path) -> FileConfig {
    FileConfig {
        file_id: file_id.to_string(),
        upload_path: path.to_path_buf(),
        file_type: "image".to_string(),
        output_format: Some("webp".to_string()),
        mode: Some("sticker".to_string()),
    }
}

pub fn video_config(file_id: &str, path: &Path) -> FileConfig {
    FileConfig {
        file_id: file_id.to_string(),
        upload_path: path.to_path_buf(),
        file_type: "video".to_string(),
        output_format: None,
        mode: None,
    }
}

/// Collect events until the job-finished event arrives.
pub async fn collect_events(subscription: &mut Subscription) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    let collect = async {
        while let Some(event) = subscription.recv().await {
            let done = event.event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(30), collect)
        .await
        .expect("job did not finish in time");
    events
}

pub const WAIT: Duration = Duration::from_secs(30);
