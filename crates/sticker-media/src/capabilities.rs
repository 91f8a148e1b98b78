//! Startup probe of the external tools a worker depends on.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::command::{check_ffmpeg, check_ffprobe};

/// An AI background-removal collaborator.
pub trait BackgroundRemover: Send + Sync {
    /// Name reported in logs.
    fn name(&self) -> &str;

    /// Whether the remover can be used in this process.
    fn is_available(&self) -> bool;
}

/// Remover used when no background-removal backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackgroundRemover;

impl BackgroundRemover for NoBackgroundRemover {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// What this process can do, resolved once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCapabilities {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub background_removal: bool,
}

impl MediaCapabilities {
    /// Resolve `ffmpeg` and `ffprobe` on PATH and query the remover.
    pub fn detect(remover: &dyn BackgroundRemover) -> Self {
        let caps = Self {
            ffmpeg: check_ffmpeg().ok(),
            ffprobe: check_ffprobe().ok(),
            background_removal: remover.is_available(),
        };

        if caps.ffmpeg.is_none() {
            warn!("FFmpeg not found in PATH, video and animated conversions will fail");
        }
        if caps.ffprobe.is_none() {
            warn!("FFprobe not found in PATH, video dimensions will use the fallback");
        }
        info!(
            ffmpeg = caps.ffmpeg.is_some(),
            ffprobe = caps.ffprobe.is_some(),
            background_removal = caps.background_removal,
            remover = remover.name(),
            "Media capabilities detected"
        );

        caps
    }

    /// Whether video and animated conversions can run.
    pub fn video_supported(&self) -> bool {
        self.ffmpeg.is_some()
    }
}
