//! Upload classification by file name.

use serde::{Deserialize, Serialize};
use std::path::Path;

use sticker_models::MediaKind;

use crate::error::{MediaError, MediaResult};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "tiff"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "wmv", "webm", "mkv"];

/// Uploads above this size get a warning.
pub const LARGE_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Result of checking an upload before it is queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCheck {
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Classify a file by its extension.
pub fn detect_media_kind(filename: &str) -> Option<MediaKind> {
    let ext = Path::new(filename)
        .extension()?
        .to_string_lossy()
        .to_ascii_lowercase();

    if ext == "gif" {
        Some(MediaKind::AnimatedImage)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Check that an upload is a supported type and collect warnings.
pub fn validate_upload(filename: &str, size: u64) -> MediaResult<UploadCheck> {
    let kind = detect_media_kind(filename)
        .ok_or_else(|| MediaError::unsupported(format!("Unsupported file type: {}", filename)))?;

    let mut warnings = Vec::new();
    if size > LARGE_UPLOAD_BYTES {
        warnings.push("File is very large, processing may be slow".to_string());
    }

    Ok(UploadCheck { kind, warnings })
}

/// Human readable size with one decimal, e.g. `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
