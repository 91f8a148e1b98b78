//! State accumulated from FFmpeg's `-progress` key/value blocks.

use serde::{Deserialize, Serialize};

/// Latest values seen for one encode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    pub frame: u64,
    /// Encoded media time
    pub out_time_ms: i64,
    /// `HH:MM:SS.micros`
    pub out_time: String,
    /// Bytes written to the output so far
    pub total_size: u64,
    /// Multiple of realtime
    pub speed: f64,
    /// Set by the final `progress=end` block
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Share of `total_duration_ms` encoded, 0 when the total is unknown.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }
}
