//! Video thumbnail generation.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// JPEG/WebP quality scale passed to `-q:v` (lower is better).
const THUMBNAIL_QSCALE: &str = "2";

fn thumbnail_command(video_path: &Path, output_path: &Path) -> FfmpegCommand {
    FfmpegCommand::new(video_path, output_path)
        .single_frame()
        .output_arg("-q:v")
        .output_arg(THUMBNAIL_QSCALE)
        .log_level("error")
}

/// Extract the first frame of a video as a still image.
pub async fn generate_video_thumbnail(
    runner: &FfmpegRunner,
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let cmd = thumbnail_command(video_path.as_ref(), output_path.as_ref());
    runner.run(&cmd).await
}
