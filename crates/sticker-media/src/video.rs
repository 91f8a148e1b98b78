//! Video and animated-image conversion with a bitrate search.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use sticker_models::{StickerLimits, Variant};

use crate::command::FfmpegCommand;
use crate::dimensions::{video_dimensions, Dimensions};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{move_file, partial_path, remove_if_exists};
use crate::probe::VideoInfo;
use crate::transcoder::Transcoder;

/// Encodes tried before giving up on the budget.
pub const MAX_VIDEO_ATTEMPTS: u32 = 5;

const VP9_CODEC: &str = "libvpx-vp9";
const VP9_PIXEL_FORMAT: &str = "yuva420p";
const VP9_CRF: u8 = 30;

/// Outcome of a video conversion that met its budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConversion {
    pub path: PathBuf,
    pub size: u64,
    pub attempts: u32,
    /// Bitrate of the kept encode
    pub bitrate_kbps: u32,
    pub dimensions: Dimensions,
}

/// Next bitrate in the search: 60% of the current one, truncated.
pub fn next_bitrate(kbps: u32) -> u32 {
    (kbps * 3 / 5).max(1)
}

/// Build the VP9 WebM sticker encode.
pub fn build_sticker_command(
    source: &Path,
    output: &Path,
    dimensions: Dimensions,
    variant: Variant,
    bitrate_kbps: u32,
    limits: &StickerLimits,
) -> FfmpegCommand {
    let mut filter = format!(
        "scale={}:{},fps={}",
        dimensions.width, dimensions.height, limits.video_fps
    );
    if variant == Variant::Icon {
        filter.push_str(",loop=0:32767:0");
    }

    FfmpegCommand::new(source, output)
        .max_duration(limits.max_video_duration_secs)
        .video_filter(filter)
        .video_codec(VP9_CODEC)
        .pixel_format(VP9_PIXEL_FORMAT)
        .no_audio()
        .video_bitrate_kbps(bitrate_kbps)
        .crf(VP9_CRF)
        .output_args(["-deadline", "good", "-auto-alt-ref", "0"])
        .format("webm")
}

/// Transcode a video or animated image to WebM within the variant's byte budget.
///
/// Each attempt encodes into a partial file beside `output`. The first
/// attempt that fits is moved into place; otherwise the bitrate drops to 60%
/// and the encode is retried, up to five attempts. An encoder failure aborts
/// the search. No file is left at `output` unless the budget was met.
pub async fn convert_video(
    transcoder: &dyn Transcoder,
    source: &Path,
    output: &Path,
    variant: Variant,
    limits: &StickerLimits,
) -> MediaResult<VideoConversion> {
    if !source.exists() {
        return Err(MediaError::FileNotFound(source.to_path_buf()));
    }

    let info = match transcoder.probe(source).await {
        Ok(info) => info,
        Err(e) => {
            warn!(source = %source.display(), error = %e, "Probe failed, using fallback dimensions");
            VideoInfo::default()
        }
    };
    let dimensions = video_dimensions(info.dimensions_or_fallback(), variant, limits);
    let budget = limits.video_budget(variant);
    let partial = partial_path(output);

    let mut bitrate_kbps = limits.initial_bitrate_kbps(variant);
    let mut last_size = 0;

    for attempt in 1..=MAX_VIDEO_ATTEMPTS {
        let cmd = build_sticker_command(source, &partial, dimensions, variant, bitrate_kbps, limits);

        if let Err(e) = transcoder.run(&cmd).await {
            let _ = remove_if_exists(&partial).await;
            return Err(e);
        }

        let size = match fs::metadata(&partial).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                return Err(MediaError::ffmpeg_failed(
                    format!("Encoder produced no output: {}", e),
                    None,
                    None,
                ))
            }
        };
        debug!(attempt, bitrate_kbps, size, budget, "WebM encode attempt");

        if size <= budget {
            move_file(&partial, output).await?;
            info!(
                attempt,
                bitrate_kbps,
                size,
                dimensions = %dimensions,
                "Video sticker within budget"
            );
            return Ok(VideoConversion {
                path: output.to_path_buf(),
                size,
                attempts: attempt,
                bitrate_kbps,
                dimensions,
            });
        }

        last_size = size;
        bitrate_kbps = next_bitrate(bitrate_kbps);
    }

    remove_if_exists(&partial).await?;
    warn!(size = last_size, budget, "Video budget not met");

    Err(MediaError::BudgetExceeded {
        size: last_size,
        budget,
        attempts: MAX_VIDEO_ATTEMPTS,
    })
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTranscoder;
    use super::*;
    use tempfile::TempDir;

    fn source(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    #[test]
    fn test_bitrate_decay() {
        let mut kbps = 300;
        let mut seen = vec![kbps];
        for _ in 1..MAX_VIDEO_ATTEMPTS {
            kbps = next_bitrate(kbps);
            seen.push(kbps);
        }
        assert_eq!(seen, vec![300, 180, 108, 64, 38]);
        assert_eq!(next_bitrate(1), 1);
    }

    #[test]
    fn test_build_sticker_command() {
        let limits = StickerLimits::default();
        let cmd = build_sticker_command(
            Path::new("in.mp4"),
            Path::new("out.webm"),
            Dimensions::new(512, 288),
            Variant::Standard,
            300,
            &limits,
        );

        assert_eq!(cmd.output_value("-t"), Some("3"));
        assert_eq!(cmd.output_value("-vf"), Some("scale=512:288,fps=30"));
        assert_eq!(cmd.output_value("-c:v"), Some("libvpx-vp9"));
        assert_eq!(cmd.output_value("-pix_fmt"), Some("yuva420p"));
        assert_eq!(cmd.output_value("-b:v"), Some("300k"));
        assert_eq!(cmd.output_value("-crf"), Some("30"));
        assert_eq!(cmd.output_value("-deadline"), Some("good"));
        assert_eq!(cmd.output_value("-auto-alt-ref"), Some("0"));
        assert!(cmd.build_args().contains(&"-an".to_string()));
    }

    #[test]
    fn test_icon_command_loops() {
        let limits = StickerLimits::default();
        let cmd = build_sticker_command(
            Path::new("in.gif"),
            Path::new("out.webm"),
            Dimensions::square(100),
            Variant::Icon,
            150,
            &limits,
        );
        assert_eq!(
            cmd.output_value("-vf"),
            Some("scale=100:100,fps=30,loop=0:32767:0")
        );
    }

    #[tokio::test]
    async fn test_first_attempt_within_budget() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir);
        let out = dir.path().join("sticker.webm");
        let transcoder = ScriptedTranscoder::with_sizes(vec![100 * 1024]);

        let limits = StickerLimits::default();
        let result = convert_video(&transcoder, &src, &out, Variant::Standard, &limits)
            .await
            .unwrap();

        assert_eq!(result.attempts, 1);
        assert_eq!(result.bitrate_kbps, 300);
        assert_eq!(result.dimensions, Dimensions::new(512, 288));
        assert_eq!(std::fs::metadata(&out).unwrap().len(), 100 * 1024);
        assert!(!partial_path(&out).exists());
    }

    #[tokio::test]
    async fn test_search_lowers_bitrate_until_it_fits() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir);
        let out = dir.path().join("sticker.webm");
        let transcoder =
            ScriptedTranscoder::with_sizes(vec![400 * 1024, 300 * 1024, 200 * 1024]);

        let limits = StickerLimits::default();
        let result = convert_video(&transcoder, &src, &out, Variant::Standard, &limits)
            .await
            .unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(result.bitrate_kbps, 108);
        assert_eq!(transcoder.bitrates(), vec!["300k", "180k", "108k"]);
    }

    #[tokio::test]
    async fn test_budget_never_met_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir);
        let out = dir.path().join("sticker.webm");
        let transcoder = ScriptedTranscoder::with_sizes(vec![300 * 1024; 5]);

        let limits = StickerLimits::default();
        let err = convert_video(&transcoder, &src, &out, Variant::Standard, &limits)
            .await
            .unwrap_err();

        match err {
            MediaError::BudgetExceeded {
                size,
                budget,
                attempts,
            } => {
                assert_eq!(size, 300 * 1024);
                assert_eq!(budget, 256 * 1024);
                assert_eq!(attempts, MAX_VIDEO_ATTEMPTS);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transcoder.bitrates().len(), 5);
        assert!(!out.exists());
        assert!(!partial_path(&out).exists());
    }

    #[tokio::test]
    async fn test_encoder_failure_aborts_without_retry() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir);
        let out = dir.path().join("sticker.webm");
        let mut transcoder = ScriptedTranscoder::with_sizes(vec![400 * 1024; 5]);
        transcoder.fail_on_attempt = Some(2);

        let limits = StickerLimits::default();
        let err = convert_video(&transcoder, &src, &out, Variant::Standard, &limits)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::FfmpegFailed { .. }));
        assert_eq!(transcoder.bitrates().len(), 2);
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_timeout_fails_file_without_retry() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir);
        let out = dir.path().join("sticker.webm");
        let mut transcoder = ScriptedTranscoder::with_sizes(vec![10 * 1024; 5]);
        transcoder.timeout_on_attempt = Some(1);

        let limits = StickerLimits::default();
        let err = convert_video(&transcoder, &src, &out, Variant::Standard, &limits)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Timeout(120)));
        assert_eq!(transcoder.bitrates(), vec!["300k"]);
        assert!(!out.exists());
        assert!(!partial_path(&out).exists());
    }

    #[tokio::test]
    async fn test_probe_failure_uses_fallback() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir);
        let out = dir.path().join("sticker.webm");
        let mut transcoder = ScriptedTranscoder::with_sizes(vec![1024]);
        transcoder.probe = None;

        let limits = StickerLimits::default();
        let result = convert_video(&transcoder, &src, &out, Variant::Standard, &limits)
            .await
            .unwrap();

        // 1280x720 fallback
        assert_eq!(result.dimensions, Dimensions::new(512, 288));
    }

    #[tokio::test]
    async fn test_icon_budget_and_bitrate() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir);
        let out = dir.path().join("icon.webm");
        let transcoder = ScriptedTranscoder::with_sizes(vec![40 * 1024, 20 * 1024]);

        let limits = StickerLimits::default();
        let result = convert_video(&transcoder, &src, &out, Variant::Icon, &limits)
            .await
            .unwrap();

        assert_eq!(result.dimensions, Dimensions::square(100));
        assert_eq!(transcoder.bitrates(), vec!["150k", "90k"]);
    }

    #[tokio::test]
    async fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let transcoder = ScriptedTranscoder::with_sizes(vec![]);
        let limits = StickerLimits::default();

        let err = convert_video(
            &transcoder,
            &dir.path().join("gone.mp4"),
            &dir.path().join("out.webm"),
            Variant::Standard,
            &limits,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(transcoder.bitrates().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_real_ffmpeg_conversion() {
        use crate::transcoder::FfmpegTranscoder;
        use std::time::Duration;

        let dir = TempDir::new().unwrap();
        let src = dir.path().join("frame.png");
        image::RgbImage::from_pixel(64, 48, image::Rgb([200, 30, 30]))
            .save(&src)
            .unwrap();
        let out = dir.path().join("sticker.webm");

        let transcoder = FfmpegTranscoder::new(Duration::from_secs(120));
        let limits = StickerLimits::default();
        let result = convert_video(&transcoder, &src, &out, Variant::Standard, &limits)
            .await
            .unwrap();

        assert!(result.size <= limits.video_budget(Variant::Standard));
        assert_eq!(result.dimensions, Dimensions::new(512, 384));
    }
}
