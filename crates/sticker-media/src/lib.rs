#![deny(unreachable_patterns)]
//! Transcoding engine for sticker conversion.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with per-invocation timeout
//! - FFprobe source inspection with fallback dimensions
//! - Image resize-to-budget (WebP quality search, PNG single pass)
//! - Video and animated-image transcode-to-budget (VP9 bitrate search)
//! - Media kind detection, thumbnails and startup capability probing

pub mod capabilities;
pub mod command;
pub mod detect;
pub mod dimensions;
pub mod engine;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod raster;
pub mod thumbnail;
pub mod transcoder;
pub mod video;

pub use capabilities::{BackgroundRemover, MediaCapabilities, NoBackgroundRemover};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use detect::{detect_media_kind, format_size, validate_upload, UploadCheck};
pub use dimensions::{image_dimensions, video_dimensions, Dimensions};
pub use engine::{ConvertedFile, StickerEngine};
pub use error::{MediaError, MediaResult};
pub use raster::{
    detect_transparency, generate_thumbnail, image_info, is_animated_gif, resize_image,
    ImageConversion, ImageInfo,
};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use thumbnail::generate_video_thumbnail;
pub use transcoder::{FfmpegTranscoder, Transcoder};
pub use video::{build_sticker_command, convert_video, VideoConversion};
