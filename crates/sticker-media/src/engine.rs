//! Request dispatch across the image and video conversion paths.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

use sticker_models::{ConversionRequest, ImageEncoding, StickerLimits, Variant};

use crate::error::{MediaError, MediaResult};
use crate::raster::{is_animated_gif, resize_image};
use crate::transcoder::Transcoder;
use crate::video::convert_video;

/// Extension of every video and animated output.
pub const VIDEO_EXTENSION: &str = "webm";

/// A converted output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    /// Encodes performed to reach this output
    pub attempts: u32,
}

/// Converts single files according to their request.
#[derive(Clone)]
pub struct StickerEngine {
    transcoder: Arc<dyn Transcoder>,
    limits: StickerLimits,
}

impl StickerEngine {
    pub fn new(transcoder: Arc<dyn Transcoder>, limits: StickerLimits) -> Self {
        Self { transcoder, limits }
    }

    pub fn limits(&self) -> &StickerLimits {
        &self.limits
    }

    /// Convert one file, writing `<stem>.<ext>` into `output_dir`.
    ///
    /// Image requests whose source turns out to be a multi-frame GIF take the
    /// video path, as do animated-image requests.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        output_dir: &Path,
        stem: &str,
    ) -> MediaResult<ConvertedFile> {
        let span = info_span!(
            "convert",
            file_id = %request.file_id(),
            kind = request.media_kind().as_str(),
            variant = request.variant().as_str(),
        );

        async move {
            match request {
                ConversionRequest::Image {
                    source,
                    encoding,
                    variant,
                    ..
                } => {
                    if self.source_is_animated(source).await? {
                        debug!("Animated GIF submitted as image, using video path");
                        self.convert_animated(source, *variant, output_dir, stem).await
                    } else {
                        self.convert_image(source, *encoding, *variant, output_dir, stem)
                            .await
                    }
                }
                ConversionRequest::Video { source, variant, .. }
                | ConversionRequest::AnimatedImage { source, variant, .. } => {
                    self.convert_animated(source, *variant, output_dir, stem).await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn source_is_animated(&self, source: &Path) -> MediaResult<bool> {
        let source = source.to_path_buf();
        tokio::task::spawn_blocking(move || is_animated_gif(&source))
            .await
            .map_err(|e| MediaError::internal(format!("Image task failed: {}", e)))?
    }

    async fn convert_image(
        &self,
        source: &Path,
        encoding: ImageEncoding,
        variant: Variant,
        output_dir: &Path,
        stem: &str,
    ) -> MediaResult<ConvertedFile> {
        let file_name = format!("{}.{}", stem, encoding.extension());
        let output = output_dir.join(&file_name);
        let source = source.to_path_buf();
        let limits = self.limits.clone();

        let conversion = tokio::task::spawn_blocking(move || {
            resize_image(&source, &output, encoding, variant, &limits)
        })
        .await
        .map_err(|e| MediaError::internal(format!("Image task failed: {}", e)))??;

        Ok(ConvertedFile {
            path: conversion.path,
            file_name,
            size: conversion.size,
            attempts: conversion.attempts,
        })
    }

    async fn convert_animated(
        &self,
        source: &Path,
        variant: Variant,
        output_dir: &Path,
        stem: &str,
    ) -> MediaResult<ConvertedFile> {
        let file_name = format!("{}.{}", stem, VIDEO_EXTENSION);
        let output = output_dir.join(&file_name);

        let conversion =
            convert_video(self.transcoder.as_ref(), source, &output, variant, &self.limits).await?;

        Ok(ConvertedFile {
            path: conversion.path,
            file_name,
            size: conversion.size,
            attempts: conversion.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::testing::ScriptedTranscoder;
    use image::codecs::gif::GifEncoder;
    use image::{Frame, Rgb, RgbImage, Rgba, RgbaImage};
    use std::fs::File;
    use tempfile::TempDir;

    fn engine(sizes: Vec<u64>) -> (StickerEngine, Arc<ScriptedTranscoder>) {
        let transcoder = Arc::new(ScriptedTranscoder::with_sizes(sizes));
        let engine = StickerEngine::new(transcoder.clone(), StickerLimits::default());
        (engine, transcoder)
    }

    #[tokio::test]
    async fn test_image_request() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("cat.jpg");
        RgbImage::from_pixel(2000, 1000, Rgb([120, 80, 40])).save(&src).unwrap();

        let (engine, transcoder) = engine(vec![]);
        let request =
            ConversionRequest::image("f1", &src, ImageEncoding::Lossy, Variant::Standard);
        let converted = engine.convert(&request, dir.path(), "sticker_1").await.unwrap();

        assert_eq!(converted.file_name, "sticker_1.webp");
        assert_eq!(image::open(&converted.path).unwrap().width(), 512);
        assert!(transcoder.bitrates().is_empty());
    }

    #[tokio::test]
    async fn test_lossless_extension() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("logo.png");
        RgbImage::from_pixel(300, 300, Rgb([1, 2, 3])).save(&src).unwrap();

        let (engine, _) = engine(vec![]);
        let request = ConversionRequest::image("f1", &src, ImageEncoding::Lossless, Variant::Icon);
        let converted = engine.convert(&request, dir.path(), "sticker_2").await.unwrap();

        assert_eq!(converted.file_name, "sticker_2.png");
    }

    #[tokio::test]
    async fn test_animated_gif_image_takes_video_path() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("wave.gif");
        {
            let mut encoder = GifEncoder::new(File::create(&src).unwrap());
            encoder
                .encode_frames(vec![
                    Frame::new(RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255]))),
                    Frame::new(RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]))),
                ])
                .unwrap();
        }

        let (engine, transcoder) = engine(vec![10 * 1024]);
        let request =
            ConversionRequest::image("f1", &src, ImageEncoding::Lossy, Variant::Standard);
        let converted = engine.convert(&request, dir.path(), "sticker_1").await.unwrap();

        assert_eq!(converted.file_name, "sticker_1.webm");
        assert_eq!(transcoder.bitrates(), vec!["300k"]);
    }

    #[tokio::test]
    async fn test_video_request() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("clip.mp4");
        std::fs::write(&src, b"video").unwrap();

        let (engine, _) = engine(vec![500 * 1024, 100 * 1024]);
        let request = ConversionRequest::video("f1", &src, Variant::Standard);
        let converted = engine.convert(&request, dir.path(), "sticker_3").await.unwrap();

        assert_eq!(converted.file_name, "sticker_3.webm");
        assert_eq!(converted.attempts, 2);
        assert_eq!(converted.size, 100 * 1024);
    }
}
