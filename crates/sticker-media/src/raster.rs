//! Static image conversion: decode, resample and encode to a byte budget.

use image::codecs::gif::GifDecoder;
use image::codecs::webp::{WebPEncoder, WebPQuality};
use image::imageops::FilterType;
use image::{
    AnimationDecoder, ColorType, DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use sticker_models::{ImageEncoding, StickerLimits, Variant};

use crate::dimensions::{image_dimensions, Dimensions};
use crate::error::{MediaError, MediaResult};

/// First WebP quality tried
pub const INITIAL_QUALITY: u8 = 95;
/// Quality decrement between attempts
pub const QUALITY_STEP: u8 = 10;
/// Lowest quality ever used
pub const MIN_QUALITY: u8 = 10;
/// Upper bound on encode attempts
pub const MAX_QUALITY_ITERATIONS: u32 = 10;

/// Preview bounding box
pub const THUMBNAIL_SIZE: u32 = 200;
const THUMBNAIL_QUALITY: u8 = 80;

/// Outcome of a static image conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConversion {
    /// Where the output was written
    pub path: PathBuf,
    /// Output size in bytes
    pub size: u64,
    /// Output dimensions
    pub dimensions: Dimensions,
    /// WebP quality used, `None` for lossless output
    pub quality: Option<u8>,
    /// Number of encodes performed
    pub attempts: u32,
    /// False when the quality floor was reached without meeting the budget
    pub within_budget: bool,
}

/// Basic image metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub color: String,
    pub has_alpha: bool,
}

/// Resize an image to sticker dimensions and encode it within the variant's byte budget.
///
/// Lossy output runs a quality search from 95 down in steps of 10 (floor 10,
/// at most 10 encodes). If the budget is never met the floor-quality encode is
/// written anyway. Lossless output is encoded once regardless of size.
/// Blocking; call from a blocking-capable context.
pub fn resize_image(
    source: &Path,
    output: &Path,
    encoding: ImageEncoding,
    variant: Variant,
    limits: &StickerLimits,
) -> MediaResult<ImageConversion> {
    let img = normalize(image::open(source)?);
    let (width, height) = img.dimensions();
    let target = image_dimensions(Dimensions::new(width, height), variant, limits);

    let resized = img.resize_exact(target.width, target.height, FilterType::Lanczos3);
    let budget = limits.image_budget(variant);

    match encoding {
        ImageEncoding::Lossless => {
            let bytes = encode_png(&resized)?;
            let size = persist_atomically(&bytes, output)?;
            Ok(ImageConversion {
                path: output.to_path_buf(),
                size,
                dimensions: target,
                quality: None,
                attempts: 1,
                within_budget: size <= budget,
            })
        }
        ImageEncoding::Lossy => {
            let mut quality = INITIAL_QUALITY;
            let mut attempts = 0;
            let mut last: Option<(u8, Vec<u8>)> = None;

            for _ in 0..MAX_QUALITY_ITERATIONS {
                attempts += 1;
                let bytes = encode_webp(&resized, quality)?;
                debug!(quality, size = bytes.len(), budget, "WebP encode attempt");

                if bytes.len() as u64 <= budget {
                    let size = persist_atomically(&bytes, output)?;
                    return Ok(ImageConversion {
                        path: output.to_path_buf(),
                        size,
                        dimensions: target,
                        quality: Some(quality),
                        attempts,
                        within_budget: true,
                    });
                }

                last = Some((quality, bytes));
                quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
            }

            let bytes = match last {
                Some((q, bytes)) if q == quality => bytes,
                _ => encode_webp(&resized, quality)?,
            };
            warn!(
                quality,
                size = bytes.len(),
                budget,
                "Image budget not met, keeping floor-quality output"
            );
            let size = persist_atomically(&bytes, output)?;

            Ok(ImageConversion {
                path: output.to_path_buf(),
                size,
                dimensions: target,
                quality: Some(quality),
                attempts,
                within_budget: false,
            })
        }
    }
}

/// Keep RGB sources as 8-bit RGB; every other colour layout becomes RGBA.
fn normalize(img: DynamicImage) -> DynamicImage {
    match img.color() {
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => {
            DynamicImage::ImageRgb8(img.into_rgb8())
        }
        _ => DynamicImage::ImageRgba8(img.into_rgba8()),
    }
}

/// Encode to lossy WebP in memory.
fn encode_webp(img: &DynamicImage, quality: u8) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = WebPEncoder::new_with_quality(&mut buf, WebPQuality::lossy(quality));
    encoder.encode(img.as_bytes(), img.width(), img.height(), img.color())?;
    Ok(buf)
}

/// Encode to PNG in memory.
fn encode_png(img: &DynamicImage) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)?;
    Ok(buf)
}

/// Write through a temp file in the destination directory, then rename into place.
fn persist_atomically(bytes: &[u8], output: &Path) -> MediaResult<u64> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(output).map_err(|e| MediaError::Io(e.error))?;

    Ok(bytes.len() as u64)
}

/// Whether the file is a GIF with more than one frame.
pub fn is_animated_gif(path: &Path) -> MediaResult<bool> {
    let reader = image::io::Reader::open(path)?.with_guessed_format()?;
    if reader.format() != Some(ImageFormat::Gif) {
        return Ok(false);
    }

    let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
    let frames = decoder
        .into_frames()
        .take(2)
        .filter(|frame| frame.is_ok())
        .count();
    Ok(frames > 1)
}

/// Whether any pixel of the image is not fully opaque.
pub fn detect_transparency(path: &Path) -> MediaResult<bool> {
    let img = image::open(path)?;
    if !img.color().has_alpha() {
        return Ok(false);
    }
    Ok(img.to_rgba8().pixels().any(|p| p[3] < u8::MAX))
}

/// Decode an image and report its dimensions and colour type.
pub fn image_info(path: &Path) -> MediaResult<ImageInfo> {
    let img = image::open(path)?;
    Ok(ImageInfo {
        width: img.width(),
        height: img.height(),
        color: format!("{:?}", img.color()),
        has_alpha: img.color().has_alpha(),
    })
}

/// Write a preview no larger than 200x200. Sources with alpha become PNG,
/// the rest lossy WebP.
pub fn generate_thumbnail(source: &Path, output: &Path) -> MediaResult<()> {
    let img = normalize(image::open(source)?);
    let thumb = img.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);

    let bytes = if thumb.color().has_alpha() {
        encode_png(&thumb)?
    } else {
        encode_webp(&thumb, THUMBNAIL_QUALITY)?
    };
    persist_atomically(&bytes, output)?;
    Ok(())
}
