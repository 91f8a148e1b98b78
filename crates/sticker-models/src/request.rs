//! Per-file conversion requests.
//!
//! `FileConfig` is the loose form callers submit; `ConversionRequest` is the
//! validated union the worker consumes. Validation happens once, at submission.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ModelError, ModelResult};

/// Source media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    #[serde(alias = "animated_gif")]
    AnimatedImage,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::AnimatedImage => "animated_gif",
        }
    }

    pub fn parse(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "animated_gif" | "animated_image" => Ok(MediaKind::AnimatedImage),
            other => Err(ModelError::UnknownMediaKind(other.to_string())),
        }
    }
}

/// Output profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Regular sticker, longest edge fixed
    #[default]
    #[serde(alias = "sticker")]
    Standard,
    /// Sticker set thumbnail, fixed square
    Icon,
    /// Custom emoji, fixed square
    #[serde(alias = "emoji")]
    CustomEmoji,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Standard => "sticker",
            Variant::Icon => "icon",
            Variant::CustomEmoji => "emoji",
        }
    }

    pub fn parse(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sticker" | "standard" => Ok(Variant::Standard),
            "icon" => Ok(Variant::Icon),
            "emoji" | "custom_emoji" => Ok(Variant::CustomEmoji),
            other => Err(ModelError::UnknownMode(other.to_string())),
        }
    }
}

/// Static image output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImageEncoding {
    /// WebP with quality search against the byte budget
    #[default]
    #[serde(alias = "webp")]
    Lossy,
    /// PNG, single encode
    #[serde(alias = "png")]
    Lossless,
}

impl ImageEncoding {
    /// File extension of the encoded output.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageEncoding::Lossy => "webp",
            ImageEncoding::Lossless => "png",
        }
    }

    pub fn parse(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" | "lossy" => Ok(ImageEncoding::Lossy),
            "png" | "lossless" => Ok(ImageEncoding::Lossless),
            other => Err(ModelError::UnknownOutputFormat(other.to_string())),
        }
    }
}

/// Per-file configuration as submitted by callers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileConfig {
    pub file_id: String,
    #[serde(alias = "source")]
    pub upload_path: PathBuf,
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Validated conversion request, keyed by media kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversionRequest {
    Image {
        file_id: String,
        source: PathBuf,
        encoding: ImageEncoding,
        variant: Variant,
    },
    Video {
        file_id: String,
        source: PathBuf,
        variant: Variant,
    },
    AnimatedImage {
        file_id: String,
        source: PathBuf,
        variant: Variant,
    },
}

impl ConversionRequest {
    pub fn image(
        file_id: impl Into<String>,
        source: impl Into<PathBuf>,
        encoding: ImageEncoding,
        variant: Variant,
    ) -> Self {
        Self::Image {
            file_id: file_id.into(),
            source: source.into(),
            encoding,
            variant,
        }
    }

    pub fn video(file_id: impl Into<String>, source: impl Into<PathBuf>, variant: Variant) -> Self {
        Self::Video {
            file_id: file_id.into(),
            source: source.into(),
            variant,
        }
    }

    pub fn animated(
        file_id: impl Into<String>,
        source: impl Into<PathBuf>,
        variant: Variant,
    ) -> Self {
        Self::AnimatedImage {
            file_id: file_id.into(),
            source: source.into(),
            variant,
        }
    }

    pub fn file_id(&self) -> &str {
        match self {
            Self::Image { file_id, .. }
            | Self::Video { file_id, .. }
            | Self::AnimatedImage { file_id, .. } => file_id,
        }
    }

    pub fn source(&self) -> &Path {
        match self {
            Self::Image { source, .. }
            | Self::Video { source, .. }
            | Self::AnimatedImage { source, .. } => source,
        }
    }

    pub fn variant(&self) -> Variant {
        match self {
            Self::Image { variant, .. }
            | Self::Video { variant, .. }
            | Self::AnimatedImage { variant, .. } => *variant,
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        match self {
            Self::Image { .. } => MediaKind::Image,
            Self::Video { .. } => MediaKind::Video,
            Self::AnimatedImage { .. } => MediaKind::AnimatedImage,
        }
    }

    /// Base name of the source, used in messages and file results.
    pub fn source_name(&self) -> String {
        self.source()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source().to_string_lossy().into_owned())
    }
}

impl TryFrom<FileConfig> for ConversionRequest {
    type Error = ModelError;

    fn try_from(config: FileConfig) -> ModelResult<Self> {
        if config.file_id.trim().is_empty() {
            return Err(ModelError::MissingField("file_id"));
        }
        if config.upload_path.as_os_str().is_empty() {
            return Err(ModelError::MissingField("upload_path"));
        }

        let kind = MediaKind::parse(&config.file_type)?;
        let variant = match config.mode.as_deref() {
            Some(mode) => Variant::parse(mode)?,
            None => Variant::default(),
        };

        Ok(match kind {
            MediaKind::Image => {
                let encoding = match config.output_format.as_deref() {
                    Some(format) => ImageEncoding::parse(format)?,
                    None => ImageEncoding::default(),
                };
                Self::Image {
                    file_id: config.file_id,
                    source: config.upload_path,
                    encoding,
                    variant,
                }
            }
            MediaKind::Video => Self::Video {
                file_id: config.file_id,
                source: config.upload_path,
                variant,
            },
            MediaKind::AnimatedImage => Self::AnimatedImage {
                file_id: config.file_id,
                source: config.upload_path,
                variant,
            },
        })
    }
}
