//! Platform sticker limits.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::request::Variant;

/// Standard sticker edge: one side must be exactly this many pixels
pub const STANDARD_SIZE: u32 = 512;
/// Sticker set icon edge
pub const ICON_SIZE: u32 = 100;
/// Custom emoji edge
pub const CUSTOM_EMOJI_SIZE: u32 = 100;

/// Static sticker byte budget
pub const MAX_IMAGE_SIZE_KB: u64 = 512;
/// Video sticker byte budget
pub const MAX_VIDEO_SIZE_KB: u64 = 256;
/// Icon byte budget (static and video)
pub const MAX_ICON_SIZE_KB: u64 = 32;

/// Video sticker duration cap
pub const MAX_VIDEO_DURATION_SECS: u32 = 3;
/// Video sticker frame rate
pub const VIDEO_FPS: u32 = 30;

/// Initial VP9 target bitrate for stickers and emoji
pub const STANDARD_BITRATE_KBPS: u32 = 300;
/// Initial VP9 target bitrate for icons
pub const ICON_BITRATE_KBPS: u32 = 150;

/// Dimensions assumed when the source cannot be probed
pub const FALLBACK_WIDTH: u32 = 1280;
pub const FALLBACK_HEIGHT: u32 = 720;

/// Size and encoding limits applied by the transcoding engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StickerLimits {
    pub standard_size: u32,
    pub icon_size: u32,
    pub custom_emoji_size: u32,
    pub image_budget_bytes: u64,
    pub icon_image_budget_bytes: u64,
    pub video_budget_bytes: u64,
    pub icon_video_budget_bytes: u64,
    pub max_video_duration_secs: u32,
    pub video_fps: u32,
    pub standard_bitrate_kbps: u32,
    pub icon_bitrate_kbps: u32,
}

impl Default for StickerLimits {
    fn default() -> Self {
        Self {
            standard_size: STANDARD_SIZE,
            icon_size: ICON_SIZE,
            custom_emoji_size: CUSTOM_EMOJI_SIZE,
            image_budget_bytes: MAX_IMAGE_SIZE_KB * 1024,
            icon_image_budget_bytes: MAX_ICON_SIZE_KB * 1024,
            video_budget_bytes: MAX_VIDEO_SIZE_KB * 1024,
            icon_video_budget_bytes: MAX_ICON_SIZE_KB * 1024,
            max_video_duration_secs: MAX_VIDEO_DURATION_SECS,
            video_fps: VIDEO_FPS,
            standard_bitrate_kbps: STANDARD_BITRATE_KBPS,
            icon_bitrate_kbps: ICON_BITRATE_KBPS,
        }
    }
}

impl StickerLimits {
    /// Fixed square edge for the variant, `None` for standard stickers.
    pub fn square_edge(&self, variant: Variant) -> Option<u32> {
        match variant {
            Variant::Standard => None,
            Variant::Icon => Some(self.icon_size),
            Variant::CustomEmoji => Some(self.custom_emoji_size),
        }
    }

    pub fn image_budget(&self, variant: Variant) -> u64 {
        match variant {
            Variant::Icon => self.icon_image_budget_bytes,
            Variant::Standard | Variant::CustomEmoji => self.image_budget_bytes,
        }
    }

    pub fn video_budget(&self, variant: Variant) -> u64 {
        match variant {
            Variant::Icon => self.icon_video_budget_bytes,
            Variant::Standard | Variant::CustomEmoji => self.video_budget_bytes,
        }
    }

    pub fn initial_bitrate_kbps(&self, variant: Variant) -> u32 {
        match variant {
            Variant::Icon => self.icon_bitrate_kbps,
            Variant::Standard | Variant::CustomEmoji => self.standard_bitrate_kbps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets() {
        let limits = StickerLimits::default();

        assert_eq!(limits.image_budget(Variant::Standard), 512 * 1024);
        assert_eq!(limits.image_budget(Variant::CustomEmoji), 512 * 1024);
        assert_eq!(limits.image_budget(Variant::Icon), 32 * 1024);
        assert_eq!(limits.video_budget(Variant::Standard), 256 * 1024);
        assert_eq!(limits.video_budget(Variant::Icon), 32 * 1024);
    }

    #[test]
    fn test_icon_starts_at_lower_bitrate() {
        let limits = StickerLimits::default();
        assert!(
            limits.initial_bitrate_kbps(Variant::Icon) < limits.initial_bitrate_kbps(Variant::Standard)
        );
    }

    #[test]
    fn test_square_edges() {
        let limits = StickerLimits::default();
        assert_eq!(limits.square_edge(Variant::Standard), None);
        assert_eq!(limits.square_edge(Variant::Icon), Some(100));
        assert_eq!(limits.square_edge(Variant::CustomEmoji), Some(100));
    }
}
