//! Target dimension computation.

use serde::{Deserialize, Serialize};
use std::fmt;

use sticker_models::{StickerLimits, Variant};

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn square(edge: u32) -> Self {
        Self::new(edge, edge)
    }

    pub fn longest_edge(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Scale so the longest edge equals `edge`, preserving aspect ratio.
    ///
    /// The short side is truncated and never drops below one pixel.
    pub fn fit_longest_edge(&self, edge: u32) -> Self {
        let longest = u64::from(self.longest_edge().max(1));
        let scale = |side: u32| -> u32 {
            let scaled = u64::from(side) * u64::from(edge) / longest;
            (scaled as u32).max(1)
        };
        Self::new(scale(self.width), scale(self.height))
    }

    /// Round each side up to the next even number.
    pub fn round_up_even(&self) -> Self {
        let even = |side: u32| side + (side % 2);
        Self::new(even(self.width), even(self.height))
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Output dimensions for a static image sticker.
pub fn image_dimensions(source: Dimensions, variant: Variant, limits: &StickerLimits) -> Dimensions {
    match limits.square_edge(variant) {
        Some(edge) => Dimensions::square(edge),
        None => source.fit_longest_edge(limits.standard_size),
    }
}

/// Output dimensions for a video sticker. Always even, as VP9 with 4:2:0
/// chroma subsampling requires.
pub fn video_dimensions(source: Dimensions, variant: Variant, limits: &StickerLimits) -> Dimensions {
    image_dimensions(source, variant, limits).round_up_even()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_landscape() {
        let limits = StickerLimits::default();
        let dims = image_dimensions(Dimensions::new(2000, 1000), Variant::Standard, &limits);
        assert_eq!(dims, Dimensions::new(512, 256));
    }

    #[test]
    fn test_standard_portrait_and_upscale() {
        let limits = StickerLimits::default();
        assert_eq!(
            image_dimensions(Dimensions::new(300, 600), Variant::Standard, &limits),
            Dimensions::new(256, 512)
        );
        assert_eq!(
            image_dimensions(Dimensions::new(64, 64), Variant::Standard, &limits),
            Dimensions::new(512, 512)
        );
    }

    #[test]
    fn test_square_variants_ignore_aspect() {
        let limits = StickerLimits::default();
        for variant in [Variant::Icon, Variant::CustomEmoji] {
            assert_eq!(
                image_dimensions(Dimensions::new(1920, 1080), variant, &limits),
                Dimensions::square(100)
            );
        }
    }

    #[test]
    fn test_extreme_aspect_keeps_one_pixel() {
        let limits = StickerLimits::default();
        let dims = image_dimensions(Dimensions::new(5000, 2), Variant::Standard, &limits);
        assert_eq!(dims, Dimensions::new(512, 1));
    }

    #[test]
    fn test_video_dimensions_are_even() {
        let limits = StickerLimits::default();

        // 1280x721 -> 512x288.4 -> 512x288
        let dims = video_dimensions(Dimensions::new(1280, 721), Variant::Standard, &limits);
        assert_eq!(dims, Dimensions::new(512, 288));

        // 1000x333 -> 512x170.496 -> 512x170
        let dims = video_dimensions(Dimensions::new(1000, 333), Variant::Standard, &limits);
        assert_eq!(dims.width % 2, 0);
        assert_eq!(dims.height % 2, 0);

        // 700x999 -> 358.7x512 -> 358x512
        let dims = video_dimensions(Dimensions::new(700, 999), Variant::Standard, &limits);
        assert_eq!(dims, Dimensions::new(358, 512));

        // 5000x2 -> 512x1 -> 512x2
        let dims = video_dimensions(Dimensions::new(5000, 2), Variant::Standard, &limits);
        assert_eq!(dims, Dimensions::new(512, 2));
    }

    #[test]
    fn test_video_odd_short_side_rounds_up() {
        let limits = StickerLimits::default();
        // 1024x600 -> 512x300; 1024x602 -> 512x301 -> 512x302
        let dims = video_dimensions(Dimensions::new(1024, 602), Variant::Standard, &limits);
        assert_eq!(dims, Dimensions::new(512, 302));
    }

    #[test]
    fn test_video_icon_square() {
        let limits = StickerLimits::default();
        let dims = video_dimensions(Dimensions::new(640, 480), Variant::Icon, &limits);
        assert_eq!(dims, Dimensions::square(100));
    }
}
