//! Blend modes for composition layers

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Blend modes for composition layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Standard alpha compositing (source over destination)
    #[default]
    Normal,
    /// Darkens: every channel becomes `base * blend / 255`
    Multiply,
    /// Lightens: every channel becomes `255 - (255 - base) * (255 - blend) / 255`
    Screen,
    /// Simplified overlay: 50/50 mix of RGB, foreground alpha kept.
    ///
    /// This is not the per-channel multiply/screen overlay formula.
    Overlay,
}

impl BlendMode {
    /// Parse a blend mode name. Unknown names fall back to [`BlendMode::Normal`].
    pub fn parse(s: &str) -> BlendMode {
        match s.trim().to_lowercase().as_str() {
            "normal" => BlendMode::Normal,
            "multiply" => BlendMode::Multiply,
            "screen" => BlendMode::Screen,
            "overlay" => BlendMode::Overlay,
            other => {
                tracing::debug!(mode = other, "unknown blend mode, using normal");
                BlendMode::Normal
            }
        }
    }

    /// Lowercase name as used in project files.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
        }
    }
}

impl std::fmt::Display for BlendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combine `foreground` onto `background` using `mode`, returning a new image.
///
/// Both images are expected to share dimensions. If they don't, the
/// foreground is stretched to the background size first, which distorts
/// non-matching aspect ratios.
pub fn blend_images(background: &RgbaImage, foreground: &RgbaImage, mode: BlendMode) -> RgbaImage {
    let mut out = background.clone();
    blend_onto(&mut out, foreground, mode);
    out
}

/// In-place variant of [`blend_images`]: `background` becomes the result.
pub fn blend_onto(background: &mut RgbaImage, foreground: &RgbaImage, mode: BlendMode) {
    let resized;
    let foreground = if foreground.dimensions() != background.dimensions() {
        tracing::warn!(
            background = ?background.dimensions(),
            foreground = ?foreground.dimensions(),
            "blend inputs differ in size, stretching foreground"
        );
        let (w, h) = background.dimensions();
        resized = imageops::resize(foreground, w, h, FilterType::Lanczos3);
        &resized
    } else {
        foreground
    };

    for (dst, src) in background.pixels_mut().zip(foreground.pixels()) {
        *dst = blend_pixel(dst, src, mode);
    }
}

/// Blend a single foreground pixel onto a background pixel.
pub(crate) fn blend_pixel(dst: &Rgba<u8>, src: &Rgba<u8>, mode: BlendMode) -> Rgba<u8> {
    match mode {
        BlendMode::Normal => source_over(src, dst),
        BlendMode::Multiply => Rgba([
            mul_div255(dst[0], src[0]),
            mul_div255(dst[1], src[1]),
            mul_div255(dst[2], src[2]),
            mul_div255(dst[3], src[3]),
        ]),
        BlendMode::Screen => Rgba([
            screen_channel(dst[0], src[0]),
            screen_channel(dst[1], src[1]),
            screen_channel(dst[2], src[2]),
            screen_channel(dst[3], src[3]),
        ]),
        BlendMode::Overlay => Rgba([
            mix_half(dst[0], src[0]),
            mix_half(dst[1], src[1]),
            mix_half(dst[2], src[2]),
            src[3],
        ]),
    }
}

/// `a * b / 255` with rounding.
fn mul_div255(a: u8, b: u8) -> u8 {
    let t = a as u32 * b as u32 + 128;
    (((t >> 8) + t) >> 8) as u8
}

fn screen_channel(a: u8, b: u8) -> u8 {
    255 - mul_div255(255 - a, 255 - b)
}

fn mix_half(a: u8, b: u8) -> u8 {
    ((a as f32 + b as f32) * 0.5).round() as u8
}

/// Porter-Duff "source over" with straight (non-premultiplied) alpha.
fn source_over(src: &Rgba<u8>, dst: &Rgba<u8>) -> Rgba<u8> {
    // Fully transparent source leaves the destination alone
    if src[3] == 0 {
        return *dst;
    }
    if src[3] == 255 {
        return *src;
    }

    let src_alpha = src[3] as f32 / 255.0;
    let dst_alpha = dst[3] as f32 / 255.0;

    // out_alpha = src_alpha + dst_alpha * (1 - src_alpha)
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
    if out_alpha == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    // out_color = (src * src_alpha + dst * dst_alpha * (1 - src_alpha)) / out_alpha
    let composite = |s: u8, d: u8| -> u8 {
        let s = s as f32 / 255.0;
        let d = d as f32 / 255.0;
        let result = (s * src_alpha + d * dst_alpha * (1.0 - src_alpha)) / out_alpha;
        (result.clamp(0.0, 1.0) * 255.0).round() as u8
    };

    Rgba([
        composite(src[0], dst[0]),
        composite(src[1], dst[1]),
        composite(src[2], dst[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(r: u8, g: u8, b: u8, a: u8) -> Rgba<u8> {
        Rgba([r, g, b, a])
    }

    #[test]
    fn test_parse_known_modes() {
        assert_eq!(BlendMode::parse("normal"), BlendMode::Normal);
        assert_eq!(BlendMode::parse("Multiply"), BlendMode::Multiply);
        assert_eq!(BlendMode::parse(" screen "), BlendMode::Screen);
        assert_eq!(BlendMode::parse("OVERLAY"), BlendMode::Overlay);
    }

    #[test]
    fn test_parse_unknown_falls_back_to_normal() {
        assert_eq!(BlendMode::parse("hard-light"), BlendMode::Normal);
        assert_eq!(BlendMode::parse(""), BlendMode::Normal);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&BlendMode::Screen).unwrap();
        assert_eq!(json, "\"screen\"");
        let mode: BlendMode = serde_json::from_str("\"overlay\"").unwrap();
        assert_eq!(mode, BlendMode::Overlay);
    }

    #[test]
    fn test_normal_opaque_replaces() {
        let out = blend_pixel(&px(10, 20, 30, 255), &px(200, 100, 50, 255), BlendMode::Normal);
        assert_eq!(out, px(200, 100, 50, 255));
    }

    #[test]
    fn test_normal_transparent_source_keeps_destination() {
        let out = blend_pixel(&px(10, 20, 30, 255), &px(200, 100, 50, 0), BlendMode::Normal);
        assert_eq!(out, px(10, 20, 30, 255));
    }

    #[test]
    fn test_normal_onto_transparent_keeps_source_color() {
        let out = blend_pixel(&px(0, 0, 0, 0), &px(100, 150, 200, 100), BlendMode::Normal);
        assert_eq!(out, px(100, 150, 200, 100));
    }

    #[test]
    fn test_normal_half_alpha_over_opaque() {
        let out = blend_pixel(&px(0, 0, 0, 255), &px(255, 255, 255, 128), BlendMode::Normal);
        assert_eq!(out[3], 255);
        assert!(out[0] >= 127 && out[0] <= 129);
    }

    #[test]
    fn test_multiply_channels() {
        let out = blend_pixel(&px(255, 128, 0, 255), &px(128, 128, 255, 255), BlendMode::Multiply);
        assert_eq!(out, px(128, 64, 0, 255));
    }

    #[test]
    fn test_multiply_white_is_identity() {
        let out = blend_pixel(&px(12, 34, 56, 255), &px(255, 255, 255, 255), BlendMode::Multiply);
        assert_eq!(out, px(12, 34, 56, 255));
    }

    #[test]
    fn test_screen_black_is_identity() {
        let out = blend_pixel(&px(12, 34, 56, 200), &px(0, 0, 0, 0), BlendMode::Screen);
        assert_eq!(out, px(12, 34, 56, 200));
    }

    #[test]
    fn test_screen_lightens() {
        let out = blend_pixel(&px(128, 0, 255, 255), &px(128, 0, 0, 255), BlendMode::Screen);
        assert_eq!(out, px(192, 0, 255, 255));
    }

    #[test]
    fn test_overlay_mixes_rgb_and_keeps_foreground_alpha() {
        let out = blend_pixel(&px(0, 100, 200, 255), &px(100, 200, 0, 40), BlendMode::Overlay);
        assert_eq!(out, px(50, 150, 100, 40));
    }

    #[test]
    fn test_blend_images_resizes_mismatched_foreground() {
        let bg = RgbaImage::from_pixel(4, 4, px(0, 0, 0, 255));
        let fg = RgbaImage::from_pixel(2, 2, px(255, 0, 0, 255));
        let out = blend_images(&bg, &fg, BlendMode::Normal);
        assert_eq!(out.dimensions(), (4, 4));
        assert!(out.get_pixel(1, 1)[0] >= 250);
    }

    #[test]
    fn test_blend_images_keeps_background_size() {
        let bg = RgbaImage::from_pixel(3, 5, px(0, 0, 0, 0));
        let fg = RgbaImage::from_pixel(3, 5, px(1, 2, 3, 255));
        let out = blend_images(&bg, &fg, BlendMode::Multiply);
        assert_eq!(out.dimensions(), (3, 5));
    }
}
