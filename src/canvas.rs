//! Canvas normalization
//!
//! Every layer is brought onto the same fixed-size transparent canvas before
//! blending, so the compositors only ever deal with equally sized buffers.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Edge length of the square output canvas, in pixels.
pub const CANVAS_SIZE: u32 = 2000;

/// Fully transparent pixel.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Create a fully transparent canvas of the given size.
pub fn transparent_canvas(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, TRANSPARENT)
}

/// Fit `image` inside a `width`×`height` canvas.
///
/// The image is scaled by `min(width / w, height / h)` so the aspect ratio is
/// kept, resampled with Lanczos3, and centered on a transparent canvas.
/// Source transparency is carried over unchanged. An image that already has
/// the target dimensions is returned as-is.
pub fn normalize(image: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image;
    }

    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return transparent_canvas(width, height);
    }

    let scale = f64::min(width as f64 / src_w as f64, height as f64 / src_h as f64);
    let new_w = ((src_w as f64 * scale) as u32).clamp(1, width);
    let new_h = ((src_h as f64 * scale) as u32).clamp(1, height);

    let resized = imageops::resize(&image, new_w, new_h, FilterType::Lanczos3);

    let x_offset = (width - new_w) / 2;
    let y_offset = (height - new_h) / 2;

    // The canvas is fully transparent, so a plain copy is the same as
    // compositing the resized image over it.
    let mut canvas = transparent_canvas(width, height);
    imageops::replace(&mut canvas, &resized, x_offset as i64, y_offset as i64);
    canvas
}

/// Scale the alpha channel of every pixel by `opacity`.
///
/// Opacity is clamped to `0.0..=1.0`; values of 1.0 (or more) leave the image
/// untouched. RGB channels are never modified.
pub fn apply_opacity(image: &mut RgbaImage, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity >= 1.0 {
        return;
    }
    for pixel in image.pixels_mut() {
        pixel[3] = (pixel[3] as f32 * opacity).round() as u8;
    }
}
