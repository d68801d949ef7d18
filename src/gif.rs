//! GIF animation encoding

use crate::output::{write_atomic, OutputError};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use std::path::Path;

/// Encode a sequence of frames as an animated GIF.
///
/// # Arguments
///
/// * `frames` - The image frames to include in the animation
/// * `durations_ms` - Display time of each frame in milliseconds; missing
///   entries reuse the last one (100 ms if empty)
/// * `loop_anim` - Whether the animation should loop infinitely
pub fn encode_gif(
    frames: &[RgbaImage],
    durations_ms: &[u32],
    loop_anim: bool,
) -> Result<Vec<u8>, OutputError> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);

        let repeat = if loop_anim { Repeat::Infinite } else { Repeat::Finite(0) };
        encoder.set_repeat(repeat)?;

        let fallback = durations_ms.last().copied().unwrap_or(100);
        for (i, rgba_image) in frames.iter().enumerate() {
            let duration_ms = durations_ms.get(i).copied().unwrap_or(fallback);
            // GIF stores delays in centiseconds, 1cs minimum
            let delay_cs = (duration_ms / 10).max(1);
            let delay = Delay::from_numer_denom_ms(delay_cs * 10, 1);
            let frame = Frame::from_parts(rgba_image.clone(), 0, 0, delay);
            encoder.encode_frame(frame)?;
        }
    }
    Ok(buf)
}

/// Render frames as a looping GIF file at `path`.
///
/// An empty frame list writes nothing.
pub fn render_gif(frames: &[RgbaImage], durations_ms: &[u32], path: &Path) -> Result<(), OutputError> {
    if frames.is_empty() {
        return Ok(());
    }
    let bytes = encode_gif(frames, durations_ms, true)?;
    write_atomic(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifDecoder;
    use image::{AnimationDecoder, Rgba};
    use std::io::Cursor;
    use tempfile::tempdir;

    /// Create a simple test frame with a solid color
    fn create_test_frame(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(width, height, color)
    }

    fn decoded_delays(bytes: &[u8]) -> Vec<u32> {
        let decoder = GifDecoder::new(Cursor::new(bytes)).unwrap();
        decoder
            .into_frames()
            .collect_frames()
            .unwrap()
            .iter()
            .map(|f| {
                let (num, denom) = f.delay().numer_denom_ms();
                num / denom
            })
            .collect()
    }

    #[test]
    fn test_render_gif_creates_valid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.gif");

        let frames = vec![
            create_test_frame(2, 2, Rgba([255, 0, 0, 255])), // Red
            create_test_frame(2, 2, Rgba([0, 255, 0, 255])), // Green
        ];

        render_gif(&frames, &[100, 100], &path).unwrap();
        assert!(path.exists());
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn test_encode_gif_frame_durations() {
        let frames = vec![
            create_test_frame(4, 4, Rgba([255, 255, 0, 255])),
            create_test_frame(4, 4, Rgba([0, 255, 255, 255])),
        ];
        let bytes = encode_gif(&frames, &[500, 200], true).unwrap();
        assert_eq!(decoded_delays(&bytes), vec![500, 200]);
    }

    #[test]
    fn test_encode_gif_reuses_last_duration() {
        let frames: Vec<_> =
            (0..3).map(|i| create_test_frame(2, 2, Rgba([i * 80, 0, 0, 255]))).collect();
        let bytes = encode_gif(&frames, &[300], true).unwrap();
        assert_eq!(decoded_delays(&bytes), vec![300, 300, 300]);
    }

    #[test]
    fn test_encode_gif_minimum_delay() {
        let frames = vec![
            create_test_frame(2, 2, Rgba([255, 0, 0, 255])),
            create_test_frame(2, 2, Rgba([0, 255, 0, 255])),
        ];
        // Below one centisecond is clamped up
        let bytes = encode_gif(&frames, &[5, 5], true).unwrap();
        assert_eq!(decoded_delays(&bytes), vec![10, 10]);
    }

    #[test]
    fn test_render_gif_empty_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.gif");

        render_gif(&[], &[], &path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_render_gif_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dirs/test.gif");

        let frames = vec![create_test_frame(2, 2, Rgba([255, 0, 0, 255]))];
        render_gif(&frames, &[100], &path).unwrap();
        assert!(path.exists());
    }
}
