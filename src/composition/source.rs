//! Layer file loading
//!
//! Decodes a layer file into one or more canvas-sized RGBA frames with the
//! layer's opacity already applied.

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::canvas::{apply_opacity, normalize, transparent_canvas};

/// Whether a layer file is treated as animated.
///
/// Any GIF counts, including single-frame ones, so the edition artifact and
/// the metadata `file_type` always agree.
pub fn is_animated_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("gif"))
}

/// Metadata file type for a layer file: `"gif"` or `"png"`.
pub fn file_type(path: &Path) -> &'static str {
    if is_animated_path(path) {
        "gif"
    } else {
        "png"
    }
}

/// Decoded, normalized content of one layer.
///
/// Frames are kept decoded at canvas size, 4 bytes per pixel. A 2000×2000
/// canvas costs 16 MB per frame, so a 60-frame GIF layer holds close to 1 GB.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSource {
    /// A single image used for every output frame
    Static(RgbaImage),
    /// Every frame of an animated source, in playback order
    Animated(Vec<RgbaImage>),
}

impl LayerSource {
    /// Transparent stand-in for a layer that failed to load.
    pub fn placeholder(width: u32, height: u32) -> Self {
        LayerSource::Static(transparent_canvas(width, height))
    }

    /// Number of frames this source contributes before looping.
    pub fn frame_count(&self) -> usize {
        match self {
            LayerSource::Static(_) => 1,
            LayerSource::Animated(frames) => frames.len().max(1),
        }
    }

    /// Bytes held by the decoded frames.
    pub fn byte_size(&self) -> usize {
        match self {
            LayerSource::Static(image) => image.as_raw().len(),
            LayerSource::Animated(frames) => frames.iter().map(|f| f.as_raw().len()).sum(),
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, LayerSource::Animated(_))
    }

    /// Content for output frame `index`.
    ///
    /// Static sources return their single image; animated sources loop, so
    /// a 3-frame source returns frame 1 for index 4.
    pub fn frame(&self, index: usize) -> &RgbaImage {
        match self {
            LayerSource::Static(image) => image,
            LayerSource::Animated(frames) => &frames[index % frames.len()],
        }
    }
}

/// Load `path`, normalize each frame to `width`×`height` and apply `opacity`.
///
/// Returns a human-readable reason on failure; callers decide whether that
/// becomes a placeholder or an error.
pub fn load_source(
    path: &Path,
    width: u32,
    height: u32,
    opacity: f32,
) -> Result<LayerSource, String> {
    let prepare = |frame: RgbaImage| {
        let mut frame = normalize(frame, width, height);
        apply_opacity(&mut frame, opacity);
        frame
    };

    if is_animated_path(path) {
        let frames = decode_frames(path)?;
        Ok(LayerSource::Animated(frames.into_iter().map(prepare).collect()))
    } else {
        let image = image::open(path).map_err(|e| format!("Failed to open image: {}", e))?;
        Ok(LayerSource::Static(prepare(image.to_rgba8())))
    }
}

/// Decode every frame of a GIF.
pub fn decode_frames(path: &Path) -> Result<Vec<RgbaImage>, String> {
    let file = File::open(path).map_err(|e| format!("Failed to open file: {}", e))?;
    let decoder = GifDecoder::new(BufReader::new(file))
        .map_err(|e| format!("Failed to decode animated image: {}", e))?;

    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| format!("Failed to decode frame: {}", e))?;

    if frames.is_empty() {
        return Err("Animated image contains no frames".to_string());
    }

    Ok(frames.into_iter().map(|f| f.into_buffer()).collect())
}

/// Count the frames of a GIF without keeping them.
pub fn count_frames(path: &Path) -> Result<usize, String> {
    let file = File::open(path).map_err(|e| format!("Failed to open file: {}", e))?;
    let decoder = GifDecoder::new(BufReader::new(file))
        .map_err(|e| format!("Failed to decode animated image: {}", e))?;

    let mut count = 0;
    for frame in decoder.into_frames() {
        frame.map_err(|e| format!("Failed to decode frame: {}", e))?;
        count += 1;
    }
    Ok(count)
}
