//! Layer compositing
//!
//! Flattens an ordered stack of layer files into one canvas-sized image, or
//! into a sequence of frames when any layer is animated.
//!
//! Layers are painted in ascending `stacking_index`; equal indices keep the
//! order they were given in. Each layer is normalized onto the canvas
//! (see [`crate::canvas::normalize`]), its alpha scaled by its opacity, and
//! folded onto the accumulator with its [`BlendMode`].
//!
//! Layer files that fail to load are replaced by a transparent placeholder
//! and reported as a [`Warning`]. With `strict` set, the same situation is a
//! [`CompositionError::AssetCorrupt`] instead.

mod animated;
mod blend;
mod error;
mod render;
mod source;

pub use blend::{blend_images, blend_onto, BlendMode};
pub use error::{CompositionError, Warning};
pub use source::{count_frames, decode_frames, file_type, is_animated_path, load_source, LayerSource};

use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::canvas::{transparent_canvas, CANVAS_SIZE};

/// Display time given to every frame of an animated edition.
///
/// Source GIF timing is not carried over.
pub const DEFAULT_FRAME_DURATION_MS: u32 = 100;

fn default_opacity() -> f32 {
    1.0
}

/// One renderable layer in a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Contributor the layer belongs to
    pub contributor: String,
    /// Path to the PNG or GIF file
    pub source: PathBuf,
    /// Display label
    pub label: String,
    /// Paint order, lower first; need not be unique or contiguous
    pub stacking_index: i64,
    /// Layer opacity (0.0-1.0)
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub blend_mode: BlendMode,
}

impl LayerDescriptor {
    pub fn new(
        contributor: impl Into<String>,
        source: impl Into<PathBuf>,
        label: impl Into<String>,
        stacking_index: i64,
    ) -> Self {
        Self {
            contributor: contributor.into(),
            source: source.into(),
            label: label.into(),
            stacking_index,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn is_animated(&self) -> bool {
        is_animated_path(&self.source)
    }
}

/// Stable ascending sort by stacking index.
pub fn sort_by_stacking(layers: &mut [LayerDescriptor]) {
    layers.sort_by_key(|l| l.stacking_index);
}

/// Frames of an animated composite and how long each is shown.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub frames: Vec<RgbaImage>,
    pub durations_ms: Vec<u32>,
}

/// Output of a composite: a single image or an animation.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Still(RgbaImage),
    Animated(Animation),
}

impl Rendered {
    /// Artifact file extension for this output.
    pub fn extension(&self) -> &'static str {
        match self {
            Rendered::Still(_) => "png",
            Rendered::Animated(_) => "gif",
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, Rendered::Animated(_))
    }

    /// First (or only) frame.
    pub fn first_frame(&self) -> Option<&RgbaImage> {
        match self {
            Rendered::Still(image) => Some(image),
            Rendered::Animated(animation) => animation.frames.first(),
        }
    }
}

/// Composite output together with the warnings raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite<T> {
    pub output: T,
    pub warnings: Vec<Warning>,
}

/// Renders layer stacks onto a fixed-size canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Compositor {
    width: u32,
    height: u32,
    frame_duration_ms: u32,
    strict: bool,
}

impl Default for Compositor {
    fn default() -> Self {
        Self {
            width: CANVAS_SIZE,
            height: CANVAS_SIZE,
            frame_duration_ms: DEFAULT_FRAME_DURATION_MS,
            strict: false,
        }
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different canvas size.
    pub fn with_canvas(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the display time given to every animated frame.
    pub fn with_frame_duration(mut self, frame_duration_ms: u32) -> Self {
        self.frame_duration_ms = frame_duration_ms;
        self
    }

    /// Treat unreadable layer files as errors instead of placeholders.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frame_duration_ms(&self) -> u32 {
        self.frame_duration_ms
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Render `layers`, producing an animation if any layer is animated.
    pub fn compose(&self, layers: &[LayerDescriptor]) -> Result<Composite<Rendered>, CompositionError> {
        if layers.iter().any(LayerDescriptor::is_animated) {
            let Composite { output, warnings } = self.compose_animated(layers)?;
            Ok(Composite { output: Rendered::Animated(output), warnings })
        } else {
            let Composite { output, warnings } = self.compose_static(layers)?;
            Ok(Composite { output: Rendered::Still(output), warnings })
        }
    }

    fn check_canvas(&self) -> Result<(), CompositionError> {
        if self.width == 0 || self.height == 0 {
            return Err(CompositionError::InvalidCanvas { width: self.width, height: self.height });
        }
        Ok(())
    }

    /// Sort `layers` and load each one onto the canvas.
    ///
    /// Decoding runs in parallel; the returned list is in paint order.
    fn prepare(
        &self,
        layers: &[LayerDescriptor],
    ) -> Result<(Vec<(LayerDescriptor, LayerSource)>, Vec<Warning>), CompositionError> {
        self.check_canvas()?;

        let mut sorted = layers.to_vec();
        sort_by_stacking(&mut sorted);

        let loaded: Vec<_> = sorted
            .par_iter()
            .map(|layer| load_source(&layer.source, self.width, self.height, layer.opacity))
            .collect();

        let mut warnings = Vec::new();
        let mut prepared = Vec::with_capacity(sorted.len());
        for (layer, result) in sorted.into_iter().zip(loaded) {
            let source = match result {
                Ok(source) => source,
                Err(reason) => {
                    if self.strict {
                        return Err(CompositionError::AssetCorrupt { path: layer.source, reason });
                    }
                    tracing::warn!(
                        path = %layer.source.display(),
                        %reason,
                        "layer failed to load, using transparent placeholder"
                    );
                    warnings.push(Warning::for_source(
                        &layer.source,
                        format!("{}; substituted a transparent layer", reason),
                    ));
                    LayerSource::placeholder(self.width, self.height)
                }
            };
            prepared.push((layer, source));
        }
        Ok((prepared, warnings))
    }

    /// Fold frame `index` of every prepared layer onto a fresh canvas.
    fn flatten_frame(&self, prepared: &[(LayerDescriptor, LayerSource)], index: usize) -> RgbaImage {
        let mut canvas = transparent_canvas(self.width, self.height);
        for (layer, source) in prepared {
            blend_onto(&mut canvas, source.frame(index), layer.blend_mode);
        }
        canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str, index: i64) -> LayerDescriptor {
        LayerDescriptor::new(name, format!("{}.png", name), name, index)
    }

    #[test]
    fn test_sort_by_stacking_ascending() {
        let mut layers = vec![layer("c", 3), layer("a", 1), layer("b", 2)];
        sort_by_stacking(&mut layers);
        let names: Vec<_> = layers.iter().map(|l| l.contributor.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_by_stacking_is_stable_for_ties() {
        let mut layers = vec![layer("x", 5), layer("y", 1), layer("z", 5), layer("w", 1)];
        sort_by_stacking(&mut layers);
        let names: Vec<_> = layers.iter().map(|l| l.contributor.as_str()).collect();
        assert_eq!(names, vec!["y", "w", "x", "z"]);
    }

    #[test]
    fn test_sort_handles_negative_and_gaps() {
        let mut layers = vec![layer("a", 100), layer("b", -4), layer("c", 7)];
        sort_by_stacking(&mut layers);
        let names: Vec<_> = layers.iter().map(|l| l.contributor.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_descriptor_defaults_from_json() {
        let json = r#"{"contributor":"ana","source":"hat.png","label":"Hat","stacking_index":2}"#;
        let d: LayerDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.opacity, 1.0);
        assert_eq!(d.blend_mode, BlendMode::Normal);
    }

    #[test]
    fn test_compositor_defaults() {
        let c = Compositor::default();
        assert_eq!(c.canvas_size(), (CANVAS_SIZE, CANVAS_SIZE));
        assert_eq!(c.frame_duration_ms(), DEFAULT_FRAME_DURATION_MS);
        assert!(!c.is_strict());
    }

    #[test]
    fn test_zero_canvas_rejected() {
        let c = Compositor::new().with_canvas(0, 10);
        assert!(matches!(c.compose_static(&[]), Err(CompositionError::InvalidCanvas { .. })));
    }

    #[test]
    fn test_rendered_extension() {
        let still = Rendered::Still(RgbaImage::new(1, 1));
        assert_eq!(still.extension(), "png");
        let anim = Rendered::Animated(Animation { frames: vec![], durations_ms: vec![] });
        assert_eq!(anim.extension(), "gif");
        assert!(anim.first_frame().is_none());
    }
}
