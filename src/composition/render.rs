//! Static (single-image) compositing

use image::RgbaImage;

use super::error::CompositionError;
use super::{Composite, Compositor, LayerDescriptor};

impl Compositor {
    /// Flatten `layers` into one canvas-sized image.
    ///
    /// Layers are painted in ascending stacking index; input order only
    /// matters between equal indices. Animated layers contribute their first
    /// frame. An empty list yields a transparent canvas.
    pub fn compose_static(
        &self,
        layers: &[LayerDescriptor],
    ) -> Result<Composite<RgbaImage>, CompositionError> {
        let (prepared, warnings) = self.prepare(layers)?;
        let output = self.flatten_frame(&prepared, 0);
        Ok(Composite { output, warnings })
    }
}
