//! Animated (multi-frame) compositing

use super::error::CompositionError;
use super::source::LayerSource;
use super::{Animation, Composite, Compositor, LayerDescriptor};

impl Compositor {
    /// Flatten `layers` into a sequence of frames.
    ///
    /// The output has as many frames as the longest animated layer (at least
    /// one). Shorter animations loop to fill it: output frame `i` uses frame
    /// `i % n` of an `n`-frame layer. Static layers appear unchanged in every
    /// frame. Every frame is shown for the compositor's fixed frame duration.
    ///
    /// Memory is not streamed: every decoded frame of every animated layer
    /// and every output frame stay in memory until the GIF is encoded. See
    /// [`Compositor::animation_bytes`] for the estimate.
    pub fn compose_animated(
        &self,
        layers: &[LayerDescriptor],
    ) -> Result<Composite<Animation>, CompositionError> {
        let (prepared, warnings) = self.prepare(layers)?;

        let max_frames = prepared
            .iter()
            .filter(|(_, source)| source.is_animated())
            .map(|(_, source)| source.frame_count())
            .max()
            .unwrap_or(1)
            .max(1);

        tracing::debug!(
            layers = prepared.len(),
            frames = max_frames,
            bytes = self.animation_bytes(prepared.iter().map(|(_, source)| source), max_frames),
            "compositing animation"
        );

        let frames: Vec<_> = (0..max_frames).map(|i| self.flatten_frame(&prepared, i)).collect();
        let durations_ms = vec![self.frame_duration_ms; frames.len()];

        Ok(Composite { output: Animation { frames, durations_ms }, warnings })
    }

    /// Peak bytes of an animated composite: the decoded sources plus
    /// `frames` output frames at canvas size.
    pub fn animation_bytes<'a>(
        &self,
        sources: impl IntoIterator<Item = &'a LayerSource>,
        frames: usize,
    ) -> usize {
        let frame = self.width as usize * self.height as usize * 4;
        sources.into_iter().map(LayerSource::byte_size).sum::<usize>() + frames * frame
    }
}

#[cfg(test)]
mod tests {
    use super::super::Rendered;
    use super::*;
    use crate::gif::encode_gif;
    use image::{GenericImageView, Rgba, RgbaImage};
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn write_gif(dir: &Path, name: &str, frames: &[RgbaImage]) -> PathBuf {
        let path = dir.join(name);
        let bytes = encode_gif(frames, &vec![40; frames.len()], true).unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Frames whose top-left pixel encodes the frame number in red.
    fn numbered_frames(count: u8, size: u32) -> Vec<RgbaImage> {
        (0..count)
            .map(|i| {
                let mut img = RgbaImage::new(size, size);
                img.put_pixel(0, 0, Rgba([(i + 1) * 20, 0, 0, 255]));
                img
            })
            .collect()
    }

    #[test]
    fn test_animation_bytes_at_full_canvas() {
        let compositor = Compositor::new().with_canvas(2000, 2000);
        let frame = 2000 * 2000 * 4;
        assert_eq!(compositor.animation_bytes([], 1), frame);

        let small = Compositor::new().with_canvas(4, 4);
        let sources = [
            LayerSource::Static(RgbaImage::new(4, 4)),
            LayerSource::Animated(vec![RgbaImage::new(4, 4); 3]),
        ];
        assert_eq!(small.animation_bytes(&sources, 3), 4 * 64 + 3 * 64);
    }

    #[test]
    fn test_static_plus_five_frame_animation() {
        let dir = tempdir().unwrap();

        let mut background = RgbaImage::new(10, 10);
        for y in 5..10 {
            for x in 0..10 {
                background.put_pixel(x, y, Rgba([0, 0, 200, 255]));
            }
        }
        let bg_path = dir.path().join("bg.png");
        background.save(&bg_path).unwrap();
        let anim_path = write_gif(dir.path(), "anim.gif", &numbered_frames(5, 10));

        let layers = vec![
            LayerDescriptor::new("scene", bg_path, "Background", 1),
            LayerDescriptor::new("fx", anim_path, "Sparkle", 2),
        ];
        let result = Compositor::default().compose_animated(&layers).unwrap();
        let animation = result.output;

        assert_eq!(animation.frames.len(), 5);
        assert_eq!(animation.durations_ms, vec![100; 5]);
        for frame in &animation.frames {
            assert_eq!(frame.dimensions(), (2000, 2000));
        }

        // Bottom half comes from the static layer and never changes
        let reference = animation.frames[0].view(0, 1000, 2000, 1000).to_image();
        for frame in &animation.frames[1..] {
            assert_eq!(frame.view(0, 1000, 2000, 1000).to_image(), reference);
        }
        // Top-left corner follows the animation
        let firsts: Vec<u8> = animation.frames.iter().map(|f| f.get_pixel(0, 0)[0]).collect();
        let mut distinct = firsts.clone();
        distinct.dedup();
        assert_eq!(distinct.len(), 5, "corner values {:?}", firsts);
    }

    #[test]
    fn test_shorter_animation_loops() {
        let dir = tempdir().unwrap();
        let long = write_gif(dir.path(), "long.gif", &numbered_frames(4, 8));
        let short = write_gif(dir.path(), "short.gif", &numbered_frames(2, 8));

        // Short one on top, so its corner pixel wins
        let layers = vec![
            LayerDescriptor::new("a", long, "Long", 1),
            LayerDescriptor::new("b", short, "Short", 2),
        ];
        let animation =
            Compositor::new().with_canvas(8, 8).compose_animated(&layers).unwrap().output;

        assert_eq!(animation.frames.len(), 4);
        let corners: Vec<u8> = animation.frames.iter().map(|f| f.get_pixel(0, 0)[0]).collect();
        assert_eq!(corners[0], corners[2]);
        assert_eq!(corners[1], corners[3]);
        assert_ne!(corners[0], corners[1]);
    }

    #[test]
    fn test_no_animated_layers_yields_one_frame() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("still.png");
        RgbaImage::from_pixel(4, 4, Rgba([5, 5, 5, 255])).save(&path).unwrap();

        let animation = Compositor::new()
            .with_canvas(4, 4)
            .with_frame_duration(250)
            .compose_animated(&[LayerDescriptor::new("a", path, "Still", 0)])
            .unwrap()
            .output;
        assert_eq!(animation.frames.len(), 1);
        assert_eq!(animation.durations_ms, vec![250]);
    }

    #[test]
    fn test_broken_gif_counts_as_one_frame() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.gif");
        std::fs::write(&broken, b"GIF89a-but-not-really").unwrap();

        let result = Compositor::new()
            .with_canvas(4, 4)
            .compose_animated(&[LayerDescriptor::new("a", broken, "Broken", 0)])
            .unwrap();
        assert_eq!(result.output.frames.len(), 1);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_compose_dispatches_on_gif_layer() {
        let dir = tempdir().unwrap();
        let anim = write_gif(dir.path(), "a.gif", &numbered_frames(3, 4));
        let still = dir.path().join("s.png");
        RgbaImage::new(4, 4).save(&still).unwrap();
        let c = Compositor::new().with_canvas(4, 4);

        let out = c.compose(&[LayerDescriptor::new("s", &still, "S", 0)]).unwrap().output;
        assert!(matches!(out, Rendered::Still(_)));

        let out = c
            .compose(&[LayerDescriptor::new("s", &still, "S", 0), LayerDescriptor::new("a", anim, "A", 1)])
            .unwrap()
            .output;
        match out {
            Rendered::Animated(animation) => assert_eq!(animation.frames.len(), 3),
            other => panic!("expected animation, got {:?}", other.extension()),
        }
    }
}
