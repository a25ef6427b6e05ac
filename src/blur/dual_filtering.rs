// ============================================================================
// DUAL FILTERING - downsample / upsample pyramid blur
// ============================================================================

use crate::gfx::catalog::names;
use crate::gfx::{Effect, GfxResult, GraphicsDevice, RenderTarget, Texture, TextureFormat};

/// Deepest pyramid level (and largest size setting).
pub const MAX_LEVELS: usize = 7;

pub(crate) struct DualFilteringEngine {
    effect: Option<Effect>,
    /// Index 0 is full resolution, index i is 1/2^i.
    levels: Vec<RenderTarget>,
}

impl DualFilteringEngine {
    pub(crate) fn new(device: &GraphicsDevice) -> Self {
        let effect = match device.create_effect(names::BLUR_DUAL_FILTERING) {
            Ok(e) => Some(e),
            Err(e) => {
                log::error!("<blur::dual_filtering> failed to load effect: {}", e);
                None
            }
        };
        Self {
            effect,
            levels: (0..=MAX_LEVELS)
                .map(|_| device.create_render_target(TextureFormat::Rgba8))
                .collect(),
        }
    }

    fn set_source(effect: &mut Effect, source: &Texture) {
        let (w, h) = source.size();
        if let Some(p) = effect.get_parameter("pImage") {
            p.set_texture(Some(source));
        }
        if let Some(p) = effect.get_parameter("pImageHalfTexel") {
            p.set_float2(0.5 / w as f32, 0.5 / h as f32);
        }
    }

    pub(crate) fn render(&mut self, size: f64, input: &Texture) -> GfxResult<Texture> {
        let depth = (size.round().max(0.0) as usize).min(MAX_LEVELS);
        let Some(effect) = self.effect.as_mut() else {
            return Ok(input.clone());
        };
        if depth == 0 {
            return Ok(input.clone());
        }

        let (w, h) = input.size();
        let level_size = |i: usize| ((w >> i).max(1), (h >> i).max(1));

        // Down: input -> 1 -> 2 -> ... -> depth
        let mut source = input.clone();
        for i in 1..=depth {
            let (lw, lh) = level_size(i);
            Self::set_source(effect, &source);
            {
                let mut op = self.levels[i].render(lw, lh)?;
                effect.run(&mut op, "Down")?;
            }
            if let Some(t) = self.levels[i].get_texture() {
                source = t;
            }
        }

        // Up: depth -> depth-1 -> ... -> 0
        for i in (0..depth).rev() {
            let (lw, lh) = level_size(i);
            Self::set_source(effect, &source);
            {
                let mut op = self.levels[i].render(lw, lh)?;
                effect.run(&mut op, "Up")?;
            }
            if let Some(t) = self.levels[i].get_texture() {
                source = t;
            }
        }

        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_matches_input_size_and_keeps_flat_colour() {
        let device = GraphicsDevice::cpu();
        let colour = [0.2, 0.4, 0.6, 1.0];
        let input = device
            .create_texture(16, 8, TextureFormat::Rgba8, Some(&[colour; 128]))
            .unwrap();
        let mut engine = DualFilteringEngine::new(&device);
        let out = engine.render(3.0, &input).unwrap();
        assert_eq!(out.size(), (16, 8));
        for p in device.read_pixels(&out).unwrap() {
            for c in 0..4 {
                assert!((p[c] - colour[c]).abs() < 0.01);
            }
        }
    }

    #[test]
    fn zero_levels_is_pass_through() {
        let device = GraphicsDevice::cpu();
        let input = device.create_texture(4, 4, TextureFormat::Rgba8, None).unwrap();
        let mut engine = DualFilteringEngine::new(&device);
        let out = engine.render(0.0, &input).unwrap();
        assert!(Texture::ptr_eq(&out, &input));
    }
}
