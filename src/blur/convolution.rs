// ============================================================================
// CONVOLUTION PASSES - box, box-linear, Gaussian, Gaussian-linear
// ============================================================================
//
// Area blurs are separable: a horizontal pass into one target, then a
// vertical pass into the other, ping-ponging so a pass never reads the
// target it writes.  Directional, rotational and zoom blurs are one pass.

use std::sync::Arc;

use super::kernel::KernelCache;
use super::{BlurFamily, BlurVariant, PassState};
use crate::gfx::catalog::names;
use crate::gfx::{
    Effect, GfxResult, GraphicsDevice, RenderTarget, Texture, TextureFormat, EPSILON,
};

pub(crate) struct ConvolutionEngine {
    family: BlurFamily,
    effect: Option<Effect>,
    kernels: Option<Arc<KernelCache>>,
    targets: [RenderTarget; 2],
}

fn effect_name(family: BlurFamily) -> &'static str {
    match family {
        BlurFamily::Box => names::BLUR_BOX,
        BlurFamily::BoxLinear => names::BLUR_BOX_LINEAR,
        BlurFamily::Gaussian => names::BLUR_GAUSSIAN,
        BlurFamily::GaussianLinear => names::BLUR_GAUSSIAN_LINEAR,
        BlurFamily::DualFiltering => names::BLUR_DUAL_FILTERING,
    }
}

impl ConvolutionEngine {
    pub(crate) fn new(
        device: &GraphicsDevice,
        family: BlurFamily,
        kernels: Option<Arc<KernelCache>>,
    ) -> Self {
        // A missing program degrades the pass to a pass-through
        let effect = match device.create_effect(effect_name(family)) {
            Ok(e) => Some(e),
            Err(e) => {
                log::error!("<blur::{}> failed to load effect: {}", family.name(), e);
                None
            }
        };
        Self {
            family,
            effect,
            kernels,
            targets: [
                device.create_render_target(TextureFormat::Rgba8),
                device.create_render_target(TextureFormat::Rgba8),
            ],
        }
    }

    /// Value uploaded to `pSize`: how many taps each side the program walks.
    fn shader_size(&self, variant: BlurVariant, size: f64) -> f32 {
        match (self.family, variant) {
            (BlurFamily::Gaussian, BlurVariant::Zoom) => size as f32,
            (BlurFamily::Gaussian, _) => (size * 2.0) as f32,
            _ => size as f32,
        }
    }

    fn apply_common(
        effect: &mut Effect,
        kernels: Option<&KernelCache>,
        input: &Texture,
        texel: [f32; 2],
        state: &PassState,
        shader_size: f32,
    ) {
        if let Some(p) = effect.get_parameter("pImage") {
            p.set_texture(Some(input));
        }
        if let Some(p) = effect.get_parameter("pImageTexel") {
            p.set_float2(texel[0], texel[1]);
        }
        if let Some(p) = effect.get_parameter("pStepScale") {
            p.set_float2(state.step_scale.0 as f32, state.step_scale.1 as f32);
        }
        if let Some(p) = effect.get_parameter("pSize") {
            p.set_float(shader_size);
        }
        if let Some(kernels) = kernels
            && let Some(p) = effect.get_parameter("pKernel")
        {
            p.set_float_array(kernels.get_kernel(state.size.round() as usize).padded());
        }
    }

    pub(crate) fn render(
        &mut self,
        variant: BlurVariant,
        state: &PassState,
        input: &Texture,
    ) -> GfxResult<Texture> {
        let (sx, sy) = state.step_scale;
        if sx + sy < EPSILON as f64 {
            return Ok(input.clone());
        }
        let shader_size = self.shader_size(variant, state.size);
        let Some(effect) = self.effect.as_mut() else {
            return Ok(input.clone());
        };
        let kernels = self.kernels.as_deref();
        let (w, h) = input.size();
        let texel = [1.0 / w as f32, 1.0 / h as f32];

        match variant {
            BlurVariant::Area => {
                let mut current = input.clone();
                let axes = [(sx, [texel[0], 0.0]), (sy, [0.0, texel[1]])];
                for (step, axis_texel) in axes {
                    if step < EPSILON as f64 {
                        continue;
                    }
                    Self::apply_common(effect, kernels, &current, axis_texel, state, shader_size);
                    {
                        let mut op = self.targets[0].render(w, h)?;
                        effect.run(&mut op, "Draw")?;
                    }
                    if let Some(t) = self.targets[0].get_texture() {
                        current = t;
                    }
                    self.targets.swap(0, 1);
                }
                Ok(current)
            }
            BlurVariant::Directional => {
                let a = state.angle.to_radians() as f32;
                let dir = [a.cos() * texel[0], a.sin() * texel[1]];
                Self::apply_common(effect, kernels, input, dir, state, shader_size);
                self.single_pass(w, h, "Draw", input)
            }
            BlurVariant::Rotational => {
                Self::apply_common(effect, kernels, input, texel, state, shader_size);
                let per_step = state.angle.to_radians() / state.size.max(1.0);
                if let Some(p) = effect.get_parameter("pAngle") {
                    p.set_float(per_step as f32);
                }
                if let Some(p) = effect.get_parameter("pCenter") {
                    p.set_float2(state.center.0 as f32, state.center.1 as f32);
                }
                self.single_pass(w, h, "Rotate", input)
            }
            BlurVariant::Zoom => {
                Self::apply_common(effect, kernels, input, texel, state, shader_size);
                if let Some(p) = effect.get_parameter("pCenter") {
                    p.set_float2(state.center.0 as f32, state.center.1 as f32);
                }
                self.single_pass(w, h, "Zoom", input)
            }
        }
    }

    fn single_pass(
        &mut self,
        w: u32,
        h: u32,
        technique: &str,
        input: &Texture,
    ) -> GfxResult<Texture> {
        let Some(effect) = self.effect.as_ref() else {
            return Ok(input.clone());
        };
        {
            let mut op = self.targets[0].render(w, h)?;
            effect.run(&mut op, technique)?;
        }
        Ok(self.targets[0].get_texture().unwrap_or_else(|| input.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blur::kernel::KernelSynthesis;

    fn state(size: f64, step: (f64, f64)) -> PassState {
        PassState {
            size,
            angle: 0.0,
            center: (0.5, 0.5),
            step_scale: step,
        }
    }

    #[test]
    fn gaussian_uploads_twice_the_size_except_zoom() {
        let device = GraphicsDevice::cpu();
        let e = ConvolutionEngine::new(&device, BlurFamily::Gaussian, None);
        assert_eq!(e.shader_size(BlurVariant::Area, 4.0), 8.0);
        assert_eq!(e.shader_size(BlurVariant::Zoom, 4.0), 4.0);
        let b = ConvolutionEngine::new(&device, BlurFamily::Box, None);
        assert_eq!(b.shader_size(BlurVariant::Area, 4.0), 4.0);
    }

    #[test]
    fn vertical_only_area_blur_leaves_columns_alone() {
        let device = GraphicsDevice::cpu();
        // Left column red, right column blue; a vertical blur must not mix them
        let mut pixels = Vec::new();
        for _ in 0..4 {
            pixels.push([1.0, 0.0, 0.0, 1.0]);
            pixels.push([0.0, 0.0, 1.0, 1.0]);
        }
        let input = device
            .create_texture(2, 4, TextureFormat::Rgba8, Some(&pixels))
            .unwrap();
        let cache = Arc::new(KernelCache::new(KernelSynthesis::Oversampled));
        let mut e = ConvolutionEngine::new(&device, BlurFamily::Gaussian, Some(cache));
        let out = e
            .render(BlurVariant::Area, &state(2.0, (0.0, 1.0)), &input)
            .unwrap();
        let result = device.read_pixels(&out).unwrap();
        for (i, p) in result.iter().enumerate() {
            assert!((p[0] - pixels[i][0]).abs() < 0.01, "texel {}", i);
            assert!((p[2] - pixels[i][2]).abs() < 0.01, "texel {}", i);
        }
    }
}
