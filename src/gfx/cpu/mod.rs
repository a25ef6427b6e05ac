// ============================================================================
// CPU BACKEND - rayon per-pixel execution of the effect catalog
// ============================================================================
//
// Every draw is a full-screen pass: the technique is compiled into a closure
// `uv -> rgba`, evaluated per texel centre with rows split across the rayon
// pool, blended against the previous contents and swapped into the target.

mod programs;

use std::sync::Arc;

use rayon::prelude::*;

use super::texture::{CpuSurface, TextureStorage};
use super::{
    Backend, BlendFactor, BlendState, DrawCall, GfxError, GfxResult, Texture, TextureFormat,
};

pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn surface(texture: &Texture) -> GfxResult<&CpuSurface> {
    match texture.storage() {
        TextureStorage::Cpu(s) => Ok(s),
        _ => Err(GfxError::ForeignTexture),
    }
}

/// Apply the storage precision of `format`.
#[inline]
fn store(c: [f32; 4], format: TextureFormat) -> [f32; 4] {
    match format {
        TextureFormat::Rgba8 => c.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() / 255.0),
        TextureFormat::Rgba16Float | TextureFormat::Rgba32Float => c,
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Option<&[[f32; 4]]>,
    ) -> GfxResult<Texture> {
        let data = match pixels {
            Some(p) => p.iter().map(|c| store(*c, format)).collect(),
            None => vec![[0.0; 4]; width as usize * height as usize],
        };
        Ok(Texture::new(
            width,
            height,
            format,
            TextureStorage::Cpu(CpuSurface::new(data)),
        ))
    }

    fn read_pixels(&self, texture: &Texture) -> GfxResult<Vec<[f32; 4]>> {
        Ok(surface(texture)?.snapshot().as_ref().clone())
    }

    fn clear(&self, target: &Texture, color: [f32; 4]) -> GfxResult<()> {
        let n = target.width() as usize * target.height() as usize;
        surface(target)?.replace(vec![store(color, target.format()); n]);
        Ok(())
    }

    fn draw(&self, target: &Texture, call: &DrawCall<'_>) -> GfxResult<()> {
        let dst_surface = surface(target)?;
        let shader = programs::compile(call)?;

        let w = target.width() as usize;
        let h = target.height() as usize;
        let format = target.format();
        let blend = call.blend;
        let previous = dst_surface.snapshot();

        let mut out = vec![[0.0f32; 4]; w * h];
        out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let v = (y as f32 + 0.5) / h as f32;
            for (x, px) in row.iter_mut().enumerate() {
                let u = (x as f32 + 0.5) / w as f32;
                let src = shader([u, v]);
                let color = if blend.enabled {
                    blend_pixel(&blend, src, previous[y * w + x])
                } else {
                    src
                };
                *px = store(color, format);
            }
        });

        dst_surface.replace(out);
        Ok(())
    }
}

#[inline]
fn factor(f: BlendFactor, src: [f32; 4], dst: [f32; 4]) -> f32 {
    match f {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::SrcAlpha => src[3],
        BlendFactor::InvSrcAlpha => 1.0 - src[3],
        BlendFactor::DstAlpha => dst[3],
        BlendFactor::InvDstAlpha => 1.0 - dst[3],
    }
}

fn blend_pixel(blend: &BlendState, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    let cs = factor(blend.color_src, src, dst);
    let cd = factor(blend.color_dst, src, dst);
    let a_s = factor(blend.alpha_src, src, dst);
    let a_d = factor(blend.alpha_dst, src, dst);
    [
        src[0] * cs + dst[0] * cd,
        src[1] * cs + dst[1] * cd,
        src[2] * cs + dst[2] * cd,
        src[3] * a_s + dst[3] * a_d,
    ]
}

// ============================================================================
// Sampler - bilinear, clamp-to-edge
// ============================================================================

#[derive(Clone)]
pub(crate) struct Sampler {
    pixels: Arc<Vec<[f32; 4]>>,
    width: usize,
    height: usize,
}

impl Sampler {
    pub(crate) fn from_texture(texture: &Texture) -> GfxResult<Self> {
        Ok(Self {
            pixels: surface(texture)?.snapshot(),
            width: texture.width() as usize,
            height: texture.height() as usize,
        })
    }

    /// Stand-in for an unbound texture: 1x1 transparent black.
    pub(crate) fn empty() -> Self {
        Self {
            pixels: Arc::new(vec![[0.0; 4]]),
            width: 1,
            height: 1,
        }
    }

    pub(crate) fn size(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }

    #[inline]
    fn fetch(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.pixels[y * self.width + x]
    }

    /// Texel containing `uv`, no filtering.
    #[inline]
    pub(crate) fn load(&self, uv: [f32; 2]) -> [f32; 4] {
        let x = (uv[0] * self.width as f32).floor() as i64;
        let y = (uv[1] * self.height as f32).floor() as i64;
        self.fetch(x, y)
    }

    /// Bilinear sample with texel centres at `(i + 0.5) / size`.
    #[inline]
    pub(crate) fn sample(&self, uv: [f32; 2]) -> [f32; 4] {
        let fx = uv[0] * self.width as f32 - 0.5;
        let fy = uv[1] * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let dx = fx - x0;
        let dy = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.fetch(x0, y0);
        let p10 = self.fetch(x0 + 1, y0);
        let p01 = self.fetch(x0, y0 + 1);
        let p11 = self.fetch(x0 + 1, y0 + 1);

        let mut out = [0.0f32; 4];
        for c in 0..4 {
            out[c] = p00[c] * (1.0 - dx) * (1.0 - dy)
                + p10[c] * dx * (1.0 - dy)
                + p01[c] * (1.0 - dx) * dy
                + p11[c] * dx * dy;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::GraphicsDevice;

    #[test]
    fn bilinear_sample_interpolates_between_centres() {
        let device = GraphicsDevice::cpu();
        let tex = device
            .create_texture(
                2,
                1,
                TextureFormat::Rgba16Float,
                Some(&[[0.0, 0.0, 0.0, 0.0], [1.0, 1.0, 1.0, 1.0]]),
            )
            .unwrap();
        let s = Sampler::from_texture(&tex).unwrap();
        assert_eq!(s.sample([0.25, 0.5])[0], 0.0);
        assert_eq!(s.sample([0.75, 0.5])[0], 1.0);
        assert!((s.sample([0.5, 0.5])[0] - 0.5).abs() < 1e-6);
        // Clamped outside the texture
        assert_eq!(s.sample([-3.0, 0.5])[0], 0.0);
        assert_eq!(s.load([0.9, 0.1])[0], 1.0);
    }

    #[test]
    fn blending_uses_separate_alpha_factors() {
        let blend = BlendState::separate(
            BlendFactor::SrcAlpha,
            BlendFactor::InvSrcAlpha,
            BlendFactor::One,
            BlendFactor::One,
        );
        let out = blend_pixel(&blend, [1.0, 0.0, 0.0, 0.25], [0.0, 0.0, 1.0, 1.0]);
        assert!((out[0] - 0.25).abs() < 1e-6);
        assert!((out[2] - 0.75).abs() < 1e-6);
        assert!((out[3] - 1.25).abs() < 1e-6);
    }

    #[test]
    fn rgba8_targets_quantize() {
        let c = store([0.5, 2.0, -1.0, 1.0], TextureFormat::Rgba8);
        assert_eq!(c[1], 1.0);
        assert_eq!(c[2], 0.0);
        assert!((c[0] - 128.0 / 255.0).abs() < 1e-6);
    }
}
