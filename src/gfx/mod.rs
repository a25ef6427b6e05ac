// ============================================================================
// GRAPHICS CAPABILITY SET - textures, render targets, effects
// ============================================================================
//
// Filters never talk to a rendering API directly.  They hold a
// `GraphicsDevice` and work with three handles:
//
//   * `Texture`       shared, reference-counted image
//   * `RenderTarget`  reusable texture you render into via a scoped `RenderOp`
//   * `Effect`        named shader program from the catalog, with typed
//                     parameters and named techniques
//
// A `Backend` executes the draws.  `gfx::cpu` runs every technique as a
// rayon per-pixel program; `crate::gpu` runs the same catalog as WGSL.

pub mod catalog;
pub mod cpu;
pub mod effect;
pub mod target;
pub mod texture;

use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;

pub use catalog::{EffectDescriptor, ParamDecl, ParamKind};
pub use effect::{Effect, ParamValue, Parameter};
pub use target::{RenderOp, RenderTarget};
pub use texture::{Texture, TextureFormat};

/// Values below this are treated as zero by filters and passes.
pub const EPSILON: f32 = 0.0001;

#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("render target size {0}x{1} is invalid")]
    InvalidSize(u32, u32),
    #[error("pixel buffer holds {got} texels, expected {expected}")]
    PixelCount { got: usize, expected: usize },
    #[error("unknown effect '{0}'")]
    UnknownEffect(String),
    #[error("effect '{effect}' has no technique '{technique}'")]
    UnknownTechnique { effect: String, technique: String },
    #[error("texture was created by another backend")]
    ForeignTexture,
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("backend failure: {0}")]
    Backend(String),
}

pub type GfxResult<T> = Result<T, GfxError>;

/// Outcome of a filter render at the host boundary.
#[derive(Clone, Debug)]
pub enum RenderResult {
    Rendered(Texture),
    /// Nothing was produced; the host passes its input through untouched.
    Skip,
}

impl RenderResult {
    pub fn texture(&self) -> Option<&Texture> {
        match self {
            RenderResult::Rendered(t) => Some(t),
            RenderResult::Skip => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, RenderResult::Skip)
    }
}

// ============================================================================
// Blend state
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
}

/// Separate color / alpha blend factors, additive operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enabled: bool,
    pub color_src: BlendFactor,
    pub color_dst: BlendFactor,
    pub alpha_src: BlendFactor,
    pub alpha_dst: BlendFactor,
}

impl BlendState {
    /// Source replaces destination.
    pub const DISABLED: BlendState = BlendState {
        enabled: false,
        color_src: BlendFactor::One,
        color_dst: BlendFactor::Zero,
        alpha_src: BlendFactor::One,
        alpha_dst: BlendFactor::Zero,
    };

    pub const fn separate(
        color_src: BlendFactor,
        color_dst: BlendFactor,
        alpha_src: BlendFactor,
        alpha_dst: BlendFactor,
    ) -> Self {
        BlendState {
            enabled: true,
            color_src,
            color_dst,
            alpha_src,
            alpha_dst,
        }
    }
}

impl Default for BlendState {
    fn default() -> Self {
        BlendState::DISABLED
    }
}

// ============================================================================
// Backend seam
// ============================================================================

/// One full-screen draw: an effect technique with its bound parameter values.
pub struct DrawCall<'a> {
    pub effect: &'static EffectDescriptor,
    pub technique: usize,
    pub values: &'a [ParamValue],
    pub blend: BlendState,
}

pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// Create a texture, zero-filled when `pixels` is `None`.
    fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Option<&[[f32; 4]]>,
    ) -> GfxResult<Texture>;

    fn read_pixels(&self, texture: &Texture) -> GfxResult<Vec<[f32; 4]>>;

    fn clear(&self, target: &Texture, color: [f32; 4]) -> GfxResult<()>;

    fn draw(&self, target: &Texture, call: &DrawCall<'_>) -> GfxResult<()>;

    /// Hand back a texture a render target no longer uses.
    fn recycle(&self, _texture: Texture) {}
}

/// Cloneable handle to a backend.  Every filter instance holds one.
#[derive(Clone)]
pub struct GraphicsDevice {
    backend: Arc<dyn Backend>,
}

impl GraphicsDevice {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Device backed by the rayon CPU renderer.
    pub fn cpu() -> Self {
        Self::new(Arc::new(cpu::CpuBackend::new()))
    }

    /// Try the wgpu backend first; fall back to the CPU renderer when no
    /// adapter can be created.
    pub fn gpu_or_cpu(power_preference: &str) -> Self {
        match crate::gpu::GpuBackend::new(power_preference) {
            Some(backend) => {
                log::info!("<gfx> using GPU backend ({})", backend.adapter_name());
                Self::new(Arc::new(backend))
            }
            None => {
                log::warn!("<gfx> no GPU adapter available, using CPU backend");
                Self::cpu()
            }
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn create_effect(&self, name: &str) -> GfxResult<Effect> {
        let descriptor =
            catalog::find(name).ok_or_else(|| GfxError::UnknownEffect(name.to_string()))?;
        Ok(Effect::new(descriptor))
    }

    pub fn create_render_target(&self, format: TextureFormat) -> RenderTarget {
        RenderTarget::new(self.clone(), format)
    }

    pub fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Option<&[[f32; 4]]>,
    ) -> GfxResult<Texture> {
        if width == 0 || height == 0 {
            return Err(GfxError::InvalidSize(width, height));
        }
        if let Some(p) = pixels {
            let expected = width as usize * height as usize;
            if p.len() != expected {
                return Err(GfxError::PixelCount { got: p.len(), expected });
            }
        }
        self.backend.create_texture(width, height, format, pixels)
    }

    /// Upload an 8-bit image as an `Rgba8` texture.
    pub fn texture_from_image(&self, image: &RgbaImage) -> GfxResult<Texture> {
        let pixels: Vec<[f32; 4]> = image
            .pixels()
            .map(|p| {
                [
                    p[0] as f32 / 255.0,
                    p[1] as f32 / 255.0,
                    p[2] as f32 / 255.0,
                    p[3] as f32 / 255.0,
                ]
            })
            .collect();
        self.create_texture(
            image.width(),
            image.height(),
            TextureFormat::Rgba8,
            Some(&pixels),
        )
    }

    /// Decode an image file from disk (blocking) and upload it.
    pub fn load_texture(&self, path: &Path) -> GfxResult<Texture> {
        let image = image::open(path)?.to_rgba8();
        self.texture_from_image(&image)
    }

    pub fn read_pixels(&self, texture: &Texture) -> GfxResult<Vec<[f32; 4]>> {
        self.backend.read_pixels(texture)
    }

    /// Read a texture back into an 8-bit image (values clamped to [0, 1]).
    pub fn read_image(&self, texture: &Texture) -> GfxResult<RgbaImage> {
        let pixels = self.read_pixels(texture)?;
        let mut raw = Vec::with_capacity(pixels.len() * 4);
        for p in &pixels {
            for c in p {
                raw.push((c.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
        }
        RgbaImage::from_raw(texture.width(), texture.height(), raw).ok_or(GfxError::PixelCount {
            got: pixels.len(),
            expected: texture.width() as usize * texture.height() as usize,
        })
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("backend", &self.backend.name())
            .finish()
    }
}
