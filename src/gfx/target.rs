// ============================================================================
// RENDER TARGET - reusable texture with a scoped render operation
// ============================================================================

use super::catalog::names;
use super::effect::Effect;
use super::texture::{Texture, TextureFormat};
use super::{BlendState, DrawCall, GfxError, GfxResult, GraphicsDevice};

/// Owns one texture that is reallocated only when the requested size
/// changes.  The texture handed out by [`get_texture`](Self::get_texture) is
/// the same object the next `render` writes into.
pub struct RenderTarget {
    device: GraphicsDevice,
    format: TextureFormat,
    texture: Option<Texture>,
}

impl RenderTarget {
    pub fn new(device: GraphicsDevice, format: TextureFormat) -> Self {
        Self {
            device,
            format,
            texture: None,
        }
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Begin rendering at `width` x `height`.  The returned op targets this
    /// render target until it is dropped.
    pub fn render(&mut self, width: u32, height: u32) -> GfxResult<RenderOp<'_>> {
        if width == 0 || height == 0 {
            return Err(GfxError::InvalidSize(width, height));
        }

        let reuse = matches!(&self.texture, Some(t) if t.size() == (width, height));
        if !reuse {
            if let Some(old) = self.texture.take() {
                self.device.backend().recycle(old);
            }
            self.texture = Some(
                self.device
                    .backend()
                    .create_texture(width, height, self.format, None)?,
            );
        }

        let target = self
            .texture
            .clone()
            .ok_or(GfxError::InvalidSize(width, height))?;
        Ok(RenderOp {
            device: &self.device,
            target,
            blend: BlendState::DISABLED,
        })
    }

    pub fn get_texture(&self) -> Option<Texture> {
        self.texture.clone()
    }
}

/// Scoped draw context for one render target.
pub struct RenderOp<'a> {
    device: &'a GraphicsDevice,
    target: Texture,
    blend: BlendState,
}

impl RenderOp<'_> {
    pub fn size(&self) -> (u32, u32) {
        self.target.size()
    }

    pub fn set_blend(&mut self, blend: BlendState) {
        self.blend = blend;
    }

    pub fn clear(&mut self, color: [f32; 4]) -> GfxResult<()> {
        self.device.backend().clear(&self.target, color)
    }

    pub fn draw(&mut self, effect: &Effect, technique: &str) -> GfxResult<()> {
        let descriptor = effect.descriptor();
        let index = descriptor
            .technique_index(technique)
            .ok_or_else(|| GfxError::UnknownTechnique {
                effect: descriptor.name.to_string(),
                technique: technique.to_string(),
            })?;
        let call = DrawCall {
            effect: descriptor,
            technique: index,
            values: effect.values(),
            blend: self.blend,
        };
        self.device.backend().draw(&self.target, &call)
    }

    /// Draw `texture` stretched over the whole target with the default effect.
    pub fn blit(&mut self, texture: &Texture) -> GfxResult<()> {
        let mut effect = self.device.create_effect(names::DEFAULT)?;
        if let Some(p) = effect.get_parameter("image") {
            p.set_texture(Some(texture));
        }
        self.draw(&effect, "Draw")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_texture_until_size_changes() {
        let device = GraphicsDevice::cpu();
        let mut rt = device.create_render_target(TextureFormat::Rgba8);
        assert!(rt.get_texture().is_none());

        rt.render(4, 4).unwrap();
        let first = rt.get_texture().unwrap();
        rt.render(4, 4).unwrap();
        assert!(Texture::ptr_eq(&first, &rt.get_texture().unwrap()));

        rt.render(8, 2).unwrap();
        let resized = rt.get_texture().unwrap();
        assert!(!Texture::ptr_eq(&first, &resized));
        assert_eq!(resized.size(), (8, 2));

        assert!(matches!(rt.render(0, 3), Err(GfxError::InvalidSize(0, 3))));
    }

    #[test]
    fn blit_copies_and_unknown_technique_fails() {
        let device = GraphicsDevice::cpu();
        let src = device
            .create_texture(2, 2, TextureFormat::Rgba8, Some(&[[1.0, 0.0, 0.0, 1.0]; 4]))
            .unwrap();
        let mut rt = device.create_render_target(TextureFormat::Rgba8);
        {
            let mut op = rt.render(2, 2).unwrap();
            op.blit(&src).unwrap();
            let effect = device.create_effect(names::DEFAULT).unwrap();
            assert!(matches!(
                op.draw(&effect, "Nope"),
                Err(GfxError::UnknownTechnique { .. })
            ));
        }
        let pixels = device.read_pixels(&rt.get_texture().unwrap()).unwrap();
        assert!(pixels.iter().all(|p| *p == [1.0, 0.0, 0.0, 1.0]));
    }
}
