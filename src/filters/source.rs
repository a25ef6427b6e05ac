// ============================================================================
// SOURCE CAPTURE - named, renderable sources a filter can read from
// ============================================================================

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::gfx::{GfxError, GfxResult, GraphicsDevice, RenderTarget, Texture, TextureFormat};

/// A source that can be rendered into a texture on demand.
pub trait SourceCapture: Send + Sync {
    fn name(&self) -> &str;

    /// Native width, or 0 when the source does not know it yet.
    fn width(&self) -> u32;

    /// Native height, or 0 when the source does not know it yet.
    fn height(&self) -> u32;

    /// Scenes are always captured at the global output size.
    fn is_scene(&self) -> bool {
        false
    }

    fn render(&self, width: u32, height: u32) -> GfxResult<Texture>;
}

/// Every source a filter may look up by name, plus the global output size
/// used for scene captures.
pub struct SourceCatalog {
    output_size: (u32, u32),
    sources: BTreeMap<String, Arc<dyn SourceCapture>>,
}

impl SourceCatalog {
    pub fn new(output_width: u32, output_height: u32) -> Self {
        Self {
            output_size: (output_width, output_height),
            sources: BTreeMap::new(),
        }
    }

    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    pub fn register(&mut self, source: Arc<dyn SourceCapture>) {
        self.sources.insert(source.name().to_string(), source);
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn SourceCapture>> {
        self.sources.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Capture size for `source`: its own size, falling back to `base` for
    /// unknown dimensions; scenes use the output size.
    pub fn capture_size(&self, source: &dyn SourceCapture, base: (u32, u32)) -> (u32, u32) {
        if source.is_scene() && self.output_size.0 > 0 && self.output_size.1 > 0 {
            return self.output_size;
        }
        let w = if source.width() == 0 { base.0 } else { source.width() };
        let h = if source.height() == 0 { base.1 } else { source.height() };
        (w, h)
    }
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

// ============================================================================
// Texture-backed source
// ============================================================================

/// A still image published as a source.  Rendering stretches it to the
/// requested size.
pub struct TextureSource {
    name: String,
    texture: Texture,
    size: (u32, u32),
    scene: bool,
    target: Mutex<RenderTarget>,
}

impl TextureSource {
    pub fn new(device: &GraphicsDevice, name: &str, texture: Texture) -> Self {
        let size = texture.size();
        Self {
            name: name.to_string(),
            texture,
            size,
            scene: false,
            target: Mutex::new(device.create_render_target(TextureFormat::Rgba8)),
        }
    }

    /// Report `width` x `height` instead of the texture size (0 = unknown).
    pub fn with_reported_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    pub fn as_scene(mut self) -> Self {
        self.scene = true;
        self
    }
}

impl SourceCapture for TextureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> u32 {
        self.size.0
    }

    fn height(&self) -> u32 {
        self.size.1
    }

    fn is_scene(&self) -> bool {
        self.scene
    }

    fn render(&self, width: u32, height: u32) -> GfxResult<Texture> {
        let mut target = self
            .target
            .lock()
            .map_err(|_| GfxError::Backend(format!("source '{}' target poisoned", self.name)))?;
        {
            let mut op = target.render(width, height)?;
            op.blit(&self.texture)?;
        }
        target
            .get_texture()
            .ok_or(GfxError::InvalidSize(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_size_falls_back_to_base_then_output() {
        let device = GraphicsDevice::cpu();
        let tex = device.create_texture(4, 4, TextureFormat::Rgba8, None).unwrap();
        let mut catalog = SourceCatalog::new(640, 360);

        let sized = TextureSource::new(&device, "logo", tex.clone());
        assert_eq!(catalog.capture_size(&sized, (100, 50)), (4, 4));

        let unknown = TextureSource::new(&device, "cam", tex.clone()).with_reported_size(0, 8);
        assert_eq!(catalog.capture_size(&unknown, (100, 50)), (100, 8));

        let scene = TextureSource::new(&device, "Scene", tex).as_scene();
        assert_eq!(catalog.capture_size(&scene, (100, 50)), (640, 360));

        catalog.register(Arc::new(sized));
        assert!(catalog.find("logo").is_some());
        assert!(catalog.find("missing").is_none());
    }

    #[test]
    fn render_stretches_to_requested_size() {
        let device = GraphicsDevice::cpu();
        let tex = device
            .create_texture(1, 1, TextureFormat::Rgba8, Some(&[[1.0, 0.0, 0.0, 1.0]]))
            .unwrap();
        let source = TextureSource::new(&device, "red", tex);
        let out = source.render(3, 2).unwrap();
        assert_eq!(out.size(), (3, 2));
        for p in device.read_pixels(&out).unwrap() {
            assert!((p[0] - 1.0).abs() < 0.01 && p[3] > 0.99);
        }
    }
}
