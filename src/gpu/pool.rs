// ============================================================================
// SURFACE POOL - recycle render-target surfaces between size changes
// ============================================================================

use std::collections::HashMap;

use super::backend::GpuSurface;
use crate::gfx::TextureFormat;

/// Surfaces kept per (width, height, format).
const MAX_PER_KEY: usize = 4;

type PoolKey = (u32, u32, TextureFormat);

/// Surfaces handed back by render targets that switched size.  A target
/// bouncing between two sizes (dual filtering, SDF scale changes) then stops
/// allocating after the first frame.
#[derive(Default)]
pub struct TexturePool {
    free: HashMap<PoolKey, Vec<GpuSurface>>,
}

impl TexturePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, width: u32, height: u32, format: TextureFormat) -> Option<GpuSurface> {
        self.free.get_mut(&(width, height, format))?.pop()
    }

    /// Keep `surface` for reuse, or drop it when its bucket is full.
    pub fn release(&mut self, surface: GpuSurface, width: u32, height: u32, format: TextureFormat) {
        let bucket = self.free.entry((width, height, format)).or_default();
        if bucket.len() < MAX_PER_KEY {
            bucket.push(surface);
        }
    }
}
