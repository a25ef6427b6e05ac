// ============================================================================
// TEXTURE - shared handle over backend-specific storage
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized; values are clamped to [0, 1] on write.
    Rgba8,
    /// Half float, filterable.
    Rgba16Float,
    /// Full float.  Used for distance fields; the GPU backend stores it as
    /// `Rgba16Float` on adapters that cannot filter 32-bit float textures.
    Rgba32Float,
}

/// CPU-side texel storage.  Readers take a cheap `Arc` snapshot; a draw
/// builds a new buffer and swaps it in, so a texture may be bound as input
/// to a draw that targets it.
pub(crate) struct CpuSurface {
    pixels: RwLock<Arc<Vec<[f32; 4]>>>,
}

impl CpuSurface {
    pub(crate) fn new(pixels: Vec<[f32; 4]>) -> Self {
        Self {
            pixels: RwLock::new(Arc::new(pixels)),
        }
    }

    pub(crate) fn snapshot(&self) -> Arc<Vec<[f32; 4]>> {
        match self.pixels.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub(crate) fn replace(&self, pixels: Vec<[f32; 4]>) {
        let mut guard = match self.pixels.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(pixels);
    }
}

pub(crate) enum TextureStorage {
    Cpu(CpuSurface),
    Gpu(crate::gpu::GpuSurface),
}

struct TextureInner {
    id: u64,
    width: u32,
    height: u32,
    format: TextureFormat,
    storage: TextureStorage,
}

/// Reference-counted texture.  Clones share storage; identity is pointer
/// identity (see [`Texture::ptr_eq`]).
#[derive(Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

impl Texture {
    pub(crate) fn new(
        width: u32,
        height: u32,
        format: TextureFormat,
        storage: TextureStorage,
    ) -> Self {
        Self {
            inner: Arc::new(TextureInner {
                id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
                width,
                height,
                format,
                storage,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.inner.width, self.inner.height)
    }

    pub fn format(&self) -> TextureFormat {
        self.inner.format
    }

    /// True when both handles refer to the same texture object.
    pub fn ptr_eq(a: &Texture, b: &Texture) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn storage(&self) -> &TextureStorage {
        &self.inner.storage
    }

    /// No other handle exists, so the storage can be pooled.
    pub(crate) fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.inner.id)
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("format", &self.inner.format)
            .finish()
    }
}
