// ============================================================================
// BLUR FACTORIES - capability / bounds tables and pass construction
// ============================================================================

use std::sync::{Arc, RwLock, Weak};

use super::dual_filtering::MAX_LEVELS;
use super::kernel::{KernelCache, KernelSynthesis, MAX_OVERSAMPLED_SIZE, MAX_SEARCHED_RADIUS};
use super::{BlurError, BlurFamily, BlurPass, BlurVariant, Bounds};
use crate::gfx::GraphicsDevice;

/// Largest box radius.
pub const MAX_BOX_SIZE: f64 = 128.0;

const ANGLE_BOUNDS: Bounds = Bounds::new(-180.0, 180.0, 0.01);
const NO_ANGLE: Bounds = Bounds::new(0.0, 0.0, 0.01);
const STEP_SCALE_BOUNDS: Bounds = Bounds::new(0.01, 1000.0, 0.01);

/// Per-family entry point: what it supports, its parameter bounds, and how
/// to build a pass.
pub trait BlurFactory: Send + Sync {
    fn family(&self) -> BlurFamily;

    fn is_type_supported(&self, variant: BlurVariant) -> bool;

    fn create(
        &self,
        device: &GraphicsDevice,
        variant: BlurVariant,
    ) -> Result<BlurPass, BlurError>;

    fn size_bounds(&self) -> Bounds;

    fn angle_bounds(&self, variant: BlurVariant) -> Bounds {
        if variant.supports_angle() {
            ANGLE_BOUNDS
        } else {
            NO_ANGLE
        }
    }

    fn is_step_scale_supported(&self, variant: BlurVariant) -> bool {
        matches!(
            variant,
            BlurVariant::Area | BlurVariant::Zoom | BlurVariant::Directional
        )
    }

    fn step_scale_bounds(&self) -> Bounds {
        STEP_SCALE_BOUNDS
    }

    /// Kernel cache shared by every pass of this family, if it uses one.
    fn kernels(&self) -> Option<Arc<KernelCache>> {
        None
    }
}

// ============================================================================
// Shared kernel cache
// ============================================================================

/// Weak slot for a family's kernel cache.  The cache is built on first use,
/// shared by all live passes and dropped with the last one.  `get` upgrades
/// under the read lock and only takes the write lock to build, re-checking
/// the slot first so concurrent callers never build it twice.
pub struct SharedKernelCache {
    synthesis: KernelSynthesis,
    slot: RwLock<Weak<KernelCache>>,
}

impl SharedKernelCache {
    pub fn new(synthesis: KernelSynthesis) -> Self {
        Self {
            synthesis,
            slot: RwLock::new(Weak::new()),
        }
    }

    pub fn get(&self) -> Arc<KernelCache> {
        let live = match self.slot.read() {
            Ok(guard) => guard.upgrade(),
            Err(poisoned) => poisoned.into_inner().upgrade(),
        };
        if let Some(cache) = live {
            return cache;
        }

        let mut slot = match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(cache) = slot.upgrade() {
            return cache;
        }
        let cache = Arc::new(KernelCache::new(self.synthesis));
        *slot = Arc::downgrade(&cache);
        cache
    }

    /// True while at least one pass holds the cache.
    pub fn is_alive(&self) -> bool {
        match self.slot.read() {
            Ok(guard) => guard.strong_count() > 0,
            Err(poisoned) => poisoned.into_inner().strong_count() > 0,
        }
    }
}

// ============================================================================
// Families
// ============================================================================

pub struct BoxFactory;

impl BlurFactory for BoxFactory {
    fn family(&self) -> BlurFamily {
        BlurFamily::Box
    }

    fn is_type_supported(&self, _variant: BlurVariant) -> bool {
        true
    }

    fn create(&self, device: &GraphicsDevice, variant: BlurVariant) -> Result<BlurPass, BlurError> {
        BlurPass::new(self, device, variant)
    }

    fn size_bounds(&self) -> Bounds {
        Bounds::new(1.0, MAX_BOX_SIZE, 1.0)
    }
}

pub struct BoxLinearFactory;

impl BlurFactory for BoxLinearFactory {
    fn family(&self) -> BlurFamily {
        BlurFamily::BoxLinear
    }

    fn is_type_supported(&self, variant: BlurVariant) -> bool {
        matches!(variant, BlurVariant::Area | BlurVariant::Directional)
    }

    fn create(&self, device: &GraphicsDevice, variant: BlurVariant) -> Result<BlurPass, BlurError> {
        BlurPass::new(self, device, variant)
    }

    fn size_bounds(&self) -> Bounds {
        Bounds::new(1.0, MAX_BOX_SIZE, 1.0)
    }
}

pub struct GaussianFactory {
    kernels: SharedKernelCache,
}

impl GaussianFactory {
    pub fn new() -> Self {
        Self {
            kernels: SharedKernelCache::new(KernelSynthesis::Oversampled),
        }
    }
}

impl Default for GaussianFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BlurFactory for GaussianFactory {
    fn family(&self) -> BlurFamily {
        BlurFamily::Gaussian
    }

    fn is_type_supported(&self, _variant: BlurVariant) -> bool {
        true
    }

    fn create(&self, device: &GraphicsDevice, variant: BlurVariant) -> Result<BlurPass, BlurError> {
        BlurPass::new(self, device, variant)
    }

    fn size_bounds(&self) -> Bounds {
        Bounds::new(1.0, MAX_OVERSAMPLED_SIZE as f64, 1.0)
    }

    fn kernels(&self) -> Option<Arc<KernelCache>> {
        Some(self.kernels.get())
    }
}

pub struct GaussianLinearFactory {
    kernels: SharedKernelCache,
}

impl GaussianLinearFactory {
    pub fn new() -> Self {
        Self {
            kernels: SharedKernelCache::new(KernelSynthesis::SearchedSigma),
        }
    }
}

impl Default for GaussianLinearFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BlurFactory for GaussianLinearFactory {
    fn family(&self) -> BlurFamily {
        BlurFamily::GaussianLinear
    }

    fn is_type_supported(&self, variant: BlurVariant) -> bool {
        matches!(variant, BlurVariant::Area | BlurVariant::Directional)
    }

    fn create(&self, device: &GraphicsDevice, variant: BlurVariant) -> Result<BlurPass, BlurError> {
        BlurPass::new(self, device, variant)
    }

    fn size_bounds(&self) -> Bounds {
        Bounds::new(1.0, MAX_SEARCHED_RADIUS as f64, 1.0)
    }

    fn kernels(&self) -> Option<Arc<KernelCache>> {
        Some(self.kernels.get())
    }
}

pub struct DualFilteringFactory;

impl BlurFactory for DualFilteringFactory {
    fn family(&self) -> BlurFamily {
        BlurFamily::DualFiltering
    }

    fn is_type_supported(&self, variant: BlurVariant) -> bool {
        variant == BlurVariant::Area
    }

    fn create(&self, device: &GraphicsDevice, variant: BlurVariant) -> Result<BlurPass, BlurError> {
        BlurPass::new(self, device, variant)
    }

    fn size_bounds(&self) -> Bounds {
        Bounds::new(1.0, MAX_LEVELS as f64, 1.0)
    }

    fn is_step_scale_supported(&self, _variant: BlurVariant) -> bool {
        false
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Type string -> factory.  Passed explicitly to every blur filter.
#[derive(Default)]
pub struct BlurRegistry {
    factories: Vec<Arc<dyn BlurFactory>>,
}

impl BlurRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All five built-in families.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BoxFactory));
        registry.register(Arc::new(BoxLinearFactory));
        registry.register(Arc::new(GaussianFactory::new()));
        registry.register(Arc::new(GaussianLinearFactory::new()));
        registry.register(Arc::new(DualFilteringFactory));
        registry
    }

    /// Adds a factory, replacing any previous one of the same family.
    pub fn register(&mut self, factory: Arc<dyn BlurFactory>) {
        let family = factory.family();
        self.factories.retain(|f| f.family() != family);
        self.factories.push(factory);
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn BlurFactory>> {
        let family = BlurFamily::from_name(type_name)?;
        self.factories
            .iter()
            .find(|f| f.family() == family)
            .cloned()
    }

    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.iter().map(|f| f.family().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_cache_is_shared_then_released() {
        let shared = SharedKernelCache::new(KernelSynthesis::Oversampled);
        assert!(!shared.is_alive());
        let a = shared.get();
        let b = shared.get();
        assert!(Arc::ptr_eq(&a, &b));
        drop(a);
        assert!(shared.is_alive());
        drop(b);
        assert!(!shared.is_alive());
    }

    #[test]
    fn concurrent_first_use_builds_one_cache() {
        let shared = Arc::new(SharedKernelCache::new(KernelSynthesis::SearchedSigma));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.get())
            })
            .collect();
        let caches: Vec<Arc<KernelCache>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        for c in &caches[1..] {
            assert!(Arc::ptr_eq(&caches[0], c));
        }
        assert!(Arc::ptr_eq(&caches[0], &shared.get()));
    }

    #[test]
    fn support_matrix() {
        let registry = BlurRegistry::with_defaults();
        let supported = |t: &str, v: BlurVariant| registry.get(t).unwrap().is_type_supported(v);
        for v in BlurVariant::ALL {
            assert!(supported("box", v));
            assert!(supported("gaussian", v));
        }
        assert!(supported("box_linear", BlurVariant::Directional));
        assert!(!supported("box_linear", BlurVariant::Zoom));
        assert!(!supported("gaussian_linear", BlurVariant::Rotational));
        assert!(supported("dual_filtering", BlurVariant::Area));
        assert!(!supported("dual_filtering", BlurVariant::Directional));
        assert!(registry.get("median").is_none());
    }

    #[test]
    fn bounds_per_family() {
        let registry = BlurRegistry::with_defaults();
        let g = registry.get("gaussian").unwrap();
        assert_eq!(g.size_bounds(), Bounds::new(1.0, 64.0, 1.0));
        assert_eq!(g.angle_bounds(BlurVariant::Rotational).max, 180.0);
        assert_eq!(g.angle_bounds(BlurVariant::Area).max, 0.0);
        assert!(g.is_step_scale_supported(BlurVariant::Zoom));
        assert!(!g.is_step_scale_supported(BlurVariant::Rotational));

        let gl = registry.get("gaussian_linear").unwrap();
        assert_eq!(gl.size_bounds().max, 127.0);
        let df = registry.get("dual_filtering").unwrap();
        assert_eq!(df.size_bounds().max, MAX_LEVELS as f64);
        assert!(!df.is_step_scale_supported(BlurVariant::Area));
    }

    #[test]
    fn unsupported_pairing_is_rejected() {
        let device = GraphicsDevice::cpu();
        let err = DualFilteringFactory
            .create(&device, BlurVariant::Zoom)
            .unwrap_err();
        assert!(matches!(err, BlurError::UnsupportedVariant { .. }));
    }

    #[test]
    fn zero_step_scale_returns_the_input_for_every_pairing() {
        use crate::gfx::{Texture, TextureFormat};
        let device = GraphicsDevice::cpu();
        let registry = BlurRegistry::with_defaults();
        let mut failed = Vec::new();
        for type_name in registry.type_names() {
            let factory = registry.get(type_name).unwrap();
            for variant in BlurVariant::ALL {
                if !factory.is_type_supported(variant) {
                    continue;
                }
                let input = device
                    .create_texture(1, 1, TextureFormat::Rgba8, Some(&[[0.3, 0.6, 0.9, 1.0]]))
                    .unwrap();
                let mut pass = factory.create(&device, variant).unwrap();
                pass.set_size(pass.get_size().max(2.0));
                pass.set_step_scale(0.0, 0.0);
                pass.set_input(input.clone());
                let out = pass.render().unwrap();
                if !Texture::ptr_eq(&out, &input) {
                    failed.push(format!("{}/{}", type_name, variant.name()));
                }
            }
        }
        assert!(failed.is_empty(), "not passed through: {:?}", failed);
    }

    #[test]
    fn gaussian_area_blur_keeps_a_flat_colour() {
        use crate::gfx::TextureFormat;
        let device = GraphicsDevice::cpu();
        let colour = [0.6, 0.2, 0.8, 1.0];
        let input = device
            .create_texture(12, 12, TextureFormat::Rgba8, Some(&[colour; 144]))
            .unwrap();
        let factory = GaussianFactory::new();
        let mut pass = factory.create(&device, BlurVariant::Area).unwrap();
        pass.set_size(6.0);
        pass.set_input(input);
        let out = pass.render().unwrap();
        assert_eq!(out.size(), (12, 12));
        for p in device.read_pixels(&out).unwrap() {
            for c in 0..4 {
                assert!((p[c] - colour[c]).abs() < 0.01);
            }
        }
    }

    #[test]
    fn size_is_clamped_to_family_bounds() {
        let device = GraphicsDevice::cpu();
        let mut pass = DualFilteringFactory
            .create(&device, BlurVariant::Area)
            .unwrap();
        pass.set_size(50.0);
        assert_eq!(pass.get_size(), MAX_LEVELS as f64);
        // Not supported: apply() falls back to unit scale
        let params = crate::blur::BlurParameters {
            step_scale: (3.0, 3.0),
            step_scale_enabled: true,
            ..crate::blur::BlurParameters::default()
        };
        pass.apply(&params);
        assert_eq!(pass.get_step_scale(), (1.0, 1.0));
    }
}
