// ============================================================================
// BLUR ENGINE - kernel cache, pass families, factories
// ============================================================================
//
// A `BlurPass` is one (family, variant) pairing: input texture in, N shader
// passes, output texture out.  Families differ in their weights (box, Gaussian)
// and sampling trick (discrete taps, paired bilinear taps, dual filtering);
// variants differ in geometry (area, directional, rotational, zoom).
// Factories answer capability and bounds questions and build passes; the
// `BlurRegistry` maps the persisted type string to a factory.

pub mod convolution;
pub mod dual_filtering;
pub mod factory;
pub mod kernel;

use crate::gfx::{EPSILON, GfxError, GfxResult, GraphicsDevice, Texture};

pub use factory::{BlurFactory, BlurRegistry, SharedKernelCache};
pub use kernel::{Kernel, KernelCache, KernelSynthesis};

use convolution::ConvolutionEngine;
use dual_filtering::DualFilteringEngine;

// ============================================================================
// Variants and families
// ============================================================================

/// Blur geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlurVariant {
    Area,
    Directional,
    Rotational,
    Zoom,
}

impl BlurVariant {
    pub const ALL: [BlurVariant; 4] = [
        BlurVariant::Area,
        BlurVariant::Directional,
        BlurVariant::Rotational,
        BlurVariant::Zoom,
    ];

    /// Persisted subtype string.
    pub fn name(self) -> &'static str {
        match self {
            BlurVariant::Area => "area",
            BlurVariant::Directional => "directional",
            BlurVariant::Rotational => "rotational",
            BlurVariant::Zoom => "zoom",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    pub fn supports_angle(self) -> bool {
        matches!(self, BlurVariant::Directional | BlurVariant::Rotational)
    }

    pub fn supports_center(self) -> bool {
        matches!(self, BlurVariant::Rotational | BlurVariant::Zoom)
    }
}

/// Weighting / sampling scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlurFamily {
    Box,
    BoxLinear,
    Gaussian,
    GaussianLinear,
    DualFiltering,
}

impl BlurFamily {
    pub const ALL: [BlurFamily; 5] = [
        BlurFamily::Box,
        BlurFamily::BoxLinear,
        BlurFamily::Gaussian,
        BlurFamily::GaussianLinear,
        BlurFamily::DualFiltering,
    ];

    /// Persisted type string.
    pub fn name(self) -> &'static str {
        match self {
            BlurFamily::Box => "box",
            BlurFamily::BoxLinear => "box_linear",
            BlurFamily::Gaussian => "gaussian",
            BlurFamily::GaussianLinear => "gaussian_linear",
            BlurFamily::DualFiltering => "dual_filtering",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Inclusive range plus UI step of one blur parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BlurError {
    #[error("{family} blur does not support the {variant} variant")]
    UnsupportedVariant {
        family: &'static str,
        variant: &'static str,
    },
    #[error(transparent)]
    Gfx(#[from] GfxError),
}

/// Filter-side parameter set, re-applied whenever the pass is rebuilt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurParameters {
    pub size: f64,
    /// Degrees.
    pub angle: f64,
    /// Normalised, 0..1.
    pub center: (f64, f64),
    pub step_scale: (f64, f64),
    pub step_scale_enabled: bool,
}

impl Default for BlurParameters {
    fn default() -> Self {
        Self {
            size: 5.0,
            angle: 0.0,
            center: (0.5, 0.5),
            step_scale: (1.0, 1.0),
            step_scale_enabled: false,
        }
    }
}

// ============================================================================
// Blur pass
// ============================================================================

/// Values a pass renders with, already clamped to the family's bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PassState {
    pub size: f64,
    pub angle: f64,
    pub center: (f64, f64),
    pub step_scale: (f64, f64),
}

enum PassEngine {
    Convolution(ConvolutionEngine),
    DualFiltering(DualFilteringEngine),
}

pub struct BlurPass {
    family: BlurFamily,
    variant: BlurVariant,
    size_bounds: Bounds,
    angle_bounds: Bounds,
    step_scale_supported: bool,
    state: PassState,
    input: Option<Texture>,
    engine: PassEngine,
}

impl BlurPass {
    pub(crate) fn new(
        factory: &dyn BlurFactory,
        device: &GraphicsDevice,
        variant: BlurVariant,
    ) -> Result<Self, BlurError> {
        let family = factory.family();
        if !factory.is_type_supported(variant) {
            return Err(BlurError::UnsupportedVariant {
                family: family.name(),
                variant: variant.name(),
            });
        }
        let engine = match family {
            BlurFamily::DualFiltering => {
                PassEngine::DualFiltering(DualFilteringEngine::new(device))
            }
            _ => PassEngine::Convolution(ConvolutionEngine::new(
                device,
                family,
                factory.kernels(),
            )),
        };
        let size_bounds = factory.size_bounds();
        Ok(Self {
            family,
            variant,
            size_bounds,
            angle_bounds: factory.angle_bounds(variant),
            step_scale_supported: factory.is_step_scale_supported(variant),
            state: PassState {
                size: size_bounds.min,
                angle: 0.0,
                center: (0.5, 0.5),
                step_scale: (1.0, 1.0),
            },
            input: None,
            engine,
        })
    }

    pub fn family(&self) -> BlurFamily {
        self.family
    }

    pub fn variant(&self) -> BlurVariant {
        self.variant
    }

    pub fn supports_angle(&self) -> bool {
        self.variant.supports_angle()
    }

    pub fn supports_center(&self) -> bool {
        self.variant.supports_center()
    }

    pub fn set_input(&mut self, texture: Texture) {
        self.input = Some(texture);
    }

    pub fn set_size(&mut self, size: f64) {
        self.state.size = self.size_bounds.clamp(size);
    }

    pub fn get_size(&self) -> f64 {
        self.state.size
    }

    /// Always stored.  Variants without step-scale support only read it for
    /// the zero-scale pass-through; [`apply`](Self::apply) resets it to 1.
    pub fn set_step_scale(&mut self, x: f64, y: f64) {
        self.state.step_scale = (x, y);
    }

    pub fn is_step_scale_supported(&self) -> bool {
        self.step_scale_supported
    }

    pub fn get_step_scale(&self) -> (f64, f64) {
        self.state.step_scale
    }

    /// Degrees.  No effect unless [`supports_angle`](Self::supports_angle).
    pub fn set_angle(&mut self, degrees: f64) {
        if self.supports_angle() {
            self.state.angle = self.angle_bounds.clamp(degrees);
        }
    }

    pub fn get_angle(&self) -> f64 {
        self.state.angle
    }

    /// No effect unless [`supports_center`](Self::supports_center).
    pub fn set_center(&mut self, x: f64, y: f64) {
        if self.supports_center() {
            self.state.center = (x, y);
        }
    }

    pub fn get_center(&self) -> (f64, f64) {
        self.state.center
    }

    /// Push a full parameter set, honouring the variant's capabilities.
    pub fn apply(&mut self, params: &BlurParameters) {
        self.set_size(params.size);
        if params.step_scale_enabled && self.step_scale_supported {
            self.set_step_scale(params.step_scale.0, params.step_scale.1);
        } else {
            self.set_step_scale(1.0, 1.0);
        }
        self.set_angle(params.angle);
        self.set_center(params.center.0, params.center.1);
    }

    /// Run the pass chain.  Returns the input itself when there is nothing
    /// to do (no step scale, or the shader is unavailable).
    pub fn render(&mut self) -> GfxResult<Texture> {
        let input = self
            .input
            .clone()
            .ok_or_else(|| GfxError::Backend("blur pass has no input texture".into()))?;
        let (sx, sy) = self.state.step_scale;
        if sx + sy < EPSILON as f64 {
            return Ok(input);
        }
        match &mut self.engine {
            PassEngine::Convolution(e) => e.render(self.variant, &self.state, &input),
            PassEngine::DualFiltering(e) => e.render(self.state.size, &input),
        }
    }
}

impl std::fmt::Debug for BlurPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlurPass")
            .field("family", &self.family)
            .field("variant", &self.variant)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for v in BlurVariant::ALL {
            assert_eq!(BlurVariant::from_name(v.name()), Some(v));
        }
        for f in BlurFamily::ALL {
            assert_eq!(BlurFamily::from_name(f.name()), Some(f));
        }
        assert_eq!(BlurFamily::from_name("gaussian-linear"), None);
    }

    #[test]
    fn capabilities_follow_geometry() {
        assert!(!BlurVariant::Area.supports_angle());
        assert!(BlurVariant::Directional.supports_angle());
        assert!(BlurVariant::Rotational.supports_angle());
        assert!(BlurVariant::Rotational.supports_center());
        assert!(BlurVariant::Zoom.supports_center());
        assert!(!BlurVariant::Directional.supports_center());
    }
}
