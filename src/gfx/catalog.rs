// ============================================================================
// EFFECT CATALOG - parameter and technique tables shared by all backends
// ============================================================================
//
// Both backends compile programs from these tables: the CPU renderer looks
// parameters up by name, the WGSL generator lays them out in declaration
// order (one vec4 slot per scalar/vector, ceil(n/4) slots per array, one
// binding per texture).  `Effect::has_parameter` therefore answers the same
// on every backend.

/// Length of the kernel array uploaded to the Gaussian programs.
pub const KERNEL_SIZE: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Float,
    Float2,
    Float4,
    FloatArray(usize),
    Texture,
}

#[derive(Debug)]
pub struct ParamDecl {
    pub name: &'static str,
    pub kind: ParamKind,
}

#[derive(Debug)]
pub struct EffectDescriptor {
    pub name: &'static str,
    pub params: &'static [ParamDecl],
    pub techniques: &'static [&'static str],
}

impl EffectDescriptor {
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    pub fn technique_index(&self, name: &str) -> Option<usize> {
        self.techniques.iter().position(|t| *t == name)
    }
}

/// Effect names as passed to `GraphicsDevice::create_effect`.
pub mod names {
    pub const DEFAULT: &str = "default";
    pub const BLUR_BOX: &str = "blur/box";
    pub const BLUR_BOX_LINEAR: &str = "blur/box-linear";
    pub const BLUR_GAUSSIAN: &str = "blur/gaussian";
    pub const BLUR_GAUSSIAN_LINEAR: &str = "blur/gaussian-linear";
    pub const BLUR_DUAL_FILTERING: &str = "blur/dual-filtering";
    pub const MASK: &str = "mask";
    pub const SDF_PRODUCER: &str = "sdf/producer";
    pub const SDF_CONSUMER: &str = "sdf/consumer";
}

const fn float(name: &'static str) -> ParamDecl {
    ParamDecl { name, kind: ParamKind::Float }
}

const fn float2(name: &'static str) -> ParamDecl {
    ParamDecl { name, kind: ParamKind::Float2 }
}

const fn float4(name: &'static str) -> ParamDecl {
    ParamDecl { name, kind: ParamKind::Float4 }
}

const fn texture(name: &'static str) -> ParamDecl {
    ParamDecl { name, kind: ParamKind::Texture }
}

pub static EFFECTS: &[EffectDescriptor] = &[
    EffectDescriptor {
        name: names::DEFAULT,
        params: &[texture("image")],
        techniques: &["Draw"],
    },
    EffectDescriptor {
        name: names::BLUR_BOX,
        params: &[
            texture("pImage"),
            float2("pImageTexel"),
            float2("pStepScale"),
            float("pSize"),
            float("pAngle"),
            float2("pCenter"),
        ],
        techniques: &["Draw", "Rotate", "Zoom"],
    },
    EffectDescriptor {
        name: names::BLUR_BOX_LINEAR,
        params: &[
            texture("pImage"),
            float2("pImageTexel"),
            float2("pStepScale"),
            float("pSize"),
        ],
        techniques: &["Draw"],
    },
    EffectDescriptor {
        name: names::BLUR_GAUSSIAN,
        params: &[
            texture("pImage"),
            float2("pImageTexel"),
            float2("pStepScale"),
            float("pSize"),
            float("pAngle"),
            float2("pCenter"),
            ParamDecl {
                name: "pKernel",
                kind: ParamKind::FloatArray(KERNEL_SIZE),
            },
        ],
        techniques: &["Draw", "Rotate", "Zoom"],
    },
    EffectDescriptor {
        name: names::BLUR_GAUSSIAN_LINEAR,
        params: &[
            texture("pImage"),
            float2("pImageTexel"),
            float2("pStepScale"),
            float("pSize"),
            ParamDecl {
                name: "pKernel",
                kind: ParamKind::FloatArray(KERNEL_SIZE),
            },
        ],
        techniques: &["Draw"],
    },
    EffectDescriptor {
        name: names::BLUR_DUAL_FILTERING,
        params: &[texture("pImage"), float2("pImageHalfTexel")],
        techniques: &["Down", "Up"],
    },
    EffectDescriptor {
        name: names::MASK,
        params: &[
            texture("image_orig"),
            texture("image_blur"),
            texture("mask_image"),
            float("mask_region_left"),
            float("mask_region_right"),
            float("mask_region_top"),
            float("mask_region_bottom"),
            float("mask_region_feather"),
            float("mask_region_feather_shift"),
            float4("mask_color"),
            float("mask_multiplier"),
        ],
        techniques: &[
            "Region",
            "RegionFeather",
            "RegionInverted",
            "RegionFeatherInverted",
            "Image",
        ],
    },
    EffectDescriptor {
        name: names::SDF_PRODUCER,
        params: &[
            texture("_image"),
            texture("_sdf"),
            float2("_size"),
            float("_threshold"),
        ],
        techniques: &["Draw"],
    },
    EffectDescriptor {
        name: names::SDF_CONSUMER,
        params: &[
            texture("pSDFTexture"),
            texture("pImageTexture"),
            float("pSDFThreshold"),
            float4("pShadowColor"),
            float("pShadowMin"),
            float("pShadowMax"),
            float2("pShadowOffset"),
            float4("pGlowColor"),
            float("pGlowWidth"),
            float("pGlowSharpness"),
            float("pGlowSharpnessInverse"),
            float4("pOutlineColor"),
            float("pOutlineWidth"),
            float("pOutlineOffset"),
            float("pOutlineSharpness"),
            float("pOutlineSharpnessInverse"),
        ],
        techniques: &[
            "ShadowOuter",
            "ShadowInner",
            "GlowOuter",
            "GlowInner",
            "Outline",
        ],
    },
];

pub fn find(name: &str) -> Option<&'static EffectDescriptor> {
    EFFECTS.iter().find(|e| e.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_resolvable() {
        for (i, e) in EFFECTS.iter().enumerate() {
            assert!(find(e.name).is_some());
            assert!(EFFECTS[i + 1..].iter().all(|o| o.name != e.name));
            assert!(!e.techniques.is_empty(), "{} has no technique", e.name);
        }
        assert!(find("blur/unknown").is_none());
    }

    #[test]
    fn parameter_names_are_unique_per_effect() {
        for e in EFFECTS {
            for (i, p) in e.params.iter().enumerate() {
                assert!(
                    e.params[i + 1..].iter().all(|o| o.name != p.name),
                    "{} declares {} twice",
                    e.name,
                    p.name
                );
            }
        }
    }
}
