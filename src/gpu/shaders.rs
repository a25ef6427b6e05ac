// ============================================================================
// WGSL SHADERS - catalog effects compiled for the wgpu backend
// ============================================================================
//
// Each effect module is `PRELUDE + generated bindings + body`.  The
// generated part follows the catalog declaration order:
//
//   binding 0       uniform block, one vec4 slot per scalar/vector and
//                   ceil(n/4) slots per float array
//   binding 1       linear clamp sampler
//   binding 2..     one texture_2d per texture parameter
//
// and exposes `p_<name>()` accessors plus `t_<name>` texture globals, so the
// bodies read like the CPU programs in `gfx::cpu::programs`.  Every
// technique is a fragment entry point named `fs_<Technique>`.

use crate::gfx::catalog::{names, EffectDescriptor, ParamKind};

/// Number of vec4 slots `kind` occupies in the uniform block.
pub fn slot_count(kind: ParamKind) -> usize {
    match kind {
        ParamKind::Float | ParamKind::Float2 | ParamKind::Float4 => 1,
        ParamKind::FloatArray(n) => n.div_ceil(4),
        ParamKind::Texture => 0,
    }
}

/// Total uniform slots for an effect; never zero so the block is valid WGSL.
pub fn uniform_slots(effect: &EffectDescriptor) -> usize {
    effect.params.iter().map(|p| slot_count(p.kind)).sum::<usize>().max(1)
}

pub fn texture_count(effect: &EffectDescriptor) -> usize {
    effect
        .params
        .iter()
        .filter(|p| p.kind == ParamKind::Texture)
        .count()
}

/// Entry point name for a technique.
pub fn entry_point(technique: &str) -> String {
    format!("fs_{}", technique)
}

/// Full WGSL source for `effect`, or `None` if the effect has no body.
pub fn module_source(effect: &EffectDescriptor) -> Option<String> {
    let body = body(effect.name)?;
    Some(format!("{}\n{}\n{}", PRELUDE, bindings(effect), body))
}

fn bindings(effect: &EffectDescriptor) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "struct Params {{ slots: array<vec4<f32>, {}>, }};\n",
        uniform_slots(effect)
    ));
    out.push_str("@group(0) @binding(0) var<uniform> u: Params;\n");
    out.push_str("@group(0) @binding(1) var samp: sampler;\n");

    let mut slot = 0usize;
    let mut binding = 2u32;
    for p in effect.params {
        match p.kind {
            ParamKind::Float => {
                out.push_str(&format!("fn p_{}() -> f32 {{ return u.slots[{}].x; }}\n", p.name, slot));
            }
            ParamKind::Float2 => {
                out.push_str(&format!(
                    "fn p_{}() -> vec2<f32> {{ return u.slots[{}].xy; }}\n",
                    p.name, slot
                ));
            }
            ParamKind::Float4 => {
                out.push_str(&format!(
                    "fn p_{}() -> vec4<f32> {{ return u.slots[{}]; }}\n",
                    p.name, slot
                ));
            }
            ParamKind::FloatArray(_) => {
                out.push_str(&format!(
                    "fn p_{}(i: i32) -> f32 {{ return u.slots[{} + i / 4][i % 4]; }}\n",
                    p.name, slot
                ));
            }
            ParamKind::Texture => {
                out.push_str(&format!(
                    "@group(0) @binding({}) var t_{}: texture_2d<f32>;\n",
                    binding, p.name
                ));
                binding += 1;
            }
        }
        slot += slot_count(p.kind);
    }
    out
}

fn body(effect: &str) -> Option<&'static str> {
    Some(match effect {
        names::DEFAULT => DEFAULT_BODY,
        names::BLUR_BOX => BOX_BODY,
        names::BLUR_BOX_LINEAR => BOX_LINEAR_BODY,
        names::BLUR_GAUSSIAN => GAUSSIAN_BODY,
        names::BLUR_GAUSSIAN_LINEAR => GAUSSIAN_LINEAR_BODY,
        names::BLUR_DUAL_FILTERING => DUAL_FILTERING_BODY,
        names::MASK => MASK_BODY,
        names::SDF_PRODUCER => SDF_PRODUCER_BODY,
        names::SDF_CONSUMER => SDF_CONSUMER_BODY,
        _ => return None,
    })
}

// ============================================================================
// Shared prelude: full-screen triangle and sampling helpers
// ============================================================================

const PRELUDE: &str = r#"
const EPS: f32 = 0.0001;
const FAR: f32 = 1.0e6;
const KERNEL_SIZE: i32 = 128;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> VsOut {
    var out: VsOut;
    let uv = vec2<f32>(f32((i << 1u) & 2u), f32(i & 2u));
    out.uv = uv;
    out.pos = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    return out;
}

fn smp(t: texture_2d<f32>, uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(t, samp, uv, 0.0);
}

fn ld(t: texture_2d<f32>, uv: vec2<f32>) -> vec4<f32> {
    let dims = vec2<i32>(textureDimensions(t));
    let c = clamp(vec2<i32>(floor(uv * vec2<f32>(dims))), vec2<i32>(0), dims - vec2<i32>(1));
    return textureLoad(t, c, 0);
}

fn tex_size(t: texture_2d<f32>) -> vec2<f32> {
    return vec2<f32>(textureDimensions(t));
}
"#;

const DEFAULT_BODY: &str = r#"
@fragment
fn fs_Draw(in: VsOut) -> @location(0) vec4<f32> {
    return smp(t_image, in.uv);
}
"#;

// ============================================================================
// Blur
// ============================================================================

const BOX_BODY: &str = r#"
fn tap(uv: vec2<f32>, k: f32, mode: i32) -> vec2<f32> {
    let texel = p_pImageTexel();
    let step = p_pStepScale();
    let center = p_pCenter();
    if (mode == 1) {
        let d = (uv - center) / max(texel, vec2<f32>(EPS * EPS));
        let a = p_pAngle() * step.x * k;
        let s = sin(a);
        let c = cos(a);
        return center + vec2<f32>(d.x * c - d.y * s, d.x * s + d.y * c) * texel;
    }
    if (mode == 2) {
        let f = k * texel.x * step.x;
        return uv - (uv - center) * f;
    }
    return uv + texel * step * k;
}

fn box_blur(uv: vec2<f32>, mode: i32) -> vec4<f32> {
    let radius = i32(max(round(p_pSize()), 0.0));
    var acc = vec4<f32>(0.0);
    for (var k = -radius; k <= radius; k = k + 1) {
        acc = acc + smp(t_pImage, tap(uv, f32(k), mode));
    }
    return acc / f32(2 * radius + 1);
}

@fragment
fn fs_Draw(in: VsOut) -> @location(0) vec4<f32> { return box_blur(in.uv, 0); }

@fragment
fn fs_Rotate(in: VsOut) -> @location(0) vec4<f32> { return box_blur(in.uv, 1); }

@fragment
fn fs_Zoom(in: VsOut) -> @location(0) vec4<f32> { return box_blur(in.uv, 2); }
"#;

const BOX_LINEAR_BODY: &str = r#"
@fragment
fn fs_Draw(in: VsOut) -> @location(0) vec4<f32> {
    let radius = i32(max(round(p_pSize()), 0.0));
    let w = 1.0 / f32(2 * radius + 1);
    let d = p_pImageTexel() * p_pStepScale();
    var acc = smp(t_pImage, in.uv) * w;
    for (var k = 1; k <= radius; k = k + 2) {
        var pair = 1.0;
        var at = f32(k);
        if (k < radius) {
            pair = 2.0;
            at = f32(k) + 0.5;
        }
        let both = smp(t_pImage, in.uv + d * at) + smp(t_pImage, in.uv - d * at);
        acc = acc + both * (w * pair);
    }
    return acc;
}
"#;

const GAUSSIAN_BODY: &str = r#"
fn tap(uv: vec2<f32>, k: f32, mode: i32) -> vec2<f32> {
    let texel = p_pImageTexel();
    let step = p_pStepScale();
    let center = p_pCenter();
    if (mode == 1) {
        let d = (uv - center) / max(texel, vec2<f32>(EPS * EPS));
        let a = p_pAngle() * step.x * k;
        let s = sin(a);
        let c = cos(a);
        return center + vec2<f32>(d.x * c - d.y * s, d.x * s + d.y * c) * texel;
    }
    if (mode == 2) {
        let f = k * texel.x * step.x;
        return uv - (uv - center) * f;
    }
    return uv + texel * step * k;
}

fn gaussian(uv: vec2<f32>, mode: i32) -> vec4<f32> {
    let size = min(i32(max(round(p_pSize()), 0.0)), KERNEL_SIZE - 1);
    var total = p_pKernel(0);
    for (var k = 1; k <= size; k = k + 1) {
        total = total + 2.0 * p_pKernel(k);
    }
    var norm = 1.0;
    if (total > EPS) {
        norm = 1.0 / total;
    }
    var acc = smp(t_pImage, uv) * p_pKernel(0);
    for (var k = 1; k <= size; k = k + 1) {
        let both = smp(t_pImage, tap(uv, f32(k), mode)) + smp(t_pImage, tap(uv, -f32(k), mode));
        acc = acc + both * p_pKernel(k);
    }
    return acc * norm;
}

@fragment
fn fs_Draw(in: VsOut) -> @location(0) vec4<f32> { return gaussian(in.uv, 0); }

@fragment
fn fs_Rotate(in: VsOut) -> @location(0) vec4<f32> { return gaussian(in.uv, 1); }

@fragment
fn fs_Zoom(in: VsOut) -> @location(0) vec4<f32> { return gaussian(in.uv, 2); }
"#;

const GAUSSIAN_LINEAR_BODY: &str = r#"
@fragment
fn fs_Draw(in: VsOut) -> @location(0) vec4<f32> {
    let size = min(i32(max(round(p_pSize()), 0.0)), KERNEL_SIZE - 1);
    let d = p_pImageTexel() * p_pStepScale();
    var acc = smp(t_pImage, in.uv) * p_pKernel(0);
    for (var k = 1; k <= size; k = k + 2) {
        let w1 = p_pKernel(k);
        var w2 = 0.0;
        if (k < size) {
            w2 = p_pKernel(k + 1);
        }
        let w = w1 + w2;
        if (w > 0.0) {
            let at = f32(k) + w2 / w;
            let both = smp(t_pImage, in.uv + d * at) + smp(t_pImage, in.uv - d * at);
            acc = acc + both * w;
        }
    }
    return acc;
}
"#;

const DUAL_FILTERING_BODY: &str = r#"
@fragment
fn fs_Down(in: VsOut) -> @location(0) vec4<f32> {
    let h = p_pImageHalfTexel();
    var acc = smp(t_pImage, in.uv) * 4.0;
    acc = acc + smp(t_pImage, in.uv - h);
    acc = acc + smp(t_pImage, in.uv + h);
    acc = acc + smp(t_pImage, in.uv + vec2<f32>(h.x, -h.y));
    acc = acc + smp(t_pImage, in.uv - vec2<f32>(h.x, -h.y));
    return acc / 8.0;
}

@fragment
fn fs_Up(in: VsOut) -> @location(0) vec4<f32> {
    let h = p_pImageHalfTexel();
    var acc = smp(t_pImage, in.uv + vec2<f32>(-h.x * 2.0, 0.0));
    acc = acc + smp(t_pImage, in.uv + vec2<f32>(-h.x, h.y)) * 2.0;
    acc = acc + smp(t_pImage, in.uv + vec2<f32>(0.0, h.y * 2.0));
    acc = acc + smp(t_pImage, in.uv + vec2<f32>(h.x, h.y)) * 2.0;
    acc = acc + smp(t_pImage, in.uv + vec2<f32>(h.x * 2.0, 0.0));
    acc = acc + smp(t_pImage, in.uv + vec2<f32>(h.x, -h.y)) * 2.0;
    acc = acc + smp(t_pImage, in.uv + vec2<f32>(0.0, -h.y * 2.0));
    acc = acc + smp(t_pImage, in.uv + vec2<f32>(-h.x, -h.y)) * 2.0;
    return acc / 12.0;
}
"#;

// ============================================================================
// Mask
// ============================================================================

const MASK_BODY: &str = r#"
fn region(uv: vec2<f32>, feathered: bool, inverted: bool) -> vec4<f32> {
    let d = min(min(uv.x - p_mask_region_left(), p_mask_region_right() - uv.x),
                min(uv.y - p_mask_region_top(), p_mask_region_bottom() - uv.y));
    var f = 0.0;
    if (feathered) {
        f = clamp(d / max(p_mask_region_feather(), EPS) + p_mask_region_feather_shift(), 0.0, 1.0);
    } else if (d >= 0.0) {
        f = 1.0;
    }
    if (inverted) {
        f = 1.0 - f;
    }
    return mix(smp(t_image_orig, uv), smp(t_image_blur, uv), f);
}

@fragment
fn fs_Region(in: VsOut) -> @location(0) vec4<f32> { return region(in.uv, false, false); }

@fragment
fn fs_RegionFeather(in: VsOut) -> @location(0) vec4<f32> { return region(in.uv, true, false); }

@fragment
fn fs_RegionInverted(in: VsOut) -> @location(0) vec4<f32> { return region(in.uv, false, true); }

@fragment
fn fs_RegionFeatherInverted(in: VsOut) -> @location(0) vec4<f32> { return region(in.uv, true, true); }

@fragment
fn fs_Image(in: VsOut) -> @location(0) vec4<f32> {
    let m = smp(t_mask_image, in.uv);
    let color = p_mask_color();
    let luma = dot(m.rgb, color.rgb) / 3.0;
    let f = clamp(luma * m.a * color.a * p_mask_multiplier(), 0.0, 1.0);
    return mix(smp(t_image_orig, in.uv), smp(t_image_blur, in.uv), f);
}
"#;

// ============================================================================
// Signed distance field
// ============================================================================

const SDF_PRODUCER_BODY: &str = r#"
var<private> NEIGHBOURS: array<vec2<f32>, 8> = array<vec2<f32>, 8>(
    vec2<f32>(-1.0, -1.0), vec2<f32>(0.0, -1.0), vec2<f32>(1.0, -1.0),
    vec2<f32>(-1.0, 0.0), vec2<f32>(1.0, 0.0),
    vec2<f32>(-1.0, 1.0), vec2<f32>(0.0, 1.0), vec2<f32>(1.0, 1.0),
);
var<private> JUMPS: array<f32, 3> = array<f32, 3>(1.0, 4.0, 16.0);

fn inside_at(q: vec2<f32>) -> bool {
    return smp(t__image, q).a >= p__threshold();
}

fn metric(d: vec2<f32>) -> f32 {
    return length(d * tex_size(t__image));
}

fn is_boundary(b: vec2<f32>, texel: vec2<f32>) -> bool {
    let hx = texel.x * 0.5;
    let hy = texel.y * 0.5;
    let s0 = inside_at(vec2<f32>(b.x - hx, b.y));
    let s1 = inside_at(vec2<f32>(b.x + hx, b.y));
    let s2 = inside_at(vec2<f32>(b.x, b.y - hy));
    let s3 = inside_at(vec2<f32>(b.x, b.y + hy));
    return (s0 || s1 || s2 || s3) && !(s0 && s1 && s2 && s3);
}

@fragment
fn fs_Draw(in: VsOut) -> @location(0) vec4<f32> {
    let uv = in.uv;
    let texel = 1.0 / max(p__size(), vec2<f32>(1.0));
    let inside = inside_at(uv);

    var found = false;
    var best = vec2<f32>(0.0);
    var best_d = 0.0;

    for (var i = 0; i < 8; i = i + 1) {
        let n = NEIGHBOURS[i];
        if (inside_at(uv + n * texel) != inside) {
            let cand = n * texel * 0.5;
            let d = metric(cand);
            if (!found || d < best_d) {
                found = true;
                best = cand;
                best_d = d;
            }
        }
    }

    for (var j = 0; j < 3; j = j + 1) {
        let last = select(8, 9, j == 0);
        for (var i = 0; i < last; i = i + 1) {
            var n = vec2<f32>(0.0);
            if (i < 8) {
                n = NEIGHBOURS[i];
            }
            let q = uv + n * texel * JUMPS[j];
            let prev = ld(t__sdf, q);
            if (prev.b < 0.5) {
                continue;
            }
            let b = q + prev.xy;
            if (is_boundary(b, texel)) {
                let cand = b - uv;
                let d = metric(cand);
                if (!found || d < best_d) {
                    found = true;
                    best = cand;
                    best_d = d;
                }
            }
        }
    }

    let inside_flag = select(0.0, 1.0, inside);
    if (found) {
        return vec4<f32>(best, 1.0, inside_flag);
    }
    return vec4<f32>(0.0, 0.0, 0.0, inside_flag);
}
"#;

const SDF_CONSUMER_BODY: &str = r#"
fn distance_at(uv: vec2<f32>) -> f32 {
    let t = ld(t_pSDFTexture, uv);
    let inside = t.a >= 0.5 || (t.b < 0.5 && smp(t_pImageTexture, uv).a >= p_pSDFThreshold());
    var d = FAR;
    if (t.b >= 0.5) {
        d = length(t.xy * tex_size(t_pImageTexture));
    }
    return select(d, -d, inside);
}

fn shadow(uv: vec2<f32>, outer: bool) -> vec4<f32> {
    let color = p_pShadowColor();
    var d = distance_at(uv - p_pShadowOffset());
    if (!outer) {
        d = -d;
    }
    let v = 1.0 - clamp((d - p_pShadowMin()) / max(p_pShadowMax() - p_pShadowMin(), EPS), 0.0, 1.0);
    let a = smp(t_pImageTexture, uv).a;
    let cover = select(a, 1.0 - a, outer);
    return vec4<f32>(color.rgb, color.a * v * cover);
}

fn glow(uv: vec2<f32>, outer: bool) -> vec4<f32> {
    let color = p_pGlowColor();
    var d = distance_at(uv);
    if (!outer) {
        d = -d;
    }
    var v = 1.0 - clamp(max(d, 0.0) / max(p_pGlowWidth(), EPS), 0.0, 1.0);
    v = clamp(v * p_pGlowSharpnessInverse(), 0.0, 1.0);
    let a = smp(t_pImageTexture, uv).a;
    let cover = select(a, 1.0 - a, outer);
    return vec4<f32>(color.rgb, color.a * v * cover);
}

@fragment
fn fs_ShadowOuter(in: VsOut) -> @location(0) vec4<f32> { return shadow(in.uv, true); }

@fragment
fn fs_ShadowInner(in: VsOut) -> @location(0) vec4<f32> { return shadow(in.uv, false); }

@fragment
fn fs_GlowOuter(in: VsOut) -> @location(0) vec4<f32> { return glow(in.uv, true); }

@fragment
fn fs_GlowInner(in: VsOut) -> @location(0) vec4<f32> { return glow(in.uv, false); }

@fragment
fn fs_Outline(in: VsOut) -> @location(0) vec4<f32> {
    let color = p_pOutlineColor();
    let half_width = p_pOutlineWidth() * 0.5;
    if (half_width < EPS) {
        return vec4<f32>(color.rgb, 0.0);
    }
    let e = abs(distance_at(in.uv) - p_pOutlineOffset());
    var v = 1.0 - clamp(e / half_width, 0.0, 1.0);
    v = clamp(v * p_pOutlineSharpnessInverse(), 0.0, 1.0);
    return vec4<f32>(color.rgb, color.a * v);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::catalog::{self, EFFECTS};

    #[test]
    fn every_catalog_effect_has_a_module() {
        for effect in EFFECTS {
            let src = module_source(effect).unwrap_or_else(|| panic!("{} has no body", effect.name));
            for technique in effect.techniques {
                assert!(
                    src.contains(&format!("fn {}(", entry_point(technique))),
                    "{} lacks {}",
                    effect.name,
                    technique
                );
            }
        }
    }

    #[test]
    fn uniform_layout_follows_declaration_order() {
        let gaussian = catalog::find(names::BLUR_GAUSSIAN).unwrap();
        // texel, step, size, angle, center = 5 slots, kernel = 128 / 4
        assert_eq!(uniform_slots(gaussian), 5 + catalog::KERNEL_SIZE / 4);
        assert_eq!(texture_count(gaussian), 1);

        let src = module_source(gaussian).unwrap();
        assert!(src.contains("fn p_pSize() -> f32 { return u.slots[2].x; }"));
        assert!(src.contains("return u.slots[5 + i / 4][i % 4];"));
        assert!(src.contains("@group(0) @binding(2) var t_pImage: texture_2d<f32>;"));

        let default = catalog::find(names::DEFAULT).unwrap();
        assert_eq!(uniform_slots(default), 1);
    }
}
