// ============================================================================
// CPU PROGRAMS - per-pixel implementations of every catalog technique
// ============================================================================
//
// These mirror the WGSL bodies in `gpu::shaders` one for one.  Parameters are
// resolved once per draw; the returned closure only does sampling and math.

use super::Sampler;
use crate::gfx::catalog::{names, KERNEL_SIZE};
use crate::gfx::effect::ParamValue;
use crate::gfx::{DrawCall, GfxError, GfxResult, EPSILON};

pub(super) type Shader = Box<dyn Fn([f32; 2]) -> [f32; 4] + Send + Sync>;

/// Distance reported for texels the distance field has not reached yet.
const FAR: f32 = 1.0e6;

// ============================================================================
// Small vector helpers
// ============================================================================

#[inline]
fn add(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]]
}

#[inline]
fn scale(a: [f32; 4], s: f32) -> [f32; 4] {
    [a[0] * s, a[1] * s, a[2] * s, a[3] * s]
}

#[inline]
fn mix(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    add(scale(a, 1.0 - t), scale(b, t))
}

#[inline]
fn offset(uv: [f32; 2], d: [f32; 2], k: f32) -> [f32; 2] {
    [uv[0] + d[0] * k, uv[1] + d[1] * k]
}

// ============================================================================
// Parameter access
// ============================================================================

struct Params<'a> {
    call: &'a DrawCall<'a>,
}

impl Params<'_> {
    fn value(&self, name: &str) -> Option<&ParamValue> {
        self.call
            .effect
            .param_index(name)
            .map(|i| &self.call.values[i])
    }

    fn float(&self, name: &str) -> f32 {
        match self.value(name) {
            Some(ParamValue::Float(v)) => *v,
            _ => 0.0,
        }
    }

    fn float2(&self, name: &str) -> [f32; 2] {
        match self.value(name) {
            Some(ParamValue::Float2(v)) => *v,
            _ => [0.0; 2],
        }
    }

    fn float4(&self, name: &str) -> [f32; 4] {
        match self.value(name) {
            Some(ParamValue::Float4(v)) => *v,
            _ => [0.0; 4],
        }
    }

    fn array(&self, name: &str) -> Vec<f32> {
        match self.value(name) {
            Some(ParamValue::FloatArray(v)) => v.clone(),
            _ => vec![0.0; KERNEL_SIZE],
        }
    }

    fn texture(&self, name: &str) -> GfxResult<Sampler> {
        match self.value(name) {
            Some(ParamValue::Texture(Some(t))) => Sampler::from_texture(t),
            _ => Ok(Sampler::empty()),
        }
    }
}

pub(super) fn compile(call: &DrawCall<'_>) -> GfxResult<Shader> {
    let technique = call.effect.techniques[call.technique];
    let p = Params { call };
    match call.effect.name {
        names::DEFAULT => {
            let image = p.texture("image")?;
            Ok(Box::new(move |uv| image.sample(uv)))
        }
        names::BLUR_BOX => box_blur(&p, technique),
        names::BLUR_BOX_LINEAR => box_linear_blur(&p),
        names::BLUR_GAUSSIAN => gaussian_blur(&p, technique),
        names::BLUR_GAUSSIAN_LINEAR => gaussian_linear_blur(&p),
        names::BLUR_DUAL_FILTERING => dual_filtering(&p, technique),
        names::MASK => mask(&p, technique),
        names::SDF_PRODUCER => sdf_producer(&p),
        names::SDF_CONSUMER => sdf_consumer(&p, technique),
        other => Err(GfxError::UnknownEffect(other.to_string())),
    }
}

// ============================================================================
// Blur programs
// ============================================================================

/// Shared geometry of the blur techniques: where tap `k` (signed) lands.
#[derive(Clone, Copy)]
struct Taps {
    texel: [f32; 2],
    step: [f32; 2],
    angle: f32,
    center: [f32; 2],
}

impl Taps {
    fn from_params(p: &Params<'_>) -> Self {
        Self {
            texel: p.float2("pImageTexel"),
            step: p.float2("pStepScale"),
            angle: p.float("pAngle"),
            center: p.float2("pCenter"),
        }
    }

    /// Straight line along the (already directional) texel vector.
    #[inline]
    fn linear(&self, uv: [f32; 2], k: f32) -> [f32; 2] {
        offset(
            uv,
            [self.texel[0] * self.step[0], self.texel[1] * self.step[1]],
            k,
        )
    }

    /// Rotate around `center` by `k` angle steps, in pixel space.
    #[inline]
    fn rotate(&self, uv: [f32; 2], k: f32) -> [f32; 2] {
        let dx = (uv[0] - self.center[0]) / self.texel[0].max(EPSILON * EPSILON);
        let dy = (uv[1] - self.center[1]) / self.texel[1].max(EPSILON * EPSILON);
        let (s, c) = (self.angle * self.step[0] * k).sin_cos();
        [
            self.center[0] + (dx * c - dy * s) * self.texel[0],
            self.center[1] + (dx * s + dy * c) * self.texel[1],
        ]
    }

    /// Move toward / away from `center`, proportional to the distance.
    #[inline]
    fn zoom(&self, uv: [f32; 2], k: f32) -> [f32; 2] {
        let f = k * self.texel[0] * self.step[0];
        [
            uv[0] - (uv[0] - self.center[0]) * f,
            uv[1] - (uv[1] - self.center[1]) * f,
        ]
    }

    fn place(&self, technique: &str) -> fn(&Taps, [f32; 2], f32) -> [f32; 2] {
        match technique {
            "Rotate" => Taps::rotate,
            "Zoom" => Taps::zoom,
            _ => Taps::linear,
        }
    }
}

fn box_blur(p: &Params<'_>, technique: &str) -> GfxResult<Shader> {
    let image = p.texture("pImage")?;
    let taps = Taps::from_params(p);
    let place = taps.place(technique);
    let radius = p.float("pSize").round().max(0.0) as i32;
    let norm = 1.0 / (2 * radius + 1) as f32;
    Ok(Box::new(move |uv| {
        let mut acc = [0.0f32; 4];
        for k in -radius..=radius {
            acc = add(acc, image.sample(place(&taps, uv, k as f32)));
        }
        scale(acc, norm)
    }))
}

/// Box weights, but each bilinear fetch lands between two texels and
/// covers both.
fn box_linear_blur(p: &Params<'_>) -> GfxResult<Shader> {
    let image = p.texture("pImage")?;
    let taps = Taps::from_params(p);
    let radius = p.float("pSize").round().max(0.0) as i32;
    let w = 1.0 / (2 * radius + 1) as f32;
    Ok(Box::new(move |uv| {
        let mut acc = scale(image.sample(uv), w);
        let mut k = 1;
        while k <= radius {
            let pair = if k < radius { 2.0 } else { 1.0 };
            let at = if k < radius { k as f32 + 0.5 } else { k as f32 };
            let both = add(
                image.sample(taps.linear(uv, at)),
                image.sample(taps.linear(uv, -at)),
            );
            acc = add(acc, scale(both, w * pair));
            k += 2;
        }
        acc
    }))
}

fn gaussian_blur(p: &Params<'_>, technique: &str) -> GfxResult<Shader> {
    let image = p.texture("pImage")?;
    let kernel = p.array("pKernel");
    let taps = Taps::from_params(p);
    let place = taps.place(technique);
    let size = (p.float("pSize").round().max(0.0) as usize).min(KERNEL_SIZE - 1);
    // Zoom runs fewer taps than the kernel holds; renormalise what is used
    let total: f32 = kernel[0] + 2.0 * kernel[1..=size].iter().sum::<f32>();
    let norm = if total > EPSILON { 1.0 / total } else { 1.0 };
    Ok(Box::new(move |uv| {
        let mut acc = scale(image.sample(uv), kernel[0]);
        for k in 1..=size {
            let both = add(
                image.sample(place(&taps, uv, k as f32)),
                image.sample(place(&taps, uv, -(k as f32))),
            );
            acc = add(acc, scale(both, kernel[k]));
        }
        scale(acc, norm)
    }))
}

/// Pairs of kernel taps merged into one bilinear fetch at their weighted
/// centre.
fn gaussian_linear_blur(p: &Params<'_>) -> GfxResult<Shader> {
    let image = p.texture("pImage")?;
    let kernel = p.array("pKernel");
    let taps = Taps::from_params(p);
    let size = (p.float("pSize").round().max(0.0) as usize).min(KERNEL_SIZE - 1);
    Ok(Box::new(move |uv| {
        let mut acc = scale(image.sample(uv), kernel[0]);
        let mut k = 1;
        while k <= size {
            let w1 = kernel[k];
            let w2 = if k < size { kernel[k + 1] } else { 0.0 };
            let w = w1 + w2;
            if w > 0.0 {
                let at = k as f32 + w2 / w;
                let both = add(
                    image.sample(taps.linear(uv, at)),
                    image.sample(taps.linear(uv, -at)),
                );
                acc = add(acc, scale(both, w));
            }
            k += 2;
        }
        acc
    }))
}

fn dual_filtering(p: &Params<'_>, technique: &str) -> GfxResult<Shader> {
    let image = p.texture("pImage")?;
    let h = p.float2("pImageHalfTexel");
    if technique == "Up" {
        return Ok(Box::new(move |uv| {
            let mut acc = image.sample(offset(uv, [-h[0] * 2.0, 0.0], 1.0));
            acc = add(acc, scale(image.sample(offset(uv, [-h[0], h[1]], 1.0)), 2.0));
            acc = add(acc, image.sample(offset(uv, [0.0, h[1] * 2.0], 1.0)));
            acc = add(acc, scale(image.sample(offset(uv, [h[0], h[1]], 1.0)), 2.0));
            acc = add(acc, image.sample(offset(uv, [h[0] * 2.0, 0.0], 1.0)));
            acc = add(acc, scale(image.sample(offset(uv, [h[0], -h[1]], 1.0)), 2.0));
            acc = add(acc, image.sample(offset(uv, [0.0, -h[1] * 2.0], 1.0)));
            acc = add(acc, scale(image.sample(offset(uv, [-h[0], -h[1]], 1.0)), 2.0));
            scale(acc, 1.0 / 12.0)
        }));
    }
    Ok(Box::new(move |uv| {
        let mut acc = scale(image.sample(uv), 4.0);
        acc = add(acc, image.sample(offset(uv, h, -1.0)));
        acc = add(acc, image.sample(offset(uv, h, 1.0)));
        acc = add(acc, image.sample(offset(uv, [h[0], -h[1]], 1.0)));
        acc = add(acc, image.sample(offset(uv, [h[0], -h[1]], -1.0)));
        scale(acc, 1.0 / 8.0)
    }))
}

// ============================================================================
// Mask
// ============================================================================

fn mask(p: &Params<'_>, technique: &str) -> GfxResult<Shader> {
    let orig = p.texture("image_orig")?;
    let blur = p.texture("image_blur")?;

    if technique == "Image" {
        let mask_image = p.texture("mask_image")?;
        let color = p.float4("mask_color");
        let multiplier = p.float("mask_multiplier");
        return Ok(Box::new(move |uv| {
            let m = mask_image.sample(uv);
            let luma = (m[0] * color[0] + m[1] * color[1] + m[2] * color[2]) / 3.0;
            let f = (luma * m[3] * color[3] * multiplier).clamp(0.0, 1.0);
            mix(orig.sample(uv), blur.sample(uv), f)
        }));
    }

    let left = p.float("mask_region_left");
    let right = p.float("mask_region_right");
    let top = p.float("mask_region_top");
    let bottom = p.float("mask_region_bottom");
    let feather = p.float("mask_region_feather");
    let shift = p.float("mask_region_feather_shift");
    let feathered = technique.starts_with("RegionFeather");
    let inverted = technique.ends_with("Inverted");

    Ok(Box::new(move |uv| {
        // Signed distance to the region border, positive inside
        let d = (uv[0] - left)
            .min(right - uv[0])
            .min(uv[1] - top)
            .min(bottom - uv[1]);
        let mut f = if feathered {
            (d / feather.max(EPSILON) + shift).clamp(0.0, 1.0)
        } else if d >= 0.0 {
            1.0
        } else {
            0.0
        };
        if inverted {
            f = 1.0 - f;
        }
        mix(orig.sample(uv), blur.sample(uv), f)
    }))
}

// ============================================================================
// Signed distance field
// ============================================================================
//
// Field texel layout: rg = uv offset to the nearest boundary point,
// b = 1 when that offset is known, a = 1 when the texel is inside.

const NEIGHBOURS: [[f32; 2]; 8] = [
    [-1.0, -1.0],
    [0.0, -1.0],
    [1.0, -1.0],
    [-1.0, 0.0],
    [1.0, 0.0],
    [-1.0, 1.0],
    [0.0, 1.0],
    [1.0, 1.0],
];

/// Jump distances (in field texels) tried when propagating the previous field.
const JUMPS: [f32; 3] = [1.0, 4.0, 16.0];

fn sdf_producer(p: &Params<'_>) -> GfxResult<Shader> {
    let image = p.texture("_image")?;
    let previous = p.texture("_sdf")?;
    let size = p.float2("_size");
    let threshold = p.float("_threshold");
    let texel = [1.0 / size[0].max(1.0), 1.0 / size[1].max(1.0)];
    let pixels = image.size();

    Ok(Box::new(move |uv| {
        let inside_at = |q: [f32; 2]| image.sample(q)[3] >= threshold;
        let metric = |d: [f32; 2]| ((d[0] * pixels[0]).powi(2) + (d[1] * pixels[1]).powi(2)).sqrt();
        // A boundary point is real if its half-texel cross straddles the edge
        let is_boundary = |b: [f32; 2]| {
            let hx = texel[0] * 0.5;
            let hy = texel[1] * 0.5;
            let s = [
                inside_at([b[0] - hx, b[1]]),
                inside_at([b[0] + hx, b[1]]),
                inside_at([b[0], b[1] - hy]),
                inside_at([b[0], b[1] + hy]),
            ];
            s.iter().any(|v| *v) && s.iter().any(|v| !*v)
        };

        let inside = inside_at(uv);
        let mut best: Option<([f32; 2], f32)> = None;
        let mut consider = |cand: [f32; 2]| {
            let d = metric(cand);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((cand, d));
            }
        };

        for n in NEIGHBOURS {
            let q = offset(uv, [n[0] * texel[0], n[1] * texel[1]], 1.0);
            if inside_at(q) != inside {
                consider([n[0] * texel[0] * 0.5, n[1] * texel[1] * 0.5]);
            }
        }

        for (i, jump) in JUMPS.iter().enumerate() {
            let own = if i == 0 { Some([0.0, 0.0]) } else { None };
            for n in NEIGHBOURS.iter().copied().chain(own) {
                let q = offset(uv, [n[0] * texel[0], n[1] * texel[1]], *jump);
                let prev = previous.load(q);
                if prev[2] < 0.5 {
                    continue;
                }
                let b = [q[0] + prev[0], q[1] + prev[1]];
                if is_boundary(b) {
                    consider([b[0] - uv[0], b[1] - uv[1]]);
                }
            }
        }

        let inside_flag = if inside { 1.0 } else { 0.0 };
        match best {
            Some((d, _)) => [d[0], d[1], 1.0, inside_flag],
            None => [0.0, 0.0, 0.0, inside_flag],
        }
    }))
}

fn sdf_consumer(p: &Params<'_>, technique: &str) -> GfxResult<Shader> {
    let sdf = p.texture("pSDFTexture")?;
    let image = p.texture("pImageTexture")?;
    let threshold = p.float("pSDFThreshold");
    let pixels = image.size();

    // Signed distance in source pixels, negative inside
    let distance = move |uv: [f32; 2]| {
        let t = sdf.load(uv);
        let inside = t[3] >= 0.5 || (t[2] < 0.5 && image.sample(uv)[3] >= threshold);
        let d = if t[2] >= 0.5 {
            ((t[0] * pixels[0]).powi(2) + (t[1] * pixels[1]).powi(2)).sqrt()
        } else {
            FAR
        };
        if inside { -d } else { d }
    };
    let image = p.texture("pImageTexture")?;

    match technique {
        "ShadowOuter" | "ShadowInner" => {
            let color = p.float4("pShadowColor");
            let min = p.float("pShadowMin");
            let max = p.float("pShadowMax");
            let shift = p.float2("pShadowOffset");
            let outer = technique == "ShadowOuter";
            Ok(Box::new(move |uv| {
                let d = distance([uv[0] - shift[0], uv[1] - shift[1]]);
                let d = if outer { d } else { -d };
                let v = 1.0 - ((d - min) / (max - min).max(EPSILON)).clamp(0.0, 1.0);
                let a = image.sample(uv)[3];
                let cover = if outer { 1.0 - a } else { a };
                [color[0], color[1], color[2], color[3] * v * cover]
            }))
        }
        "GlowOuter" | "GlowInner" => {
            let color = p.float4("pGlowColor");
            let width = p.float("pGlowWidth");
            let inverse = p.float("pGlowSharpnessInverse");
            let outer = technique == "GlowOuter";
            Ok(Box::new(move |uv| {
                let d = distance(uv);
                let d = if outer { d } else { -d };
                let v = 1.0 - (d.max(0.0) / width.max(EPSILON)).clamp(0.0, 1.0);
                let v = (v * inverse).clamp(0.0, 1.0);
                let a = image.sample(uv)[3];
                let cover = if outer { 1.0 - a } else { a };
                [color[0], color[1], color[2], color[3] * v * cover]
            }))
        }
        "Outline" => {
            let color = p.float4("pOutlineColor");
            let width = p.float("pOutlineWidth");
            let shift = p.float("pOutlineOffset");
            let inverse = p.float("pOutlineSharpnessInverse");
            Ok(Box::new(move |uv| {
                let half = width * 0.5;
                if half < EPSILON {
                    return [color[0], color[1], color[2], 0.0];
                }
                let e = (distance(uv) - shift).abs();
                let v = 1.0 - (e / half).clamp(0.0, 1.0);
                let v = (v * inverse).clamp(0.0, 1.0);
                [color[0], color[1], color[2], color[3] * v]
            }))
        }
        other => Err(GfxError::UnknownTechnique {
            effect: names::SDF_CONSUMER.to_string(),
            technique: other.to_string(),
        }),
    }
}
