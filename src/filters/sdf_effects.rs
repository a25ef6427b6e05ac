// ============================================================================
// SDF EFFECTS - distance field producer + layered shadow / glow / outline
// ============================================================================
//
// The producer refines a signed distance field of the input's alpha edge at
// a scaled resolution, seeded with the previous frame's field, and ping-pongs
// between two float targets.  The consumer draws the input, then up to five
// layers blended on top in a fixed order.

use uuid::Uuid;

use super::unpack_rgb;
use crate::gfx::catalog::names;
use crate::gfx::{
    BlendFactor, BlendState, Effect, GfxError, GfxResult, GraphicsDevice, RenderOp,
    RenderResult, RenderTarget, Texture, TextureFormat,
};
use crate::settings::SettingsStore;

pub mod keys {
    pub const SHADOW_OUTER: &str = "Filter.SDFEffects.Shadow.Outer";
    pub const SHADOW_OUTER_RANGE_MINIMUM: &str = "Filter.SDFEffects.Shadow.Outer.Range.Minimum";
    pub const SHADOW_OUTER_RANGE_MAXIMUM: &str = "Filter.SDFEffects.Shadow.Outer.Range.Maximum";
    pub const SHADOW_OUTER_OFFSET_X: &str = "Filter.SDFEffects.Shadow.Outer.Offset.X";
    pub const SHADOW_OUTER_OFFSET_Y: &str = "Filter.SDFEffects.Shadow.Outer.Offset.Y";
    pub const SHADOW_OUTER_COLOR: &str = "Filter.SDFEffects.Shadow.Outer.Color";
    pub const SHADOW_OUTER_ALPHA: &str = "Filter.SDFEffects.Shadow.Outer.Alpha";

    pub const SHADOW_INNER: &str = "Filter.SDFEffects.Shadow.Inner";
    pub const SHADOW_INNER_RANGE_MINIMUM: &str = "Filter.SDFEffects.Shadow.Inner.Range.Minimum";
    pub const SHADOW_INNER_RANGE_MAXIMUM: &str = "Filter.SDFEffects.Shadow.Inner.Range.Maximum";
    pub const SHADOW_INNER_OFFSET_X: &str = "Filter.SDFEffects.Shadow.Inner.Offset.X";
    pub const SHADOW_INNER_OFFSET_Y: &str = "Filter.SDFEffects.Shadow.Inner.Offset.Y";
    pub const SHADOW_INNER_COLOR: &str = "Filter.SDFEffects.Shadow.Inner.Color";
    pub const SHADOW_INNER_ALPHA: &str = "Filter.SDFEffects.Shadow.Inner.Alpha";

    pub const GLOW_OUTER: &str = "Filter.SDFEffects.Glow.Outer";
    pub const GLOW_OUTER_COLOR: &str = "Filter.SDFEffects.Glow.Outer.Color";
    pub const GLOW_OUTER_ALPHA: &str = "Filter.SDFEffects.Glow.Outer.Alpha";
    pub const GLOW_OUTER_WIDTH: &str = "Filter.SDFEffects.Glow.Outer.Width";
    pub const GLOW_OUTER_SHARPNESS: &str = "Filter.SDFEffects.Glow.Outer.Sharpness";

    pub const GLOW_INNER: &str = "Filter.SDFEffects.Glow.Inner";
    pub const GLOW_INNER_COLOR: &str = "Filter.SDFEffects.Glow.Inner.Color";
    pub const GLOW_INNER_ALPHA: &str = "Filter.SDFEffects.Glow.Inner.Alpha";
    pub const GLOW_INNER_WIDTH: &str = "Filter.SDFEffects.Glow.Inner.Width";
    pub const GLOW_INNER_SHARPNESS: &str = "Filter.SDFEffects.Glow.Inner.Sharpness";

    pub const OUTLINE: &str = "Filter.SDFEffects.Outline";
    pub const OUTLINE_COLOR: &str = "Filter.SDFEffects.Outline.Color";
    pub const OUTLINE_ALPHA: &str = "Filter.SDFEffects.Outline.Alpha";
    pub const OUTLINE_WIDTH: &str = "Filter.SDFEffects.Outline.Width";
    pub const OUTLINE_OFFSET: &str = "Filter.SDFEffects.Outline.Offset";
    pub const OUTLINE_SHARPNESS: &str = "Filter.SDFEffects.Outline.Sharpness";

    pub const SDF_SCALE: &str = "Filter.SDFEffects.SDF.Scale";
    pub const SDF_THRESHOLD: &str = "Filter.SDFEffects.SDF.Threshold";
}

// ============================================================================
// Layers
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShadowLayer {
    pub enabled: bool,
    pub color: [f32; 4],
    pub range_min: f32,
    pub range_max: f32,
    /// Source pixels.
    pub offset: (f32, f32),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlowLayer {
    pub enabled: bool,
    pub color: [f32; 4],
    pub width: f32,
    pub sharpness: f32,
    pub sharpness_inv: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OutlineLayer {
    pub enabled: bool,
    pub color: [f32; 4],
    pub width: f32,
    pub offset: f32,
    pub sharpness: f32,
    pub sharpness_inv: f32,
}

/// The five layers, in draw order.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SdfLayers {
    pub outer_shadow: ShadowLayer,
    pub inner_shadow: ShadowLayer,
    pub outer_glow: GlowLayer,
    pub inner_glow: GlowLayer,
    pub outline: OutlineLayer,
}

/// Clamp a 0..1 sharpness below 1 and return it with `1 / (1 - s)`.
fn sharpness(percent: f64) -> (f32, f32) {
    let s = ((percent / 100.0) as f32).min(1.0 - f32::EPSILON);
    (s, 1.0 / (1.0 - s))
}

fn layer_color(settings: &SettingsStore, color_key: &str, alpha_key: &str) -> [f32; 4] {
    let [r, g, b] = unpack_rgb(settings.get_int(color_key));
    [r, g, b, (settings.get_double(alpha_key) / 100.0) as f32]
}

fn layer_enabled(settings: &SettingsStore, switch_key: &str, alpha_key: &str) -> bool {
    settings.get_bool(switch_key) && settings.get_double(alpha_key) >= f64::EPSILON
}

impl SdfLayers {
    pub fn from_settings(s: &SettingsStore) -> Self {
        let shadow = |switch: &str, color: &str, alpha: &str, min: &str, max: &str, x: &str, y: &str| {
            ShadowLayer {
                enabled: layer_enabled(s, switch, alpha),
                color: layer_color(s, color, alpha),
                range_min: s.get_double(min) as f32,
                range_max: s.get_double(max) as f32,
                offset: (s.get_double(x) as f32, s.get_double(y) as f32),
            }
        };
        let glow = |switch: &str, color: &str, alpha: &str, width: &str, sharp: &str| {
            let (sharpness, sharpness_inv) = sharpness(s.get_double(sharp));
            GlowLayer {
                enabled: layer_enabled(s, switch, alpha),
                color: layer_color(s, color, alpha),
                width: s.get_double(width) as f32,
                sharpness,
                sharpness_inv,
            }
        };

        let (outline_sharpness, outline_sharpness_inv) =
            sharpness(s.get_double(keys::OUTLINE_SHARPNESS));

        Self {
            outer_shadow: shadow(
                keys::SHADOW_OUTER,
                keys::SHADOW_OUTER_COLOR,
                keys::SHADOW_OUTER_ALPHA,
                keys::SHADOW_OUTER_RANGE_MINIMUM,
                keys::SHADOW_OUTER_RANGE_MAXIMUM,
                keys::SHADOW_OUTER_OFFSET_X,
                keys::SHADOW_OUTER_OFFSET_Y,
            ),
            inner_shadow: shadow(
                keys::SHADOW_INNER,
                keys::SHADOW_INNER_COLOR,
                keys::SHADOW_INNER_ALPHA,
                keys::SHADOW_INNER_RANGE_MINIMUM,
                keys::SHADOW_INNER_RANGE_MAXIMUM,
                keys::SHADOW_INNER_OFFSET_X,
                keys::SHADOW_INNER_OFFSET_Y,
            ),
            outer_glow: glow(
                keys::GLOW_OUTER,
                keys::GLOW_OUTER_COLOR,
                keys::GLOW_OUTER_ALPHA,
                keys::GLOW_OUTER_WIDTH,
                keys::GLOW_OUTER_SHARPNESS,
            ),
            inner_glow: glow(
                keys::GLOW_INNER,
                keys::GLOW_INNER_COLOR,
                keys::GLOW_INNER_ALPHA,
                keys::GLOW_INNER_WIDTH,
                keys::GLOW_INNER_SHARPNESS,
            ),
            outline: OutlineLayer {
                enabled: layer_enabled(s, keys::OUTLINE, keys::OUTLINE_ALPHA),
                color: layer_color(s, keys::OUTLINE_COLOR, keys::OUTLINE_ALPHA),
                width: s.get_double(keys::OUTLINE_WIDTH) as f32,
                offset: s.get_double(keys::OUTLINE_OFFSET) as f32,
                sharpness: outline_sharpness,
                sharpness_inv: outline_sharpness_inv,
            },
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.outer_shadow.enabled
            || self.inner_shadow.enabled
            || self.outer_glow.enabled
            || self.inner_glow.enabled
            || self.outline.enabled
    }
}

/// Which layer groups show their detail properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SdfVisibility {
    pub outer_shadow: bool,
    pub inner_shadow: bool,
    pub outer_glow: bool,
    pub inner_glow: bool,
    pub outline: bool,
}

// ============================================================================
// Pipeline
// ============================================================================

const LAYER_BLEND: BlendState = BlendState::separate(
    BlendFactor::SrcAlpha,
    BlendFactor::InvSrcAlpha,
    BlendFactor::One,
    BlendFactor::One,
);

pub struct DistanceFieldPipeline {
    id: Uuid,
    producer: Effect,
    consumer: Effect,

    source_rt: RenderTarget,
    sdf_read: RenderTarget,
    sdf_write: RenderTarget,
    output_rt: RenderTarget,

    layers: SdfLayers,
    /// Field resolution relative to the input.
    scale: f64,
    threshold: f32,

    source_texture: Option<Texture>,
    sdf_texture: Option<Texture>,
    output_texture: Option<Texture>,
    source_rendered: bool,
    output_rendered: bool,
}

impl DistanceFieldPipeline {
    pub fn new(device: GraphicsDevice, settings: &SettingsStore) -> GfxResult<Self> {
        let id = Uuid::new_v4();
        let load = |name: &str| {
            device.create_effect(name).map_err(|e| {
                log::error!("<filter::sdf_effects> [{}] error loading '{}': {}", id, name, e);
                e
            })
        };
        let producer = load(names::SDF_PRODUCER)?;
        let consumer = load(names::SDF_CONSUMER)?;

        let mut targets = [
            device.create_render_target(TextureFormat::Rgba8),
            device.create_render_target(TextureFormat::Rgba32Float),
            device.create_render_target(TextureFormat::Rgba32Float),
            device.create_render_target(TextureFormat::Rgba8),
        ];
        for rt in targets.iter_mut() {
            rt.render(1, 1)?.clear([0.0; 4])?;
        }
        let [source_rt, sdf_read, sdf_write, output_rt] = targets;

        let mut pipeline = Self {
            id,
            producer,
            consumer,
            source_rt,
            sdf_read,
            sdf_write,
            output_rt,
            layers: SdfLayers::default(),
            scale: 1.0,
            threshold: 0.5,
            source_texture: None,
            sdf_texture: None,
            output_texture: None,
            source_rendered: false,
            output_rendered: false,
        };
        pipeline.update(settings);
        Ok(pipeline)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn layers(&self) -> &SdfLayers {
        &self.layers
    }

    /// Latest distance field, if one was produced.
    pub fn distance_field(&self) -> Option<&Texture> {
        self.sdf_texture.as_ref()
    }

    pub fn get_defaults(settings: &mut SettingsStore) {
        for (switch, color, alpha, min, max, x, y) in [
            (
                keys::SHADOW_OUTER,
                keys::SHADOW_OUTER_COLOR,
                keys::SHADOW_OUTER_ALPHA,
                keys::SHADOW_OUTER_RANGE_MINIMUM,
                keys::SHADOW_OUTER_RANGE_MAXIMUM,
                keys::SHADOW_OUTER_OFFSET_X,
                keys::SHADOW_OUTER_OFFSET_Y,
            ),
            (
                keys::SHADOW_INNER,
                keys::SHADOW_INNER_COLOR,
                keys::SHADOW_INNER_ALPHA,
                keys::SHADOW_INNER_RANGE_MINIMUM,
                keys::SHADOW_INNER_RANGE_MAXIMUM,
                keys::SHADOW_INNER_OFFSET_X,
                keys::SHADOW_INNER_OFFSET_Y,
            ),
        ] {
            settings.set_default_bool(switch, false);
            settings.set_default_int(color, 0x0000_0000);
            settings.set_default_double(alpha, 100.0);
            settings.set_default_double(min, 0.0);
            settings.set_default_double(max, 4.0);
            settings.set_default_double(x, 0.0);
            settings.set_default_double(y, 0.0);
        }

        for (switch, color, alpha, width, sharp) in [
            (
                keys::GLOW_OUTER,
                keys::GLOW_OUTER_COLOR,
                keys::GLOW_OUTER_ALPHA,
                keys::GLOW_OUTER_WIDTH,
                keys::GLOW_OUTER_SHARPNESS,
            ),
            (
                keys::GLOW_INNER,
                keys::GLOW_INNER_COLOR,
                keys::GLOW_INNER_ALPHA,
                keys::GLOW_INNER_WIDTH,
                keys::GLOW_INNER_SHARPNESS,
            ),
        ] {
            settings.set_default_bool(switch, false);
            settings.set_default_int(color, 0xFFFF_FFFF);
            settings.set_default_double(alpha, 100.0);
            settings.set_default_double(width, 4.0);
            settings.set_default_double(sharp, 50.0);
        }

        settings.set_default_bool(keys::OUTLINE, false);
        settings.set_default_int(keys::OUTLINE_COLOR, 0x0000_0000);
        settings.set_default_double(keys::OUTLINE_ALPHA, 100.0);
        settings.set_default_double(keys::OUTLINE_WIDTH, 4.0);
        settings.set_default_double(keys::OUTLINE_OFFSET, 0.0);
        settings.set_default_double(keys::OUTLINE_SHARPNESS, 50.0);

        settings.set_default_double(keys::SDF_SCALE, 100.0);
        settings.set_default_double(keys::SDF_THRESHOLD, 50.0);
    }

    pub fn visibility(settings: &SettingsStore) -> SdfVisibility {
        SdfVisibility {
            outer_shadow: settings.get_bool(keys::SHADOW_OUTER),
            inner_shadow: settings.get_bool(keys::SHADOW_INNER),
            outer_glow: settings.get_bool(keys::GLOW_OUTER),
            inner_glow: settings.get_bool(keys::GLOW_INNER),
            outline: settings.get_bool(keys::OUTLINE),
        }
    }

    pub fn update(&mut self, settings: &SettingsStore) {
        self.layers = SdfLayers::from_settings(settings);
        self.scale = settings.get_double(keys::SDF_SCALE) / 100.0;
        self.threshold = (settings.get_double(keys::SDF_THRESHOLD) / 100.0) as f32;
        self.output_rendered = false;
    }

    pub fn tick(&mut self) {
        self.source_rendered = false;
        self.output_rendered = false;
    }

    pub fn render(&mut self, upstream: &Texture) -> RenderResult {
        let base = upstream.size();

        if !self.source_rendered {
            if let Err(e) = self.produce(upstream) {
                log::error!("<filter::sdf_effects> [{}] {}", self.id, e);
                return RenderResult::Skip;
            }
            self.source_rendered = true;
        }

        if !self.output_rendered {
            match self.consume(base) {
                Ok(texture) => self.output_texture = Some(texture),
                Err(e) => {
                    log::error!("<filter::sdf_effects> [{}] {}", self.id, e);
                    return RenderResult::Skip;
                }
            }
            self.output_rendered = true;
        }

        match &self.output_texture {
            Some(texture) => RenderResult::Rendered(texture.clone()),
            None => RenderResult::Skip,
        }
    }

    /// Capture the input and advance the distance field by one step.
    fn produce(&mut self, upstream: &Texture) -> GfxResult<()> {
        let (w, h) = upstream.size();
        {
            let mut op = self.source_rt.render(w, h)?;
            op.clear([0.0; 4])?;
            op.blit(upstream)?;
        }
        let source = self
            .source_rt
            .get_texture()
            .ok_or_else(|| GfxError::Backend("failed to draw source".into()))?;
        let previous = self
            .sdf_read
            .get_texture()
            .ok_or_else(|| GfxError::Backend("SDF backbuffer empty".into()))?;

        let sdf_w = (w as f64 * self.scale).max(1.0) as u32;
        let sdf_h = (h as f64 * self.scale).max(1.0) as u32;
        if let Some(p) = self.producer.get_parameter("_image") {
            p.set_texture(Some(&source));
        }
        if let Some(p) = self.producer.get_parameter("_sdf") {
            p.set_texture(Some(&previous));
        }
        if let Some(p) = self.producer.get_parameter("_size") {
            p.set_float2(sdf_w as f32, sdf_h as f32);
        }
        if let Some(p) = self.producer.get_parameter("_threshold") {
            p.set_float(self.threshold);
        }
        {
            let mut op = self.sdf_write.render(sdf_w, sdf_h)?;
            op.clear([0.0; 4])?;
            self.producer.run(&mut op, "Draw")?;
        }
        std::mem::swap(&mut self.sdf_read, &mut self.sdf_write);

        self.sdf_texture = Some(
            self.sdf_read
                .get_texture()
                .ok_or_else(|| GfxError::Backend("SDF backbuffer empty".into()))?,
        );
        self.source_texture = Some(source);
        Ok(())
    }

    fn consume(&mut self, base: (u32, u32)) -> GfxResult<Texture> {
        let source = self
            .source_texture
            .clone()
            .ok_or_else(|| GfxError::Backend("no captured input".into()))?;
        let sdf = self
            .sdf_texture
            .clone()
            .ok_or_else(|| GfxError::Backend("no distance field".into()))?;

        {
            let mut op = self.output_rt.render(base.0, base.1)?;
            op.set_blend(BlendState::DISABLED);
            op.blit(&source)?;

            op.set_blend(LAYER_BLEND);
            let inputs = LayerInputs {
                sdf: &sdf,
                source: &source,
                threshold: self.threshold,
                base,
            };
            // Layers drawn so far stay; the rest are dropped for this frame
            if let Err(e) = draw_layers(&mut self.consumer, &mut op, &self.layers, &inputs) {
                log::warn!(
                    "<filter::sdf_effects> [{}] abandoning remaining layers: {}",
                    self.id,
                    e
                );
            }
        }

        self.output_rt
            .get_texture()
            .ok_or(GfxError::InvalidSize(base.0, base.1))
    }
}

struct LayerInputs<'a> {
    sdf: &'a Texture,
    source: &'a Texture,
    threshold: f32,
    base: (u32, u32),
}

fn draw_layers(
    effect: &mut Effect,
    op: &mut RenderOp<'_>,
    layers: &SdfLayers,
    inputs: &LayerInputs<'_>,
) -> GfxResult<()> {
    let common = |effect: &mut Effect| {
        if let Some(p) = effect.get_parameter("pSDFTexture") {
            p.set_texture(Some(inputs.sdf));
        }
        if let Some(p) = effect.get_parameter("pSDFThreshold") {
            p.set_float(inputs.threshold);
        }
        if let Some(p) = effect.get_parameter("pImageTexture") {
            p.set_texture(Some(inputs.source));
        }
    };

    for (layer, technique) in [
        (&layers.outer_shadow, "ShadowOuter"),
        (&layers.inner_shadow, "ShadowInner"),
    ] {
        if layer.enabled {
            common(effect);
            set_shadow(effect, layer, inputs.base);
            effect.run(op, technique)?;
        }
    }
    for (layer, technique) in [
        (&layers.outer_glow, "GlowOuter"),
        (&layers.inner_glow, "GlowInner"),
    ] {
        if layer.enabled {
            common(effect);
            set_glow(effect, layer);
            effect.run(op, technique)?;
        }
    }
    if layers.outline.enabled {
        common(effect);
        set_outline(effect, &layers.outline);
        effect.run(op, "Outline")?;
    }
    Ok(())
}

fn set_color(effect: &mut Effect, name: &str, color: [f32; 4]) {
    if let Some(p) = effect.get_parameter(name) {
        p.set_float4(color[0], color[1], color[2], color[3]);
    }
}

fn set_float(effect: &mut Effect, name: &str, value: f32) {
    if let Some(p) = effect.get_parameter(name) {
        p.set_float(value);
    }
}

fn set_shadow(effect: &mut Effect, layer: &ShadowLayer, base: (u32, u32)) {
    set_color(effect, "pShadowColor", layer.color);
    set_float(effect, "pShadowMin", layer.range_min);
    set_float(effect, "pShadowMax", layer.range_max);
    if let Some(p) = effect.get_parameter("pShadowOffset") {
        p.set_float2(layer.offset.0 / base.0 as f32, layer.offset.1 / base.1 as f32);
    }
}

fn set_glow(effect: &mut Effect, layer: &GlowLayer) {
    set_color(effect, "pGlowColor", layer.color);
    set_float(effect, "pGlowWidth", layer.width);
    set_float(effect, "pGlowSharpness", layer.sharpness);
    set_float(effect, "pGlowSharpnessInverse", layer.sharpness_inv);
}

fn set_outline(effect: &mut Effect, layer: &OutlineLayer) {
    set_color(effect, "pOutlineColor", layer.color);
    set_float(effect, "pOutlineWidth", layer.width);
    set_float(effect, "pOutlineOffset", layer.offset);
    set_float(effect, "pOutlineSharpness", layer.sharpness);
    set_float(effect, "pOutlineSharpnessInverse", layer.sharpness_inv);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SettingsStore {
        let mut s = SettingsStore::new();
        DistanceFieldPipeline::get_defaults(&mut s);
        s
    }

    /// 16x16 transparent frame with an opaque white 8x8 square in the middle.
    fn square(device: &GraphicsDevice) -> (Texture, Vec<[f32; 4]>) {
        let pixels: Vec<[f32; 4]> = (0..256)
            .map(|i| {
                let (x, y) = (i % 16, i / 16);
                if (4..12).contains(&x) && (4..12).contains(&y) {
                    [1.0, 1.0, 1.0, 1.0]
                } else {
                    [0.0; 4]
                }
            })
            .collect();
        let tex = device
            .create_texture(16, 16, TextureFormat::Rgba8, Some(&pixels))
            .unwrap();
        (tex, pixels)
    }

    #[test]
    fn full_sharpness_stays_finite() {
        let mut s = settings();
        s.set_double(keys::GLOW_OUTER_SHARPNESS, 100.0);
        s.set_double(keys::OUTLINE_SHARPNESS, 250.0);
        let layers = SdfLayers::from_settings(&s);
        for (sharp, inv) in [
            (layers.outer_glow.sharpness, layers.outer_glow.sharpness_inv),
            (layers.outline.sharpness, layers.outline.sharpness_inv),
        ] {
            assert!(sharp <= 1.0 - f32::EPSILON);
            assert!(inv.is_finite() && inv > 0.0);
        }
        assert_eq!(layers.inner_glow.sharpness_inv, 2.0);
    }

    #[test]
    fn zero_alpha_disables_a_layer() {
        let mut s = settings();
        s.set_bool(keys::OUTLINE, true);
        assert!(SdfLayers::from_settings(&s).outline.enabled);
        s.set_double(keys::OUTLINE_ALPHA, 0.0);
        assert!(!SdfLayers::from_settings(&s).outline.enabled);
        assert!(!SdfLayers::from_settings(&s).any_enabled());
    }

    #[test]
    fn visibility_follows_switches() {
        let mut s = settings();
        s.set_bool(keys::GLOW_INNER, true);
        let v = DistanceFieldPipeline::visibility(&s);
        assert!(v.inner_glow);
        assert!(!v.outer_glow && !v.outline);
    }

    #[test]
    fn no_layers_reproduces_the_input() {
        let device = GraphicsDevice::cpu();
        let (input, pixels) = square(&device);
        let mut sdf = DistanceFieldPipeline::new(device.clone(), &settings()).unwrap();
        sdf.tick();
        let out = sdf.render(&input);
        let result = device.read_pixels(out.texture().unwrap()).unwrap();
        for (a, b) in result.iter().zip(&pixels) {
            for c in 0..4 {
                assert!((a[c] - b[c]).abs() < 0.01);
            }
        }
    }

    #[test]
    fn field_resolution_follows_scale() {
        let device = GraphicsDevice::cpu();
        let (input, _) = square(&device);
        let mut s = settings();
        s.set_double(keys::SDF_SCALE, 50.0);
        let mut sdf = DistanceFieldPipeline::new(device, &s).unwrap();
        sdf.tick();
        assert!(!sdf.render(&input).is_skip());
        assert_eq!(sdf.distance_field().unwrap().size(), (8, 8));

        s.set_double(keys::SDF_SCALE, 1.0);
        sdf.update(&s);
        sdf.tick();
        sdf.render(&input);
        assert_eq!(sdf.distance_field().unwrap().size(), (1, 1));
    }

    #[test]
    fn distance_field_is_stored_at_full_float() {
        let device = GraphicsDevice::cpu();
        let (input, _) = square(&device);
        let mut sdf = DistanceFieldPipeline::new(device.clone(), &settings()).unwrap();
        sdf.tick();
        sdf.render(&input);
        let field = sdf.distance_field().unwrap();
        assert_eq!(field.format(), TextureFormat::Rgba32Float);

        // One texel of a 4K-wide frame as a UV offset, below half-float spacing
        let offset = 1000.0 / 4096.0 + 1.0 / 4096.0;
        let stored = device
            .create_texture(1, 1, field.format(), Some(&[[offset, 0.0, 1.0, 0.0]]))
            .unwrap();
        assert_eq!(device.read_pixels(&stored).unwrap()[0][0], offset);
    }

    #[test]
    fn outer_glow_hugs_the_edge() {
        let device = GraphicsDevice::cpu();
        let (input, _) = square(&device);
        let mut s = settings();
        s.set_bool(keys::GLOW_OUTER, true);
        s.set_int(keys::GLOW_OUTER_COLOR, 0x0000_00FF);
        let mut sdf = DistanceFieldPipeline::new(device.clone(), &s).unwrap();
        sdf.tick();
        let out = sdf.render(&input);
        let result = device.read_pixels(out.texture().unwrap()).unwrap();

        // Just left of the square: full red glow
        let edge = result[8 * 16 + 3];
        assert!(edge[0] > 0.95 && edge[1] < 0.05 && edge[3] > 0.95, "{:?}", edge);
        // Inside the square: untouched
        let inside = result[8 * 16 + 8];
        assert!(inside[1] > 0.95 && inside[3] > 0.95, "{:?}", inside);
        // Far corner: beyond the glow width
        assert!(result[0][3] < 0.05, "{:?}", result[0]);
    }
}
