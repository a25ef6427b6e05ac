// ============================================================================
// BLUR FILTER - pass orchestration, per-tick parameters, post-mask
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use super::source::{SourceCapture, SourceCatalog};
use super::unpack_rgb;
use crate::blur::{BlurParameters, BlurPass, BlurRegistry, BlurVariant, Bounds};
use crate::gfx::catalog::names;
use crate::gfx::{
    Effect, GfxError, GfxResult, GraphicsDevice, RenderResult, RenderTarget, Texture,
    TextureFormat,
};
use crate::migration::{MigrationPlan, MigrationStep, Threshold};
use crate::settings::{SettingValue, SettingsStore};
use crate::version::Version;

pub mod keys {
    pub const TYPE: &str = "Filter.Blur.Type";
    pub const SUBTYPE: &str = "Filter.Blur.SubType";
    pub const SIZE: &str = "Filter.Blur.Size";
    pub const ANGLE: &str = "Filter.Blur.Angle";
    pub const CENTER_X: &str = "Filter.Blur.Center.X";
    pub const CENTER_Y: &str = "Filter.Blur.Center.Y";
    pub const STEP_SCALE: &str = "Filter.Blur.StepScale";
    pub const STEP_SCALE_X: &str = "Filter.Blur.StepScale.X";
    pub const STEP_SCALE_Y: &str = "Filter.Blur.StepScale.Y";
    pub const MASK: &str = "Filter.Blur.Mask";
    pub const MASK_TYPE: &str = "Filter.Blur.Mask.Type";
    pub const MASK_REGION_LEFT: &str = "Filter.Blur.Mask.Region.Left";
    pub const MASK_REGION_RIGHT: &str = "Filter.Blur.Mask.Region.Right";
    pub const MASK_REGION_TOP: &str = "Filter.Blur.Mask.Region.Top";
    pub const MASK_REGION_BOTTOM: &str = "Filter.Blur.Mask.Region.Bottom";
    pub const MASK_REGION_FEATHER: &str = "Filter.Blur.Mask.Region.Feather";
    pub const MASK_REGION_FEATHER_SHIFT: &str = "Filter.Blur.Mask.Region.Feather.Shift";
    pub const MASK_REGION_INVERT: &str = "Filter.Blur.Mask.Region.Invert";
    pub const MASK_IMAGE: &str = "Filter.Blur.Mask.Image";
    pub const MASK_SOURCE: &str = "Filter.Blur.Mask.Source";
    pub const MASK_COLOR: &str = "Filter.Blur.Mask.Color";
    pub const MASK_ALPHA: &str = "Filter.Blur.Mask.Alpha";
    pub const MASK_MULTIPLIER: &str = "Filter.Blur.Mask.Multiplier";
    pub const MIGRATED_VERSION: &str = "Filter.Blur.MigratedVersion";

    // Pre-0.1 layout
    pub const LEGACY_DIRECTIONAL: &str = "Filter.Blur.Directional";
    pub const LEGACY_DIRECTIONAL_ANGLE: &str = "Filter.Blur.Directional.Angle";
}

// ============================================================================
// Mask configuration
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaskType {
    #[default]
    Region,
    Image,
    Source,
}

impl MaskType {
    /// Persisted integer; unknown values read as `Region`.
    pub fn from_int(v: i64) -> Self {
        match v {
            1 => MaskType::Image,
            2 => MaskType::Source,
            _ => MaskType::Region,
        }
    }

    pub fn to_int(self) -> i64 {
        match self {
            MaskType::Region => 0,
            MaskType::Image => 1,
            MaskType::Source => 2,
        }
    }
}

/// Region edges in uv space: the unblurred area is outside
/// `[left, right] x [top, bottom]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RegionMask {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub feather: f32,
    pub feather_shift: f32,
    pub invert: bool,
}

#[derive(Default)]
pub struct ImageMask {
    pub path: String,
    loaded_path: Option<String>,
    texture: Option<Texture>,
}

impl ImageMask {
    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }
}

#[derive(Default)]
pub struct SourceMask {
    pub name: String,
    bound_name: Option<String>,
    capture: Option<Arc<dyn SourceCapture>>,
    texture: Option<Texture>,
}

impl SourceMask {
    pub fn is_bound(&self) -> bool {
        self.capture.is_some()
    }
}

#[derive(Default)]
pub struct MaskConfig {
    pub enabled: bool,
    pub kind: MaskType,
    pub region: RegionMask,
    pub image: ImageMask,
    pub source: SourceMask,
    pub color: [f32; 4],
    pub multiplier: f32,
}

impl MaskConfig {
    /// Mask program technique for the current configuration.
    pub fn technique(&self) -> &'static str {
        match self.kind {
            MaskType::Region => {
                let feathered = self.region.feather > f32::EPSILON;
                match (feathered, self.region.invert) {
                    (false, false) => "Region",
                    (false, true) => "RegionInverted",
                    (true, false) => "RegionFeather",
                    (true, true) => "RegionFeatherInverted",
                }
            }
            MaskType::Image | MaskType::Source => "Image",
        }
    }

    fn texture(&self) -> Option<&Texture> {
        match self.kind {
            MaskType::Region => None,
            MaskType::Image => self.image.texture.as_ref(),
            MaskType::Source => self.source.texture.as_ref(),
        }
    }
}

fn apply_mask_parameters(effect: &mut Effect, mask: &MaskConfig, original: &Texture, blurred: &Texture) {
    if let Some(p) = effect.get_parameter("image_orig") {
        p.set_texture(Some(original));
    }
    if let Some(p) = effect.get_parameter("image_blur") {
        p.set_texture(Some(blurred));
    }

    if mask.kind == MaskType::Region {
        let r = &mask.region;
        let values = [
            ("mask_region_left", r.left),
            ("mask_region_right", r.right),
            ("mask_region_top", r.top),
            ("mask_region_bottom", r.bottom),
            ("mask_region_feather", r.feather),
            ("mask_region_feather_shift", r.feather_shift),
        ];
        for (name, value) in values {
            if let Some(p) = effect.get_parameter(name) {
                p.set_float(value);
            }
        }
    } else if let Some(p) = effect.get_parameter("mask_image") {
        p.set_texture(mask.texture());
    }

    if let Some(p) = effect.get_parameter("mask_color") {
        let [r, g, b, a] = mask.color;
        p.set_float4(r, g, b, a);
    }
    if let Some(p) = effect.get_parameter("mask_multiplier") {
        p.set_float(mask.multiplier);
    }
}

// ============================================================================
// Property visibility
// ============================================================================

/// Which properties to show for the current settings, plus the numeric
/// limits of the selected family / variant.
#[derive(Clone, Debug, PartialEq)]
pub struct BlurVisibility {
    pub supported_subtypes: Vec<&'static str>,
    pub size: Bounds,
    /// `None` when the variant has no angle.
    pub angle: Option<Bounds>,
    pub center: bool,
    pub step_scale: bool,
    /// `None` unless step scaling is supported and switched on.
    pub step_scale_values: Option<Bounds>,
    pub mask_type: bool,
    pub mask_region: bool,
    pub mask_image: bool,
    pub mask_source: bool,
    /// Colour, alpha and multiplier.
    pub mask_shared: bool,
}

// ============================================================================
// Migration
// ============================================================================

/// Integer type ids and the separate directional switch of the first
/// settings layout.
fn migrate_from_v0(settings: &mut SettingsStore) {
    if let Some(SettingValue::Int(old)) = settings.user_value(keys::TYPE).cloned() {
        let name = match old {
            1 => "gaussian",
            3 => "box_linear",
            4 => "gaussian_linear",
            // 0 box, 2 bilateral (removed), anything else
            _ => "box",
        };
        settings.set_string(keys::TYPE, name);
    }

    if settings.has_user_value(keys::LEGACY_DIRECTIONAL) {
        let subtype = if settings.get_bool(keys::LEGACY_DIRECTIONAL) {
            BlurVariant::Directional
        } else {
            BlurVariant::Area
        };
        settings.set_string(keys::SUBTYPE, subtype.name());
        settings.unset(keys::LEGACY_DIRECTIONAL);
    }

    if settings.has_user_value(keys::LEGACY_DIRECTIONAL_ANGLE) {
        let angle = settings.get_double(keys::LEGACY_DIRECTIONAL_ANGLE);
        settings.set_double(keys::ANGLE, angle);
        settings.unset(keys::LEGACY_DIRECTIONAL_ANGLE);
    }
}

static MIGRATION: MigrationPlan = MigrationPlan {
    component: "filter::blur",
    stamp_key: keys::MIGRATED_VERSION,
    steps: &[MigrationStep {
        name: "integer blur type",
        threshold: Threshold::AtOrBelow(Version::ZERO),
        apply: migrate_from_v0,
    }],
};

// ============================================================================
// Orchestrator
// ============================================================================

pub struct BlurOrchestrator {
    id: Uuid,
    device: GraphicsDevice,
    registry: Arc<BlurRegistry>,
    sources: Arc<SourceCatalog>,

    pass: Option<BlurPass>,
    /// Type string the current pass was built from.
    built_type: Option<String>,
    params: BlurParameters,
    mask: MaskConfig,
    mask_effect: Option<Effect>,

    source_rt: RenderTarget,
    output_rt: RenderTarget,
    source_texture: Option<Texture>,
    output_texture: Option<Texture>,
    source_rendered: bool,
    output_rendered: bool,
}

impl BlurOrchestrator {
    pub fn new(
        device: GraphicsDevice,
        registry: Arc<BlurRegistry>,
        sources: Arc<SourceCatalog>,
        settings: &SettingsStore,
    ) -> Self {
        let id = Uuid::new_v4();
        let mask_effect = match device.create_effect(names::MASK) {
            Ok(e) => Some(e),
            Err(e) => {
                log::error!("<filter::blur> [{}] failed to load mask effect: {}", id, e);
                None
            }
        };
        let mut filter = Self {
            id,
            source_rt: device.create_render_target(TextureFormat::Rgba8),
            output_rt: device.create_render_target(TextureFormat::Rgba8),
            device,
            registry,
            sources,
            pass: None,
            built_type: None,
            params: BlurParameters::default(),
            mask: MaskConfig::default(),
            mask_effect,
            source_texture: None,
            output_texture: None,
            source_rendered: false,
            output_rendered: false,
        };
        filter.update(settings);
        filter
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pass(&self) -> Option<&BlurPass> {
        self.pass.as_ref()
    }

    pub fn parameters(&self) -> &BlurParameters {
        &self.params
    }

    pub fn mask(&self) -> &MaskConfig {
        &self.mask
    }

    pub fn get_defaults(settings: &mut SettingsStore) {
        settings.set_default_string(keys::TYPE, "box");
        settings.set_default_string(keys::SUBTYPE, "area");

        settings.set_default_double(keys::SIZE, 5.0);
        settings.set_default_double(keys::ANGLE, 0.0);
        settings.set_default_double(keys::CENTER_X, 50.0);
        settings.set_default_double(keys::CENTER_Y, 50.0);
        settings.set_default_bool(keys::STEP_SCALE, false);
        settings.set_default_double(keys::STEP_SCALE_X, 100.0);
        settings.set_default_double(keys::STEP_SCALE_Y, 100.0);

        settings.set_default_bool(keys::MASK, false);
        settings.set_default_int(keys::MASK_TYPE, MaskType::Region.to_int());
        settings.set_default_double(keys::MASK_REGION_LEFT, 0.0);
        settings.set_default_double(keys::MASK_REGION_RIGHT, 0.0);
        settings.set_default_double(keys::MASK_REGION_TOP, 0.0);
        settings.set_default_double(keys::MASK_REGION_BOTTOM, 0.0);
        settings.set_default_double(keys::MASK_REGION_FEATHER, 0.0);
        settings.set_default_double(keys::MASK_REGION_FEATHER_SHIFT, 0.0);
        settings.set_default_bool(keys::MASK_REGION_INVERT, false);
        settings.set_default_string(keys::MASK_IMAGE, "");
        settings.set_default_string(keys::MASK_SOURCE, "");
        settings.set_default_int(keys::MASK_COLOR, 0xFFFF_FFFF);
        settings.set_default_double(keys::MASK_ALPHA, 100.0);
        settings.set_default_double(keys::MASK_MULTIPLIER, 1.0);
    }

    /// Upgrade a document written by `version`.  Safe to call repeatedly.
    pub fn migrate(settings: &mut SettingsStore, version: Version) {
        MIGRATION.run(settings, version);
    }

    pub fn visibility(
        registry: &BlurRegistry,
        settings: &mut SettingsStore,
    ) -> Option<BlurVisibility> {
        let factory = registry.get(&settings.get_string(keys::TYPE))?;
        let mut variant = BlurVariant::from_name(&settings.get_string(keys::SUBTYPE))?;

        let supported: Vec<BlurVariant> = BlurVariant::ALL
            .into_iter()
            .filter(|v| factory.is_type_supported(*v))
            .collect();
        if !factory.is_type_supported(variant) {
            // Switch to the first subtype the family can render
            let first = *supported.first()?;
            settings.set_string(keys::SUBTYPE, first.name());
            variant = first;
        }

        let step_scale = factory.is_step_scale_supported(variant);
        let show_scaling = step_scale && settings.get_bool(keys::STEP_SCALE);
        let show_mask = settings.get_bool(keys::MASK);
        let kind = MaskType::from_int(settings.get_int(keys::MASK_TYPE));
        let image_or_source = show_mask && kind != MaskType::Region;

        Some(BlurVisibility {
            supported_subtypes: supported.iter().map(|v| v.name()).collect(),
            size: factory.size_bounds(),
            angle: variant
                .supports_angle()
                .then(|| factory.angle_bounds(variant)),
            center: variant.supports_center(),
            step_scale,
            step_scale_values: show_scaling.then(|| factory.step_scale_bounds()),
            mask_type: show_mask,
            mask_region: show_mask && kind == MaskType::Region,
            mask_image: show_mask && kind == MaskType::Image,
            mask_source: show_mask && kind == MaskType::Source,
            mask_shared: image_or_source,
        })
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn update(&mut self, settings: &SettingsStore) {
        self.params = BlurParameters {
            size: settings.get_double(keys::SIZE),
            angle: settings.get_double(keys::ANGLE),
            center: (
                settings.get_double(keys::CENTER_X) / 100.0,
                settings.get_double(keys::CENTER_Y) / 100.0,
            ),
            step_scale: (
                settings.get_double(keys::STEP_SCALE_X) / 100.0,
                settings.get_double(keys::STEP_SCALE_Y) / 100.0,
            ),
            step_scale_enabled: settings.get_bool(keys::STEP_SCALE),
        };
        self.update_pass(settings);
        self.update_mask(settings);
    }

    fn update_pass(&mut self, settings: &SettingsStore) {
        let type_name = settings.get_string(keys::TYPE);
        let subtype = settings.get_string(keys::SUBTYPE);
        let (Some(factory), Some(variant)) =
            (self.registry.get(&type_name), BlurVariant::from_name(&subtype))
        else {
            log::debug!(
                "<filter::blur> [{}] ignoring unknown blur '{}' / '{}'",
                self.id,
                type_name,
                subtype
            );
            return;
        };

        let type_changed = self.built_type.as_deref() != Some(type_name.as_str());
        let variant_changed = self.pass.as_ref().is_none_or(|p| p.variant() != variant);
        if !(type_changed || variant_changed) || !factory.is_type_supported(variant) {
            return;
        }

        match factory.create(&self.device, variant) {
            Ok(mut pass) => {
                pass.apply(&self.params);
                log::debug!(
                    "<filter::blur> [{}] using {} / {}",
                    self.id,
                    type_name,
                    variant.name()
                );
                self.pass = Some(pass);
                self.built_type = Some(type_name);
                self.output_rendered = false;
            }
            Err(e) => log::error!("<filter::blur> [{}] {}", self.id, e),
        }
    }

    fn update_mask(&mut self, settings: &SettingsStore) {
        self.mask.enabled = settings.get_bool(keys::MASK);
        if !self.mask.enabled {
            return;
        }

        self.mask.kind = MaskType::from_int(settings.get_int(keys::MASK_TYPE));
        let percent = |key: &str| (settings.get_double(key) / 100.0) as f32;
        match self.mask.kind {
            MaskType::Region => {
                self.mask.region = RegionMask {
                    left: percent(keys::MASK_REGION_LEFT),
                    top: percent(keys::MASK_REGION_TOP),
                    right: 1.0 - percent(keys::MASK_REGION_RIGHT),
                    bottom: 1.0 - percent(keys::MASK_REGION_BOTTOM),
                    feather: percent(keys::MASK_REGION_FEATHER),
                    feather_shift: percent(keys::MASK_REGION_FEATHER_SHIFT),
                    invert: settings.get_bool(keys::MASK_REGION_INVERT),
                };
            }
            MaskType::Image => self.mask.image.path = settings.get_string(keys::MASK_IMAGE),
            MaskType::Source => self.mask.source.name = settings.get_string(keys::MASK_SOURCE),
        }

        if self.mask.kind != MaskType::Region {
            let [r, g, b] = unpack_rgb(settings.get_int(keys::MASK_COLOR));
            self.mask.color = [r, g, b, percent(keys::MASK_ALPHA)];
            self.mask.multiplier = settings.get_double(keys::MASK_MULTIPLIER) as f32;
        }
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    pub fn tick(&mut self) {
        if let Some(pass) = self.pass.as_mut() {
            pass.apply(&self.params);
        }

        match self.mask.kind {
            MaskType::Image => self.refresh_mask_image(),
            MaskType::Source => self.refresh_mask_source(),
            MaskType::Region => {}
        }

        self.source_rendered = false;
        self.output_rendered = false;
    }

    fn refresh_mask_image(&mut self) {
        let image = &mut self.mask.image;
        if image.loaded_path.as_deref() == Some(image.path.as_str()) {
            return;
        }
        if image.path.is_empty() {
            image.texture = None;
            image.loaded_path = Some(String::new());
            return;
        }
        match self.device.load_texture(Path::new(&image.path)) {
            Ok(texture) => {
                image.texture = Some(texture);
                image.loaded_path = Some(image.path.clone());
            }
            Err(e) => log::error!(
                "<filter::blur> [{}] failed to load image '{}': {}",
                self.id,
                image.path,
                e
            ),
        }
    }

    fn refresh_mask_source(&mut self) {
        let source = &mut self.mask.source;
        if source.bound_name.as_deref() == Some(source.name.as_str()) {
            return;
        }
        if source.name.is_empty() {
            source.capture = None;
            source.texture = None;
            source.bound_name = Some(String::new());
            return;
        }
        match self.sources.find(&source.name) {
            Some(capture) => {
                source.capture = Some(capture);
                source.bound_name = Some(source.name.clone());
            }
            None => log::error!(
                "<filter::blur> [{}] failed to grab source '{}'",
                self.id,
                source.name
            ),
        }
    }

    // ------------------------------------------------------------------
    // Render
    // ------------------------------------------------------------------

    /// Blur `upstream` (and mask it).  Any failure skips the frame.
    pub fn render(&mut self, upstream: &Texture) -> RenderResult {
        if self.pass.is_none() {
            return RenderResult::Skip;
        }

        if !self.source_rendered {
            match self.capture_upstream(upstream) {
                Ok(texture) => self.source_texture = Some(texture),
                Err(e) => {
                    log::error!("<filter::blur> [{}] failed to capture input: {}", self.id, e);
                    return RenderResult::Skip;
                }
            }
            self.source_rendered = true;
        }

        if !self.output_rendered {
            match self.render_output(upstream.size()) {
                Ok(texture) => self.output_texture = Some(texture),
                Err(e) => {
                    log::error!("<filter::blur> [{}] render failed: {}", self.id, e);
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

    fn capture_upstream(&mut self, upstream: &Texture) -> GfxResult<Texture> {
        let (w, h) = upstream.size();
        {
            let mut op = self.source_rt.render(w, h)?;
            op.blit(upstream)?;
        }
        self.source_rt
            .get_texture()
            .ok_or(GfxError::InvalidSize(w, h))
    }

    fn render_output(&mut self, base: (u32, u32)) -> GfxResult<Texture> {
        let source = self
            .source_texture
            .clone()
            .ok_or_else(|| GfxError::Backend("no captured input".into()))?;
        let pass = self
            .pass
            .as_mut()
            .ok_or_else(|| GfxError::Backend("no blur pass".into()))?;
        pass.set_input(source.clone());
        let blurred = pass.render()?;

        if !self.mask.enabled {
            return Ok(blurred);
        }
        self.composite_mask(&source, &blurred, base)
    }

    fn composite_mask(
        &mut self,
        original: &Texture,
        blurred: &Texture,
        base: (u32, u32),
    ) -> GfxResult<Texture> {
        if self.mask.kind == MaskType::Source
            && let Some(capture) = self.mask.source.capture.clone()
        {
            let (w, h) = self.sources.capture_size(capture.as_ref(), base);
            self.mask.source.texture = Some(capture.render(w, h)?);
        }

        let technique = self.mask.technique();
        let effect = self
            .mask_effect
            .as_mut()
            .ok_or_else(|| GfxError::UnknownEffect(names::MASK.to_string()))?;
        apply_mask_parameters(effect, &self.mask, original, blurred);
        {
            let mut op = self.output_rt.render(base.0, base.1)?;
            effect.run(&mut op, technique)?;
        }
        self.output_rt
            .get_texture()
            .ok_or(GfxError::InvalidSize(base.0, base.1))
    }
}
