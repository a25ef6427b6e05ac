// End-to-end runs of the public API on the CPU backend.

use std::sync::Arc;

use broadcastfx::blur::BlurRegistry;
use broadcastfx::encoder::{
    CodecContext, EncoderRegistry, KEY_HOST_RATE_CONTROL, OptionContext, codecs,
};
use broadcastfx::filters::blur::keys as blur_keys;
use broadcastfx::filters::sdf_effects::keys as sdf_keys;
use broadcastfx::filters::{BlurOrchestrator, DistanceFieldPipeline, SourceCatalog};
use broadcastfx::gfx::{GraphicsDevice, Texture, TextureFormat};
use broadcastfx::migration::MIGRATED_VERSION_KEY;
use broadcastfx::{SettingsStore, Version, version};

const SOLID: [f32; 4] = [0.2, 0.5, 0.8, 1.0];

fn solid(device: &GraphicsDevice, w: u32, h: u32) -> Texture {
    let pixels = vec![SOLID; (w * h) as usize];
    device
        .create_texture(w, h, TextureFormat::Rgba8, Some(&pixels))
        .unwrap()
}

fn blur_settings(type_name: &str, subtype: &str, size: f64) -> SettingsStore {
    let mut s = SettingsStore::new();
    BlurOrchestrator::get_defaults(&mut s);
    s.set_string(blur_keys::TYPE, type_name);
    s.set_string(blur_keys::SUBTYPE, subtype);
    s.set_double(blur_keys::SIZE, size);
    s
}

#[test]
fn every_family_leaves_a_solid_frame_unchanged() {
    let device = GraphicsDevice::cpu();
    let registry = Arc::new(BlurRegistry::with_defaults());
    let sources = Arc::new(SourceCatalog::new(24, 16));
    let input = solid(&device, 24, 16);

    for type_name in ["box", "box_linear", "gaussian", "gaussian_linear", "dual_filtering"] {
        let settings = blur_settings(type_name, "area", 2.0);
        let mut filter =
            BlurOrchestrator::new(device.clone(), registry.clone(), sources.clone(), &settings);
        filter.tick();
        let out = filter.render(&input);
        let texture = out.texture().unwrap_or_else(|| panic!("{} skipped", type_name));
        assert_eq!(texture.size(), (24, 16));

        for p in device.read_pixels(texture).unwrap() {
            for c in 0..4 {
                assert!((p[c] - SOLID[c]).abs() < 0.01, "{}: {:?}", type_name, p);
            }
        }
    }
}

#[test]
fn blur_settings_survive_a_save_and_migrate() {
    let mut legacy = SettingsStore::new();
    legacy.set_int(blur_keys::TYPE, 1);
    legacy.set_double(blur_keys::SIZE, 7.0);
    let raw = legacy.to_bytes(Version::ZERO).unwrap();

    let (mut loaded, written_with) = SettingsStore::from_bytes(&raw).unwrap();
    assert_eq!(written_with, Version::ZERO);
    BlurOrchestrator::get_defaults(&mut loaded);
    BlurOrchestrator::migrate(&mut loaded, written_with);
    assert_eq!(loaded.get_string(blur_keys::TYPE), "gaussian");

    let device = GraphicsDevice::cpu();
    let filter = BlurOrchestrator::new(
        device,
        Arc::new(BlurRegistry::with_defaults()),
        Arc::new(SourceCatalog::new(8, 8)),
        &loaded,
    );
    assert_eq!(filter.pass().unwrap().get_size(), 7.0);
}

#[test]
fn sdf_outline_stays_outside_an_opaque_frame_edge() {
    let device = GraphicsDevice::cpu();
    let input = solid(&device, 12, 12);

    let mut s = SettingsStore::new();
    DistanceFieldPipeline::get_defaults(&mut s);
    s.set_bool(sdf_keys::OUTLINE, true);
    let mut sdf = DistanceFieldPipeline::new(device.clone(), &s).unwrap();

    for _ in 0..3 {
        sdf.tick();
        assert!(!sdf.render(&input).is_skip());
    }
    assert_eq!(sdf.distance_field().unwrap().size(), (12, 12));
}

#[test]
fn every_codec_configures_from_defaults() {
    let registry = EncoderRegistry::with_defaults();
    for name in registry.codec_names() {
        let mapper = registry.find(name).unwrap();
        let codec = codecs::find(name).unwrap();
        let mut settings = SettingsStore::new();
        let mut ctx = OptionContext::new(codec);

        mapper.get_defaults(&mut settings);
        mapper.migrate(&mut settings, version::CURRENT, &ctx);
        mapper.update(&mut settings, &mut ctx);
        mapper.override_update(&mut ctx);

        let lines = mapper.log_options(&ctx);
        assert!(!lines.is_empty(), "{}", name);
        assert!(lines.iter().all(|l| l.starts_with(&format!("[{}]", name))));
        assert!(!mapper.visibility(&settings, &ctx).is_empty());
        assert!(ctx.fields().bit_rate > 0);
    }
}

#[test]
fn nvenc_document_from_an_old_release() {
    let registry = EncoderRegistry::with_defaults();
    let mapper = registry.find("hevc_nvenc").unwrap();
    let mut ctx = OptionContext::new(codecs::find("hevc_nvenc").unwrap());

    // 4 was CBR_HQ before 0.11
    let mut settings = SettingsStore::new();
    settings.set_int("RateControl.Mode", 4);
    mapper.get_defaults(&mut settings);
    mapper.migrate(&mut settings, Version::new(0, 10, 0, 0), &ctx);
    let stamp = settings.get_int(MIGRATED_VERSION_KEY);
    mapper.migrate(&mut settings, Version::new(0, 10, 0, 0), &ctx);
    assert_eq!(settings.get_int(MIGRATED_VERSION_KEY), stamp);
    assert_eq!(settings.get_int("RateControl.Mode"), 2);

    mapper.update(&mut settings, &mut ctx);
    assert_eq!(ctx.opt_get_string("rc").unwrap(), "cbr");
    assert_eq!(settings.get_string(KEY_HOST_RATE_CONTROL), "CBR");
}

#[test]
#[ignore = "needs a GPU adapter"]
fn gpu_backend_matches_cpu_on_a_solid_frame() {
    let device = GraphicsDevice::gpu_or_cpu("high performance");
    let settings = blur_settings("gaussian", "area", 4.0);
    let input = solid(&device, 32, 32);
    let mut filter = BlurOrchestrator::new(
        device.clone(),
        Arc::new(BlurRegistry::with_defaults()),
        Arc::new(SourceCatalog::new(32, 32)),
        &settings,
    );
    filter.tick();
    let out = filter.render(&input);
    for p in device.read_pixels(out.texture().unwrap()).unwrap() {
        assert!((p[1] - SOLID[1]).abs() < 0.01, "{:?}", p);
    }
}
