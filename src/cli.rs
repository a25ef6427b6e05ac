// ============================================================================
// BroadcastFX CLI - headless filter rendering and encoder option preview
// ============================================================================
//
// Usage examples:
//   broadcastfx blur -i frame.png -o out.png --type gaussian --size 12
//   broadcastfx blur -i shots/*.png --output-dir blurred/ --mask-region 10 10 10 10
//   broadcastfx sdf -i logo.png --set Filter.SDFEffects.Outline=true --frames 8
//   broadcastfx encoder h264_nvenc --set RateControl.Mode=2 --set RateControl.Limits.Bitrate.Target=6000
//   broadcastfx encoder amf_hevc --settings stream.bfx --migrate-from 0.10.0
//
// Filters render through the same code paths the live pipeline uses.  The
// CPU backend is the default; `--gpu` asks for a wgpu adapter first.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use crate::blur::factory::BlurRegistry;
use crate::encoder::{CodecContext, EncoderRegistry, OptionContext, codecs};
use crate::filters::blur::{self, BlurOrchestrator, MaskType};
use crate::filters::sdf_effects::DistanceFieldPipeline;
use crate::filters::source::{SourceCatalog, TextureSource};
use crate::gfx::{GraphicsDevice, RenderResult, Texture};
use crate::settings::SettingsStore;
use crate::version::{self, Version};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// BroadcastFX headless tools.
#[derive(Parser, Debug)]
#[command(
    name = "broadcastfx",
    about = "Render BroadcastFX filters on still images and preview encoder options",
    long_about = "Run the blur and SDF effect filters on image files without a live\n\
                  pipeline, or show which native options an AMF / NVENC encoder would\n\
                  receive for a settings document.\n\n\
                  Example:\n  \
                  broadcastfx blur -i frame.png -o out.png --type gaussian --size 12\n  \
                  broadcastfx encoder h264_nvenc --set RateControl.Mode=2 --set RateControl.Limits.Bitrate.Target=6000"
)]
pub struct CliArgs {
    /// Render on the GPU when an adapter is available (falls back to CPU).
    #[arg(long, global = true)]
    pub gpu: bool,

    /// wgpu power preference: "high performance" or "low power".
    #[arg(long, global = true, default_value = "high performance", value_name = "PREF")]
    pub power_preference: String,

    /// Debug-level logging and per-file timing information.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Blur images, optionally through a region, image or source mask.
    Blur(BlurArgs),
    /// Draw distance-field shadows, glows and outlines around image alpha.
    Sdf(SdfArgs),
    /// Print the native options an encoder would be configured with.
    Encoder(EncoderArgs),
}

/// Inputs, outputs and settings shared by the filter commands.
#[derive(Args, Debug)]
pub struct ImageArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Settings document to start from.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Raw `key=value` setting, applied after --settings.  Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub assignments: Vec<String>,

    /// Write the effective settings document here after applying everything.
    #[arg(long, value_name = "FILE")]
    pub save_settings: Option<PathBuf>,

    /// Publish an image as a named source (`name=path`).  Repeatable.
    #[arg(long = "source", value_name = "NAME=PATH")]
    pub sources: Vec<String>,

    /// Frames to render before the output is read back.
    #[arg(long, default_value_t = 1, value_name = "N")]
    pub frames: u32,
}

#[derive(Args, Debug)]
pub struct BlurArgs {
    #[command(flatten)]
    pub common: ImageArgs,

    /// Blur family: box, box_linear, gaussian, gaussian_linear, dual_filtering.
    #[arg(long = "type", value_name = "TYPE")]
    pub blur_type: Option<String>,

    /// Variant: area, directional, rotational, zoom.
    #[arg(long, value_name = "SUBTYPE")]
    pub subtype: Option<String>,

    /// Blur size in pixels.
    #[arg(long)]
    pub size: Option<f64>,

    /// Angle in degrees (directional, rotational).
    #[arg(long)]
    pub angle: Option<f64>,

    /// Centre in percent of the frame (rotational, zoom).
    #[arg(long, num_args = 2, value_names = ["X", "Y"])]
    pub center: Option<Vec<f64>>,

    /// Per-axis step scale in percent; enables step scaling.
    #[arg(long, num_args = 2, value_names = ["X", "Y"])]
    pub step_scale: Option<Vec<f64>>,

    /// Keep the borders sharp; edges in percent of the frame.
    #[arg(long, num_args = 4, value_names = ["LEFT", "TOP", "RIGHT", "BOTTOM"])]
    pub mask_region: Option<Vec<f64>>,

    /// Region feather width in percent.
    #[arg(long, value_name = "PERCENT")]
    pub mask_feather: Option<f64>,

    /// Blur outside the region instead of inside it.
    #[arg(long)]
    pub mask_invert: bool,

    /// Use an image file as the mask.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["mask_region", "mask_source"])]
    pub mask_image: Option<PathBuf>,

    /// Use a published source (see --source) as the mask.
    #[arg(long, value_name = "NAME", conflicts_with = "mask_region")]
    pub mask_source: Option<String>,
}

#[derive(Args, Debug)]
pub struct SdfArgs {
    #[command(flatten)]
    pub common: ImageArgs,

    /// Field resolution in percent of the input.
    #[arg(long, value_name = "PERCENT")]
    pub scale: Option<f64>,

    /// Alpha threshold of the edge in percent.
    #[arg(long, value_name = "PERCENT")]
    pub threshold: Option<f64>,
}

#[derive(Args, Debug)]
pub struct EncoderArgs {
    /// Codec name: amf_h264, amf_hevc, h264_nvenc, hevc_nvenc.
    pub codec: String,

    /// Settings document to start from.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Raw `key=value` setting, applied after migration.  Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub assignments: Vec<String>,

    /// Treat the document as written by this version (defaults to the
    /// version stored in --settings, or the current one).
    #[arg(long, value_name = "VERSION")]
    pub migrate_from: Option<Version>,

    /// Apply the settings to a running encoder (runtime-safe options only).
    #[arg(long)]
    pub running: bool,

    /// Show which properties are visible for these settings.
    #[arg(long)]
    pub visibility: bool,

    /// Write the migrated settings document here.
    #[arg(long, value_name = "FILE")]
    pub save_settings: Option<PathBuf>,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the selected command and return an OS exit code.
/// `0` = success, `1` = bad arguments or one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let device = || {
        if args.gpu {
            GraphicsDevice::gpu_or_cpu(&args.power_preference)
        } else {
            GraphicsDevice::cpu()
        }
    };

    match &args.command {
        Command::Blur(blur_args) => run_images(&blur_args.common, args.verbose, device(), |d, s, c| {
            build_blur(blur_args, d, s, c)
        }),
        Command::Sdf(sdf_args) => run_images(&sdf_args.common, args.verbose, device(), |d, s, _| {
            build_sdf(sdf_args, d, s)
        }),
        Command::Encoder(encoder_args) => run_encoder(encoder_args),
    }
}

// ============================================================================
// Filter commands
// ============================================================================

/// A filter instance the image loop can drive.
enum Filter {
    Blur(BlurOrchestrator),
    Sdf(DistanceFieldPipeline),
}

impl Filter {
    fn tick(&mut self) {
        match self {
            Filter::Blur(f) => f.tick(),
            Filter::Sdf(f) => f.tick(),
        }
    }

    fn render(&mut self, upstream: &Texture) -> RenderResult {
        match self {
            Filter::Blur(f) => f.render(upstream),
            Filter::Sdf(f) => f.render(upstream),
        }
    }
}

fn build_blur(
    args: &BlurArgs,
    device: &GraphicsDevice,
    settings: &mut SettingsStore,
    sources: Arc<SourceCatalog>,
) -> Result<Filter, String> {
    BlurOrchestrator::get_defaults(settings);
    apply_blur_flags(args, settings);
    Ok(Filter::Blur(BlurOrchestrator::new(
        device.clone(),
        Arc::new(BlurRegistry::with_defaults()),
        sources,
        settings,
    )))
}

fn build_sdf(args: &SdfArgs, device: &GraphicsDevice, settings: &mut SettingsStore) -> Result<Filter, String> {
    use crate::filters::sdf_effects::keys;

    DistanceFieldPipeline::get_defaults(settings);
    if let Some(v) = args.scale {
        settings.set_double(keys::SDF_SCALE, v);
    }
    if let Some(v) = args.threshold {
        settings.set_double(keys::SDF_THRESHOLD, v);
    }
    DistanceFieldPipeline::new(device.clone(), settings)
        .map(Filter::Sdf)
        .map_err(|e| format!("SDF pipeline: {}", e))
}

/// Typed flags win over --settings and --set.
fn apply_blur_flags(args: &BlurArgs, settings: &mut SettingsStore) {
    use blur::keys;

    if let Some(v) = &args.blur_type {
        settings.set_string(keys::TYPE, v);
    }
    if let Some(v) = &args.subtype {
        settings.set_string(keys::SUBTYPE, v);
    }
    if let Some(v) = args.size {
        settings.set_double(keys::SIZE, v);
    }
    if let Some(v) = args.angle {
        settings.set_double(keys::ANGLE, v);
    }
    if let Some([x, y]) = args.center.as_deref().and_then(|c| <[f64; 2]>::try_from(c).ok()) {
        settings.set_double(keys::CENTER_X, x);
        settings.set_double(keys::CENTER_Y, y);
    }
    if let Some([x, y]) = args.step_scale.as_deref().and_then(|c| <[f64; 2]>::try_from(c).ok()) {
        settings.set_bool(keys::STEP_SCALE, true);
        settings.set_double(keys::STEP_SCALE_X, x);
        settings.set_double(keys::STEP_SCALE_Y, y);
    }

    if let Some([l, t, r, b]) = args.mask_region.as_deref().and_then(|c| <[f64; 4]>::try_from(c).ok()) {
        settings.set_bool(keys::MASK, true);
        settings.set_int(keys::MASK_TYPE, MaskType::Region.to_int());
        settings.set_double(keys::MASK_REGION_LEFT, l);
        settings.set_double(keys::MASK_REGION_TOP, t);
        settings.set_double(keys::MASK_REGION_RIGHT, r);
        settings.set_double(keys::MASK_REGION_BOTTOM, b);
    }
    if let Some(v) = args.mask_feather {
        settings.set_double(keys::MASK_REGION_FEATHER, v);
    }
    if args.mask_invert {
        settings.set_bool(keys::MASK_REGION_INVERT, true);
    }
    if let Some(path) = &args.mask_image {
        settings.set_bool(keys::MASK, true);
        settings.set_int(keys::MASK_TYPE, MaskType::Image.to_int());
        settings.set_string(keys::MASK_IMAGE, &path.to_string_lossy());
    }
    if let Some(name) = &args.mask_source {
        settings.set_bool(keys::MASK, true);
        settings.set_int(keys::MASK_TYPE, MaskType::Source.to_int());
        settings.set_string(keys::MASK_SOURCE, name);
    }
}

/// Shared per-file loop of the filter commands.
fn run_images<F>(args: &ImageArgs, verbose: bool, device: GraphicsDevice, build: F) -> ExitCode
where
    F: Fn(&GraphicsDevice, &mut SettingsStore, Arc<SourceCatalog>) -> Result<Filter, String>,
{
    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    // Multiple inputs require --output-dir, not --output
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let mut settings = match load_settings(args.settings.as_deref(), &args.assignments) {
        Ok((settings, _)) => settings,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    if verbose {
        println!("backend: {}", device.backend_name());
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, args, &device, &mut settings, &build) {
            Ok(()) => {
                if verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if let Some(path) = &args.save_settings
        && let Err(e) = settings.save(path, version::CURRENT)
    {
        eprintln!("error: could not write settings '{}': {}", path.display(), e);
        any_failure = true;
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn run_one<F>(
    input: &Path,
    output: &Path,
    args: &ImageArgs,
    device: &GraphicsDevice,
    settings: &mut SettingsStore,
    build: &F,
) -> Result<(), String>
where
    F: Fn(&GraphicsDevice, &mut SettingsStore, Arc<SourceCatalog>) -> Result<Filter, String>,
{
    // -- Step 1: Load ----------------------------------------------------
    let upstream = device
        .load_texture(input)
        .map_err(|e| format!("load failed: {}", e))?;

    // -- Step 2: Filter --------------------------------------------------
    let (w, h) = upstream.size();
    let sources = Arc::new(build_sources(device, &args.sources, w, h)?);
    let mut filter = build(device, settings, sources)?;

    let mut result = RenderResult::Skip;
    for _ in 0..args.frames.max(1) {
        filter.tick();
        result = filter.render(&upstream);
    }

    // A skipped frame passes the input through unchanged
    let texture = match &result {
        RenderResult::Rendered(texture) => texture,
        RenderResult::Skip => {
            log::warn!("<cli> filter skipped '{}', writing input unchanged", input.display());
            &upstream
        }
    };

    // -- Step 3: Save ----------------------------------------------------
    let image = device
        .read_image(texture)
        .map_err(|e| format!("read-back failed: {}", e))?;
    image
        .save(output)
        .map_err(|e| format!("save failed: {}", e))
}

/// Register every `--source name=path` image in a fresh catalog sized to the
/// frame being rendered.
fn build_sources(
    device: &GraphicsDevice,
    entries: &[String],
    width: u32,
    height: u32,
) -> Result<SourceCatalog, String> {
    let mut catalog = SourceCatalog::new(width, height);
    for entry in entries {
        let (name, path) = entry
            .split_once('=')
            .ok_or_else(|| format!("--source expects name=path, got '{}'", entry))?;
        let texture = device
            .load_texture(Path::new(path))
            .map_err(|e| format!("source '{}': {}", name, e))?;
        catalog.register(Arc::new(TextureSource::new(device, name, texture)));
    }
    Ok(catalog)
}

// ============================================================================
// Encoder command
// ============================================================================

fn run_encoder(args: &EncoderArgs) -> ExitCode {
    let registry = EncoderRegistry::with_defaults();
    let mapper = match registry.find(&args.codec) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("known codecs: {}", registry.codec_names().join(", "));
            return ExitCode::FAILURE;
        }
    };
    let Some(codec) = codecs::find(&args.codec) else {
        eprintln!("error: no option table for '{}'", args.codec);
        return ExitCode::FAILURE;
    };

    // --set is applied after migration so overrides are never rewritten
    let (mut settings, stored_version) = match load_settings(args.settings.as_deref(), &[]) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut context = OptionContext::new(codec);

    mapper.get_defaults(&mut settings);
    let from = args.migrate_from.or(stored_version).unwrap_or(version::CURRENT);
    mapper.migrate(&mut settings, from, &context);
    for assignment in &args.assignments {
        if let Err(e) = settings.apply_assignment(assignment) {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if args.running {
        context.open();
    }
    mapper.update(&mut settings, &mut context);
    mapper.override_update(&mut context);

    println!(
        "{} ({:?} runtime {})",
        codec.name,
        mapper.family(),
        if mapper.is_available() { "available" } else { "not found" }
    );
    for line in mapper.log_options(&context) {
        println!("{}", line);
    }

    println!("changed options:");
    for (name, value) in context.changed_options() {
        println!("  {} = {}", name, value);
    }
    let fields = context.fields();
    println!(
        "fields: bitrate={} maxrate={} bufsize={} qmin={} qmax={} refs={} bf={} delay={}",
        fields.bit_rate,
        fields.rc_max_rate,
        fields.rc_buffer_size,
        fields.qmin,
        fields.qmax,
        fields.refs,
        fields.max_b_frames,
        fields.delay
    );

    if args.visibility {
        println!("visible properties:");
        for (key, visible) in mapper.visibility(&settings, &context) {
            println!("  {:<48} {}", key, if visible { "shown" } else { "hidden" });
        }
    }

    if let Some(path) = &args.save_settings
        && let Err(e) = settings.save(path, version::CURRENT)
    {
        eprintln!("error: could not write settings '{}': {}", path.display(), e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

// ============================================================================
// Helpers
// ============================================================================

/// Load `path` (if any) and apply `assignments` on top.  Returns the version
/// the document was written with.
fn load_settings(
    path: Option<&Path>,
    assignments: &[String],
) -> Result<(SettingsStore, Option<Version>), String> {
    let (mut settings, version) = match path {
        Some(p) => {
            let (s, v) = SettingsStore::load(p)
                .map_err(|e| format!("could not read settings '{}': {}", p.display(), e))?;
            (s, Some(v))
        }
        None => (SettingsStore::new(), None),
    };
    for assignment in assignments {
        settings.apply_assignment(assignment).map_err(|e| e.to_string())?;
    }
    Ok((settings, version))
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, keeps the input file name)
/// 3. Fallback: next to the input with `_fx` appended to the stem
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_fx.{}", stem, ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_priority() {
        let input = Path::new("shots/frame.jpg");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), Some(Path::new("out"))),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out"))),
            Some(PathBuf::from("out/frame.jpg"))
        );
        assert_eq!(
            build_output_path(input, None, None),
            Some(PathBuf::from("shots/frame_fx.jpg"))
        );
    }

    #[test]
    fn parses_encoder_command() {
        let args = CliArgs::try_parse_from([
            "broadcastfx",
            "encoder",
            "h264_nvenc",
            "--set",
            "RateControl.Mode=2",
            "--migrate-from",
            "0.10",
        ])
        .unwrap();
        let Command::Encoder(enc) = args.command else {
            panic!("expected encoder command");
        };
        assert_eq!(enc.codec, "h264_nvenc");
        assert_eq!(enc.assignments, vec!["RateControl.Mode=2".to_string()]);
        assert_eq!(enc.migrate_from, Some(Version::new(0, 10, 0, 0)));
    }

    #[test]
    fn blur_flags_become_settings() {
        let args = CliArgs::try_parse_from([
            "broadcastfx",
            "blur",
            "-i",
            "a.png",
            "--type",
            "gaussian",
            "--center",
            "25",
            "75",
            "--mask-region",
            "1",
            "2",
            "3",
            "4",
        ])
        .unwrap();
        let Command::Blur(blur_args) = args.command else {
            panic!("expected blur command");
        };
        let mut settings = SettingsStore::new();
        BlurOrchestrator::get_defaults(&mut settings);
        apply_blur_flags(&blur_args, &mut settings);

        assert_eq!(settings.get_string(blur::keys::TYPE), "gaussian");
        assert_eq!(settings.get_double(blur::keys::CENTER_Y), 75.0);
        assert!(settings.get_bool(blur::keys::MASK));
        assert_eq!(settings.get_double(blur::keys::MASK_REGION_RIGHT), 3.0);
        assert!(!settings.get_bool(blur::keys::STEP_SCALE));
    }

    #[test]
    fn mask_image_conflicts_with_region() {
        let parsed = CliArgs::try_parse_from([
            "broadcastfx",
            "blur",
            "-i",
            "a.png",
            "--mask-image",
            "m.png",
            "--mask-region",
            "1",
            "2",
            "3",
            "4",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn settings_assignments_are_typed() {
        let (settings, version) =
            load_settings(None, &["Bitrate=6000".to_string(), "Preset=p7".to_string()]).unwrap();
        assert_eq!(version, None);
        assert_eq!(settings.get_int("Bitrate"), 6000);
        assert_eq!(settings.get_string("Preset"), "p7");
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("broadcastfx-cli-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn blurring_a_solid_image_keeps_its_colour() {
        let dir = scratch_dir();
        let input = dir.join("solid.png");
        image::RgbaImage::from_pixel(16, 8, image::Rgba([40, 120, 200, 255]))
            .save(&input)
            .unwrap();

        let args = CliArgs::try_parse_from([
            "broadcastfx",
            "blur",
            "-i",
            input.to_str().unwrap(),
            "--type",
            "gaussian",
            "--size",
            "3",
        ])
        .unwrap();
        let _ = run(args);

        let out = image::open(dir.join("solid_fx.png")).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (16, 8));
        for p in out.pixels() {
            for (got, want) in p.0.iter().zip([40u8, 120, 200, 255]) {
                assert!(got.abs_diff(want) <= 1, "{:?}", p);
            }
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn encoder_command_migrates_and_saves() {
        let dir = scratch_dir();
        let before = dir.join("old.bfx");
        let after = dir.join("new.bfx");

        let mut old = SettingsStore::new();
        old.set_int("RateControl.Bitrate.Maximum", 9000);
        old.save(&before, Version::new(0, 7, 0, 0)).unwrap();

        let args = CliArgs::try_parse_from([
            "broadcastfx",
            "encoder",
            "h264_nvenc",
            "--settings",
            before.to_str().unwrap(),
            "--save-settings",
            after.to_str().unwrap(),
        ])
        .unwrap();
        let _ = run(args);

        let (saved, version) = SettingsStore::load(&after).unwrap();
        assert_eq!(version, version::CURRENT);
        assert!(!saved.has_user_value("RateControl.Bitrate.Maximum"));
        assert_eq!(saved.get_int("RateControl.Limits.Bitrate.Maximum"), 9000);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
