// ============================================================================
// NVIDIA NVENC - settings → h264_nvenc / hevc_nvenc options
// ============================================================================
//
// Most options can only be chosen before the encoder opens.  Once it runs,
// only the bitrate limits are re-applied, and `rc` is passed numerically.

use super::context::{CodecContext, EncoderFamily};
use super::ratecontrol::NvencRateControl;
use super::tools::OptionLog;
use super::{
    check, library_available, EncoderOptionMapper, PropertyStates, KEY_HOST_BITRATE,
    KEY_HOST_RATE_CONTROL,
};
use crate::migration::{MigrationPlan, MigrationStep, Threshold, MIGRATED_VERSION_KEY};
use crate::settings::{tristate, SettingsStore};
use crate::version::Version;

const COMPONENT: &str = "encoder::nvenc";

pub mod keys {
    pub const PRESET: &str = "Preset";
    pub const TUNE: &str = "Tune";
    pub const RC: &str = "RateControl";
    pub const RC_MODE: &str = "RateControl.Mode";
    pub const RC_TWO_PASS: &str = "RateControl.TwoPass";
    pub const RC_MULTI_PASS: &str = "RateControl.MultiPass";
    pub const RC_LOOKAHEAD: &str = "RateControl.LookAhead";
    pub const RC_ADAPTIVE_I: &str = "RateControl.AdaptiveI";
    pub const RC_ADAPTIVE_B: &str = "RateControl.AdaptiveB";
    pub const LIMITS: &str = "RateControl.Limits";
    pub const LIMITS_BUFFER_SIZE: &str = "RateControl.Limits.BufferSize";
    pub const LIMITS_QUALITY: &str = "RateControl.Limits.Quality";
    pub const LIMITS_BITRATE_TARGET: &str = "RateControl.Limits.Bitrate.Target";
    pub const LIMITS_BITRATE_MAXIMUM: &str = "RateControl.Limits.Bitrate.Maximum";
    pub const QP: &str = "RateControl.QP";
    pub const QP_MINIMUM: &str = "RateControl.Quality.Minimum";
    pub const QP_MAXIMUM: &str = "RateControl.Quality.Maximum";
    pub const QP_I: &str = "RateControl.QP.I";
    pub const QP_P: &str = "RateControl.QP.P";
    pub const QP_B: &str = "RateControl.QP.B";
    pub const AQ: &str = "AQ";
    pub const AQ_SPATIAL: &str = "AQ.Spatial";
    pub const AQ_TEMPORAL: &str = "AQ.Temporal";
    pub const AQ_STRENGTH: &str = "AQ.Strength";
    pub const OTHER: &str = "Other";
    pub const OTHER_B_FRAMES: &str = "Other.BFrames";
    pub const OTHER_B_FRAME_REFERENCE_MODE: &str = "Other.BFrameReferenceMode";
    pub const OTHER_ZERO_LATENCY: &str = "Other.ZeroLatency";
    pub const OTHER_WEIGHTED_PREDICTION: &str = "Other.WeightedPrediction";
    pub const OTHER_NON_REFERENCE_P_FRAMES: &str = "Other.NonReferencePFrames";
    pub const OTHER_REFERENCE_FRAMES: &str = "Other.ReferenceFrames";
    pub const OTHER_LOW_DELAY_KEY_FRAME_SCALE: &str = "Other.LowDelayKeyFrameScale";

    // Layouts before 0.8
    pub const LEGACY_BITRATE_TARGET: &str = "RateControl.Bitrate.Target";
    pub const LEGACY_BITRATE_MAXIMUM: &str = "RateControl.Bitrate.Maximum";
    pub const LEGACY_BUFFER_SIZE: &str = "RateControl.BufferSize";
    pub const LEGACY_QUALITY_TARGET: &str = "RateControl.Quality.Target";
    // Removed in 0.11
    pub const LEGACY_ACCESS_UNIT_DELIMITER: &str = "Other.AccessUnitDelimiter";
    pub const LEGACY_DECODED_PICTURE_BUFFER_SIZE: &str = "Other.DecodedPictureBufferSize";
}

#[cfg(all(windows, target_pointer_width = "64"))]
const RUNTIME_LIBRARY: &str = "nvEncodeAPI64.dll";
#[cfg(all(windows, not(target_pointer_width = "64")))]
const RUNTIME_LIBRARY: &str = "nvEncodeAPI.dll";
#[cfg(not(windows))]
const RUNTIME_LIBRARY: &str = "libnvidia-encode.so.1";

/// Name of the unit constant `value` of `option`, if the library has one.
fn unit_name(ctx: &dyn CodecContext, option: &str, value: i64) -> Option<&'static str> {
    ctx.opt_unit(option)
        .and_then(|unit| ctx.name_from_unit_value(unit, value))
}

// ============================================================================
// Migration
// ============================================================================

/// Stored `RateControl.Mode` values of the 0.10 layout.
mod legacy_mode {
    pub const VBR_HQ: i64 = 2;
    pub const CBR_HQ: i64 = 4;
    pub const CBR_LD_HQ: i64 = 5;
}

fn copy_unset_int(settings: &mut SettingsStore, from: &str, to: &str) {
    if from != to && settings.has_user_value(from) {
        let v = settings.get_int(from);
        settings.set_int(to, v);
        settings.unset(from);
    }
}

fn copy_unset_double(settings: &mut SettingsStore, from: &str, to: &str) {
    if from != to && settings.has_user_value(from) {
        let v = settings.get_double(from);
        settings.set_double(to, v);
        settings.unset(from);
    }
}

fn move_limits(settings: &mut SettingsStore) {
    copy_unset_int(settings, keys::LEGACY_BITRATE_TARGET, keys::LIMITS_BITRATE_TARGET);
    copy_unset_int(settings, keys::LEGACY_BITRATE_MAXIMUM, keys::LIMITS_BITRATE_MAXIMUM);
    copy_unset_int(settings, keys::LEGACY_BUFFER_SIZE, keys::LIMITS_BUFFER_SIZE);
    copy_unset_double(settings, keys::LEGACY_QUALITY_TARGET, keys::LIMITS_QUALITY);
}

fn drop_removed_options(settings: &mut SettingsStore) {
    settings.unset(keys::LEGACY_ACCESS_UNIT_DELIMITER);
    settings.unset(keys::LEGACY_DECODED_PICTURE_BUFFER_SIZE);
}

fn high_quality_passes(settings: &mut SettingsStore, mode: NvencRateControl) {
    let mode = match mode {
        NvencRateControl::Cbr => 2,
        _ => 1,
    };
    settings.set_int(keys::RC_MODE, mode);
    settings.set_int(keys::RC_TWO_PASS, tristate::ENABLED);
    settings.set_int(keys::RC_MULTI_PASS, 1);
}

fn vbr_hq(settings: &mut SettingsStore) {
    high_quality_passes(settings, NvencRateControl::Vbr);
}

fn cbr_hq(settings: &mut SettingsStore) {
    high_quality_passes(settings, NvencRateControl::Cbr);
}

fn cbr_ld_hq(settings: &mut SettingsStore) {
    settings.set_int(keys::OTHER_LOW_DELAY_KEY_FRAME_SCALE, 1);
    cbr_hq(settings);
}

/// The HQ modes became plain modes with multi-pass, and the quality target
/// moved from a percentage to the 0..51 CQ scale.
fn split_hq_modes(settings: &mut SettingsStore) {
    match settings.get_int(keys::RC_MODE) {
        legacy_mode::VBR_HQ => vbr_hq(settings),
        legacy_mode::CBR_HQ => cbr_hq(settings),
        legacy_mode::CBR_LD_HQ => cbr_ld_hq(settings),
        _ => {}
    }

    let quality = settings.get_double(keys::LIMITS_QUALITY);
    if quality > 0.0 {
        settings.set_double(keys::LIMITS_QUALITY, quality / 100.0 * 51.0);
    }
}

static MIGRATIONS: MigrationPlan = MigrationPlan {
    component: COMPONENT,
    stamp_key: MIGRATED_VERSION_KEY,
    steps: &[
        MigrationStep {
            name: "move bitrate and quality into RateControl.Limits",
            threshold: Threshold::AtOrBelow(Version::new(0, 8, 0, 0)),
            apply: move_limits,
        },
        MigrationStep {
            name: "drop removed options",
            threshold: Threshold::Below(Version::new(0, 11, 0, 0)),
            apply: drop_removed_options,
        },
        MigrationStep {
            name: "split HQ rate control modes",
            threshold: Threshold::Below(Version::new(0, 11, 1, 0)),
            apply: split_hq_modes,
        },
    ],
};

// ============================================================================
// NvencMapper
// ============================================================================

pub struct NvencMapper;

impl NvencMapper {
    fn set(&self, ctx: &mut dyn CodecContext, option: &str, value: i64) {
        let codec = ctx.codec().name;
        check(COMPONENT, codec, ctx.opt_set_int(option, value));
    }

    fn update_preset(&self, settings: &SettingsStore, ctx: &mut dyn CodecContext) {
        let codec = ctx.codec().name;

        let preset = settings.get_int(keys::PRESET);
        if preset != -1 {
            match unit_name(ctx, "preset", preset) {
                Some(name) => check(COMPONENT, codec, ctx.opt_set("preset", name)),
                None => self.set(ctx, "preset", preset),
            }
        }

        let tune = settings.get_int(keys::TUNE);
        if tune > -1 && ctx.opt_exists("tune") {
            self.set(ctx, "tune", tune);
        }
    }

    fn update_rate_control(&self, settings: &mut SettingsStore, ctx: &mut dyn CodecContext) {
        let codec = ctx.codec();
        let open = ctx.is_open();

        let value = settings.get_int(keys::RC_MODE);
        let name = unit_name(ctx, "rc", value);
        if value != -1 {
            match name {
                Some(name) if !open => check(COMPONENT, codec.name, ctx.opt_set("rc", name)),
                _ => self.set(ctx, "rc", value),
            }
        }

        let mode = NvencRateControl::from_option_name(name);
        let fields = mode.active_fields();
        if !open {
            self.set(ctx, "cbr", (mode == NvencRateControl::Cbr) as i64);
        }
        if let Some(host_name) = mode.host_name() {
            settings.set_string(KEY_HOST_RATE_CONTROL, host_name);
        }

        if !open {
            if ctx.opt_exists("multipass") {
                let passes = settings.get_int(keys::RC_MULTI_PASS);
                if passes > -1 {
                    self.set(ctx, "multipass", passes);
                    self.set(ctx, "2pass", 0);
                }
            } else {
                let two_pass = settings.get_int(keys::RC_TWO_PASS);
                if two_pass > -1 {
                    self.set(ctx, "2pass", (two_pass != 0) as i64);
                }
            }

            let la = settings.get_int(keys::RC_LOOKAHEAD);
            if tristate::is_set(la) {
                self.set(ctx, "rc-lookahead", la);
            }

            // `no-scenecut` is the negation of adaptive I-frames.
            let adaptive_i = settings.get_int(keys::RC_ADAPTIVE_I);
            if tristate::is_set(adaptive_i) && la != 0 {
                self.set(ctx, "no-scenecut", 1 - adaptive_i);
            }

            if codec.caps.adaptive_b {
                let adaptive_b = settings.get_int(keys::RC_ADAPTIVE_B);
                if tristate::is_set(adaptive_b) && la != 0 {
                    self.set(ctx, "b_adapt", adaptive_b);
                }
            }
        }

        if fields.bitrate {
            let mut v = settings.get_int(keys::LIMITS_BITRATE_TARGET);

            // The host may cap the bitrate.
            let cap = settings.get_int(KEY_HOST_BITRATE);
            if cap != settings.get_default_int(KEY_HOST_BITRATE) {
                v = v.min(cap).max(-1);
            }

            if v > -1 {
                ctx.fields_mut().bit_rate = v * 1000;
            }
        } else {
            ctx.fields_mut().bit_rate = 0;
        }

        let maximum = settings.get_int(keys::LIMITS_BITRATE_MAXIMUM);
        let f = ctx.fields_mut();
        if fields.bitrate_range {
            f.rc_max_rate = if maximum > -1 { maximum * 1000 } else { f.bit_rate };
            f.rc_min_rate = f.bit_rate;
        } else {
            f.rc_min_rate = f.bit_rate;
            f.rc_max_rate = f.bit_rate;
        }
        settings.set_int(KEY_HOST_BITRATE, f.rc_max_rate);

        if fields.bitrate || fields.bitrate_range {
            let v = settings.get_int(keys::LIMITS_BUFFER_SIZE);
            if v > -1 {
                f.rc_buffer_size = v * 1000;
            }
        } else {
            f.rc_buffer_size = 0;
        }

        if open {
            return;
        }

        if fields.qp_limits {
            let qmin = settings.get_int(keys::QP_MINIMUM);
            let qmax = settings.get_int(keys::QP_MAXIMUM);
            let f = ctx.fields_mut();
            if qmin > -1 {
                f.qmin = qmin;
            }
            if qmax > -1 {
                f.qmax = qmax;
            }
        } else {
            let f = ctx.fields_mut();
            f.qmin = -1;
            f.qmax = -1;
        }

        if fields.quality {
            let cq = settings.get_double(keys::LIMITS_QUALITY);
            if cq > 0.0 {
                check(COMPONENT, codec.name, ctx.opt_set_double("cq", cq));
            }
        } else {
            check(COMPONENT, codec.name, ctx.opt_set_double("cq", 0.0));
        }

        if fields.qp {
            for (key, option) in [
                (keys::QP_I, "init_qpI"),
                (keys::QP_P, "init_qpP"),
                (keys::QP_B, "init_qpB"),
            ] {
                let qp = settings.get_int(key);
                if qp > -1 {
                    self.set(ctx, option, qp);
                }
            }
        }
    }

    fn update_aq(&self, settings: &SettingsStore, ctx: &mut dyn CodecContext) {
        let caps = ctx.codec().caps;
        let spatial = settings.get_int(keys::AQ_SPATIAL);
        let temporal = settings.get_int(keys::AQ_TEMPORAL);

        if tristate::is_set(spatial) {
            self.set(ctx, caps.spatial_aq_option, spatial);
        }
        if tristate::is_set(temporal) {
            self.set(ctx, caps.temporal_aq_option, temporal);
        }
        if tristate::is_enabled(spatial) {
            let strength = settings.get_int(keys::AQ_STRENGTH);
            if strength > -1 {
                self.set(ctx, "aq-strength", strength);
            }
        }
    }

    fn update_other(&self, settings: &SettingsStore, ctx: &mut dyn CodecContext) {
        let codec = ctx.codec().name;

        let bf = settings.get_int(keys::OTHER_B_FRAMES);
        if bf > -1 {
            self.set(ctx, "bf", bf);
        }

        for (key, option) in [
            (keys::OTHER_ZERO_LATENCY, "zerolatency"),
            (keys::OTHER_NON_REFERENCE_P_FRAMES, "nonref_p"),
        ] {
            let v = settings.get_int(key);
            if tristate::is_set(v) {
                self.set(ctx, option, v);
            }
        }

        let refs = settings.get_int(keys::OTHER_REFERENCE_FRAMES);
        if refs > -1 {
            self.set(ctx, "refs", refs);
        }

        let wp = settings.get_int(keys::OTHER_WEIGHTED_PREDICTION);
        if ctx.fields().max_b_frames > 0 && tristate::is_enabled(wp) {
            log::warn!(
                "<{}> [{}] Weighted Prediction disabled because of B-Frames being used.",
                COMPONENT,
                codec
            );
            self.set(ctx, "weighted_pred", 0);
        } else if tristate::is_set(wp) {
            self.set(ctx, "weighted_pred", wp);
        }

        let b_ref_mode = settings.get_int(keys::OTHER_B_FRAME_REFERENCE_MODE);
        if b_ref_mode > -1 {
            self.set(ctx, "b_ref_mode", b_ref_mode);
        }

        let ldkfs = settings.get_int(keys::OTHER_LOW_DELAY_KEY_FRAME_SCALE);
        if ldkfs > -1 && ctx.opt_exists("ldkfs") {
            self.set(ctx, "ldkfs", ldkfs);
        }
    }
}

impl EncoderOptionMapper for NvencMapper {
    fn family(&self) -> EncoderFamily {
        EncoderFamily::Nvenc
    }

    fn is_available(&self) -> bool {
        library_available(RUNTIME_LIBRARY)
    }

    fn get_defaults(&self, settings: &mut SettingsStore) {
        for key in [
            keys::PRESET,
            keys::TUNE,
            keys::RC_MODE,
            keys::RC_TWO_PASS,
            keys::RC_MULTI_PASS,
            keys::RC_LOOKAHEAD,
            keys::RC_ADAPTIVE_I,
            keys::RC_ADAPTIVE_B,
            keys::QP_MINIMUM,
            keys::QP_MAXIMUM,
            keys::QP_I,
            keys::QP_P,
            keys::QP_B,
            keys::AQ_SPATIAL,
            keys::AQ_STRENGTH,
            keys::AQ_TEMPORAL,
            keys::OTHER_B_FRAMES,
            keys::OTHER_B_FRAME_REFERENCE_MODE,
            keys::OTHER_ZERO_LATENCY,
            keys::OTHER_WEIGHTED_PREDICTION,
            keys::OTHER_NON_REFERENCE_P_FRAMES,
            keys::OTHER_REFERENCE_FRAMES,
            keys::OTHER_LOW_DELAY_KEY_FRAME_SCALE,
        ] {
            settings.set_default_int(key, -1);
        }

        settings.set_default_int(keys::LIMITS_BITRATE_TARGET, 6000);
        settings.set_default_int(keys::LIMITS_BITRATE_MAXIMUM, 0);
        settings.set_default_int(keys::LIMITS_BUFFER_SIZE, 0);
        settings.set_default_double(keys::LIMITS_QUALITY, 0.0);

        settings.set_default_int(KEY_HOST_BITRATE, 0);
    }

    fn visibility(&self, settings: &SettingsStore, ctx: &dyn CodecContext) -> PropertyStates {
        let fields = NvencRateControl::from_int(settings.get_int(keys::RC_MODE)).active_fields();
        let multipass = ctx.opt_exists("multipass");
        let caps = ctx.codec().caps;

        PropertyStates::from([
            (keys::TUNE, ctx.opt_exists("tune")),
            (keys::RC_MULTI_PASS, multipass),
            (keys::RC_TWO_PASS, !multipass),
            (keys::RC_ADAPTIVE_B, caps.adaptive_b),
            (keys::LIMITS, fields.bitrate || fields.quality),
            (keys::LIMITS_BUFFER_SIZE, fields.bitrate),
            (keys::LIMITS_QUALITY, fields.quality),
            (keys::LIMITS_BITRATE_TARGET, fields.bitrate),
            (keys::LIMITS_BITRATE_MAXIMUM, fields.bitrate_range),
            (keys::QP, fields.qp || fields.qp_limits),
            (keys::QP_MINIMUM, fields.qp_limits),
            (keys::QP_MAXIMUM, fields.qp_limits),
            (keys::QP_I, fields.qp),
            (keys::QP_P, fields.qp),
            (keys::QP_B, fields.qp),
            (
                keys::AQ_STRENGTH,
                tristate::is_enabled(settings.get_int(keys::AQ_SPATIAL)),
            ),
            (keys::OTHER_LOW_DELAY_KEY_FRAME_SCALE, ctx.opt_exists("ldkfs")),
        ])
    }

    fn runtime_properties(&self) -> PropertyStates {
        let mut states = PropertyStates::new();
        for key in [
            keys::PRESET,
            keys::TUNE,
            keys::RC,
            keys::RC_MODE,
            keys::RC_TWO_PASS,
            keys::RC_MULTI_PASS,
            keys::RC_LOOKAHEAD,
            keys::RC_ADAPTIVE_I,
            keys::RC_ADAPTIVE_B,
            keys::LIMITS_QUALITY,
            keys::QP,
            keys::QP_MINIMUM,
            keys::QP_MAXIMUM,
            keys::QP_I,
            keys::QP_P,
            keys::QP_B,
            keys::AQ,
            keys::AQ_SPATIAL,
            keys::AQ_STRENGTH,
            keys::AQ_TEMPORAL,
            keys::OTHER,
            keys::OTHER_B_FRAMES,
            keys::OTHER_B_FRAME_REFERENCE_MODE,
            keys::OTHER_ZERO_LATENCY,
            keys::OTHER_WEIGHTED_PREDICTION,
            keys::OTHER_NON_REFERENCE_P_FRAMES,
            keys::OTHER_REFERENCE_FRAMES,
            keys::OTHER_LOW_DELAY_KEY_FRAME_SCALE,
        ] {
            states.insert(key, false);
        }
        for key in [
            keys::LIMITS,
            keys::LIMITS_BUFFER_SIZE,
            keys::LIMITS_BITRATE_TARGET,
            keys::LIMITS_BITRATE_MAXIMUM,
        ] {
            states.insert(key, true);
        }
        states
    }

    fn update(&self, settings: &mut SettingsStore, ctx: &mut dyn CodecContext) {
        if !ctx.is_open() {
            self.update_preset(settings, ctx);
        }

        self.update_rate_control(settings, ctx);

        if !ctx.is_open() {
            self.update_aq(settings, ctx);
            self.update_other(settings, ctx);
        }
    }

    /// Size the surface pool for look-ahead and B-frames unless the user
    /// picked a count, then bound the output delay by it.
    fn override_update(&self, ctx: &mut dyn CodecContext) {
        let lookahead = ctx.opt_get_int("rc-lookahead").unwrap_or(0);
        let mut surfaces = ctx.opt_get_int("surfaces").unwrap_or(0);
        let async_depth = ctx.opt_get_int("async_depth").unwrap_or(0);
        let b_frames = ctx.fields().max_b_frames;

        if surfaces == 0 {
            surfaces = if lookahead > 0 {
                let base = 4_i64.max((b_frames + 1) * 4);
                1_i64.max(base.max(lookahead + b_frames + 5))
            } else if b_frames > 0 {
                4_i64.max((b_frames + 1) * 4)
            } else {
                4
            };
            self.set(ctx, "surfaces", surfaces);
        }

        ctx.fields_mut().delay = async_depth.max(3).min(surfaces - 1);
    }

    fn migrate(&self, settings: &mut SettingsStore, version: Version, _ctx: &dyn CodecContext) {
        MIGRATIONS.run(settings, version);
    }

    fn log_options(&self, ctx: &dyn CodecContext) -> Vec<String> {
        let caps = ctx.codec().caps;
        let mut log = OptionLog::new(ctx);

        log.heading("  NVIDIA NVENC");
        log.print_option_string("preset", "    Preset");
        log.print_option_string("rc", "    Rate Control");
        log.print_option_bool("2pass", "      Two Pass", false);
        log.print_option_string("multipass", "      Multi-Pass");
        log.print_option_int("rc-lookahead", "      Look-Ahead", "Frames");
        log.print_option_bool("no-scenecut", "      Adaptive I-Frames", true);
        if caps.adaptive_b {
            log.print_option_bool("b_adapt", "      Adaptive B-Frames", false);
        }

        log.heading("      Bitrate");
        log.print_option_int("b", "        Target", "bits/sec");
        log.print_option_int("minrate", "        Minimum", "bits/sec");
        log.print_option_int("maxrate", "        Maximum", "bits/sec");
        log.print_option_int("bufsize", "        Buffer", "bits");
        log.heading("      Quality");
        log.print_option_int("cq", "        Target", "");
        log.print_option_int("qmin", "        Minimum", "");
        log.print_option_int("qmax", "        Maximum", "");
        log.heading("      Quantization Parameters");
        log.print_option_int("init_qpI", "        I-Frame", "");
        log.print_option_int("init_qpP", "        P-Frame", "");
        log.print_option_int("init_qpB", "        B-Frame", "");
        log.print_option_int("qp_cb_offset", "        CB Offset", "");
        log.print_option_int("qp_cr_offset", "        CR Offset", "");

        log.print_option_int("bf", "    B-Frames", "Frames");
        log.print_option_string("b_ref_mode", "      Reference Mode");

        log.heading("    Adaptive Quantization");
        log.print_option_bool(caps.spatial_aq_option, "      Spatial AQ", false);
        log.print_option_int("aq-strength", "        Strength", "");
        log.print_option_bool(caps.temporal_aq_option, "      Temporal AQ", false);

        log.heading("    Other");
        log.print_option_bool("zerolatency", "      Zero Latency", false);
        log.print_option_bool("weighted_pred", "      Weighted Prediction", false);
        log.print_option_bool("nonref_p", "      Non-reference P-Frames", false);
        log.print_option_int("refs", "      Reference Frames", "Frames");
        log.print_option_bool("strict_gop", "      Strict GOP", false);
        log.print_option_bool("aud", "      Access Unit Delimiters", false);
        log.print_option_bool("bluray-compat", "      Bluray Compatibility", false);
        log.print_option_bool("a53cc", "      A53 Closed Captions", false);
        log.print_option_int("dpb_size", "      DPB Size", "Frames");
        log.print_option_int("ldkfs", "      Low Delay Key-Frame Scale", "");
        log.print_option_bool("extra_sei", "      Extra SEI Data", false);
        log.print_option_bool("udu_sei", "      User SEI Data", false);
        log.print_option_bool("intra-refresh", "      Intra-Refresh", false);
        if ctx.opt_exists("single-slice-intra-refresh") {
            log.print_option_bool(
                "single-slice-intra-refresh",
                "      Single Slice Intra-Refresh",
                false,
            );
        }
        log.print_option_bool("constrained-encoding", "      Constrained Encoding", false);

        log.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::codecs::{H264_NVENC, HEVC_NVENC};
    use crate::encoder::context::OptionContext;
    use crate::version;

    fn defaults() -> SettingsStore {
        let mut s = SettingsStore::new();
        NvencMapper.get_defaults(&mut s);
        s
    }

    fn updated(settings: &mut SettingsStore, ctx: &mut OptionContext) {
        NvencMapper.update(settings, ctx);
    }

    #[test]
    fn cbr_populates_only_bitrate_fields() {
        let mut s = defaults();
        s.set_int(keys::RC_MODE, 2);
        let mut ctx = OptionContext::new(&H264_NVENC);
        updated(&mut s, &mut ctx);

        let f = *ctx.fields();
        assert_eq!(ctx.opt_get_string("rc").unwrap(), "cbr");
        assert_eq!(ctx.opt_get_int("cbr").unwrap(), 1);
        assert_eq!((f.bit_rate, f.rc_min_rate, f.rc_max_rate), (6_000_000, 6_000_000, 6_000_000));
        assert_eq!(f.rc_buffer_size, 0);
        assert_eq!((f.qmin, f.qmax), (-1, -1));
        assert_eq!(ctx.opt_get_double("cq").unwrap(), 0.0);
        assert!(ctx.opt_is_default("init_qpI"));
        assert_eq!(s.get_string(KEY_HOST_RATE_CONTROL), "CBR");
        assert_eq!(s.get_int(KEY_HOST_BITRATE), 6_000_000);
    }

    #[test]
    fn constqp_forwards_qp_and_resets_rates() {
        let mut s = defaults();
        s.set_int(keys::RC_MODE, 0);
        s.set_int(keys::QP_I, 18);
        s.set_int(keys::QP_B, 24);
        s.set_double(keys::LIMITS_QUALITY, 30.0);
        let mut ctx = OptionContext::new(&HEVC_NVENC);
        updated(&mut s, &mut ctx);

        let f = *ctx.fields();
        assert_eq!((f.bit_rate, f.rc_max_rate, f.rc_buffer_size), (0, 0, 0));
        assert_eq!(ctx.opt_get_int("init_qpI").unwrap(), 18);
        assert_eq!(ctx.opt_get_int("init_qpB").unwrap(), 24);
        assert_eq!(ctx.opt_get_double("cq").unwrap(), 0.0);
        assert_eq!(s.get_string(KEY_HOST_RATE_CONTROL), "CQP");
    }

    #[test]
    fn vbr_applies_range_quality_and_limits() {
        let mut s = defaults();
        s.set_int(keys::RC_MODE, 1);
        s.set_int(keys::LIMITS_BITRATE_TARGET, 4000);
        s.set_int(keys::LIMITS_BITRATE_MAXIMUM, 8000);
        s.set_int(keys::LIMITS_BUFFER_SIZE, 16000);
        s.set_double(keys::LIMITS_QUALITY, 23.5);
        s.set_int(keys::QP_MINIMUM, 10);
        s.set_int(keys::QP_MAXIMUM, 40);
        let mut ctx = OptionContext::new(&H264_NVENC);
        updated(&mut s, &mut ctx);

        let f = *ctx.fields();
        assert_eq!(f.bit_rate, 4_000_000);
        assert_eq!(f.rc_min_rate, 4_000_000);
        assert_eq!(f.rc_max_rate, 8_000_000);
        assert_eq!(f.rc_buffer_size, 16_000_000);
        assert_eq!((f.qmin, f.qmax), (10, 40));
        assert_eq!(ctx.opt_get_double("cq").unwrap(), 23.5);
        assert_eq!(ctx.opt_get_int("cbr").unwrap(), 0);
    }

    #[test]
    fn host_bitrate_caps_target() {
        let mut s = defaults();
        s.set_int(keys::RC_MODE, 2);
        s.set_int(keys::LIMITS_BITRATE_TARGET, 9000);
        s.set_int(KEY_HOST_BITRATE, 2500);
        let mut ctx = OptionContext::new(&H264_NVENC);
        updated(&mut s, &mut ctx);
        assert_eq!(ctx.fields().bit_rate, 2_500_000);
    }

    #[test]
    fn unset_mode_keeps_everything_active() {
        let mut s = defaults();
        let mut ctx = OptionContext::new(&H264_NVENC);
        updated(&mut s, &mut ctx);

        assert!(ctx.opt_is_default("rc"));
        assert_eq!(ctx.opt_get_int("cbr").unwrap(), 0);
        assert_eq!(ctx.fields().bit_rate, 6_000_000);
        assert!(!s.has_user_value(KEY_HOST_RATE_CONTROL));
    }

    #[test]
    fn preset_resolves_through_unit_table() {
        let mut s = defaults();
        s.set_int(keys::PRESET, 18);
        let mut ctx = OptionContext::new(&H264_NVENC);
        updated(&mut s, &mut ctx);
        assert_eq!(ctx.opt_get_string("preset").unwrap(), "p7");
    }

    #[test]
    fn prefers_multipass_over_two_pass() {
        let mut s = defaults();
        s.set_int(keys::RC_MULTI_PASS, 2);
        s.set_int(keys::RC_TWO_PASS, 1);

        let mut modern = OptionContext::new(&H264_NVENC);
        updated(&mut s, &mut modern);
        assert_eq!(modern.opt_get_string("multipass").unwrap(), "fullres");
        assert_eq!(modern.opt_get_int("2pass").unwrap(), 0);

        let mut old = OptionContext::new(&H264_NVENC).with_hidden(&["multipass"]);
        updated(&mut s, &mut old);
        assert_eq!(old.opt_get_int("2pass").unwrap(), 1);
    }

    #[test]
    fn adaptive_frames_depend_on_lookahead() {
        let mut s = defaults();
        s.set_int(keys::RC_ADAPTIVE_I, tristate::ENABLED);
        s.set_int(keys::RC_ADAPTIVE_B, tristate::DISABLED);
        s.set_int(keys::RC_LOOKAHEAD, 0);
        let mut ctx = OptionContext::new(&H264_NVENC);
        updated(&mut s, &mut ctx);
        assert!(ctx.opt_is_default("no-scenecut"));
        assert!(ctx.opt_is_default("b_adapt"));

        s.set_int(keys::RC_LOOKAHEAD, 16);
        updated(&mut s, &mut ctx);
        assert_eq!(ctx.opt_get_int("rc-lookahead").unwrap(), 16);
        assert_eq!(ctx.opt_get_int("no-scenecut").unwrap(), 0);
        assert_eq!(ctx.opt_get_int("b_adapt").unwrap(), 0);

        let mut hevc = OptionContext::new(&HEVC_NVENC);
        updated(&mut s, &mut hevc);
        assert!(!hevc.opt_exists("b_adapt"));
    }

    #[test]
    fn aq_uses_codec_option_names() {
        let mut s = defaults();
        s.set_int(keys::AQ_SPATIAL, tristate::ENABLED);
        s.set_int(keys::AQ_TEMPORAL, tristate::DISABLED);
        s.set_int(keys::AQ_STRENGTH, 12);

        let mut h264 = OptionContext::new(&H264_NVENC);
        updated(&mut s, &mut h264);
        assert_eq!(h264.opt_get_int("spatial-aq").unwrap(), 1);
        assert_eq!(h264.opt_get_int("temporal-aq").unwrap(), 0);
        assert_eq!(h264.opt_get_int("aq-strength").unwrap(), 12);

        let mut hevc = OptionContext::new(&HEVC_NVENC);
        updated(&mut s, &mut hevc);
        assert_eq!(hevc.opt_get_int("spatial_aq").unwrap(), 1);
        assert_eq!(hevc.opt_get_int("temporal_aq").unwrap(), 0);
    }

    #[test]
    fn weighted_prediction_is_forced_off_with_b_frames() {
        let mut s = defaults();
        s.set_int(keys::OTHER_WEIGHTED_PREDICTION, tristate::ENABLED);

        let mut no_b = OptionContext::new(&H264_NVENC);
        s.set_int(keys::OTHER_B_FRAMES, 0);
        updated(&mut s, &mut no_b);
        assert_eq!(no_b.opt_get_int("weighted_pred").unwrap(), 1);

        let mut with_b = OptionContext::new(&H264_NVENC);
        s.set_int(keys::OTHER_B_FRAMES, 2);
        updated(&mut s, &mut with_b);
        assert_eq!(with_b.fields().max_b_frames, 2);
        assert_eq!(with_b.opt_get_int("weighted_pred").unwrap(), 0);
    }

    #[test]
    fn running_encoder_only_takes_bitrate_limits() {
        let mut s = defaults();
        s.set_int(keys::RC_MODE, 2);
        s.set_int(keys::PRESET, 12);
        s.set_int(keys::QP_I, 20);
        s.set_int(keys::OTHER_B_FRAMES, 3);
        s.set_int(keys::LIMITS_BITRATE_TARGET, 3000);
        let mut ctx = OptionContext::new(&H264_NVENC);
        ctx.open();
        updated(&mut s, &mut ctx);

        assert!(ctx.opt_is_default("preset"));
        assert!(ctx.opt_is_default("cbr"));
        assert_eq!(ctx.opt_get_int("rc").unwrap(), 2);
        assert_eq!(ctx.fields().bit_rate, 3_000_000);
        assert_eq!(ctx.fields().max_b_frames, -1);
        assert!(ctx.opt_is_default("init_qpI"));
    }

    #[test]
    fn override_update_sizes_surfaces() {
        let mut ctx = OptionContext::new(&H264_NVENC);
        NvencMapper.override_update(&mut ctx);
        assert_eq!(ctx.opt_get_int("surfaces").unwrap(), 4);
        assert_eq!(ctx.fields().delay, 3);

        let mut ctx = OptionContext::new(&H264_NVENC);
        ctx.opt_set_int("bf", 2).unwrap();
        NvencMapper.override_update(&mut ctx);
        assert_eq!(ctx.opt_get_int("surfaces").unwrap(), 12);

        let mut ctx = OptionContext::new(&H264_NVENC);
        ctx.opt_set_int("bf", 2).unwrap();
        ctx.opt_set_int("rc-lookahead", 20).unwrap();
        ctx.opt_set_int("async_depth", 8).unwrap();
        NvencMapper.override_update(&mut ctx);
        assert_eq!(ctx.opt_get_int("surfaces").unwrap(), 27);
        assert_eq!(ctx.fields().delay, 8);

        let mut ctx = OptionContext::new(&H264_NVENC);
        ctx.opt_set_int("surfaces", 3).unwrap();
        ctx.opt_set_int("async_depth", 8).unwrap();
        NvencMapper.override_update(&mut ctx);
        assert_eq!(ctx.opt_get_int("surfaces").unwrap(), 3);
        assert_eq!(ctx.fields().delay, 2);
    }

    #[test]
    fn visibility_follows_mode_and_library() {
        let mut s = defaults();
        let ctx = OptionContext::new(&HEVC_NVENC);

        s.set_int(keys::RC_MODE, 0);
        let cqp = NvencMapper.visibility(&s, &ctx);
        assert!(!cqp[keys::LIMITS]);
        assert!(cqp[keys::QP]);
        assert!(cqp[keys::QP_I]);
        assert!(!cqp[keys::QP_MINIMUM]);

        s.set_int(keys::RC_MODE, 2);
        let cbr = NvencMapper.visibility(&s, &ctx);
        assert!(cbr[keys::LIMITS_BITRATE_TARGET]);
        assert!(!cbr[keys::LIMITS_BITRATE_MAXIMUM]);
        assert!(!cbr[keys::LIMITS_QUALITY]);
        assert!(!cbr[keys::QP]);
        assert!(!cbr[keys::RC_ADAPTIVE_B]);
        assert!(cbr[keys::RC_MULTI_PASS]);
        assert!(!cbr[keys::AQ_STRENGTH]);

        s.set_int(keys::AQ_SPATIAL, tristate::ENABLED);
        let old = OptionContext::new(&H264_NVENC).with_hidden(&["multipass", "ldkfs"]);
        let vis = NvencMapper.visibility(&s, &old);
        assert!(vis[keys::AQ_STRENGTH]);
        assert!(vis[keys::RC_TWO_PASS]);
        assert!(!vis[keys::OTHER_LOW_DELAY_KEY_FRAME_SCALE]);
        assert!(vis[keys::RC_ADAPTIVE_B]);
    }

    #[test]
    fn only_limits_stay_editable_while_running() {
        let states = NvencMapper.runtime_properties();
        assert!(states[keys::LIMITS_BITRATE_TARGET]);
        assert!(states[keys::LIMITS_BUFFER_SIZE]);
        assert!(!states[keys::RC_MODE]);
        assert!(!states[keys::LIMITS_QUALITY]);
        assert!(!states[keys::AQ_SPATIAL]);
    }

    // ------------------------------------------------------------------
    // Migration
    // ------------------------------------------------------------------

    fn migrated_twice(mut s: SettingsStore, from: Version) -> (SettingsStore, SettingsStore) {
        let ctx = OptionContext::new(&H264_NVENC);
        NvencMapper.migrate(&mut s, from, &ctx);
        let once = s.clone();
        NvencMapper.migrate(&mut s, from, &ctx);
        (once, s)
    }

    fn assert_same_user_values(a: &SettingsStore, b: &SettingsStore) {
        let keys_a: Vec<&str> = a.user_keys().collect();
        let keys_b: Vec<&str> = b.user_keys().collect();
        assert_eq!(keys_a, keys_b);
        for key in keys_a {
            assert_eq!(a.user_value(key), b.user_value(key), "{}", key);
        }
    }

    fn legacy_document() -> SettingsStore {
        let mut s = defaults();
        s.set_int(keys::LEGACY_BITRATE_TARGET, 5000);
        s.set_int(keys::LEGACY_BITRATE_MAXIMUM, 7000);
        s.set_int(keys::LEGACY_BUFFER_SIZE, 10000);
        s.set_double(keys::LEGACY_QUALITY_TARGET, 50.0);
        s.set_int(keys::LEGACY_ACCESS_UNIT_DELIMITER, 1);
        s.set_int(keys::RC_MODE, legacy_mode::CBR_HQ);
        s
    }

    #[test]
    fn migration_from_0_8_moves_keys_and_rescales_once() {
        let (once, twice) = migrated_twice(legacy_document(), Version::new(0, 8, 0, 0));
        assert_same_user_values(&once, &twice);

        assert_eq!(once.get_int(keys::LIMITS_BITRATE_TARGET), 5000);
        assert_eq!(once.get_int(keys::LIMITS_BITRATE_MAXIMUM), 7000);
        assert_eq!(once.get_int(keys::LIMITS_BUFFER_SIZE), 10000);
        assert!(!once.has_user_value(keys::LEGACY_BITRATE_TARGET));
        assert!(!once.has_user_value(keys::LEGACY_QUALITY_TARGET));
        assert!(!once.has_user_value(keys::LEGACY_ACCESS_UNIT_DELIMITER));
        assert!((once.get_double(keys::LIMITS_QUALITY) - 25.5).abs() < 1e-9);
        assert_eq!(once.get_int(keys::RC_MODE), 2);
        assert_eq!(once.get_int(keys::RC_TWO_PASS), 1);
        assert_eq!(once.get_int(keys::RC_MULTI_PASS), 1);
    }

    #[test]
    fn migration_from_0_11_0_only_remaps_modes() {
        let mut s = legacy_document();
        s.set_int(keys::RC_MODE, legacy_mode::VBR_HQ);
        let (once, twice) = migrated_twice(s, Version::new(0, 11, 0, 0));
        assert_same_user_values(&once, &twice);

        assert!(once.has_user_value(keys::LEGACY_BITRATE_TARGET));
        assert!(once.has_user_value(keys::LEGACY_ACCESS_UNIT_DELIMITER));
        assert_eq!(once.get_int(keys::RC_MODE), 1);
        assert_eq!(once.get_int(keys::RC_MULTI_PASS), 1);
    }

    #[test]
    fn migration_from_0_11_1_changes_nothing() {
        let (once, twice) = migrated_twice(legacy_document(), Version::new(0, 11, 1, 0));
        assert_same_user_values(&once, &twice);
        assert_eq!(once.get_int(keys::RC_MODE), legacy_mode::CBR_HQ);
        assert_eq!(MIGRATIONS.recorded_version(&once), Some(version::CURRENT));
    }

    #[test]
    fn low_delay_hq_gains_key_frame_scale() {
        let mut s = defaults();
        s.set_int(keys::RC_MODE, legacy_mode::CBR_LD_HQ);
        let (once, _) = migrated_twice(s, Version::new(0, 10, 0, 0));
        assert_eq!(once.get_int(keys::OTHER_LOW_DELAY_KEY_FRAME_SCALE), 1);
        assert_eq!(once.get_int(keys::RC_MODE), 2);
        assert_eq!(once.get_int(keys::RC_TWO_PASS), 1);
    }

    #[test]
    fn plain_modes_survive_migration() {
        for mode in [0, 1, 3] {
            let mut s = defaults();
            s.set_int(keys::RC_MODE, mode);
            let (once, _) = migrated_twice(s, Version::new(0, 10, 0, 0));
            assert_eq!(once.get_int(keys::RC_MODE), mode);
            assert!(!once.has_user_value(keys::RC_TWO_PASS));
        }
    }

    #[test]
    fn log_options_cover_codec_specific_names() {
        let mut s = defaults();
        let mut ctx = OptionContext::new(&HEVC_NVENC);
        updated(&mut s, &mut ctx);
        let lines = NvencMapper.log_options(&ctx);
        assert!(lines.iter().all(|l| !l.contains("<Error")));
        assert!(lines.contains(&"[hevc_nvenc]     Preset: p4 <Default>".to_string()));
        assert!(lines.iter().all(|l| !l.contains("Adaptive B-Frames")));
    }
}
