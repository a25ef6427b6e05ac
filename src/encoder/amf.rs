// ============================================================================
// AMD AMF - settings → amf_h264 / amf_hevc options
// ============================================================================

use super::context::{CodecContext, EncoderFamily, FLAG_LOOP_FILTER};
use super::ratecontrol::{AmfPreset, AmfRateControl};
use super::tools::OptionLog;
use super::{check, library_available, EncoderOptionMapper, PropertyStates, KEY_HOST_BITRATE};
use crate::migration::{MigrationPlan, MIGRATED_VERSION_KEY};
use crate::settings::{tristate, SettingsStore};
use crate::version::Version;

const COMPONENT: &str = "encoder::amf";

pub mod keys {
    pub const PRESET: &str = "Preset";
    pub const RC_MODE: &str = "RateControl.Mode";
    pub const RC_LOOKAHEAD: &str = "RateControl.LookAhead";
    pub const RC_FRAME_SKIPPING: &str = "RateControl.FrameSkipping";
    pub const LIMITS: &str = "RateControl.Limits";
    pub const LIMITS_BUFFER_SIZE: &str = "RateControl.Limits.BufferSize";
    pub const LIMITS_BITRATE_TARGET: &str = "RateControl.Limits.Bitrate.Target";
    pub const LIMITS_BITRATE_MAXIMUM: &str = "RateControl.Limits.Bitrate.Maximum";
    pub const QP: &str = "RateControl.QP";
    pub const QP_I: &str = "RateControl.QP.I";
    pub const QP_P: &str = "RateControl.QP.P";
    pub const QP_B: &str = "RateControl.QP.B";
    pub const OTHER_B_FRAMES: &str = "Other.BFrames";
    pub const OTHER_B_FRAME_REFERENCES: &str = "Other.BFrameReferences";
    pub const OTHER_REFERENCE_FRAMES: &str = "Other.ReferenceFrames";
    pub const OTHER_ENFORCE_HRD: &str = "Other.EnforceHRD";
    pub const OTHER_VBAQ: &str = "Other.VBAQ";
    pub const OTHER_ACCESS_UNIT_DELIMITER: &str = "Other.AccessUnitDelimiter";
}

#[cfg(all(windows, target_pointer_width = "64"))]
const RUNTIME_LIBRARY: &str = "amfrt64.dll";
#[cfg(all(windows, not(target_pointer_width = "64")))]
const RUNTIME_LIBRARY: &str = "amfrt32.dll";
#[cfg(all(not(windows), target_pointer_width = "64"))]
const RUNTIME_LIBRARY: &str = "libamfrt64.so.1";
#[cfg(all(not(windows), not(target_pointer_width = "64")))]
const RUNTIME_LIBRARY: &str = "libamfrt32.so.1";

/// No AMF settings layout has changed yet; running the plan only stamps.
static MIGRATIONS: MigrationPlan = MigrationPlan {
    component: COMPONENT,
    stamp_key: MIGRATED_VERSION_KEY,
    steps: &[],
};

pub struct AmfMapper;

impl AmfMapper {
    fn update_rate_control(&self, settings: &mut SettingsStore, ctx: &mut dyn CodecContext) {
        let codec = ctx.codec();
        let rc = AmfRateControl::from_int(settings.get_int(keys::RC_MODE));
        let fields = rc.active_fields();

        check(COMPONENT, codec.name, ctx.opt_set("rc", rc.option_name().unwrap_or("cbr")));

        let filler = matches!(rc, AmfRateControl::Cbr | AmfRateControl::Invalid);
        check(COMPONENT, codec.name, ctx.opt_set_int("filler_data", filler as i64));

        let la = settings.get_int(keys::RC_LOOKAHEAD);
        if tristate::is_set(la) {
            check(COMPONENT, codec.name, ctx.opt_set_int("preanalysis", la));
        }

        let skip = settings.get_int(keys::RC_FRAME_SKIPPING);
        if tristate::is_set(skip) {
            check(
                COMPONENT,
                codec.name,
                ctx.opt_set_int(codec.caps.frame_skip_option, skip),
            );
        }

        if fields.bitrate {
            let v = settings.get_int(keys::LIMITS_BITRATE_TARGET);
            let f = ctx.fields_mut();
            if v > -1 {
                f.bit_rate = v * 1000;
                f.rc_max_rate = f.bit_rate;
                settings.set_int(KEY_HOST_BITRATE, v);
            } else {
                settings.set_int(KEY_HOST_BITRATE, f.bit_rate / 1000);
            }
        } else {
            ctx.fields_mut().bit_rate = 0;
        }

        if fields.bitrate_range {
            let max = settings.get_int(keys::LIMITS_BITRATE_MAXIMUM);
            if max > -1 {
                ctx.fields_mut().rc_max_rate = max * 1000;
            }
        } else {
            ctx.fields_mut().rc_max_rate = 0;
        }

        if fields.bitrate || fields.bitrate_range {
            let v = settings.get_int(keys::LIMITS_BUFFER_SIZE);
            if v > -1 {
                ctx.fields_mut().rc_buffer_size = v * 1000;
            }
        } else {
            ctx.fields_mut().rc_buffer_size = 0;
        }

        if fields.qp {
            let mut frame_types = vec![(keys::QP_I, "qp_i"), (keys::QP_P, "qp_p")];
            if codec.caps.b_frames {
                frame_types.push((keys::QP_B, "qp_b"));
            }
            for (key, option) in frame_types {
                let qp = settings.get_int(key);
                if qp > -1 {
                    check(COMPONENT, codec.name, ctx.opt_set_int(option, qp));
                }
            }
        }
    }

    fn update_other(&self, settings: &SettingsStore, ctx: &mut dyn CodecContext) {
        let codec = ctx.codec();

        if codec.caps.b_frames {
            let bf = settings.get_int(keys::OTHER_B_FRAMES);
            if bf > -1 {
                ctx.fields_mut().max_b_frames = bf;
            }
            let refs = settings.get_int(keys::OTHER_B_FRAME_REFERENCES);
            if tristate::is_set(refs) {
                check(COMPONENT, codec.name, ctx.opt_set_int("bf_ref", refs));
            }
        }

        let refs = settings.get_int(keys::OTHER_REFERENCE_FRAMES);
        if refs > -1 {
            ctx.fields_mut().refs = refs;
        }

        for (key, option) in [
            (keys::OTHER_ENFORCE_HRD, "enforce_hrd"),
            (keys::OTHER_VBAQ, "vbaq"),
            (keys::OTHER_ACCESS_UNIT_DELIMITER, "aud"),
        ] {
            let v = settings.get_int(key);
            if tristate::is_set(v) {
                check(COMPONENT, codec.name, ctx.opt_set_int(option, v));
            }
        }

        check(COMPONENT, codec.name, ctx.opt_set_int("me_half_pel", 1));
        check(COMPONENT, codec.name, ctx.opt_set_int("me_quarter_pel", 1));
    }
}

impl EncoderOptionMapper for AmfMapper {
    fn family(&self) -> EncoderFamily {
        EncoderFamily::Amf
    }

    fn is_available(&self) -> bool {
        library_available(RUNTIME_LIBRARY)
    }

    fn get_defaults(&self, settings: &mut SettingsStore) {
        settings.set_default_int(keys::PRESET, AmfPreset::Balanced.to_int());

        settings.set_default_int(keys::RC_MODE, AmfRateControl::Cbr.to_int());
        settings.set_default_int(keys::RC_LOOKAHEAD, tristate::DEFAULT);
        settings.set_default_int(keys::RC_FRAME_SKIPPING, tristate::DEFAULT);

        settings.set_default_int(keys::LIMITS_BITRATE_TARGET, 6000);
        settings.set_default_int(keys::LIMITS_BITRATE_MAXIMUM, 0);
        settings.set_default_int(keys::LIMITS_BUFFER_SIZE, 12000);

        settings.set_default_int(keys::QP_I, -1);
        settings.set_default_int(keys::QP_P, -1);
        settings.set_default_int(keys::QP_B, -1);

        settings.set_default_int(keys::OTHER_B_FRAMES, -1);
        settings.set_default_int(keys::OTHER_B_FRAME_REFERENCES, tristate::DEFAULT);
        settings.set_default_int(keys::OTHER_REFERENCE_FRAMES, -1);
        settings.set_default_int(keys::OTHER_ENFORCE_HRD, tristate::DEFAULT);
        settings.set_default_int(keys::OTHER_VBAQ, tristate::DEFAULT);
        settings.set_default_int(keys::OTHER_ACCESS_UNIT_DELIMITER, tristate::DEFAULT);

        settings.set_default_int(KEY_HOST_BITRATE, 0);
    }

    fn visibility(&self, settings: &SettingsStore, ctx: &dyn CodecContext) -> PropertyStates {
        let fields = AmfRateControl::from_int(settings.get_int(keys::RC_MODE)).active_fields();
        let b_frames = ctx.codec().caps.b_frames;

        PropertyStates::from([
            (keys::LIMITS, fields.bitrate),
            (keys::LIMITS_BUFFER_SIZE, fields.bitrate),
            (keys::LIMITS_BITRATE_TARGET, fields.bitrate),
            (keys::LIMITS_BITRATE_MAXIMUM, fields.bitrate_range),
            (keys::QP, fields.qp),
            (keys::QP_I, fields.qp),
            (keys::QP_P, fields.qp),
            (keys::QP_B, fields.qp && b_frames),
            (keys::OTHER_B_FRAMES, b_frames),
            (keys::OTHER_B_FRAME_REFERENCES, b_frames),
        ])
    }

    /// AMF reconfigures nothing while running.
    fn runtime_properties(&self) -> PropertyStates {
        PropertyStates::new()
    }

    fn update(&self, settings: &mut SettingsStore, ctx: &mut dyn CodecContext) {
        let codec = ctx.codec();

        ctx.fields_mut().flags |= FLAG_LOOP_FILTER;

        // Other usages misbehave with the settings below.
        check(COMPONENT, codec.name, ctx.opt_set("usage", "transcoding"));

        match AmfPreset::from_int(settings.get_int(keys::PRESET)) {
            Some(preset) => check(COMPONENT, codec.name, ctx.opt_set("quality", preset.option_name())),
            None => check(COMPONENT, codec.name, ctx.opt_clear("quality")),
        }

        self.update_rate_control(settings, ctx);
        self.update_other(settings, ctx);
    }

    fn migrate(&self, settings: &mut SettingsStore, version: Version, _ctx: &dyn CodecContext) {
        MIGRATIONS.run(settings, version);
    }

    fn log_options(&self, ctx: &dyn CodecContext) -> Vec<String> {
        let codec = ctx.codec();
        let mut log = OptionLog::new(ctx);

        log.heading("  AMD AMF");
        log.print_option_string("usage", "    Usage");
        log.print_option_string("quality", "    Preset");
        log.print_option_string("rc", "    Rate Control");
        log.print_option_bool("preanalysis", "      Look-Ahead", false);
        log.print_option_bool(codec.caps.frame_skip_option, "      Frame Skipping", false);
        log.print_option_bool("filler_data", "      Filler Data", false);

        log.heading("      Bitrate");
        log.print_option_int("b", "        Target", "bits/sec");
        log.print_option_int("maxrate", "        Maximum", "bits/sec");
        log.print_option_int("bufsize", "        Buffer", "bits");
        log.heading("      Quantization Parameters");
        log.print_option_int("qp_i", "        I-Frame", "");
        log.print_option_int("qp_p", "        P-Frame", "");
        if codec.caps.b_frames {
            log.print_option_int("qp_b", "        B-Frame", "");
            log.print_option_int("bf", "    B-Frames", "Frames");
            log.print_option_int("bf_delta_qp", "      Delta QP", "");
            log.print_option_bool("bf_ref", "      References", false);
            log.print_option_int("bf_ref_delta_qp", "        Delta QP", "");
        }

        log.heading("    Other");
        log.print_option_int("refs", "      Reference Frames", "Frames");
        log.print_option_bool("enforce_hrd", "      Enforce HRD", false);
        log.print_option_bool("vbaq", "      VBAQ", false);
        log.print_option_bool("aud", "      Access Unit Delimiter", false);
        log.print_option_int("max_au_size", "        Maximum Size", "");
        log.print_option_bool("me_half_pel", "      Half-Pel Motion Estimation", false);
        log.print_option_bool("me_quarter_pel", "      Quarter-Pel Motion Estimation", false);

        log.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::codecs::{AMF_H264, AMF_HEVC};
    use crate::encoder::context::OptionContext;
    use crate::version;

    fn defaults() -> SettingsStore {
        let mut s = SettingsStore::new();
        AmfMapper.get_defaults(&mut s);
        s
    }

    #[test]
    fn defaults_populate_only_cbr_fields() {
        let mut s = defaults();
        let mut ctx = OptionContext::new(&AMF_H264);
        AmfMapper.update(&mut s, &mut ctx);

        let f = *ctx.fields();
        assert_eq!(f.bit_rate, 6_000_000);
        assert_eq!(f.rc_max_rate, 0);
        assert_eq!(f.rc_buffer_size, 12_000_000);
        assert_ne!(f.flags & FLAG_LOOP_FILTER, 0);

        assert_eq!(ctx.opt_get_string("rc").unwrap(), "cbr");
        assert_eq!(ctx.opt_get_string("usage").unwrap(), "transcoding");
        assert_eq!(ctx.opt_get_string("quality").unwrap(), "balanced");
        assert_eq!(ctx.opt_get_int("filler_data").unwrap(), 1);
        assert!(ctx.opt_is_default("qp_i"));
        assert!(ctx.opt_is_default("preanalysis"));
        assert!(ctx.opt_is_default("enforce_hrd"));
        assert_eq!(f.refs, -1);
        assert_eq!(f.max_b_frames, -1);
        assert_eq!(s.get_int(KEY_HOST_BITRATE), 6000);
    }

    #[test]
    fn cqp_resets_bitrate_fields_and_forwards_qp() {
        let mut s = defaults();
        s.set_int(keys::RC_MODE, AmfRateControl::Cqp.to_int());
        s.set_int(keys::QP_I, 20);
        s.set_int(keys::QP_P, 22);
        s.set_int(keys::QP_B, 24);
        let mut ctx = OptionContext::new(&AMF_HEVC);
        AmfMapper.update(&mut s, &mut ctx);

        let f = *ctx.fields();
        assert_eq!((f.bit_rate, f.rc_max_rate, f.rc_buffer_size), (0, 0, 0));
        assert_eq!(ctx.opt_get_int("qp_i").unwrap(), 20);
        assert_eq!(ctx.opt_get_int("qp_p").unwrap(), 22);
        assert_eq!(ctx.opt_get_int("filler_data").unwrap(), 0);
        assert!(!ctx.opt_exists("qp_b"));
    }

    #[test]
    fn vbr_peak_uses_maximum_and_qp() {
        let mut s = defaults();
        s.set_int(keys::RC_MODE, AmfRateControl::VbrPeak.to_int());
        s.set_int(keys::LIMITS_BITRATE_TARGET, 4000);
        s.set_int(keys::LIMITS_BITRATE_MAXIMUM, 9000);
        s.set_int(keys::QP_B, 30);
        let mut ctx = OptionContext::new(&AMF_H264);
        AmfMapper.update(&mut s, &mut ctx);

        let f = *ctx.fields();
        assert_eq!(f.bit_rate, 4_000_000);
        assert_eq!(f.rc_max_rate, 9_000_000);
        assert_eq!(ctx.opt_get_string("rc").unwrap(), "vbr_peak");
        assert_eq!(ctx.opt_get_int("qp_b").unwrap(), 30);
    }

    #[test]
    fn unknown_mode_falls_back_to_cbr() {
        let mut s = defaults();
        s.set_int(keys::RC_MODE, 17);
        let mut ctx = OptionContext::new(&AMF_H264);
        AmfMapper.update(&mut s, &mut ctx);

        assert_eq!(ctx.opt_get_string("rc").unwrap(), "cbr");
        assert_eq!(ctx.opt_get_int("filler_data").unwrap(), 1);
        assert_eq!(ctx.fields().bit_rate, 6_000_000);
    }

    #[test]
    fn unknown_preset_clears_quality() {
        let mut s = defaults();
        let mut ctx = OptionContext::new(&AMF_H264);
        s.set_int(keys::PRESET, AmfPreset::Quality.to_int());
        AmfMapper.update(&mut s, &mut ctx);
        assert_eq!(ctx.opt_get_string("quality").unwrap(), "quality");

        s.set_int(keys::PRESET, 9);
        AmfMapper.update(&mut s, &mut ctx);
        assert!(ctx.opt_is_default("quality"));
    }

    #[test]
    fn frame_skipping_uses_codec_option_name() {
        let mut s = defaults();
        s.set_int(keys::RC_FRAME_SKIPPING, tristate::ENABLED);

        let mut h264 = OptionContext::new(&AMF_H264);
        AmfMapper.update(&mut s, &mut h264);
        assert_eq!(h264.opt_get_int("frame_skipping").unwrap(), 1);

        let mut hevc = OptionContext::new(&AMF_HEVC);
        AmfMapper.update(&mut s, &mut hevc);
        assert_eq!(hevc.opt_get_int("skip_frame").unwrap(), 1);
    }

    #[test]
    fn b_frame_settings_only_reach_h264() {
        let mut s = defaults();
        s.set_int(keys::OTHER_B_FRAMES, 2);
        s.set_int(keys::OTHER_B_FRAME_REFERENCES, tristate::DISABLED);

        let mut hevc = OptionContext::new(&AMF_HEVC);
        AmfMapper.update(&mut s, &mut hevc);
        assert_eq!(hevc.fields().max_b_frames, -1);

        let mut h264 = OptionContext::new(&AMF_H264);
        AmfMapper.update(&mut s, &mut h264);
        assert_eq!(h264.fields().max_b_frames, 2);
        assert_eq!(h264.opt_get_int("bf_ref").unwrap(), 0);
    }

    #[test]
    fn visibility_follows_rate_control() {
        let mut s = defaults();
        let ctx = OptionContext::new(&AMF_HEVC);

        let cbr = AmfMapper.visibility(&s, &ctx);
        assert!(cbr[keys::LIMITS_BITRATE_TARGET]);
        assert!(!cbr[keys::LIMITS_BITRATE_MAXIMUM]);
        assert!(!cbr[keys::QP]);

        s.set_int(keys::RC_MODE, AmfRateControl::VbrLatency.to_int());
        let vbr = AmfMapper.visibility(&s, &ctx);
        assert!(vbr[keys::LIMITS_BITRATE_MAXIMUM]);
        assert!(vbr[keys::QP_I]);
        assert!(!vbr[keys::QP_B]);
    }

    #[test]
    fn migrate_only_stamps() {
        let mut s = defaults();
        let ctx = OptionContext::new(&AMF_H264);
        s.set_int(keys::LIMITS_BITRATE_TARGET, 3500);
        AmfMapper.migrate(&mut s, Version::new(0, 8, 0, 0), &ctx);
        let once = s.clone();
        AmfMapper.migrate(&mut s, Version::new(0, 8, 0, 0), &ctx);

        assert_eq!(s.get_int(keys::LIMITS_BITRATE_TARGET), 3500);
        assert_eq!(
            s.get_int(MIGRATED_VERSION_KEY),
            once.get_int(MIGRATED_VERSION_KEY)
        );
        assert_eq!(MIGRATIONS.recorded_version(&s), Some(version::CURRENT));
    }

    #[test]
    fn log_options_reads_back_every_line() {
        let mut s = defaults();
        let mut ctx = OptionContext::new(&AMF_H264);
        AmfMapper.update(&mut s, &mut ctx);
        let lines = AmfMapper.log_options(&ctx);

        assert!(lines.iter().all(|l| l.starts_with("[amf_h264] ")));
        assert!(lines.contains(&"[amf_h264]     Rate Control: cbr".to_string()));
        assert!(lines.contains(&"[amf_h264]         Target: 6000000 bits/sec".to_string()));
        assert!(lines.iter().all(|l| !l.contains("<Error")));
    }
}
