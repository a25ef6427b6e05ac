// ============================================================================
// CODEC TABLES - option sets of the supported hardware encoders
// ============================================================================
//
// Mirrors what the native libraries expose: option names, kinds, ranges,
// defaults and the named constants of each unit.  Deprecated constants are
// still accepted by name but are not offered in lists.

use super::context::{
    Capabilities, CodecDescriptor, CodecFields, EncoderFamily, OptionDecl, OptionKind, UnitConst,
};

const I32_MAX: i64 = i32::MAX as i64;

const fn int(name: &'static str, default: i64, min: i64, max: i64) -> OptionDecl {
    OptionDecl {
        name,
        kind: OptionKind::Int { default, min, max },
        unit: None,
    }
}

const fn unit_int(name: &'static str, default: i64, min: i64, max: i64, unit: &'static str) -> OptionDecl {
    OptionDecl {
        name,
        kind: OptionKind::Int { default, min, max },
        unit: Some(unit),
    }
}

const fn boolean(name: &'static str, default: i64) -> OptionDecl {
    OptionDecl {
        name,
        kind: OptionKind::Bool { default },
        unit: None,
    }
}

const fn double(name: &'static str, default: f64, min: f64, max: f64) -> OptionDecl {
    OptionDecl {
        name,
        kind: OptionKind::Double { default, min, max },
        unit: None,
    }
}

const fn konst(unit: &'static str, name: &'static str, value: i64) -> UnitConst {
    UnitConst {
        unit,
        name,
        value,
        deprecated: false,
    }
}

const fn deprecated(unit: &'static str, name: &'static str, value: i64) -> UnitConst {
    UnitConst {
        unit,
        name,
        value,
        deprecated: true,
    }
}

// ============================================================================
// AMD AMF
// ============================================================================

macro_rules! amf_units {
    ($speed:expr, $balanced:expr, $quality:expr) => {
        &[
            konst("usage", "transcoding", 0),
            konst("usage", "ultralowlatency", 1),
            konst("usage", "lowlatency", 2),
            konst("usage", "webcam", 3),
            konst("quality", "speed", $speed),
            konst("quality", "balanced", $balanced),
            konst("quality", "quality", $quality),
            konst("rc", "cqp", 0),
            konst("rc", "cbr", 1),
            konst("rc", "vbr_peak", 2),
            konst("rc", "vbr_latency", 3),
        ]
    };
}

pub static AMF_H264: CodecDescriptor = CodecDescriptor {
    name: "amf_h264",
    family: EncoderFamily::Amf,
    caps: Capabilities {
        b_frames: true,
        adaptive_b: false,
        frame_skip_option: "frame_skipping",
        spatial_aq_option: "vbaq",
        temporal_aq_option: "vbaq",
        max_reference_frames: 16,
    },
    options: &[
        unit_int("usage", 0, 0, 3, "usage"),
        unit_int("quality", 0, 0, 2, "quality"),
        unit_int("rc", -1, -1, 3, "rc"),
        boolean("preanalysis", 0),
        boolean("frame_skipping", 0),
        boolean("filler_data", 0),
        boolean("enforce_hrd", 0),
        boolean("vbaq", 0),
        int("qp_i", -1, -1, 51),
        int("qp_p", -1, -1, 51),
        int("qp_b", -1, -1, 51),
        int("bf_delta_qp", 4, -10, 10),
        boolean("bf_ref", 1),
        int("bf_ref_delta_qp", 4, -10, 10),
        boolean("aud", 0),
        int("max_au_size", 0, 0, I32_MAX),
        boolean("me_half_pel", 1),
        boolean("me_quarter_pel", 1),
    ],
    units: amf_units!(1, 0, 2),
    field_defaults: CodecFields::new(),
};

pub static AMF_HEVC: CodecDescriptor = CodecDescriptor {
    name: "amf_hevc",
    family: EncoderFamily::Amf,
    caps: Capabilities {
        b_frames: false,
        adaptive_b: false,
        frame_skip_option: "skip_frame",
        spatial_aq_option: "vbaq",
        temporal_aq_option: "vbaq",
        max_reference_frames: 16,
    },
    options: &[
        unit_int("usage", 0, 0, 3, "usage"),
        unit_int("quality", 5, 0, 10, "quality"),
        unit_int("rc", -1, -1, 3, "rc"),
        boolean("preanalysis", 0),
        boolean("skip_frame", 0),
        boolean("filler_data", 0),
        boolean("enforce_hrd", 0),
        boolean("vbaq", 0),
        int("qp_i", -1, -1, 51),
        int("qp_p", -1, -1, 51),
        boolean("aud", 0),
        int("max_au_size", 0, 0, I32_MAX),
        boolean("me_half_pel", 1),
        boolean("me_quarter_pel", 1),
    ],
    units: amf_units!(10, 5, 0),
    field_defaults: CodecFields::new(),
};

// ============================================================================
// NVIDIA NVENC
// ============================================================================

/// Set on rate-control constants kept only for old configurations.
pub const RC_MODE_DEPRECATED: i64 = 0x80_0000;

macro_rules! nvenc_options {
    ($($extra:expr),* $(,)?) => {
        &[
            unit_int("preset", 15, 0, 18, "preset"),
            unit_int("tune", 1, 1, 4, "tune"),
            unit_int("rc", -1, -1, I32_MAX, "rc"),
            boolean("cbr", 0),
            boolean("2pass", -1),
            unit_int("multipass", 0, 0, 2, "multipass"),
            int("rc-lookahead", 0, 0, I32_MAX),
            int("surfaces", 0, 0, 64),
            int("async_depth", 2, 0, I32_MAX),
            boolean("no-scenecut", 0),
            double("cq", 0.0, 0.0, 51.0),
            int("init_qpI", -1, -1, 51),
            int("init_qpP", -1, -1, 51),
            int("init_qpB", -1, -1, 51),
            int("qp_cb_offset", 0, -12, 12),
            int("qp_cr_offset", 0, -12, 12),
            int("aq-strength", 8, 1, 15),
            boolean("zerolatency", 0),
            boolean("nonref_p", 0),
            boolean("weighted_pred", 0),
            unit_int("b_ref_mode", 0, 0, 2, "b_ref_mode"),
            int("ldkfs", 0, 0, 255),
            boolean("strict_gop", 0),
            boolean("aud", 0),
            boolean("bluray-compat", 0),
            boolean("a53cc", 1),
            int("dpb_size", 0, 0, I32_MAX),
            boolean("extra_sei", 1),
            boolean("udu_sei", 0),
            boolean("intra-refresh", 0),
            boolean("constrained-encoding", 0),
            $($extra),*
        ]
    };
}

const NVENC_UNITS: &[UnitConst] = &[
    konst("preset", "default", 0),
    konst("preset", "slow", 1),
    konst("preset", "medium", 2),
    konst("preset", "fast", 3),
    konst("preset", "hp", 4),
    konst("preset", "hq", 5),
    konst("preset", "bd", 6),
    konst("preset", "ll", 7),
    konst("preset", "llhq", 8),
    konst("preset", "llhp", 9),
    konst("preset", "lossless", 10),
    konst("preset", "losslesshp", 11),
    konst("preset", "p1", 12),
    konst("preset", "p2", 13),
    konst("preset", "p3", 14),
    konst("preset", "p4", 15),
    konst("preset", "p5", 16),
    konst("preset", "p6", 17),
    konst("preset", "p7", 18),
    konst("tune", "hq", 1),
    konst("tune", "ll", 2),
    konst("tune", "ull", 3),
    konst("tune", "lossless", 4),
    konst("rc", "constqp", 0),
    konst("rc", "vbr", 1),
    konst("rc", "cbr", 2),
    deprecated("rc", "cbr_ld_hq", 8 | RC_MODE_DEPRECATED),
    deprecated("rc", "cbr_hq", 16 | RC_MODE_DEPRECATED),
    deprecated("rc", "vbr_hq", 32 | RC_MODE_DEPRECATED),
    konst("multipass", "disabled", 0),
    konst("multipass", "qres", 1),
    konst("multipass", "fullres", 2),
    konst("b_ref_mode", "disabled", 0),
    konst("b_ref_mode", "each", 1),
    konst("b_ref_mode", "middle", 2),
];

pub static H264_NVENC: CodecDescriptor = CodecDescriptor {
    name: "h264_nvenc",
    family: EncoderFamily::Nvenc,
    caps: Capabilities {
        b_frames: true,
        adaptive_b: true,
        frame_skip_option: "",
        spatial_aq_option: "spatial-aq",
        temporal_aq_option: "temporal-aq",
        max_reference_frames: 16,
    },
    options: nvenc_options!(
        boolean("spatial-aq", 0),
        boolean("temporal-aq", 0),
        boolean("b_adapt", 1),
        boolean("single-slice-intra-refresh", 0),
    ),
    units: NVENC_UNITS,
    field_defaults: CodecFields::new(),
};

pub static HEVC_NVENC: CodecDescriptor = CodecDescriptor {
    name: "hevc_nvenc",
    family: EncoderFamily::Nvenc,
    caps: Capabilities {
        b_frames: true,
        adaptive_b: false,
        frame_skip_option: "",
        spatial_aq_option: "spatial_aq",
        temporal_aq_option: "temporal_aq",
        max_reference_frames: 4,
    },
    options: nvenc_options!(boolean("spatial_aq", 0), boolean("temporal_aq", 0)),
    units: NVENC_UNITS,
    field_defaults: CodecFields::new(),
};

/// Every codec the encoder mappers know about.
pub static CODECS: &[&CodecDescriptor] = &[&AMF_H264, &AMF_HEVC, &H264_NVENC, &HEVC_NVENC];

pub fn find(name: &str) -> Option<&'static CodecDescriptor> {
    CODECS.iter().copied().find(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_names_are_unique_per_codec() {
        for codec in CODECS {
            for (i, o) in codec.options.iter().enumerate() {
                assert!(
                    codec.options[i + 1..].iter().all(|p| p.name != o.name),
                    "{} declares {} twice",
                    codec.name,
                    o.name
                );
            }
        }
    }

    #[test]
    fn unit_lookups_resolve_both_ways() {
        assert_eq!(H264_NVENC.unit_value("rc", "cbr"), Some(2));
        assert_eq!(H264_NVENC.unit_name("preset", 15), Some("p4"));
        assert_eq!(HEVC_NVENC.unit_name("b_ref_mode", 2), Some("middle"));
        assert_eq!(AMF_H264.unit_value("quality", "speed"), Some(1));
        assert_eq!(AMF_HEVC.unit_value("quality", "speed"), Some(10));
        assert!(H264_NVENC.unit_entries("rc").all(|c| c.value & RC_MODE_DEPRECATED == 0));
        assert_eq!(H264_NVENC.unit_entries("rc").count(), 3);
    }

    #[test]
    fn capability_table_matches_option_tables() {
        for codec in CODECS {
            if !codec.caps.frame_skip_option.is_empty() {
                assert!(codec.option(codec.caps.frame_skip_option).is_some());
            }
            assert!(codec.option(codec.caps.spatial_aq_option).is_some());
            assert!(codec.option(codec.caps.temporal_aq_option).is_some());
            assert_eq!(codec.option("b_adapt").is_some(), codec.caps.adaptive_b);
        }
        assert!(AMF_H264.option("qp_b").is_some());
        assert!(AMF_HEVC.option("qp_b").is_none());
        assert!(find("h264_nvenc").is_some());
        assert!(find("libx264").is_none());
    }
}
