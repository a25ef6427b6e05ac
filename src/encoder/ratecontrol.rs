// ============================================================================
// RATE CONTROL - mode → set of settings groups that apply
// ============================================================================

/// Settings groups a rate-control mode makes meaningful.  Mappers write the
/// native options of an active group and reset those of an inactive one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActiveFieldSet {
    pub bitrate: bool,
    pub bitrate_range: bool,
    pub quality: bool,
    pub qp_limits: bool,
    pub qp: bool,
}

impl ActiveFieldSet {
    pub const ALL: Self = Self {
        bitrate: true,
        bitrate_range: true,
        quality: true,
        qp_limits: true,
        qp: true,
    };

    pub const BITRATE: Self = Self {
        bitrate: true,
        bitrate_range: false,
        quality: false,
        qp_limits: false,
        qp: false,
    };

    pub const QP: Self = Self {
        bitrate: false,
        bitrate_range: false,
        quality: false,
        qp_limits: false,
        qp: true,
    };
}

// ============================================================================
// AMF
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmfRateControl {
    Cqp,
    Cbr,
    VbrPeak,
    VbrLatency,
    Invalid,
}

impl AmfRateControl {
    /// Stored `RateControl.Mode` value; anything unknown is `Invalid`.
    pub fn from_int(value: i64) -> Self {
        match value {
            0 => Self::Cqp,
            1 => Self::Cbr,
            2 => Self::VbrPeak,
            3 => Self::VbrLatency,
            _ => Self::Invalid,
        }
    }

    pub fn to_int(self) -> i64 {
        match self {
            Self::Cqp => 0,
            Self::Cbr => 1,
            Self::VbrPeak => 2,
            Self::VbrLatency => 3,
            Self::Invalid => -1,
        }
    }

    /// Native `rc` constant name.
    pub fn option_name(self) -> Option<&'static str> {
        match self {
            Self::Cqp => Some("cqp"),
            Self::Cbr => Some("cbr"),
            Self::VbrPeak => Some("vbr_peak"),
            Self::VbrLatency => Some("vbr_latency"),
            Self::Invalid => None,
        }
    }

    /// VBR keeps the per-frame-type QP bounds; AMF has no quality target
    /// or QP limits.
    pub fn active_fields(self) -> ActiveFieldSet {
        match self {
            Self::Cqp => ActiveFieldSet::QP,
            Self::Cbr | Self::Invalid => ActiveFieldSet::BITRATE,
            Self::VbrPeak | Self::VbrLatency => ActiveFieldSet {
                bitrate: true,
                bitrate_range: true,
                qp: true,
                ..ActiveFieldSet::default()
            },
        }
    }

    pub const ALL: [Self; 4] = [Self::Cqp, Self::Cbr, Self::VbrPeak, Self::VbrLatency];
}

/// AMF quality preset, stored as `Preset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmfPreset {
    Speed,
    Balanced,
    Quality,
}

impl AmfPreset {
    pub fn from_int(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Speed),
            1 => Some(Self::Balanced),
            2 => Some(Self::Quality),
            _ => None,
        }
    }

    pub fn to_int(self) -> i64 {
        match self {
            Self::Speed => 0,
            Self::Balanced => 1,
            Self::Quality => 2,
        }
    }

    /// Native `quality` constant name.
    pub fn option_name(self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Balanced => "balanced",
            Self::Quality => "quality",
        }
    }
}

// ============================================================================
// NVENC
// ============================================================================

/// NVENC rate control, decoded from the native `rc` constant name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NvencRateControl {
    ConstQp,
    Cbr,
    Vbr,
    /// Unset or a name this mapper does not special-case.
    Other,
}

impl NvencRateControl {
    pub fn from_option_name(name: Option<&str>) -> Self {
        match name {
            Some("constqp") => Self::ConstQp,
            Some("cbr") => Self::Cbr,
            Some("vbr") => Self::Vbr,
            _ => Self::Other,
        }
    }

    /// Decode the stored `RateControl.Mode` value the way the properties
    /// list encodes it (the native `rc` constants).
    pub fn from_int(value: i64) -> Self {
        match value {
            0 => Self::ConstQp,
            1 => Self::Vbr,
            2 => Self::Cbr,
            _ => Self::Other,
        }
    }

    pub fn active_fields(self) -> ActiveFieldSet {
        match self {
            Self::ConstQp => ActiveFieldSet::QP,
            Self::Cbr => ActiveFieldSet::BITRATE,
            Self::Vbr | Self::Other => ActiveFieldSet::ALL,
        }
    }

    /// Name reported to the host in `rate_control`.
    pub fn host_name(self) -> Option<&'static str> {
        match self {
            Self::ConstQp => Some("CQP"),
            Self::Cbr => Some("CBR"),
            Self::Vbr => Some("VBR"),
            Self::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amf_cqp_only_enables_qp() {
        let f = AmfRateControl::Cqp.active_fields();
        assert_eq!(f, ActiveFieldSet::QP);
        assert!(!f.bitrate && !f.bitrate_range);
    }

    #[test]
    fn amf_vbr_latency_enables_bitrate_range_and_qp() {
        let f = AmfRateControl::VbrLatency.active_fields();
        assert!(f.bitrate && f.bitrate_range && f.qp);
        assert!(!f.quality && !f.qp_limits);
        assert_eq!(f, AmfRateControl::VbrPeak.active_fields());
    }

    #[test]
    fn amf_unknown_mode_behaves_like_cbr() {
        assert_eq!(AmfRateControl::from_int(42), AmfRateControl::Invalid);
        assert_eq!(
            AmfRateControl::Invalid.active_fields(),
            AmfRateControl::Cbr.active_fields()
        );
        assert_eq!(AmfRateControl::Invalid.option_name(), None);
        for rc in AmfRateControl::ALL {
            assert_eq!(AmfRateControl::from_int(rc.to_int()), rc);
        }
    }

    #[test]
    fn nvenc_modes() {
        assert_eq!(
            NvencRateControl::from_option_name(Some("constqp")).active_fields(),
            ActiveFieldSet::QP
        );
        assert_eq!(
            NvencRateControl::from_option_name(Some("cbr")).active_fields(),
            ActiveFieldSet::BITRATE
        );
        assert_eq!(NvencRateControl::Vbr.active_fields(), ActiveFieldSet::ALL);
        assert_eq!(
            NvencRateControl::from_option_name(Some("vbr_hq")),
            NvencRateControl::Other
        );
        assert_eq!(NvencRateControl::from_option_name(None).active_fields(), ActiveFieldSet::ALL);
        assert_eq!(NvencRateControl::from_int(2), NvencRateControl::Cbr);
    }

    #[test]
    fn amf_presets() {
        assert_eq!(AmfPreset::from_int(1), Some(AmfPreset::Balanced));
        assert_eq!(AmfPreset::from_int(-1), None);
        assert_eq!(AmfPreset::Quality.option_name(), "quality");
    }
}
