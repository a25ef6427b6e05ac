// ============================================================================
// ENCODER MODULE - settings → hardware encoder option mapping
// ============================================================================
//
// Architecture:
//   context.rs     - CodecContext trait + in-memory OptionContext
//   codecs.rs      - option/unit tables of amf_h264, amf_hevc, h264_nvenc, hevc_nvenc
//   ratecontrol.rs - rate-control mode → active field set
//   tools.rs       - option read-back printers used by `log_options`
//   amf.rs         - AMD AMF mapper
//   nvenc.rs       - NVIDIA NVENC mapper
// ============================================================================

pub mod amf;
pub mod codecs;
pub mod context;
pub mod nvenc;
pub mod ratecontrol;
pub mod tools;

use std::collections::BTreeMap;
use std::path::Path;

use crate::settings::SettingsStore;
use crate::version::Version;

pub use context::{CodecContext, CodecDescriptor, CodecFields, EncoderFamily, OptionContext};
pub use ratecontrol::ActiveFieldSet;

/// Settings key written back for hosts that cap the stream bitrate (kbit/s).
pub const KEY_HOST_BITRATE: &str = "bitrate";

/// Settings key written back with a host-readable rate-control name.
pub const KEY_HOST_RATE_CONTROL: &str = "rate_control";

#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("{codec} has no option '{option}'")]
    UnknownOption { codec: String, option: String },
    #[error("option '{option}' expects {expected}")]
    TypeMismatch {
        option: String,
        expected: &'static str,
    },
    #[error("value {value} is out of range for option '{option}'")]
    OutOfRange { option: String, value: String },
    #[error("no encoder mapper handles codec '{0}'")]
    UnknownCodec(String),
}

/// Property key → state (visible, or editable while running).
pub type PropertyStates = BTreeMap<&'static str, bool>;

/// Log a failed native option call and carry on.  A rejected option must not
/// abort the rest of an update.
pub(crate) fn check(component: &str, codec: &str, result: Result<(), EncoderError>) {
    if let Err(e) = result {
        log::warn!("<{}> [{}] {}", component, codec, e);
    }
}

/// Check for a vendor runtime library without keeping it loaded.
pub(crate) fn library_available(name: &str) -> bool {
    // Loading runs the library's initialisers; vendor runtimes are trusted.
    match unsafe { libloading::Library::new(Path::new(name)) } {
        Ok(_) => true,
        Err(e) => {
            log::debug!("<encoder> '{}' not loadable: {}", name, e);
            false
        }
    }
}

// ============================================================================
// EncoderOptionMapper
// ============================================================================

/// Translates a flat settings document into the native option set of one
/// hardware encoder family.  Mappers hold no state between calls.
pub trait EncoderOptionMapper: Send + Sync {
    fn family(&self) -> EncoderFamily;

    fn handles(&self, codec: &str) -> bool {
        codecs::find(codec).is_some_and(|c| c.family == self.family())
    }

    /// Whether the vendor runtime can be loaded on this machine.
    fn is_available(&self) -> bool;

    /// Register sentinel defaults for every key the mapper reads.
    fn get_defaults(&self, settings: &mut SettingsStore);

    /// Which properties to show for the current settings.
    fn visibility(&self, settings: &SettingsStore, context: &dyn CodecContext) -> PropertyStates;

    /// Which properties stay editable while the encoder is running.
    fn runtime_properties(&self) -> PropertyStates;

    /// Apply `settings` to `context`.  May write host compatibility keys back
    /// into `settings`.
    fn update(&self, settings: &mut SettingsStore, context: &mut dyn CodecContext);

    /// Final adjustments after the generic update ran.
    fn override_update(&self, _context: &mut dyn CodecContext) {}

    /// Upgrade a document written by `version`.  Safe to call repeatedly.
    fn migrate(&self, settings: &mut SettingsStore, version: Version, context: &dyn CodecContext);

    /// Read the effective native options back, one line each.  Lines are also
    /// sent to the log at info level.
    fn log_options(&self, context: &dyn CodecContext) -> Vec<String>;
}

// ============================================================================
// EncoderRegistry
// ============================================================================

/// Codec name → mapper.
pub struct EncoderRegistry {
    mappers: Vec<Box<dyn EncoderOptionMapper>>,
}

impl EncoderRegistry {
    pub fn new() -> Self {
        Self {
            mappers: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(amf::AmfMapper));
        registry.register(Box::new(nvenc::NvencMapper));
        registry
    }

    pub fn register(&mut self, mapper: Box<dyn EncoderOptionMapper>) {
        self.mappers.push(mapper);
    }

    pub fn find(&self, codec: &str) -> Result<&dyn EncoderOptionMapper, EncoderError> {
        self.mappers
            .iter()
            .find(|m| m.handles(codec))
            .map(|m| &**m)
            .ok_or_else(|| EncoderError::UnknownCodec(codec.to_string()))
    }

    /// Codec names some registered mapper handles.
    pub fn codec_names(&self) -> Vec<&'static str> {
        codecs::CODECS
            .iter()
            .map(|c| c.name)
            .filter(|name| self.mappers.iter().any(|m| m.handles(name)))
            .collect()
    }
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_every_known_codec() {
        let registry = EncoderRegistry::with_defaults();
        assert_eq!(
            registry.codec_names(),
            vec!["amf_h264", "amf_hevc", "h264_nvenc", "hevc_nvenc"]
        );
        assert_eq!(registry.find("amf_hevc").unwrap().family(), EncoderFamily::Amf);
        assert_eq!(registry.find("h264_nvenc").unwrap().family(), EncoderFamily::Nvenc);
        assert!(matches!(
            registry.find("libx264"),
            Err(EncoderError::UnknownCodec(_))
        ));
    }

    #[test]
    fn empty_registry_handles_nothing() {
        let registry = EncoderRegistry::new();
        assert!(registry.codec_names().is_empty());
        assert!(registry.find("amf_h264").is_err());
    }
}
