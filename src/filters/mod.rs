// ============================================================================
// FILTERS - per-instance video filters driven by a settings document
// ============================================================================
//
// Each filter follows the same lifecycle:
//
//   get_defaults(settings)   fill the default layer
//   migrate(settings, ver)   upgrade documents written by older versions
//   update(settings)         read settings into typed state
//   tick()                   once per frame, before any render
//   render(upstream)         `Rendered(texture)` or `Skip`
//
// Renders are cached per tick: calling `render` twice in one tick reuses the
// textures produced by the first call.

pub mod blur;
pub mod sdf_effects;
pub mod source;

pub use blur::{BlurOrchestrator, BlurVisibility, MaskConfig, MaskType};
pub use sdf_effects::{DistanceFieldPipeline, SdfLayers, SdfVisibility};
pub use source::{SourceCapture, SourceCatalog, TextureSource};

/// Unpack a host colour integer (r in bits 0-7, g 8-15, b 16-23) into
/// normalised rgb.
pub fn unpack_rgb(packed: i64) -> [f32; 3] {
    let bits = packed as u32;
    [
        (bits & 0xFF) as f32 / 255.0,
        ((bits >> 8) & 0xFF) as f32 / 255.0,
        ((bits >> 16) & 0xFF) as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_channels_are_little_endian() {
        assert_eq!(unpack_rgb(0x00_00_00_FF), [1.0, 0.0, 0.0]);
        assert_eq!(unpack_rgb(0x00_00_FF_00), [0.0, 1.0, 0.0]);
        assert_eq!(unpack_rgb(0xFF_FF_00_00), [0.0, 0.0, 1.0]);
    }
}
