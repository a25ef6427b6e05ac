// ============================================================================
// BroadcastFX - real-time video filters and hardware encoder option mapping
// ============================================================================
//
// Filters (blur, SDF effects) run against the capability set in `gfx`, which
// is backed either by the rayon CPU renderer (`gfx::cpu`) or by wgpu (`gpu`).
// Encoder mappers translate a flat settings document into AMF / NVENC
// native option sets.  `cli` drives both headlessly.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod blur;
pub mod cli;
pub mod encoder;
pub mod filters;
pub mod gfx;
pub mod gpu;
pub mod logger;
pub mod migration;
pub mod settings;
pub mod version;

pub use gfx::{GfxError, GraphicsDevice, RenderResult, Texture};
pub use settings::SettingsStore;
pub use version::Version;
