// ============================================================================
// GPU MODULE - wgpu implementation of the gfx backend
// ============================================================================
//
// Architecture:
//   context.rs - wgpu Device, Queue, adapter init
//   shaders.rs - WGSL prelude, binding generator and effect bodies
//   backend.rs - `gfx::Backend` impl: pipelines, draws, clears, readback
//   pool.rs    - render-target surface recycling
// ============================================================================

pub mod backend;
pub mod context;
pub mod pool;
pub mod shaders;

pub use backend::{GpuBackend, GpuSurface};
