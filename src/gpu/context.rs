// ============================================================================
// GPU CONTEXT - wgpu Device, Queue, and adapter initialization
// ============================================================================

/// Core wgpu resources for the render backend.  Created once; if creation
/// fails the caller falls back to the CPU renderer.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
    /// Maximum texture dimension supported by this device.
    pub max_texture_dim: u32,
    /// `Rgba32Float` can be bound to the linear sampler.
    pub float32_filterable: bool,
}

impl GpuContext {
    /// Attempt to create a GPU context.  Tries hardware first, then a
    /// software rasterizer (`force_fallback_adapter`).
    pub fn new(power_preference: &str) -> Option<Self> {
        if let Some(ctx) = pollster::block_on(Self::new_async(power_preference, false)) {
            return Some(ctx);
        }
        log::warn!("<gpu> hardware adapter unavailable, trying software fallback");
        pollster::block_on(Self::new_async(power_preference, true))
    }

    async fn new_async(power_preference: &str, force_fallback: bool) -> Option<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let power = match power_preference.to_lowercase().as_str() {
            "low power" | "integrated" => wgpu::PowerPreference::LowPower,
            _ => wgpu::PowerPreference::HighPerformance,
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power,
                compatible_surface: None, // headless, offscreen only
                force_fallback_adapter: force_fallback,
            })
            .await?;

        let adapter_name = adapter.get_info().name.clone();
        let limits = adapter.limits();
        let features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("BroadcastFX GPU"),
                    required_features: features,
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await
            .ok()?;

        Some(Self {
            device,
            queue,
            adapter_name,
            max_texture_dim: limits.max_texture_dimension_2d,
            float32_filterable: features.contains(wgpu::Features::FLOAT32_FILTERABLE),
        })
    }

    /// Check if a texture of the given dimensions can be created.
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    /// Submit a single encoder's commands.
    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
