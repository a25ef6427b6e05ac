// ============================================================================
// GPU BACKEND - catalog effects executed through wgpu render pipelines
// ============================================================================
//
// Every draw is one full-screen triangle into the target's texture:
//
//   1. textures bound as inputs are resolved to views; a texture that is also
//      the target is snapshotted into a scratch surface first
//   2. parameter values are packed into the uniform block (see `shaders`)
//   3. the (effect, technique, format, blend) pipeline is fetched or built
//   4. one render pass with `LoadOp::Load`, so hardware blending sees the
//      previous contents
//
// Readback copies into a staging buffer and blocks on `Maintain::Wait`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::pool::TexturePool;
use super::shaders;
use crate::gfx::catalog::{EffectDescriptor, ParamKind};
use crate::gfx::effect::ParamValue;
use crate::gfx::texture::TextureStorage;
use crate::gfx::{
    Backend, BlendFactor, BlendState, DrawCall, GfxError, GfxResult, Texture, TextureFormat,
};

/// GPU-side storage of a `gfx::Texture`.
#[derive(Clone)]
pub struct GpuSurface {
    pub(crate) texture: Arc<wgpu::Texture>,
    pub(crate) view: Arc<wgpu::TextureView>,
}

struct EffectProgram {
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

type PipelineKey = (&'static str, usize, TextureFormat, BlendState);

pub struct GpuBackend {
    ctx: GpuContext,
    sampler: wgpu::Sampler,
    /// Bound in place of unset texture parameters: 1x1 transparent black.
    dummy: GpuSurface,
    programs: Mutex<HashMap<&'static str, Arc<EffectProgram>>>,
    pipelines: Mutex<HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>>,
    pool: Mutex<TexturePool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn surface(texture: &Texture) -> GfxResult<&GpuSurface> {
    match texture.storage() {
        TextureStorage::Gpu(s) => Ok(s),
        _ => Err(GfxError::ForeignTexture),
    }
}

fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

fn storage_format(format: TextureFormat, float32_filterable: bool) -> TextureFormat {
    match format {
        TextureFormat::Rgba32Float if !float32_filterable => TextureFormat::Rgba16Float,
        f => f,
    }
}

fn bytes_per_texel(format: TextureFormat) -> u32 {
    match format {
        TextureFormat::Rgba8 => 4,
        TextureFormat::Rgba16Float => 8,
        TextureFormat::Rgba32Float => 16,
    }
}

fn aligned_bytes_per_row(width: u32, format: TextureFormat) -> u32 {
    let unaligned = width * bytes_per_texel(format);
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

fn blend_factor(f: BlendFactor) -> wgpu::BlendFactor {
    match f {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InvDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

fn wgpu_blend(blend: &BlendState) -> Option<wgpu::BlendState> {
    if !blend.enabled {
        return None;
    }
    Some(wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: blend_factor(blend.color_src),
            dst_factor: blend_factor(blend.color_dst),
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: blend_factor(blend.alpha_src),
            dst_factor: blend_factor(blend.alpha_dst),
            operation: wgpu::BlendOperation::Add,
        },
    })
}

// ============================================================================
// Texel encoding
// ============================================================================

pub(crate) fn f16_from_f32(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = (bits >> 16) & 0x8000;
    let exp = ((bits >> 23) & 0xFF) as i32;
    let mant = bits & 0x7F_FFFF;

    if exp == 0xFF {
        let nan = if mant != 0 { 0x200 } else { 0 };
        return (sign | 0x7C00 | nan) as u16;
    }
    let e = exp - 127 + 15;
    if e >= 0x1F {
        return (sign | 0x7C00) as u16;
    }
    if e <= 0 {
        if e < -10 {
            return sign as u16;
        }
        let full = mant | 0x80_0000;
        let shift = (14 - e) as u32;
        let m = (full + (1 << (shift - 1))) >> shift;
        return (sign | m) as u16;
    }
    let half = sign | ((e as u32) << 10) | (mant >> 13);
    // Round half up; a carry into the exponent is still the right value
    (half + ((mant >> 12) & 1)) as u16
}

pub(crate) fn f32_from_f16(half: u16) -> f32 {
    let sign = ((half & 0x8000) as u32) << 16;
    let exp = ((half >> 10) & 0x1F) as u32;
    let mant = (half & 0x3FF) as u32;
    match exp {
        0 => {
            let v = mant as f32 * 2f32.powi(-24);
            if sign != 0 { -v } else { v }
        }
        0x1F => f32::from_bits(sign | 0x7F80_0000 | (mant << 13)),
        _ => f32::from_bits(sign | ((exp + 112) << 23) | (mant << 13)),
    }
}

fn encode_texels(pixels: &[[f32; 4]], format: TextureFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * bytes_per_texel(format) as usize);
    for p in pixels {
        for c in p {
            match format {
                TextureFormat::Rgba8 => out.push((c.clamp(0.0, 1.0) * 255.0).round() as u8),
                TextureFormat::Rgba16Float => {
                    out.extend_from_slice(&f16_from_f32(*c).to_le_bytes())
                }
                TextureFormat::Rgba32Float => out.extend_from_slice(&c.to_le_bytes()),
            }
        }
    }
    out
}

fn decode_texel(bytes: &[u8], format: TextureFormat) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    for (c, v) in out.iter_mut().enumerate() {
        *v = match format {
            TextureFormat::Rgba8 => bytes[c] as f32 / 255.0,
            TextureFormat::Rgba16Float => {
                f32_from_f16(u16::from_le_bytes([bytes[c * 2], bytes[c * 2 + 1]]))
            }
            TextureFormat::Rgba32Float => {
                let at = c * 4;
                f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
            }
        };
    }
    out
}

/// Pack parameter values into uniform slots in declaration order.
fn pack_uniforms(effect: &EffectDescriptor, values: &[ParamValue]) -> Vec<[f32; 4]> {
    let mut slots = vec![[0.0f32; 4]; shaders::uniform_slots(effect)];
    let mut slot = 0usize;
    for (decl, value) in effect.params.iter().zip(values) {
        match value {
            ParamValue::Float(v) => slots[slot][0] = *v,
            ParamValue::Float2(v) => slots[slot][..2].copy_from_slice(v),
            ParamValue::Float4(v) => slots[slot] = *v,
            ParamValue::FloatArray(v) => {
                for (i, x) in v.iter().enumerate() {
                    slots[slot + i / 4][i % 4] = *x;
                }
            }
            ParamValue::Texture(_) => {}
        }
        slot += shaders::slot_count(decl.kind);
    }
    slots
}

// ============================================================================
// Backend
// ============================================================================

impl GpuBackend {
    /// Create the backend, or `None` when no adapter is available.
    pub fn new(power_preference: &str) -> Option<Self> {
        let ctx = GpuContext::new(power_preference)?;
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("linear_clamp"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let dummy = Self::alloc_surface(&ctx, 1, 1, TextureFormat::Rgba8);
        ctx.queue.write_texture(
            dummy.texture.as_image_copy(),
            &[0u8; 4],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        log::info!("<gpu> adapter '{}' ready", ctx.adapter_name);
        if !ctx.float32_filterable {
            log::warn!("<gpu> 32-bit float textures are not filterable, storing them as half float");
        }
        Some(Self {
            ctx,
            sampler,
            dummy,
            programs: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            pool: Mutex::new(TexturePool::new()),
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    /// Format a texture of the requested format is actually stored in.
    fn storage_format(&self, format: TextureFormat) -> TextureFormat {
        storage_format(format, self.ctx.float32_filterable)
    }

    fn alloc_surface(ctx: &GpuContext, width: u32, height: u32, format: TextureFormat) -> GpuSurface {
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("gfx_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuSurface {
            texture: Arc::new(texture),
            view: Arc::new(view),
        }
    }

    /// Run `f` inside a validation error scope so shader or pipeline errors
    /// surface as `GfxError` instead of the device's uncaptured-error panic.
    fn validated<T>(&self, what: &str, f: impl FnOnce() -> T) -> GfxResult<T> {
        self.ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        match pollster::block_on(self.ctx.device.pop_error_scope()) {
            Some(err) => Err(GfxError::Backend(format!("{}: {}", what, err))),
            None => Ok(value),
        }
    }

    fn program(&self, effect: &'static EffectDescriptor) -> GfxResult<Arc<EffectProgram>> {
        if let Some(p) = lock(&self.programs).get(effect.name) {
            return Ok(Arc::clone(p));
        }

        let source = shaders::module_source(effect)
            .ok_or_else(|| GfxError::UnknownEffect(effect.name.to_string()))?;
        let device = &self.ctx.device;
        let module = self.validated(effect.name, || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(effect.name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })?;

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        for i in 0..shaders::texture_count(effect) {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + i as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(effect.name),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(effect.name),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let program = Arc::new(EffectProgram {
            module,
            bind_group_layout,
            pipeline_layout,
        });
        lock(&self.programs).insert(effect.name, Arc::clone(&program));
        Ok(program)
    }

    fn pipeline(
        &self,
        call: &DrawCall<'_>,
        format: TextureFormat,
        program: &EffectProgram,
    ) -> GfxResult<Arc<wgpu::RenderPipeline>> {
        let key = (call.effect.name, call.technique, format, call.blend);
        if let Some(p) = lock(&self.pipelines).get(&key) {
            return Ok(Arc::clone(p));
        }

        let technique = call.effect.techniques[call.technique];
        let entry = shaders::entry_point(technique);
        let device = &self.ctx.device;
        let pipeline = self.validated(technique, || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(technique),
                layout: Some(&program.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.module,
                    entry_point: "vs_main",
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &program.module,
                    entry_point: &entry,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: wgpu_format(format),
                        blend: wgpu_blend(&call.blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                multiview: None,
            })
        })?;

        let pipeline = Arc::new(pipeline);
        lock(&self.pipelines).insert(key, Arc::clone(&pipeline));
        Ok(pipeline)
    }

    fn clear_surface(&self, target: &GpuSurface, color: [f32; 4]) {
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("clear") });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color[0] as f64,
                            g: color[1] as f64,
                            b: color[2] as f64,
                            a: color[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.ctx.submit_one(encoder);
    }
}

impl Backend for GpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: Option<&[[f32; 4]]>,
    ) -> GfxResult<Texture> {
        if !self.ctx.supports_size(width, height) {
            return Err(GfxError::InvalidSize(width, height));
        }
        let format = self.storage_format(format);

        let surface = match pixels {
            Some(p) => {
                let surface = Self::alloc_surface(&self.ctx, width, height, format);
                self.ctx.queue.write_texture(
                    surface.texture.as_image_copy(),
                    &encode_texels(p, format),
                    wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(width * bytes_per_texel(format)),
                        rows_per_image: Some(height),
                    },
                    wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                );
                surface
            }
            None => {
                let pooled = lock(&self.pool).acquire(width, height, format);
                let surface = pooled
                    .unwrap_or_else(|| Self::alloc_surface(&self.ctx, width, height, format));
                self.clear_surface(&surface, [0.0; 4]);
                surface
            }
        };
        Ok(Texture::new(width, height, format, TextureStorage::Gpu(surface)))
    }

    fn read_pixels(&self, texture: &Texture) -> GfxResult<Vec<[f32; 4]>> {
        let src = surface(texture)?;
        let (width, height) = texture.size();
        let format = texture.format();
        let bytes_per_row = aligned_bytes_per_row(width, format);
        let device = &self.ctx.device;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size: bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback") });
        encoder.copy_texture_to_buffer(
            src.texture.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.submit_one(encoder);

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(GfxError::Backend(format!("readback map error: {:?}", e))),
            Err(e) => return Err(GfxError::Backend(format!("readback channel error: {:?}", e))),
        }

        let texel = bytes_per_texel(format) as usize;
        let mut out = Vec::with_capacity(width as usize * height as usize);
        {
            let mapped = slice.get_mapped_range();
            for y in 0..height as usize {
                let row = &mapped[y * bytes_per_row as usize..];
                for x in 0..width as usize {
                    out.push(decode_texel(&row[x * texel..(x + 1) * texel], format));
                }
            }
        }
        staging.unmap();
        Ok(out)
    }

    fn clear(&self, target: &Texture, color: [f32; 4]) -> GfxResult<()> {
        self.clear_surface(surface(target)?, color);
        Ok(())
    }

    fn draw(&self, target: &Texture, call: &DrawCall<'_>) -> GfxResult<()> {
        let dst = surface(target)?;
        let program = self.program(call.effect)?;
        let pipeline = self.pipeline(call, target.format(), &program)?;
        let device = &self.ctx.device;
        let (width, height) = target.size();

        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("draw") });

        let mut views: Vec<Arc<wgpu::TextureView>> = Vec::new();
        for (decl, value) in call.effect.params.iter().zip(call.values) {
            if decl.kind != ParamKind::Texture {
                continue;
            }
            let view = match value {
                ParamValue::Texture(Some(t)) if Texture::ptr_eq(t, target) => {
                    let scratch = Self::alloc_surface(&self.ctx, width, height, target.format());
                    encoder.copy_texture_to_texture(
                        dst.texture.as_image_copy(),
                        scratch.texture.as_image_copy(),
                        wgpu::Extent3d {
                            width,
                            height,
                            depth_or_array_layers: 1,
                        },
                    );
                    Arc::clone(&scratch.view)
                }
                ParamValue::Texture(Some(t)) => Arc::clone(&surface(t)?.view),
                _ => Arc::clone(&self.dummy.view),
            };
            views.push(view);
        }

        let slots = pack_uniforms(call.effect, call.values);
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("effect_uniforms"),
            contents: bytemuck::cast_slice(&slots),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        for (i, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(call.effect.name),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("effect_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dst.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.ctx.submit_one(encoder);
        Ok(())
    }

    fn recycle(&self, texture: Texture) {
        if !texture.is_unique() {
            return;
        }
        if let TextureStorage::Gpu(s) = texture.storage() {
            let (w, h) = texture.size();
            lock(&self.pool).release(s.clone(), w, h, texture.format());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::catalog::{self, names};

    #[test]
    fn half_float_conversion_keeps_field_values() {
        for v in [0.0f32, 1.0, -1.0, 0.5, 0.25, 65504.0, 1.0e-5, -0.003] {
            let back = f32_from_f16(f16_from_f32(v));
            assert!((back - v).abs() <= v.abs() * 1e-3 + 1e-7, "{} -> {}", v, back);
        }
        assert_eq!(f16_from_f32(1.0), 0x3C00);
        assert_eq!(f16_from_f32(f32::INFINITY), 0x7C00);
        assert!(f32_from_f16(f16_from_f32(f32::NAN)).is_nan());
        assert_eq!(f16_from_f32(1.0e6), 0x7C00);
    }

    #[test]
    fn uniforms_follow_slot_layout() {
        let effect = catalog::find(names::BLUR_GAUSSIAN_LINEAR).unwrap();
        let mut kernel = vec![0.0; catalog::KERNEL_SIZE];
        kernel[0] = 0.5;
        kernel[5] = 0.125;
        let values = [
            ParamValue::Texture(None),
            ParamValue::Float2([0.1, 0.2]),
            ParamValue::Float2([1.0, 1.0]),
            ParamValue::Float(3.0),
            ParamValue::FloatArray(kernel),
        ];
        let slots = pack_uniforms(effect, &values);
        assert_eq!(slots.len(), 3 + catalog::KERNEL_SIZE / 4);
        assert_eq!(slots[0], [0.1, 0.2, 0.0, 0.0]);
        assert_eq!(slots[2][0], 3.0);
        assert_eq!(slots[3][0], 0.5);
        assert_eq!(slots[4][1], 0.125);
    }

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(aligned_bytes_per_row(1, TextureFormat::Rgba8), 256);
        assert_eq!(aligned_bytes_per_row(64, TextureFormat::Rgba8), 256);
        assert_eq!(aligned_bytes_per_row(64, TextureFormat::Rgba16Float), 512);
        assert_eq!(aligned_bytes_per_row(65, TextureFormat::Rgba16Float), 768);
        assert_eq!(aligned_bytes_per_row(16, TextureFormat::Rgba32Float), 256);
        assert_eq!(aligned_bytes_per_row(17, TextureFormat::Rgba32Float), 512);
    }

    #[test]
    fn full_float_texels_keep_large_distances() {
        let texel = [1000.125f32, -0.0001, 4096.5, 1.0];
        let bytes = encode_texels(&[texel], TextureFormat::Rgba32Float);
        assert_eq!(bytes.len(), 16);
        assert_eq!(decode_texel(&bytes, TextureFormat::Rgba32Float), texel);
    }

    #[test]
    fn full_float_falls_back_without_filtering() {
        assert_eq!(
            storage_format(TextureFormat::Rgba32Float, true),
            TextureFormat::Rgba32Float
        );
        assert_eq!(
            storage_format(TextureFormat::Rgba32Float, false),
            TextureFormat::Rgba16Float
        );
        assert_eq!(storage_format(TextureFormat::Rgba8, false), TextureFormat::Rgba8);
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn gpu_blit_matches_cpu() {
        use crate::gfx::GraphicsDevice;
        let Some(backend) = GpuBackend::new("high performance") else {
            return;
        };
        let device = GraphicsDevice::new(Arc::new(backend));
        let pixels = [[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0], [1.0; 4]];
        let src = device
            .create_texture(2, 2, TextureFormat::Rgba8, Some(&pixels))
            .unwrap();
        let mut rt = device.create_render_target(TextureFormat::Rgba8);
        {
            let mut op = rt.render(2, 2).unwrap();
            op.blit(&src).unwrap();
        }
        let out = device.read_pixels(&rt.get_texture().unwrap()).unwrap();
        for (a, b) in out.iter().zip(pixels.iter()) {
            for c in 0..4 {
                assert!((a[c] - b[c]).abs() < 0.01);
            }
        }
    }
}
