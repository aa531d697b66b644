//! [`GraphicsDevice`] backend on wgpu.
//!
//! wgpu has no separately bindable blend or raster state, so the device
//! records draws during the frame and resolves one render pipeline per
//! (program, blend, raster) combination. Constant buffer contents are
//! snapshotted into a per-frame uniform ring at draw time: `queue.write_buffer`
//! only takes effect at submit, and per-pass constants change between draws.

use std::collections::HashMap;
use std::mem;
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use crate::error::RenderError;
use crate::renderer::device::*;
use crate::renderer::pipeline_builder::ModelPipelineBuilder;
use crate::renderer::vertex::{DataType, InputLayout, VertexElement};

const CONSTANT_SLOT_COUNT: usize = 4;
/// Binding size of each vertex constant slot: camera, unused, bones, per-pass.
const CONSTANT_SLOT_SIZES: [u64; CONSTANT_SLOT_COUNT] = [144, 16, 16384, 80];
const INITIAL_RING_CAPACITY: u64 = 256 * 1024;
const VERTEX_SLOT_COUNT: usize = 2;

enum DeviceBuffer {
    Gpu {
        buffer: wgpu::Buffer,
        size: u64,
        usage: BufferUsage,
    },
    /// CPU copy; uploaded through the ring when a draw reads it.
    Constant { bytes: Vec<u8>, revision: u64 },
}

struct OwnedVertexLayout {
    stride: u64,
    step_mode: wgpu::VertexStepMode,
    attributes: Vec<wgpu::VertexAttribute>,
}

struct Program {
    label: String,
    module: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_entry: String,
    vertex_layouts: Vec<OwnedVertexLayout>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    blend: BlendStateId,
    raster: RasterStateId,
}

#[derive(Debug, Default, Clone, Copy)]
struct Bindings {
    index: Option<(BufferId, IndexFormat)>,
    vertex: [Option<BufferId>; VERTEX_SLOT_COUNT],
    program: Option<ProgramId>,
    blend: Option<BlendStateId>,
    raster: Option<RasterStateId>,
    constants: [Option<BufferId>; CONSTANT_SLOT_COUNT],
    texture: Option<TextureId>,
    sampler: Option<SamplerId>,
}

struct RecordedDraw {
    pipeline: PipelineKey,
    index: (BufferId, IndexFormat),
    vertex: [Option<BufferId>; VERTEX_SLOT_COUNT],
    constant_offsets: [u32; CONSTANT_SLOT_COUNT],
    textures: (TextureId, SamplerId),
    draw: DrawIndexed,
}

struct ConstantRing {
    buffer: wgpu::Buffer,
    capacity: u64,
    bind_group: wgpu::BindGroup,
    staging: Vec<u8>,
    uploaded: HashMap<(BufferId, u64), u32>,
    zero_offset: Option<u32>,
    alignment: u64,
}

impl ConstantRing {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, capacity: u64) -> Self {
        let buffer = create_ring_buffer(device, capacity);
        let bind_group = create_ring_bind_group(device, layout, &buffer);
        Self {
            buffer,
            capacity,
            bind_group,
            staging: Vec::with_capacity(capacity as usize),
            uploaded: HashMap::new(),
            zero_offset: None,
            alignment: device.limits().min_uniform_buffer_offset_alignment as u64,
        }
    }

    fn push(&mut self, data: &[u8], size: u64) -> u32 {
        let offset = align_to(self.staging.len() as u64, self.alignment);
        self.staging.resize(offset as usize, 0);
        let take = data.len().min(size as usize);
        self.staging.extend_from_slice(&data[..take]);
        self.staging.resize((offset + size) as usize, 0);
        offset as u32
    }

    fn zero_block(&mut self) -> u32 {
        if let Some(offset) = self.zero_offset {
            return offset;
        }
        let largest = CONSTANT_SLOT_SIZES.iter().copied().max().unwrap_or(256);
        let offset = self.push(&[], largest);
        self.zero_offset = Some(offset);
        offset
    }

    fn reset(&mut self) {
        self.staging.clear();
        self.uploaded.clear();
        self.zero_offset = None;
    }

    fn flush(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) {
        let required = self.staging.len() as u64;
        if required > self.capacity {
            let new_capacity = required.max(self.capacity * 2);
            log::info!(
                "Growing constant ring: {} -> {} bytes",
                self.capacity,
                new_capacity
            );
            self.buffer = create_ring_buffer(device, new_capacity);
            self.bind_group = create_ring_bind_group(device, layout, &self.buffer);
            self.capacity = new_capacity;
        }
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
    }
}

/// Where [`WgpuDevice::submit_frame`] draws to.
pub struct FrameTarget<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: Option<&'a wgpu::TextureView>,
    /// Clear colour; `None` loads the existing contents.
    pub clear: Option<wgpu::Color>,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    constant_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    buffers: HashMap<BufferId, DeviceBuffer>,
    next_buffer: u32,
    programs: Vec<Program>,
    blend_states: Vec<Option<wgpu::BlendState>>,
    /// Culling enabled per raster state.
    raster_states: Vec<bool>,
    samplers: Vec<wgpu::Sampler>,
    textures: Vec<wgpu::TextureView>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    texture_groups: HashMap<(TextureId, SamplerId), wgpu::BindGroup>,
    ring: ConstantRing,
    bindings: Bindings,
    draws: Vec<RecordedDraw>,
}

impl WgpuDevice {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let constant_entries: Vec<wgpu::BindGroupLayoutEntry> = CONSTANT_SLOT_SIZES
            .iter()
            .enumerate()
            .map(|(binding, &size)| wgpu::BindGroupLayoutEntry {
                binding: binding as u32,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(size),
                },
                count: None,
            })
            .collect();
        let constant_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ModelConstantsLayout"),
            entries: &constant_entries,
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ModelTextureLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ModelPipelineLayout"),
            bind_group_layouts: &[&constant_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let ring = ConstantRing::new(&device, &constant_layout, INITIAL_RING_CAPACITY);

        Self {
            device,
            queue,
            color_format,
            depth_format,
            constant_layout,
            texture_layout,
            pipeline_layout,
            buffers: HashMap::new(),
            next_buffer: 0,
            programs: Vec::new(),
            blend_states: Vec::new(),
            raster_states: Vec::new(),
            samplers: Vec::new(),
            textures: Vec::new(),
            pipelines: HashMap::new(),
            texture_groups: HashMap::new(),
            ring,
            bindings: Bindings::default(),
            draws: Vec::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn register_texture(&mut self, view: wgpu::TextureView) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(view);
        id
    }

    /// Uploads a single-mip RGBA8 texture and registers its view.
    pub fn create_texture_rgba8(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureId, RenderError> {
        let expected = (width as usize) * (height as usize) * 4;
        if pixels.len() != expected {
            return Err(RenderError::InvalidDescriptor(format!(
                "texture '{}' expects {} bytes, got {}",
                label,
                expected,
                pixels.len()
            )));
        }
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(self.register_texture(view))
    }

    /// Number of draws recorded since the last submit.
    pub fn pending_draws(&self) -> usize {
        self.draws.len()
    }

    /// Render pipelines built so far, one per (program, blend, raster).
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Encodes every draw recorded this frame into one render pass and submits it.
    pub fn submit_frame(&mut self, target: &FrameTarget<'_>) -> usize {
        let draws = mem::take(&mut self.draws);
        self.ring
            .flush(&self.device, &self.queue, &self.constant_layout);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ModelEncoder"),
            });

        let mut issued = 0usize;
        {
            let color_load = match target.clear {
                Some(color) => wgpu::LoadOp::Clear(color),
                None => wgpu::LoadOp::Load,
            };
            let depth_load = if target.clear.is_some() {
                wgpu::LoadOp::Clear(1.0)
            } else {
                wgpu::LoadOp::Load
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ModelPass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.color,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: target.depth.map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: depth_load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for recorded in &draws {
                let (Some(pipeline), Some(textures)) = (
                    self.pipelines.get(&recorded.pipeline),
                    self.texture_groups.get(&recorded.textures),
                ) else {
                    continue;
                };
                let Some(index_buffer) = gpu_buffer(&self.buffers, recorded.index.0) else {
                    log::warn!("Skipping draw with released index buffer");
                    continue;
                };

                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.ring.bind_group, &recorded.constant_offsets);
                pass.set_bind_group(1, textures, &[]);
                pass.set_index_buffer(index_buffer.slice(..), index_format(recorded.index.1));

                let mut complete = true;
                for (slot, id) in recorded.vertex.iter().enumerate() {
                    let Some(id) = id else { continue };
                    match gpu_buffer(&self.buffers, *id) {
                        Some(buffer) => pass.set_vertex_buffer(slot as u32, buffer.slice(..)),
                        None => complete = false,
                    }
                }
                if !complete {
                    log::warn!("Skipping draw with released vertex buffer");
                    continue;
                }

                let draw = recorded.draw;
                pass.draw_indexed(
                    draw.start_index..draw.start_index + draw.index_count,
                    draw.base_vertex,
                    0..draw.instance_count,
                );
                issued += 1;
            }
        }

        self.queue.submit(Some(encoder.finish()));
        self.ring.reset();
        issued
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> bool {
        if self.pipelines.contains_key(&key) {
            return true;
        }
        let (Some(program), Some(blend), Some(cull)) = (
            self.programs.get(key.program.index()),
            self.blend_states.get(key.blend.index()),
            self.raster_states.get(key.raster.index()),
        ) else {
            log::warn!("Cannot build pipeline for unknown state {:?}", key);
            return false;
        };

        let mut builder = ModelPipelineBuilder::new(
            &self.device,
            &self.pipeline_layout,
            &program.module,
            (program.vertex_entry.as_str(), program.fragment_entry.as_str()),
            self.color_format,
        )
        .with_label(&program.label)
        .with_blend(*blend)
        .with_culling(*cull)
        .with_depth(self.depth_format);
        for layout in &program.vertex_layouts {
            builder = builder.with_vertex_buffer(wgpu::VertexBufferLayout {
                array_stride: layout.stride,
                step_mode: layout.step_mode,
                attributes: &layout.attributes,
            });
        }

        log::debug!("Building pipeline {:?} for '{}'", key, program.label);
        let pipeline = builder.build();
        self.pipelines.insert(key, pipeline);
        true
    }

    fn ensure_texture_group(&mut self, texture: TextureId, sampler: SamplerId) -> bool {
        if self.texture_groups.contains_key(&(texture, sampler)) {
            return true;
        }
        let (Some(view), Some(sampler_object)) = (
            self.textures.get(texture.index()),
            self.samplers.get(sampler.index()),
        ) else {
            log::warn!("Unknown texture {:?} or sampler {:?}", texture, sampler);
            return false;
        };
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ModelTextureBindGroup"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler_object),
                },
            ],
        });
        self.texture_groups.insert((texture, sampler), group);
        true
    }

    fn snapshot_constants(&mut self) -> [u32; CONSTANT_SLOT_COUNT] {
        let mut offsets = [0u32; CONSTANT_SLOT_COUNT];
        for (slot, offset) in offsets.iter_mut().enumerate() {
            let bound = self.bindings.constants[slot].and_then(|id| match self.buffers.get(&id) {
                Some(DeviceBuffer::Constant { bytes, revision }) => Some((id, *revision, bytes)),
                _ => None,
            });
            *offset = match bound {
                Some((id, revision, bytes)) => match self.ring.uploaded.get(&(id, revision)) {
                    Some(&cached) => cached,
                    None => {
                        let at = self.ring.push(bytes, CONSTANT_SLOT_SIZES[slot]);
                        self.ring.uploaded.insert((id, revision), at);
                        at
                    }
                },
                None => self.ring.zero_block(),
            };
        }
        offsets
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<BufferId, RenderError> {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;

        let entry = match desc.usage {
            BufferUsage::Constant => DeviceBuffer::Constant {
                bytes: desc.contents.to_vec(),
                revision: 0,
            },
            usage => {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(desc.label),
                        contents: &padded(desc.contents),
                        usage: buffer_usages(usage),
                    });
                DeviceBuffer::Gpu {
                    size: buffer.size(),
                    buffer,
                    usage,
                }
            }
        };
        self.buffers.insert(id, entry);
        Ok(id)
    }

    fn update_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), RenderError> {
        let entry = self
            .buffers
            .get_mut(&id)
            .ok_or(RenderError::UnknownResource {
                kind: "buffer",
                id: id.0,
            })?;

        match entry {
            DeviceBuffer::Constant { bytes, revision } => {
                bytes.clear();
                bytes.extend_from_slice(data);
                *revision += 1;
            }
            DeviceBuffer::Gpu {
                buffer,
                size,
                usage,
            } => {
                let data = padded(data);
                let required = data.len() as u64;
                if required > *size {
                    let new_size = required.max(*size * 2);
                    log::info!("Growing {:?} buffer: {} -> {} bytes", usage, size, new_size);
                    buffer.destroy();
                    *buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some("ModelBuffer"),
                        size: new_size,
                        usage: buffer_usages(*usage),
                        mapped_at_creation: false,
                    });
                    *size = new_size;
                }
                if !data.is_empty() {
                    self.queue.write_buffer(buffer, 0, &data);
                }
            }
        }
        Ok(())
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        match self.buffers.remove(&id) {
            Some(DeviceBuffer::Gpu { buffer, .. }) => buffer.destroy(),
            Some(DeviceBuffer::Constant { .. }) => {}
            None => log::warn!("Destroying unknown buffer {:?}", id),
        }
    }

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> Result<ProgramId, RenderError> {
        for entry in [desc.vertex_entry, desc.fragment_entry] {
            if !declares_entry_point(desc.source, entry) {
                return Err(RenderError::ShaderCompilation {
                    label: desc.label.to_string(),
                    details: format!("entry point '{}' not found", entry),
                });
            }
        }
        let vertex_layouts = vertex_layouts(desc.layout)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.source.into()),
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::ShaderCompilation {
                label: desc.label.to_string(),
                details: error.to_string(),
            });
        }

        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(Program {
            label: desc.label.to_string(),
            module,
            vertex_entry: desc.vertex_entry.to_string(),
            fragment_entry: desc.fragment_entry.to_string(),
            vertex_layouts,
        });
        Ok(id)
    }

    fn create_blend_state(&mut self, desc: &BlendDescriptor) -> Result<BlendStateId, RenderError> {
        let id = BlendStateId(self.blend_states.len() as u32);
        self.blend_states.push(blend_state(desc));
        Ok(id)
    }

    fn create_raster_state(
        &mut self,
        desc: &RasterDescriptor,
    ) -> Result<RasterStateId, RenderError> {
        let id = RasterStateId(self.raster_states.len() as u32);
        self.raster_states.push(desc.cull_enabled);
        Ok(id)
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> Result<SamplerId, RenderError> {
        let address = match desc.address_mode {
            AddressMode::Wrap => wgpu::AddressMode::Repeat,
            AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
        };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ModelSampler"),
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter_mode(desc.mag_filter),
            min_filter: filter_mode(desc.min_filter),
            mipmap_filter: filter_mode(desc.mip_filter),
            ..Default::default()
        });
        let id = SamplerId(self.samplers.len() as u32);
        self.samplers.push(sampler);
        Ok(id)
    }

    fn set_index_buffer(&mut self, buffer: BufferId, format: IndexFormat) {
        self.bindings.index = Some((buffer, format));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, _stride: u32) {
        match self.bindings.vertex.get_mut(slot as usize) {
            Some(bound) => *bound = Some(buffer),
            None => log::warn!("Vertex buffer slot {} is not supported", slot),
        }
    }

    fn set_program(&mut self, program: ProgramId) {
        self.bindings.program = Some(program);
    }

    fn set_blend_state(&mut self, state: BlendStateId) {
        self.bindings.blend = Some(state);
    }

    fn set_raster_state(&mut self, state: RasterStateId) {
        self.bindings.raster = Some(state);
    }

    fn set_vertex_constant_buffer(&mut self, slot: u32, buffer: BufferId) {
        match self.bindings.constants.get_mut(slot as usize) {
            Some(bound) => *bound = Some(buffer),
            None => log::warn!("Constant buffer slot {} is not supported", slot),
        }
    }

    fn set_pixel_texture(&mut self, slot: u32, texture: TextureId) {
        if slot == 0 {
            self.bindings.texture = Some(texture);
        } else {
            log::warn!("Pixel texture slot {} is not supported", slot);
        }
    }

    fn set_pixel_sampler(&mut self, slot: u32, sampler: SamplerId) {
        if slot == 0 {
            self.bindings.sampler = Some(sampler);
        } else {
            log::warn!("Pixel sampler slot {} is not supported", slot);
        }
    }

    fn draw_indexed_instanced(&mut self, draw: &DrawIndexed) {
        let bindings = self.bindings;
        let (Some(program), Some(blend), Some(raster), Some(index)) = (
            bindings.program,
            bindings.blend,
            bindings.raster,
            bindings.index,
        ) else {
            log::warn!("Draw issued without program, blend, raster or index buffer bound");
            return;
        };
        let (Some(texture), Some(sampler)) = (bindings.texture, bindings.sampler) else {
            log::warn!("Draw issued without a texture and sampler bound");
            return;
        };

        let pipeline = PipelineKey {
            program,
            blend,
            raster,
        };
        if !self.ensure_pipeline(pipeline) || !self.ensure_texture_group(texture, sampler) {
            return;
        }

        let constant_offsets = self.snapshot_constants();
        self.draws.push(RecordedDraw {
            pipeline,
            index,
            vertex: bindings.vertex,
            constant_offsets,
            textures: (texture, sampler),
            draw: *draw,
        });
    }
}

fn gpu_buffer(buffers: &HashMap<BufferId, DeviceBuffer>, id: BufferId) -> Option<&wgpu::Buffer> {
    match buffers.get(&id) {
        Some(DeviceBuffer::Gpu { buffer, .. }) => Some(buffer),
        _ => None,
    }
}

fn create_ring_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("ModelConstantRing"),
        size: capacity,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_ring_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry> = CONSTANT_SLOT_SIZES
        .iter()
        .enumerate()
        .map(|(binding, &size)| wgpu::BindGroupEntry {
            binding: binding as u32,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: NonZeroU64::new(size),
            }),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("ModelConstantsBindGroup"),
        layout,
        entries: &entries,
    })
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Copies must be a multiple of four bytes.
fn padded(data: &[u8]) -> Vec<u8> {
    let mut bytes = data.to_vec();
    bytes.resize(align_to(data.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT) as usize, 0);
    bytes
}

fn buffer_usages(usage: BufferUsage) -> wgpu::BufferUsages {
    match usage {
        BufferUsage::Vertex | BufferUsage::Instance => {
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST
        }
        BufferUsage::Index => wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        BufferUsage::Constant => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    }
}

fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
        IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
    }
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Point => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
    }
}

fn blend_state(desc: &BlendDescriptor) -> Option<wgpu::BlendState> {
    if !desc.enabled {
        return None;
    }
    Some(wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: blend_factor(desc.src_color),
            dst_factor: blend_factor(desc.dst_color),
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: blend_factor(desc.src_alpha),
            dst_factor: blend_factor(desc.dst_alpha),
            operation: wgpu::BlendOperation::Add,
        },
    })
}

fn vertex_format(element: &VertexElement) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    match (element.data_type, element.components, element.normalized) {
        (DataType::Float, 1, _) => Some(F::Float32),
        (DataType::Float, 2, _) => Some(F::Float32x2),
        (DataType::Float, 3, _) => Some(F::Float32x3),
        (DataType::Float, 4, _) => Some(F::Float32x4),
        (DataType::Byte, 2, true) => Some(F::Unorm8x2),
        (DataType::Byte, 2, false) => Some(F::Uint8x2),
        (DataType::Byte, 4, true) => Some(F::Unorm8x4),
        (DataType::Byte, 4, false) => Some(F::Uint8x4),
        _ => None,
    }
}

/// Shader locations follow declaration order across the whole layout.
fn vertex_layouts(layout: &InputLayout) -> Result<Vec<OwnedVertexLayout>, RenderError> {
    let slots = layout.slots();
    if slots.iter().enumerate().any(|(i, &slot)| i as u32 != slot) {
        return Err(RenderError::InvalidDescriptor(format!(
            "vertex slots must be contiguous from 0, got {:?}",
            slots
        )));
    }

    let mut layouts = Vec::with_capacity(slots.len());
    for slot in slots {
        let mut attributes = Vec::new();
        for (location, element) in layout.elements().iter().enumerate() {
            if element.slot != slot {
                continue;
            }
            let format = vertex_format(element).ok_or_else(|| {
                RenderError::InvalidDescriptor(format!(
                    "unsupported vertex element {}{}",
                    element.semantic, element.index
                ))
            })?;
            attributes.push(wgpu::VertexAttribute {
                format,
                offset: layout.offset(location) as u64,
                shader_location: location as u32,
            });
        }
        layouts.push(OwnedVertexLayout {
            stride: layout.stride(slot) as u64,
            step_mode: if layout.is_instanced_slot(slot) {
                wgpu::VertexStepMode::Instance
            } else {
                wgpu::VertexStepMode::Vertex
            },
            attributes,
        });
    }
    Ok(layouts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::vertex::m2_input_layout;

    #[test]
    fn m2_layout_maps_to_two_buffers() {
        let layouts = vertex_layouts(&m2_input_layout()).unwrap();
        assert_eq!(layouts.len(), 2);
        assert_eq!(layouts[0].stride, 48);
        assert_eq!(layouts[0].attributes[1].format, wgpu::VertexFormat::Unorm8x4);
        assert_eq!(layouts[0].attributes[2].format, wgpu::VertexFormat::Uint8x4);
        assert!(matches!(layouts[1].step_mode, wgpu::VertexStepMode::Instance));
        assert_eq!(layouts[1].attributes[0].shader_location, 6);
        assert_eq!(layouts[1].attributes[4].offset, 64);
    }

    #[test]
    fn disabled_blend_maps_to_none() {
        assert!(blend_state(&BlendDescriptor::DISABLED).is_none());
        let additive = blend_state(&BlendDescriptor::blended(
            BlendFactor::SrcAlpha,
            BlendFactor::One,
            BlendFactor::SrcAlpha,
            BlendFactor::One,
        ))
        .unwrap();
        assert_eq!(additive.color.dst_factor, wgpu::BlendFactor::One);
    }

    #[test]
    fn padding_rounds_to_copy_alignment() {
        assert_eq!(padded(&[1, 2, 3, 4, 5, 6]).len(), 8);
        assert_eq!(padded(&[]).len(), 0);
        assert_eq!(align_to(300, 256), 512);
    }
}
