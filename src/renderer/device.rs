use crate::error::RenderError;
use crate::renderer::vertex::InputLayout;

macro_rules! handle {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(BufferId);
handle!(ProgramId);
handle!(BlendStateId);
handle!(RasterStateId);
handle!(SamplerId);
handle!(TextureId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    /// Per-instance vertex data rewritten every frame.
    Instance,
    Constant,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    pub usage: BufferUsage,
    pub contents: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgramDescriptor<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    pub layout: &'a InputLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    DstColor,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendDescriptor {
    pub enabled: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendDescriptor {
    pub const DISABLED: Self = Self {
        enabled: false,
        src_color: BlendFactor::One,
        dst_color: BlendFactor::Zero,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::Zero,
    };

    pub const fn blended(
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Self {
        Self {
            enabled: true,
            src_color,
            dst_color,
            src_alpha,
            dst_alpha,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterDescriptor {
    pub cull_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Point,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDescriptor {
    pub address_mode: AddressMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_filter: FilterMode,
}

/// One indexed, instanced draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexed {
    pub start_index: u32,
    pub index_count: u32,
    pub base_vertex: i32,
    pub instance_count: u32,
}

/// The GPU capability the batch renderers draw through.
///
/// Creation calls can fail and report a [`RenderError`]; binding and drawing
/// only record state and never fail. Every method must be called from the
/// render thread, other threads go through the
/// [`RenderDispatcher`](crate::dispatch::RenderDispatcher).
pub trait GraphicsDevice {
    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<BufferId, RenderError>;

    /// Replaces the buffer contents, growing its storage when `data` is larger.
    fn update_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), RenderError>;

    fn destroy_buffer(&mut self, buffer: BufferId);

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> Result<ProgramId, RenderError>;

    fn create_blend_state(&mut self, desc: &BlendDescriptor) -> Result<BlendStateId, RenderError>;

    fn create_raster_state(&mut self, desc: &RasterDescriptor)
        -> Result<RasterStateId, RenderError>;

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> Result<SamplerId, RenderError>;

    fn set_index_buffer(&mut self, buffer: BufferId, format: IndexFormat);

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, stride: u32);

    fn set_program(&mut self, program: ProgramId);

    fn set_blend_state(&mut self, state: BlendStateId);

    fn set_raster_state(&mut self, state: RasterStateId);

    fn set_vertex_constant_buffer(&mut self, slot: u32, buffer: BufferId);

    fn set_pixel_texture(&mut self, slot: u32, texture: TextureId);

    fn set_pixel_sampler(&mut self, slot: u32, sampler: SamplerId);

    fn draw_indexed_instanced(&mut self, draw: &DrawIndexed);
}

/// Cheap textual check that `source` defines a function named `entry`.
pub(crate) fn declares_entry_point(source: &str, entry: &str) -> bool {
    source.split("fn ").skip(1).any(|rest| {
        rest.trim_start()
            .strip_prefix(entry)
            .map_or(false, |tail| tail.trim_start().starts_with('('))
    })
}
