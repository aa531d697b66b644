pub mod device;
pub mod headless;
pub mod pipeline_builder;
pub mod state;
pub mod uniforms;
pub mod vertex;
pub mod wgpu_device;

pub use device::{
    AddressMode, BlendDescriptor, BlendFactor, BlendStateId, BufferDescriptor, BufferId,
    BufferUsage, DrawIndexed, FilterMode, GraphicsDevice, IndexFormat, ProgramDescriptor,
    ProgramId, RasterDescriptor, RasterStateId, SamplerDescriptor, SamplerId, TextureId,
};
pub use headless::{DeviceCall, HeadlessDevice};
pub use pipeline_builder::ModelPipelineBuilder;
pub use state::BoundState;
pub use uniforms::{CameraUniform, PerModelPassBuffer, MAX_BONES};
pub use vertex::{m2_input_layout, InputLayout, M2Vertex, PerInstanceData, VertexElement};
pub use wgpu_device::{FrameTarget, WgpuDevice};
