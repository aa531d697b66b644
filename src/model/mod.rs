pub mod asset;
pub mod batch;
pub mod instance;
pub mod manager;
pub mod shared;

pub use asset::{ModelAsset, ModelPass, RenderFlags};
pub use batch::{BatchRenderer, FrameStats, LoadState};
pub use instance::RenderInstance;
pub use manager::ModelManager;
pub use shared::{ProgramSet, SharedRenderResources, BLEND_MODES, M2_SHADER_SOURCE};
