pub mod animation;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use dispatch::RenderDispatcher;
pub use error::RenderError;
pub use model::{BatchRenderer, FrameStats, ModelAsset, ModelManager, SharedRenderResources};
pub use settings::RendererSettings;

/// Installs `env_logger` at `Info`, overridable through `RUST_LOG`.
/// Later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
