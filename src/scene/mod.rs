pub mod bounds;
pub mod camera;
pub mod context;
pub mod transform;

pub use bounds::BoundingBox;
pub use camera::{Camera, Frustum, VisibilityProvider};
pub use context::{BrushHighlight, SceneContext};
pub use transform::Transform;
