#![allow(dead_code)]

use std::sync::Arc;

use glam::Vec3;
use m2_batch::model::{BatchRenderer, ModelAsset, ModelPass, SharedRenderResources};
use m2_batch::renderer::{HeadlessDevice, M2Vertex, TextureId};
use m2_batch::scene::{BoundingBox, SceneContext};
use m2_batch::RendererSettings;

pub struct Fixture {
    pub device: HeadlessDevice,
    pub shared: Arc<SharedRenderResources>,
    pub context: Arc<SceneContext>,
    pub texture: TextureId,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(RendererSettings::default())
    }

    pub fn with_settings(settings: RendererSettings) -> Self {
        let mut device = HeadlessDevice::new();
        let shared = Arc::new(SharedRenderResources::initialize(&mut device).unwrap());
        let texture = device.register_texture();
        Self {
            device,
            shared,
            context: Arc::new(SceneContext::new(settings)),
            texture,
        }
    }

    pub fn renderer(&self, asset: ModelAsset) -> Arc<BatchRenderer> {
        Arc::new(BatchRenderer::new(
            Arc::new(asset),
            Arc::clone(&self.shared),
            Arc::clone(&self.context),
        ))
    }

    /// Only boxes left of x = 100 are in view.
    pub fn limit_view_to_x_below_100(&self) {
        self.context
            .set_camera(Arc::new(|b: &BoundingBox| b.max.x < 100.0));
    }
}

pub fn quad_vertices() -> Vec<M2Vertex> {
    let vertex = |x: f32, y: f32| M2Vertex {
        position: [x, y, 0.0],
        normal: [0.0, 0.0, 1.0],
        ..Default::default()
    };
    vec![
        vertex(-1.0, -1.0),
        vertex(1.0, -1.0),
        vertex(-1.0, 1.0),
        vertex(1.0, 1.0),
    ]
}

/// Quad drawn once per listed pass, all passes textured with `texture`.
pub fn quad_asset(name: &str, texture: TextureId, passes: Vec<ModelPass>) -> ModelAsset {
    passes.into_iter().fold(
        ModelAsset::new(name, quad_vertices(), vec![0, 1, 2, 2, 1, 3]),
        |asset, pass| asset.with_pass(pass.with_texture(texture)),
    )
}

pub fn at_x(x: f32) -> Vec3 {
    Vec3::new(x, 0.0, 0.0)
}
