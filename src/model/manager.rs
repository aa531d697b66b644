use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::Vec3;

use crate::model::asset::ModelAsset;
use crate::model::batch::{BatchRenderer, FrameStats};
use crate::model::instance::RenderInstance;
use crate::model::shared::SharedRenderResources;
use crate::renderer::device::{BufferDescriptor, BufferId, BufferUsage, GraphicsDevice};
use crate::renderer::state::BoundState;
use crate::renderer::uniforms::CAMERA_SLOT;
use crate::scene::context::SceneContext;

/// One [`BatchRenderer`] per model name.
///
/// Renderers are created by the first placement of a model and disposed
/// when their last placement is removed.
pub struct ModelManager {
    shared: Arc<SharedRenderResources>,
    context: Arc<SceneContext>,
    renderers: Mutex<HashMap<String, Arc<BatchRenderer>>>,
    /// Render-thread only.
    camera_buffer: Mutex<Option<BufferId>>,
}

impl ModelManager {
    pub fn new(shared: Arc<SharedRenderResources>, context: Arc<SceneContext>) -> Self {
        Self {
            shared,
            context,
            renderers: Mutex::new(HashMap::new()),
            camera_buffer: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<SceneContext> {
        &self.context
    }

    pub fn add_instance(
        &self,
        asset: &Arc<ModelAsset>,
        uuid: u32,
        position: Vec3,
        rotation: Vec3,
        scale: Vec3,
    ) -> Arc<RenderInstance> {
        let mut renderers = self.lock();
        let renderer = renderers.entry(asset.name.clone()).or_insert_with(|| {
            log::debug!("Creating batch renderer for '{}'", asset.name);
            Arc::new(BatchRenderer::new(
                Arc::clone(asset),
                Arc::clone(&self.shared),
                Arc::clone(&self.context),
            ))
        });
        renderer.add_instance(uuid, position, rotation, scale)
    }

    /// Returns true when the model's renderer was disposed as a result.
    pub fn remove_instance(&self, model: &str, uuid: u32) -> bool {
        let mut renderers = self.lock();
        let Some(renderer) = renderers.get(model) else {
            return false;
        };
        if !renderer.remove_instance(uuid) {
            return false;
        }
        if let Some(renderer) = renderers.remove(model) {
            renderer.dispose();
        }
        true
    }

    pub fn push_map_reference(&self, model: &str, uuid: u32) {
        if let Some(renderer) = self.renderer(model) {
            renderer.push_map_reference(uuid);
        }
    }

    pub fn view_changed(&self) {
        for renderer in self.snapshot() {
            renderer.view_changed();
        }
    }

    pub fn renderer(&self, model: &str) -> Option<Arc<BatchRenderer>> {
        self.lock().get(model).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs queued render tasks, binds the camera constants, then renders
    /// every model in name order.
    pub fn on_frame(&self, device: &mut dyn GraphicsDevice, bound: &mut BoundState) -> FrameStats {
        self.context.dispatcher().process_pending(device);
        if !self.bind_camera(device) {
            return FrameStats::default();
        }

        let mut total = FrameStats::default();
        for renderer in self.snapshot() {
            total += renderer.on_frame(device, bound);
        }
        total
    }

    /// Disposes every renderer and releases the camera buffer on the next frame.
    pub fn clear(&self) {
        let drained: Vec<Arc<BatchRenderer>> = self.lock().drain().map(|(_, r)| r).collect();
        for renderer in drained {
            renderer.dispose();
        }
        let camera = self.lock_camera().take();
        if let Some(buffer) = camera {
            self.context
                .dispatcher()
                .begin_invoke(move |device| device.destroy_buffer(buffer));
        }
    }

    /// Uploads the scene's camera constants and binds them to the camera slot.
    fn bind_camera(&self, device: &mut dyn GraphicsDevice) -> bool {
        let uniform = self.context.view_uniform();
        let bytes = bytemuck::bytes_of(&uniform);
        let existing = *self.lock_camera();

        let uploaded = match existing {
            Some(buffer) => device.update_buffer(buffer, bytes).map(|()| buffer),
            None => device
                .create_buffer(&BufferDescriptor {
                    label: "M2CameraBuffer",
                    usage: BufferUsage::Constant,
                    contents: bytes,
                })
                .inspect(|&buffer| *self.lock_camera() = Some(buffer)),
        };
        match uploaded {
            Ok(buffer) => {
                device.set_vertex_constant_buffer(CAMERA_SLOT, buffer);
                true
            }
            Err(err) => {
                log::error!("Failed to upload camera constants: {}", err);
                false
            }
        }
    }

    fn snapshot(&self) -> Vec<Arc<BatchRenderer>> {
        let renderers = self.lock();
        let mut sorted: Vec<(&String, &Arc<BatchRenderer>)> = renderers.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        sorted.into_iter().map(|(_, r)| Arc::clone(r)).collect()
    }

    fn lock_camera(&self) -> MutexGuard<'_, Option<BufferId>> {
        self.camera_buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<BatchRenderer>>> {
        self.renderers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
