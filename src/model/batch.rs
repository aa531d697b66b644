use std::collections::HashMap;
use std::mem;
use std::ops::AddAssign;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::{Mat4, Vec3, Vec4};

use crate::animation::{Animator, KeyframeAnimator};
use crate::error::RenderError;
use crate::model::asset::ModelAsset;
use crate::model::instance::RenderInstance;
use crate::model::shared::{SharedRenderResources, BLEND_MODE_COUNT};
use crate::renderer::device::{
    BufferDescriptor, BufferId, BufferUsage, DrawIndexed, GraphicsDevice, IndexFormat,
};
use crate::renderer::state::BoundState;
use crate::renderer::uniforms::{PerModelPassBuffer, ANIMATION_SLOT, MAX_BONES, PER_PASS_SLOT};
use crate::renderer::vertex::{PerInstanceData, INSTANCE_SLOT};
use crate::scene::bounds::BoundingBox;
use crate::scene::context::SceneContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadState {
    Unloaded = 0,
    /// Upload queued on the render dispatcher.
    Loading = 1,
    Ready = 2,
    /// Terminal: no geometry, failed upload or disposed.
    SkipRendering = 3,
}

impl LoadState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoadState::Unloaded,
            1 => LoadState::Loading,
            2 => LoadState::Ready,
            _ => LoadState::SkipRendering,
        }
    }
}

/// What one `on_frame` call submitted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub instances: u32,
    /// Program, blend and raster binds actually issued.
    pub state_binds: u32,
}

impl AddAssign for FrameStats {
    fn add_assign(&mut self, other: Self) {
        self.draw_calls += other.draw_calls;
        self.instances += other.instances;
        self.state_binds += other.state_binds;
    }
}

#[derive(Debug, Clone, Copy)]
struct GpuBuffers {
    vertex: BufferId,
    index: BufferId,
    instance: BufferId,
    animation: BufferId,
    per_pass: BufferId,
}

impl GpuBuffers {
    fn destroy(self, device: &mut dyn GraphicsDevice) {
        for id in [
            self.vertex,
            self.index,
            self.instance,
            self.animation,
            self.per_pass,
        ] {
            device.destroy_buffer(id);
        }
    }
}

/// Render-thread state. Only the render thread locks it, either inside
/// `on_frame` or from a dispatched task.
struct FrameResources {
    buffers: Option<GpuBuffers>,
    scratch: Vec<PerInstanceData>,
    instance_count: usize,
    bones: Vec<Mat4>,
}

struct InstanceEntry {
    instance: Arc<RenderInstance>,
    references: u32,
}

/// Draws every visible placement of one model with one instanced draw per pass.
///
/// Instance management may be called from any thread. `on_frame` belongs to
/// the render thread. The full set and the visible set have their own locks,
/// always taken in that order.
pub struct BatchRenderer {
    asset: Arc<ModelAsset>,
    shared: Arc<SharedRenderResources>,
    context: Arc<SceneContext>,
    animator: Arc<dyn Animator>,
    full: Mutex<HashMap<u32, InstanceEntry>>,
    visible: Mutex<Vec<Arc<RenderInstance>>>,
    state: AtomicU8,
    disposed: AtomicBool,
    frame: Arc<Mutex<FrameResources>>,
}

impl BatchRenderer {
    /// Animates the model with a [`KeyframeAnimator`] built from the asset.
    pub fn new(
        asset: Arc<ModelAsset>,
        shared: Arc<SharedRenderResources>,
        context: Arc<SceneContext>,
    ) -> Self {
        let animator = Arc::new(KeyframeAnimator::new(
            asset.skeleton.clone(),
            asset.animations.clone(),
        ));
        Self::with_animator(asset, shared, context, animator)
    }

    pub fn with_animator(
        asset: Arc<ModelAsset>,
        shared: Arc<SharedRenderResources>,
        context: Arc<SceneContext>,
        animator: Arc<dyn Animator>,
    ) -> Self {
        animator.set_animation_by_index(0);
        context.animations().add(Arc::clone(&animator));

        let capacity = context.settings().initial_instance_capacity;
        Self {
            asset,
            shared,
            context,
            animator,
            full: Mutex::new(HashMap::new()),
            visible: Mutex::new(Vec::with_capacity(capacity)),
            state: AtomicU8::new(LoadState::Unloaded as u8),
            disposed: AtomicBool::new(false),
            frame: Arc::new(Mutex::new(FrameResources {
                buffers: None,
                scratch: Vec::with_capacity(capacity),
                instance_count: 0,
                bones: vec![Mat4::IDENTITY; MAX_BONES],
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.asset.name
    }

    pub fn asset(&self) -> &Arc<ModelAsset> {
        &self.asset
    }

    pub fn animator(&self) -> &Arc<dyn Animator> {
        &self.animator
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.asset.bounding_box
    }

    pub fn load_state(&self) -> LoadState {
        LoadState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Places an instance, or adds a reference when `uuid` is already placed.
    ///
    /// A new instance joins the visible set when the active camera contains
    /// its world bounding box.
    pub fn add_instance(
        &self,
        uuid: u32,
        position: Vec3,
        rotation: Vec3,
        scale: Vec3,
    ) -> Arc<RenderInstance> {
        let mut full = self.lock_full();
        if let Some(entry) = full.get_mut(&uuid) {
            entry.references += 1;
            return Arc::clone(&entry.instance);
        }

        let instance = Arc::new(RenderInstance::new(
            uuid,
            position,
            rotation,
            scale,
            &self.asset.bounding_box,
            self.context.default_color(),
        ));
        full.insert(
            uuid,
            InstanceEntry {
                instance: Arc::clone(&instance),
                references: 1,
            },
        );

        if self.context.is_visible(instance.bounding_box()) {
            instance.set_updated(true);
            self.lock_visible().push(Arc::clone(&instance));
        }
        instance
    }

    /// Drops one reference. Returns true when this emptied the full set, so
    /// the renderer itself can be disposed.
    pub fn remove_instance(&self, uuid: u32) -> bool {
        let mut full = self.lock_full();
        let Some(entry) = full.get_mut(&uuid) else {
            return false;
        };
        entry.references -= 1;
        if entry.references > 0 {
            return false;
        }
        full.remove(&uuid);

        let mut visible = self.lock_visible();
        if let Some(index) = visible.iter().position(|i| i.uuid() == uuid) {
            visible.remove(index);
        }
        drop(visible);

        full.is_empty()
    }

    /// Re-adds a known instance to the visible set. Unknown ids and instances
    /// already pushed since the last view change are ignored.
    pub fn push_map_reference(&self, uuid: u32) {
        let full = self.lock_full();
        let Some(entry) = full.get(&uuid) else {
            return;
        };
        if entry.instance.set_updated(true) {
            return;
        }
        self.lock_visible().push(Arc::clone(&entry.instance));
    }

    /// Empties the visible set; the scene pushes back what is still in view.
    pub fn view_changed(&self) {
        let full = self.lock_full();
        self.lock_visible().clear();
        for entry in full.values() {
            entry.instance.set_updated(false);
        }
    }

    /// Renders all visible instances. Render thread only.
    pub fn on_frame(
        self: &Arc<Self>,
        device: &mut dyn GraphicsDevice,
        bound: &mut BoundState,
    ) -> FrameStats {
        let mut stats = FrameStats::default();

        match self.load_state() {
            LoadState::Unloaded => {
                if self.context.is_initial_load() {
                    self.sync_load(device, LoadState::Unloaded);
                } else {
                    self.request_load();
                    return stats;
                }
            }
            LoadState::Loading | LoadState::SkipRendering => return stats,
            LoadState::Ready => {}
        }
        if self.load_state() != LoadState::Ready {
            return stats;
        }

        if let Some(brush) = self.context.brush() {
            let highlight = self.context.highlight_color();
            let default = self.context.default_color();
            for instance in self.lock_visible().iter() {
                instance.update_brush_highlighting(
                    brush.position,
                    brush.outer_radius,
                    highlight,
                    default,
                );
            }
        }

        // No lock is held across device calls; scratch and bones are lent
        // out for the draw and returned afterwards.
        let (buffers, scratch, mut bones) = {
            let mut frame = self.lock_frame();
            let Some(buffers) = frame.buffers else {
                return stats;
            };
            self.pack_visible_instances(&mut frame);
            (
                buffers,
                mem::take(&mut frame.scratch),
                mem::take(&mut frame.bones),
            )
        };

        if !scratch.is_empty() {
            stats = self.draw_passes(device, bound, buffers, &scratch, &mut bones);
        }

        let mut frame = self.lock_frame();
        frame.scratch = scratch;
        frame.bones = bones;
        stats
    }

    fn draw_passes(
        &self,
        device: &mut dyn GraphicsDevice,
        bound: &mut BoundState,
        buffers: GpuBuffers,
        instances: &[PerInstanceData],
        bones: &mut [Mat4],
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        if let Err(err) = device.update_buffer(buffers.instance, bytemuck::cast_slice(instances)) {
            log::error!("Failed to upload instances of '{}': {}", self.name(), err);
            return stats;
        }

        let layout = self.shared.input_layout();
        device.set_index_buffer(buffers.index, IndexFormat::Uint16);
        device.set_vertex_buffer(0, buffers.vertex, layout.stride(0));
        device.set_vertex_buffer(INSTANCE_SLOT, buffers.instance, layout.stride(INSTANCE_SLOT));

        if self.animator.get_bones(bones) {
            if let Err(err) = device.update_buffer(buffers.animation, bytemuck::cast_slice(bones)) {
                log::warn!("Failed to upload bones of '{}': {}", self.name(), err);
            }
        }
        device.set_vertex_constant_buffer(ANIMATION_SLOT, buffers.animation);
        device.set_vertex_constant_buffer(PER_PASS_SLOT, buffers.per_pass);
        device.set_pixel_sampler(0, self.shared.sampler());

        for pass in &self.asset.passes {
            let Some(blend) = self.shared.blend_state(pass.blend_mode) else {
                log::trace!("Skipping pass with blend mode {}", pass.blend_mode);
                continue;
            };
            let Some(&texture) = pass.textures.first() else {
                log::trace!("Skipping untextured pass of '{}'", self.name());
                continue;
            };

            let raster = self
                .shared
                .raster_state(pass.render_flags.culling_disabled());
            let program = self.shared.program_for_blend_mode(pass.blend_mode);
            let binds = [
                bound.apply_raster(device, raster),
                bound.apply_blend(device, blend),
                bound.apply_program(device, program),
            ];
            stats.state_binds += binds.iter().filter(|&&b| b).count() as u32;

            let (lit, fogged) = pass.render_flags.lighting_factors();
            let uv_anim = pass
                .tex_anim_index
                .map_or(Mat4::IDENTITY, |index| self.animator.uv_anim_matrix(index as usize));
            let constants = PerModelPassBuffer::new(uv_anim, Vec4::new(lit, fogged, 0.0, 0.0));
            if let Err(err) = device.update_buffer(buffers.per_pass, bytemuck::bytes_of(&constants)) {
                log::warn!("Failed to upload pass constants of '{}': {}", self.name(), err);
                continue;
            }

            device.set_pixel_texture(0, texture);
            device.draw_indexed_instanced(&DrawIndexed {
                start_index: pass.start_index,
                index_count: pass.index_count,
                base_vertex: 0,
                instance_count: instances.len() as u32,
            });
            stats.draw_calls += 1;
        }

        stats.instances = instances.len() as u32;
        stats
    }

    /// Skips rendering from now on and releases the GPU buffers on the render
    /// thread. Safe to call from any thread, more than once.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.state
            .store(LoadState::SkipRendering as u8, Ordering::Release);

        let frame = Arc::clone(&self.frame);
        let name = self.asset.name.clone();
        self.context.dispatcher().begin_invoke(move |device| {
            let buffers = frame
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .buffers
                .take();
            if let Some(buffers) = buffers {
                buffers.destroy(device);
                log::debug!("Released GPU buffers of '{}'", name);
            }
        });

        self.context.animations().remove(&self.animator);
        log::info!("Disposed batch renderer for '{}'", self.asset.name);
    }

    pub fn reference_count(&self, uuid: u32) -> Option<u32> {
        self.lock_full().get(&uuid).map(|e| e.references)
    }

    pub fn contains(&self, uuid: u32) -> bool {
        self.lock_full().contains_key(&uuid)
    }

    pub fn instance_count(&self) -> usize {
        self.lock_full().len()
    }

    pub fn visible_count(&self) -> usize {
        self.lock_visible().len()
    }

    pub fn visible_ids(&self) -> Vec<u32> {
        self.lock_visible().iter().map(|i| i.uuid()).collect()
    }

    /// Instances packed by the last frame.
    pub fn packed_count(&self) -> usize {
        self.lock_frame().instance_count
    }

    pub fn scratch_capacity(&self) -> usize {
        self.lock_frame().scratch.capacity()
    }

    fn request_load(self: &Arc<Self>) {
        let queued = self
            .state
            .compare_exchange(
                LoadState::Unloaded as u8,
                LoadState::Loading as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if !queued {
            return;
        }

        let renderer = Arc::downgrade(self);
        self.context.dispatcher().begin_invoke(move |device| {
            if let Some(renderer) = renderer.upgrade() {
                renderer.sync_load(device, LoadState::Loading);
            }
        });
        log::debug!("Queued upload of '{}'", self.name());
    }

    /// Uploads geometry and creates the per-renderer buffers.
    fn sync_load(&self, device: &mut dyn GraphicsDevice, expected: LoadState) {
        if self.is_disposed() {
            return;
        }

        if !self.asset.has_geometry() {
            log::info!(
                "Model '{}' has no geometry, rendering disabled",
                self.name()
            );
            self.state
                .store(LoadState::SkipRendering as u8, Ordering::Release);
            return;
        }

        for pass in &self.asset.passes {
            if pass.blend_mode as usize >= BLEND_MODE_COUNT {
                log::warn!(
                    "Model '{}' has a pass with unknown blend mode {}; it will not be drawn",
                    self.name(),
                    pass.blend_mode
                );
            }
            if pass.textures.is_empty() {
                log::warn!(
                    "Model '{}' has an untextured pass at index {}; it will not be drawn",
                    self.name(),
                    pass.start_index
                );
            }
        }

        let mut created = Vec::with_capacity(5);
        match self.create_buffers(device, &mut created) {
            Ok(buffers) => {
                self.lock_frame().buffers = Some(buffers);
                let ready = self
                    .state
                    .compare_exchange(
                        expected as u8,
                        LoadState::Ready as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok();
                if ready {
                    log::info!(
                        "Loaded model '{}' ({} vertices, {} indices, {} passes)",
                        self.name(),
                        self.asset.vertices.len(),
                        self.asset.indices.len(),
                        self.asset.passes.len()
                    );
                }
            }
            Err(err) => {
                for id in created {
                    device.destroy_buffer(id);
                }
                log::error!("Failed to upload model '{}': {}", self.name(), err);
                self.state
                    .store(LoadState::SkipRendering as u8, Ordering::Release);
            }
        }
    }

    fn create_buffers(
        &self,
        device: &mut dyn GraphicsDevice,
        created: &mut Vec<BufferId>,
    ) -> Result<GpuBuffers, RenderError> {
        let mut create = |label: &str,
                          usage: BufferUsage,
                          contents: &[u8]|
         -> Result<BufferId, RenderError> {
            let id = device.create_buffer(&BufferDescriptor {
                label,
                usage,
                contents,
            })?;
            created.push(id);
            Ok(id)
        };

        let capacity = self.context.settings().initial_instance_capacity;
        let instances = vec![0u8; capacity * mem::size_of::<PerInstanceData>()];
        let bones = vec![Mat4::IDENTITY; MAX_BONES];

        Ok(GpuBuffers {
            vertex: create(
                "M2VertexBuffer",
                BufferUsage::Vertex,
                bytemuck::cast_slice(&self.asset.vertices),
            )?,
            index: create(
                "M2IndexBuffer",
                BufferUsage::Index,
                bytemuck::cast_slice(&self.asset.indices),
            )?,
            instance: create("M2InstanceBuffer", BufferUsage::Instance, &instances[..])?,
            animation: create(
                "M2AnimationBuffer",
                BufferUsage::Constant,
                bytemuck::cast_slice(&bones),
            )?,
            per_pass: create(
                "M2PerPassBuffer",
                BufferUsage::Constant,
                bytemuck::bytes_of(&PerModelPassBuffer::default()),
            )?,
        })
    }

    /// Copies the visible set into the scratch buffer under the visible lock.
    fn pack_visible_instances(&self, frame: &mut FrameResources) {
        let visible = self.lock_visible();
        let previous = frame.scratch.capacity();
        frame.scratch.clear();
        frame
            .scratch
            .extend(visible.iter().map(|instance| instance.per_instance_data()));
        frame.instance_count = visible.len();

        if frame.scratch.capacity() > previous {
            log::info!(
                "Growing instance scratch for '{}': {} -> {}",
                self.name(),
                previous,
                frame.scratch.capacity()
            );
        }
    }

    fn lock_full(&self) -> MutexGuard<'_, HashMap<u32, InstanceEntry>> {
        self.full.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_visible(&self) -> MutexGuard<'_, Vec<Arc<RenderInstance>>> {
        self.visible.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_frame(&self) -> MutexGuard<'_, FrameResources> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BatchRenderer {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_state_round_trips_through_u8() {
        for state in [
            LoadState::Unloaded,
            LoadState::Loading,
            LoadState::Ready,
            LoadState::SkipRendering,
        ] {
            assert_eq!(LoadState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn frame_stats_accumulate() {
        let mut total = FrameStats::default();
        total += FrameStats {
            draw_calls: 2,
            instances: 10,
            state_binds: 3,
        };
        total += FrameStats {
            draw_calls: 1,
            instances: 4,
            state_binds: 0,
        };
        assert_eq!(
            total,
            FrameStats {
                draw_calls: 3,
                instances: 14,
                state_binds: 3,
            }
        );
    }
}
