use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use glam::{Mat4, Vec3, Vec4};

use crate::animation::AnimationRegistry;
use crate::dispatch::RenderDispatcher;
use crate::renderer::uniforms::CameraUniform;
use crate::scene::bounds::BoundingBox;
use crate::scene::camera::{Camera, VisibilityProvider};
use crate::settings::RendererSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushHighlight {
    pub position: Vec3,
    pub outer_radius: f32,
}

/// Scene-wide state shared by every batch renderer.
pub struct SceneContext {
    camera: RwLock<Arc<dyn VisibilityProvider>>,
    view: RwLock<CameraUniform>,
    initial_load: AtomicBool,
    brush: RwLock<Option<BrushHighlight>>,
    dispatcher: RenderDispatcher,
    animations: Arc<AnimationRegistry>,
    settings: RendererSettings,
}

impl SceneContext {
    /// Starts in the initial bulk-load phase with everything visible.
    pub fn new(settings: RendererSettings) -> Self {
        Self::with_parts(
            settings,
            RenderDispatcher::new(),
            Arc::new(AnimationRegistry::new()),
        )
    }

    pub fn with_parts(
        settings: RendererSettings,
        dispatcher: RenderDispatcher,
        animations: Arc<AnimationRegistry>,
    ) -> Self {
        let everything: Arc<dyn VisibilityProvider> = Arc::new(|_: &BoundingBox| true);
        Self {
            camera: RwLock::new(everything),
            view: RwLock::new(CameraUniform::new()),
            initial_load: AtomicBool::new(true),
            brush: RwLock::new(None),
            dispatcher,
            animations,
            settings,
        }
    }

    pub fn set_camera(&self, camera: Arc<dyn VisibilityProvider>) {
        *self.camera.write().unwrap_or_else(PoisonError::into_inner) = camera;
    }

    pub fn camera(&self) -> Arc<dyn VisibilityProvider> {
        self.camera
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Culls against `camera`'s frustum and renders through its view-projection.
    pub fn set_view(&self, camera: &Camera, aspect: f32) {
        self.set_view_matrix(camera.view_proj(aspect), camera.eye);
        self.set_camera(Arc::new(camera.frustum(aspect)));
    }

    /// Replaces the shader camera constants without touching culling.
    pub fn set_view_matrix(&self, view_proj: Mat4, eye: Vec3) {
        *self.view.write().unwrap_or_else(PoisonError::into_inner) =
            CameraUniform::from_matrix(view_proj, eye);
    }

    /// Camera constants uploaded to the camera slot each frame.
    pub fn view_uniform(&self) -> CameraUniform {
        *self.view.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_visible(&self, bounds: &BoundingBox) -> bool {
        self.camera().contains(bounds)
    }

    pub fn is_initial_load(&self) -> bool {
        self.initial_load.load(Ordering::Acquire)
    }

    pub fn set_initial_load(&self, loading: bool) {
        self.initial_load.store(loading, Ordering::Release);
        log::info!(
            "Initial load phase {}",
            if loading { "started" } else { "finished" }
        );
    }

    pub fn brush(&self) -> Option<BrushHighlight> {
        *self.brush.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_brush(&self, brush: Option<BrushHighlight>) {
        *self.brush.write().unwrap_or_else(PoisonError::into_inner) = brush;
    }

    pub fn dispatcher(&self) -> &RenderDispatcher {
        &self.dispatcher
    }

    pub fn animations(&self) -> &Arc<AnimationRegistry> {
        &self.animations
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn highlight_color(&self) -> Vec4 {
        Vec4::from_array(self.settings.highlight_color)
    }

    pub fn default_color(&self) -> Vec4 {
        Vec4::from_array(self.settings.default_color)
    }
}
