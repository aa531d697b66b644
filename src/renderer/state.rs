use crate::renderer::device::{BlendStateId, GraphicsDevice, ProgramId, RasterStateId};

/// Tracks the program, blend and raster state last bound on the device so
/// that a bind is only issued when the requested object differs.
///
/// Owned by the render loop and shared by every batch renderer of one model
/// class for the duration of a frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BoundState {
    program: Option<ProgramId>,
    blend: Option<BlendStateId>,
    raster: Option<RasterStateId>,
}

impl BoundState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget what is bound, e.g. after foreign code changed device state.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn blend(&self) -> Option<BlendStateId> {
        self.blend
    }

    pub fn raster(&self) -> Option<RasterStateId> {
        self.raster
    }

    /// Returns true when a bind call was issued.
    pub fn apply_program(&mut self, device: &mut dyn GraphicsDevice, program: ProgramId) -> bool {
        if self.program == Some(program) {
            return false;
        }
        device.set_program(program);
        self.program = Some(program);
        true
    }

    pub fn apply_blend(&mut self, device: &mut dyn GraphicsDevice, state: BlendStateId) -> bool {
        if self.blend == Some(state) {
            return false;
        }
        device.set_blend_state(state);
        self.blend = Some(state);
        true
    }

    pub fn apply_raster(&mut self, device: &mut dyn GraphicsDevice, state: RasterStateId) -> bool {
        if self.raster == Some(state) {
            return false;
        }
        device.set_raster_state(state);
        self.raster = Some(state);
        true
    }
}
