use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::vertex::PerInstanceData;
use crate::scene::bounds::BoundingBox;
use crate::scene::transform::Transform;

/// One placement of a model in the scene.
///
/// The world matrix and world bounding box are fixed at construction; the
/// highlight colour and the updated flag change while the instance lives.
#[derive(Debug)]
pub struct RenderInstance {
    uuid: u32,
    transform: Transform,
    matrix: Mat4,
    bounding_box: BoundingBox,
    highlight_color: Mutex<Vec4>,
    is_updated: AtomicBool,
}

impl RenderInstance {
    pub fn new(
        uuid: u32,
        position: Vec3,
        rotation: Vec3,
        scale: Vec3,
        model_bounds: &BoundingBox,
        color: Vec4,
    ) -> Self {
        let transform = Transform::from_placement(position, rotation, scale);
        let matrix = transform.matrix();
        Self {
            uuid,
            transform,
            matrix,
            bounding_box: model_bounds.transform(&matrix),
            highlight_color: Mutex::new(color),
            is_updated: AtomicBool::new(false),
        }
    }

    pub fn uuid(&self) -> u32 {
        self.uuid
    }

    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn highlight_color(&self) -> Vec4 {
        *self
            .highlight_color
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_highlight_color(&self, color: Vec4) {
        *self
            .highlight_color
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = color;
    }

    pub fn is_updated(&self) -> bool {
        self.is_updated.load(Ordering::Acquire)
    }

    /// Returns the previous value.
    pub fn set_updated(&self, updated: bool) -> bool {
        self.is_updated.swap(updated, Ordering::AcqRel)
    }

    /// Tints the instance when its position is within `radius` of the brush.
    pub fn update_brush_highlighting(
        &self,
        brush_position: Vec3,
        radius: f32,
        highlight: Vec4,
        default: Vec4,
    ) {
        let inside = self.position().distance_squared(brush_position) <= radius * radius;
        self.set_highlight_color(if inside { highlight } else { default });
    }

    pub fn per_instance_data(&self) -> PerInstanceData {
        PerInstanceData::new(self.matrix, self.highlight_color())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn world_box_follows_placement() {
        let instance = RenderInstance::new(
            7,
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::ZERO,
            Vec3::splat(2.0),
            &unit_box(),
            Vec4::ONE,
        );
        assert_eq!(instance.uuid(), 7);
        assert!(instance
            .bounding_box()
            .min
            .abs_diff_eq(Vec3::new(8.0, -2.0, -2.0), 1e-5));
        assert!(instance
            .bounding_box()
            .max
            .abs_diff_eq(Vec3::new(12.0, 2.0, 2.0), 1e-5));
    }

    #[test]
    fn brush_highlight_uses_outer_radius() {
        let instance = RenderInstance::new(
            1,
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::ZERO,
            Vec3::ONE,
            &unit_box(),
            Vec4::ONE,
        );
        let highlight = Vec4::new(2.0, 2.0, 2.0, 1.0);

        instance.update_brush_highlighting(Vec3::ZERO, 5.0, highlight, Vec4::ONE);
        assert_eq!(instance.highlight_color(), highlight);
        assert_eq!(instance.per_instance_data().color, highlight.to_array());

        instance.update_brush_highlighting(Vec3::ZERO, 2.0, highlight, Vec4::ONE);
        assert_eq!(instance.highlight_color(), Vec4::ONE);
    }

    #[test]
    fn updated_flag_swaps() {
        let instance =
            RenderInstance::new(1, Vec3::ZERO, Vec3::ZERO, Vec3::ONE, &unit_box(), Vec4::ONE);
        assert!(!instance.set_updated(true));
        assert!(instance.set_updated(true));
        assert!(instance.is_updated());
    }
}
