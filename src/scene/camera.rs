use glam::{Mat4, Vec3, Vec4};

use crate::scene::bounds::BoundingBox;

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }
    pub fn proj(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect, self.near, self.far)
    }
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.proj(aspect) * self.view()
    }
    pub fn position(&self) -> Vec3 {
        self.eye
    }
    pub fn frustum(&self, aspect: f32) -> Frustum {
        Frustum::from_view_proj(&self.view_proj(aspect))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_radians: 60f32.to_radians(),
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Answers whether a world-space box is in view.
pub trait VisibilityProvider: Send + Sync {
    fn contains(&self, bounds: &BoundingBox) -> bool;
}

impl<F> VisibilityProvider for F
where
    F: Fn(&BoundingBox) -> bool + Send + Sync,
{
    fn contains(&self, bounds: &BoundingBox) -> bool {
        self(bounds)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far; normals point inwards.
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Planes of a projection with a 0..1 depth range.
    pub fn from_view_proj(view_proj: &Mat4) -> Self {
        let m = *view_proj;
        let mut planes = [
            m.row(3) + m.row(0),
            m.row(3) - m.row(0),
            m.row(3) + m.row(1),
            m.row(3) - m.row(1),
            m.row(2),
            m.row(3) - m.row(2),
        ];
        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }
        Self { planes }
    }

    /// Conservative: boxes straddling a corner may pass.
    pub fn intersects_box(&self, bounds: &BoundingBox) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            // Corner furthest along the plane normal.
            let positive = Vec3::select(normal.cmpge(Vec3::ZERO), bounds.max, bounds.min);
            normal.dot(positive) + plane.w >= 0.0
        })
    }
}

impl VisibilityProvider for Frustum {
    fn contains(&self, bounds: &BoundingBox) -> bool {
        self.intersects_box(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn view_proj_is_reasonable() {
        let cam = Camera::default();
        let vp = cam.view_proj(16.0 / 9.0);
        let inv = vp.inverse();
        let id = vp * inv;
        let eps = 1e-4;
        assert!(id.abs_diff_eq(Mat4::IDENTITY, eps));
    }

    #[test]
    fn frustum_accepts_target_and_rejects_behind() {
        let frustum = Camera::default().frustum(1.0);
        let at_target = BoundingBox::new(Vec3::splat(-0.5), Vec3::splat(0.5));
        let behind = BoundingBox::new(Vec3::new(-0.5, -0.5, 9.5), Vec3::new(0.5, 0.5, 10.5));
        let far_left = BoundingBox::new(Vec3::new(-60.0, -0.5, -1.0), Vec3::new(-59.0, 0.5, 0.0));

        assert!(frustum.contains(&at_target));
        assert!(!frustum.contains(&behind));
        assert!(!frustum.contains(&far_left));
    }

    #[test]
    fn closures_are_providers() {
        let above_ground = |b: &BoundingBox| b.max.y >= 0.0;
        let provider: &dyn VisibilityProvider = &above_ground;
        assert!(provider.contains(&BoundingBox::new(Vec3::ZERO, Vec3::ONE)));
        assert!(!provider.contains(&BoundingBox::new(Vec3::splat(-2.0), Vec3::splat(-1.0))));
    }
}
