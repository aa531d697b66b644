// renderer/uniforms.rs
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Bone palette size shared with the vertex shader.
pub const MAX_BONES: usize = 256;

/// Constant buffer slots used by the model shader.
pub const CAMERA_SLOT: u32 = 0;
pub const ANIMATION_SLOT: u32 = 2;
pub const PER_PASS_SLOT: u32 = 3;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub inverse_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub _padding: f32,
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            inverse_view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            camera_pos: [0.0, 0.0, 0.0],
            _padding: 0.0,
        }
    }

    pub fn from_matrix(view_proj: Mat4, camera_pos: Vec3) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            inverse_view_proj: view_proj.inverse().to_cols_array_2d(),
            camera_pos: camera_pos.to_array(),
            _padding: 0.0,
        }
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-pass constants: texture animation plus `(lit, fogged, 0, 0)`.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct PerModelPassBuffer {
    pub uv_anim_matrix: [[f32; 4]; 4],
    pub model_pass_params: [f32; 4],
}

impl PerModelPassBuffer {
    pub fn new(uv_anim_matrix: Mat4, params: Vec4) -> Self {
        Self {
            uv_anim_matrix: uv_anim_matrix.to_cols_array_2d(),
            model_pass_params: params.to_array(),
        }
    }
}

impl Default for PerModelPassBuffer {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Vec4::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_uniform_is_144_bytes() {
        // 2 * mat4x4<f32> = 128 bytes, vec3<f32> = 12 bytes, padding = 4 bytes = 144 bytes
        assert_eq!(std::mem::size_of::<CameraUniform>(), 144);
    }

    #[test]
    fn per_pass_buffer_is_80_bytes() {
        assert_eq!(std::mem::size_of::<PerModelPassBuffer>(), 80);
    }

    #[test]
    fn bone_palette_fits_a_uniform_binding() {
        assert_eq!(MAX_BONES * std::mem::size_of::<Mat4>(), 16384);
    }
}
