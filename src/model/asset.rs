use bitflags::bitflags;
use glam::Vec3;

use crate::animation::{AnimationClip, Bone};
use crate::renderer::device::TextureId;
use crate::renderer::vertex::M2Vertex;
use crate::scene::bounds::BoundingBox;

bitflags! {
    /// Material flags of a render pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderFlags: u16 {
        const UNLIT = 0x01;
        const UNFOGGED = 0x02;
        const TWO_SIDED = 0x04;
    }
}

impl RenderFlags {
    pub fn culling_disabled(self) -> bool {
        self.contains(RenderFlags::TWO_SIDED)
    }

    /// Shader parameters `(lit, fogged)`: 1.0 unless the flag is set.
    pub fn lighting_factors(self) -> (f32, f32) {
        let lit = if self.contains(RenderFlags::UNLIT) { 0.0 } else { 1.0 };
        let fogged = if self.contains(RenderFlags::UNFOGGED) { 0.0 } else { 1.0 };
        (lit, fogged)
    }
}

/// One material sub-draw within the model's index range.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPass {
    pub start_index: u32,
    pub index_count: u32,
    /// Index into the shared blend-state table, 0..=6.
    pub blend_mode: u16,
    pub render_flags: RenderFlags,
    pub tex_anim_index: Option<u16>,
    pub textures: Vec<TextureId>,
}

impl ModelPass {
    pub fn new(start_index: u32, index_count: u32, blend_mode: u16) -> Self {
        Self {
            start_index,
            index_count,
            blend_mode,
            render_flags: RenderFlags::empty(),
            tex_anim_index: None,
            textures: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: RenderFlags) -> Self {
        self.render_flags = flags;
        self
    }

    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.textures.push(texture);
        self
    }

    pub fn with_tex_anim(mut self, index: u16) -> Self {
        self.tex_anim_index = Some(index);
        self
    }
}

/// Decoded model geometry, passes and animation data.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub name: String,
    pub vertices: Vec<M2Vertex>,
    pub indices: Vec<u16>,
    pub passes: Vec<ModelPass>,
    pub bounding_box: BoundingBox,
    pub skeleton: Vec<Bone>,
    pub animations: Vec<AnimationClip>,
}

impl ModelAsset {
    /// Bounding box is computed from the vertex positions.
    pub fn new(name: impl Into<String>, vertices: Vec<M2Vertex>, indices: Vec<u16>) -> Self {
        let bounding_box =
            BoundingBox::from_points(vertices.iter().map(|v| Vec3::from_array(v.position)));
        Self {
            name: name.into(),
            vertices,
            indices,
            passes: Vec::new(),
            bounding_box,
            skeleton: Vec::new(),
            animations: Vec::new(),
        }
    }

    pub fn with_pass(mut self, pass: ModelPass) -> Self {
        self.passes.push(pass);
        self
    }

    pub fn with_animation(mut self, skeleton: Vec<Bone>, clips: Vec<AnimationClip>) -> Self {
        self.skeleton = skeleton;
        self.animations = clips;
        self
    }

    /// Nothing to draw without vertices, indices and at least one pass.
    pub fn has_geometry(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty() && !self.passes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_shader_factors() {
        assert_eq!(RenderFlags::empty().lighting_factors(), (1.0, 1.0));
        assert_eq!(RenderFlags::UNLIT.lighting_factors(), (0.0, 1.0));
        assert_eq!(
            (RenderFlags::UNLIT | RenderFlags::UNFOGGED).lighting_factors(),
            (0.0, 0.0)
        );
        assert!(RenderFlags::from_bits_truncate(0x05).culling_disabled());
        assert!(!RenderFlags::UNFOGGED.culling_disabled());
    }

    #[test]
    fn bounding_box_follows_vertices() {
        let vertex = |x: f32, y: f32| M2Vertex {
            position: [x, y, 0.0],
            ..Default::default()
        };
        let asset = ModelAsset::new("quad", vec![vertex(-1.0, 0.0), vertex(2.0, 3.0)], vec![0, 1]);
        assert_eq!(asset.bounding_box.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(asset.bounding_box.max, Vec3::new(2.0, 3.0, 0.0));
        assert!(!asset.has_geometry());
    }
}
