use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Float,
    Byte,
}

impl DataType {
    pub fn size(self) -> u32 {
        match self {
            DataType::Float => 4,
            DataType::Byte => 1,
        }
    }
}

/// One attribute of the input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    pub semantic: &'static str,
    pub index: u32,
    pub components: u32,
    pub data_type: DataType,
    pub normalized: bool,
    pub slot: u32,
    /// Advances once per instance instead of once per vertex.
    pub per_instance: bool,
}

impl VertexElement {
    pub const fn float(semantic: &'static str, index: u32, components: u32) -> Self {
        Self {
            semantic,
            index,
            components,
            data_type: DataType::Float,
            normalized: false,
            slot: 0,
            per_instance: false,
        }
    }

    pub const fn bytes(semantic: &'static str, index: u32, normalized: bool) -> Self {
        Self {
            semantic,
            index,
            components: 4,
            data_type: DataType::Byte,
            normalized,
            slot: 0,
            per_instance: false,
        }
    }

    pub const fn instanced(mut self, slot: u32) -> Self {
        self.slot = slot;
        self.per_instance = true;
        self
    }

    pub fn size(&self) -> u32 {
        self.components * self.data_type.size()
    }
}

/// Ordered attribute list; offsets and strides follow declaration order per slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLayout {
    elements: Vec<VertexElement>,
}

impl InputLayout {
    pub fn new(elements: Vec<VertexElement>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    pub fn stride(&self, slot: u32) -> u32 {
        self.elements
            .iter()
            .filter(|e| e.slot == slot)
            .map(VertexElement::size)
            .sum()
    }

    /// Byte offset of element `index` within its slot.
    pub fn offset(&self, index: usize) -> u32 {
        let slot = self.elements[index].slot;
        self.elements[..index]
            .iter()
            .filter(|e| e.slot == slot)
            .map(VertexElement::size)
            .sum()
    }

    /// Distinct slots in ascending order.
    pub fn slots(&self) -> Vec<u32> {
        let mut slots: Vec<u32> = self.elements.iter().map(|e| e.slot).collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    pub fn is_instanced_slot(&self, slot: u32) -> bool {
        self.elements
            .iter()
            .any(|e| e.slot == slot && e.per_instance)
    }
}

pub const INSTANCE_SLOT: u32 = 1;

/// Geometry vertex at slot 0 followed by the per-instance record at slot 1.
pub fn m2_input_layout() -> InputLayout {
    InputLayout::new(vec![
        VertexElement::float("POSITION", 0, 3),
        VertexElement::bytes("BLENDWEIGHT", 0, true),
        VertexElement::bytes("BLENDINDEX", 0, false),
        VertexElement::float("NORMAL", 0, 3),
        VertexElement::float("TEXCOORD", 0, 2),
        VertexElement::float("TEXCOORD", 1, 2),
        VertexElement::float("TEXCOORD", 2, 4).instanced(INSTANCE_SLOT),
        VertexElement::float("TEXCOORD", 3, 4).instanced(INSTANCE_SLOT),
        VertexElement::float("TEXCOORD", 4, 4).instanced(INSTANCE_SLOT),
        VertexElement::float("TEXCOORD", 5, 4).instanced(INSTANCE_SLOT),
        VertexElement::float("COLOR", 0, 4).instanced(INSTANCE_SLOT),
    ])
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, Default, PartialEq)]
pub struct M2Vertex {
    pub position: [f32; 3],
    pub bone_weights: [u8; 4],
    pub bone_indices: [u8; 4],
    pub normal: [f32; 3],
    pub tex_coord0: [f32; 2],
    pub tex_coord1: [f32; 2],
}

/// Packed per-instance record: world matrix columns plus the colour modifier.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct PerInstanceData {
    pub transform: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl PerInstanceData {
    pub fn new(transform: Mat4, color: Vec4) -> Self {
        Self {
            transform: transform.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_matches_struct_size() {
        let layout = m2_input_layout();
        assert_eq!(layout.stride(0) as usize, std::mem::size_of::<M2Vertex>());
        assert_eq!(
            layout.stride(INSTANCE_SLOT) as usize,
            std::mem::size_of::<PerInstanceData>()
        );
    }

    #[test]
    fn offsets_restart_per_slot() {
        let layout = m2_input_layout();
        // BLENDWEIGHT follows the float3 position.
        assert_eq!(layout.offset(1), 12);
        // First instance row starts its own slot.
        assert_eq!(layout.offset(6), 0);
        assert_eq!(layout.offset(10), 64);
    }

    #[test]
    fn only_slot_one_is_instanced() {
        let layout = m2_input_layout();
        assert_eq!(layout.slots(), vec![0, 1]);
        assert!(!layout.is_instanced_slot(0));
        assert!(layout.is_instanced_slot(INSTANCE_SLOT));
    }
}
