//! Recording graphics device without a GPU.
//!
//! [`HeadlessDevice`] hands out handles, keeps buffer contents in memory and
//! records every bind and draw so callers can inspect the command stream.
//! Used by the demo binary and as a call-count spy in tests.

use std::collections::HashMap;

use crate::error::RenderError;
use crate::renderer::device::*;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateBuffer(BufferId, BufferUsage),
    UpdateBuffer(BufferId, usize),
    DestroyBuffer(BufferId),
    SetIndexBuffer(BufferId),
    SetVertexBuffer { slot: u32, buffer: BufferId },
    SetProgram(ProgramId),
    SetBlendState(BlendStateId),
    SetRasterState(RasterStateId),
    SetConstantBuffer { slot: u32, buffer: BufferId },
    SetPixelTexture { slot: u32, texture: TextureId },
    SetPixelSampler { slot: u32, sampler: SamplerId },
    Draw(DrawIndexed),
}

#[derive(Debug, Clone)]
struct HeadlessBuffer {
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    buffers: HashMap<BufferId, HeadlessBuffer>,
    next_buffer: u32,
    programs: Vec<String>,
    blend_states: Vec<BlendDescriptor>,
    raster_states: Vec<RasterDescriptor>,
    samplers: Vec<SamplerDescriptor>,
    next_texture: u32,
    calls: Vec<DeviceCall>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_texture(&mut self) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        id
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn draws(&self) -> Vec<DrawIndexed> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    pub fn draw_calls(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::Draw(_)))
    }

    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffers_with_usage(&self, usage: BufferUsage) -> Vec<BufferId> {
        let mut ids: Vec<BufferId> = self
            .buffers
            .iter()
            .filter(|(_, b)| b.usage == usage)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn program_label(&self, program: ProgramId) -> Option<&str> {
        self.programs.get(program.index()).map(String::as_str)
    }

    pub fn blend_descriptor(&self, state: BlendStateId) -> Option<&BlendDescriptor> {
        self.blend_states.get(state.index())
    }

    pub fn raster_descriptor(&self, state: RasterStateId) -> Option<&RasterDescriptor> {
        self.raster_states.get(state.index())
    }

    pub fn sampler_descriptor(&self, sampler: SamplerId) -> Option<&SamplerDescriptor> {
        self.samplers.get(sampler.index())
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<BufferId, RenderError> {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(
            id,
            HeadlessBuffer {
                usage: desc.usage,
                data: desc.contents.to_vec(),
            },
        );
        self.calls.push(DeviceCall::CreateBuffer(id, desc.usage));
        Ok(id)
    }

    fn update_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), RenderError> {
        let entry = self
            .buffers
            .get_mut(&buffer)
            .ok_or(RenderError::UnknownResource {
                kind: "buffer",
                id: buffer.0,
            })?;
        entry.data.clear();
        entry.data.extend_from_slice(data);
        self.calls.push(DeviceCall::UpdateBuffer(buffer, data.len()));
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.calls.push(DeviceCall::DestroyBuffer(buffer));
        } else {
            log::warn!("Destroying unknown buffer {:?}", buffer);
        }
    }

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> Result<ProgramId, RenderError> {
        for entry in [desc.vertex_entry, desc.fragment_entry] {
            if !declares_entry_point(desc.source, entry) {
                return Err(RenderError::ShaderCompilation {
                    label: desc.label.to_string(),
                    details: format!("entry point '{}' not found", entry),
                });
            }
        }
        if desc.layout.elements().is_empty() {
            return Err(RenderError::InvalidDescriptor(format!(
                "program '{}' has an empty input layout",
                desc.label
            )));
        }
        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(desc.label.to_string());
        Ok(id)
    }

    fn create_blend_state(&mut self, desc: &BlendDescriptor) -> Result<BlendStateId, RenderError> {
        let id = BlendStateId(self.blend_states.len() as u32);
        self.blend_states.push(*desc);
        Ok(id)
    }

    fn create_raster_state(
        &mut self,
        desc: &RasterDescriptor,
    ) -> Result<RasterStateId, RenderError> {
        let id = RasterStateId(self.raster_states.len() as u32);
        self.raster_states.push(*desc);
        Ok(id)
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> Result<SamplerId, RenderError> {
        let id = SamplerId(self.samplers.len() as u32);
        self.samplers.push(*desc);
        Ok(id)
    }

    fn set_index_buffer(&mut self, buffer: BufferId, _format: IndexFormat) {
        self.calls.push(DeviceCall::SetIndexBuffer(buffer));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, _stride: u32) {
        self.calls.push(DeviceCall::SetVertexBuffer { slot, buffer });
    }

    fn set_program(&mut self, program: ProgramId) {
        self.calls.push(DeviceCall::SetProgram(program));
    }

    fn set_blend_state(&mut self, state: BlendStateId) {
        self.calls.push(DeviceCall::SetBlendState(state));
    }

    fn set_raster_state(&mut self, state: RasterStateId) {
        self.calls.push(DeviceCall::SetRasterState(state));
    }

    fn set_vertex_constant_buffer(&mut self, slot: u32, buffer: BufferId) {
        self.calls.push(DeviceCall::SetConstantBuffer { slot, buffer });
    }

    fn set_pixel_texture(&mut self, slot: u32, texture: TextureId) {
        self.calls.push(DeviceCall::SetPixelTexture { slot, texture });
    }

    fn set_pixel_sampler(&mut self, slot: u32, sampler: SamplerId) {
        self.calls.push(DeviceCall::SetPixelSampler { slot, sampler });
    }

    fn draw_indexed_instanced(&mut self, draw: &DrawIndexed) {
        self.calls.push(DeviceCall::Draw(*draw));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::vertex::m2_input_layout;

    #[test]
    fn missing_entry_point_fails_program_creation() {
        let mut device = HeadlessDevice::new();
        let layout = m2_input_layout();
        let result = device.create_program(&ProgramDescriptor {
            label: "Broken",
            source: "@vertex fn vs_main() {}",
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            layout: &layout,
        });
        assert!(matches!(
            result,
            Err(RenderError::ShaderCompilation { .. })
        ));
    }

    #[test]
    fn update_replaces_contents() {
        let mut device = HeadlessDevice::new();
        let id = device
            .create_buffer(&BufferDescriptor {
                label: "Test",
                usage: BufferUsage::Instance,
                contents: &[0u8; 4],
            })
            .unwrap();
        device.update_buffer(id, &[1u8; 8]).unwrap();
        assert_eq!(device.buffer_data(id), Some(&[1u8; 8][..]));
        assert!(device.update_buffer(BufferId(99), &[]).is_err());
    }
}
