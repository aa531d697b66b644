use crate::error::RenderError;
use crate::renderer::device::{
    AddressMode, BlendDescriptor, BlendFactor, BlendStateId, FilterMode, GraphicsDevice,
    ProgramDescriptor, ProgramId, RasterDescriptor, RasterStateId, SamplerDescriptor, SamplerId,
};
use crate::renderer::vertex::{m2_input_layout, InputLayout};

pub const M2_SHADER_SOURCE: &str = include_str!("../shader/m2.wgsl");

pub const VERTEX_ENTRY: &str = "vs_main";
pub const OPAQUE_ENTRY: &str = "fs_opaque";
pub const BLEND_ENTRY: &str = "fs_blend";
pub const BLEND_TEST_ENTRY: &str = "fs_blend_alpha_test";

pub const BLEND_MODE_COUNT: usize = 7;

/// Blend state per pass blend mode.
///
/// Mode 5 repeats mode 2 and mode 6 swaps the multiply factors; both are kept
/// so asset blend modes index the table directly.
pub const BLEND_MODES: [BlendDescriptor; BLEND_MODE_COUNT] = [
    BlendDescriptor::DISABLED,
    BlendDescriptor::blended(
        BlendFactor::One,
        BlendFactor::Zero,
        BlendFactor::One,
        BlendFactor::Zero,
    ),
    BlendDescriptor::blended(
        BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha,
        BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha,
    ),
    BlendDescriptor::blended(
        BlendFactor::SrcColor,
        BlendFactor::DstColor,
        BlendFactor::SrcAlpha,
        BlendFactor::DstAlpha,
    ),
    BlendDescriptor::blended(
        BlendFactor::SrcAlpha,
        BlendFactor::One,
        BlendFactor::SrcAlpha,
        BlendFactor::One,
    ),
    BlendDescriptor::blended(
        BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha,
        BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha,
    ),
    BlendDescriptor::blended(
        BlendFactor::DstColor,
        BlendFactor::SrcColor,
        BlendFactor::DstAlpha,
        BlendFactor::SrcAlpha,
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramSet {
    pub no_blend: ProgramId,
    pub blend: ProgramId,
    pub blend_test: ProgramId,
}

/// Programs, states and sampler shared by every batch renderer of the model
/// class. Immutable once initialised.
#[derive(Debug, Clone)]
pub struct SharedRenderResources {
    layout: InputLayout,
    programs: ProgramSet,
    blend_states: [BlendStateId; BLEND_MODE_COUNT],
    cull: RasterStateId,
    no_cull: RasterStateId,
    sampler: SamplerId,
}

impl SharedRenderResources {
    pub fn initialize(device: &mut dyn GraphicsDevice) -> Result<Self, RenderError> {
        Self::initialize_with_source(device, M2_SHADER_SOURCE)
    }

    pub fn initialize_with_source(
        device: &mut dyn GraphicsDevice,
        source: &str,
    ) -> Result<Self, RenderError> {
        let layout = m2_input_layout();

        let mut program = |label: &str, fragment_entry: &str| {
            device.create_program(&ProgramDescriptor {
                label,
                source,
                vertex_entry: VERTEX_ENTRY,
                fragment_entry,
                layout: &layout,
            })
        };
        let programs = ProgramSet {
            no_blend: program("M2NoBlend", OPAQUE_ENTRY)?,
            blend: program("M2Blend", BLEND_ENTRY)?,
            blend_test: program("M2BlendTest", BLEND_TEST_ENTRY)?,
        };

        let mut blend_states = [BlendStateId(0); BLEND_MODE_COUNT];
        for (state, desc) in blend_states.iter_mut().zip(BLEND_MODES.iter()) {
            *state = device.create_blend_state(desc)?;
        }

        let cull = device.create_raster_state(&RasterDescriptor { cull_enabled: true })?;
        let no_cull = device.create_raster_state(&RasterDescriptor {
            cull_enabled: false,
        })?;

        let sampler = device.create_sampler(&SamplerDescriptor {
            address_mode: AddressMode::Wrap,
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: FilterMode::Linear,
        })?;

        log::info!(
            "Initialized shared model resources: {} blend states, {} input elements",
            BLEND_MODE_COUNT,
            layout.elements().len()
        );

        Ok(Self {
            layout,
            programs,
            blend_states,
            cull,
            no_cull,
            sampler,
        })
    }

    pub fn input_layout(&self) -> &InputLayout {
        &self.layout
    }

    pub fn programs(&self) -> ProgramSet {
        self.programs
    }

    /// Alpha-tested for mode 1, blended for any other non-zero mode.
    pub fn program_for_blend_mode(&self, blend_mode: u16) -> ProgramId {
        match blend_mode {
            0 => self.programs.no_blend,
            1 => self.programs.blend_test,
            _ => self.programs.blend,
        }
    }

    pub fn blend_state(&self, blend_mode: u16) -> Option<BlendStateId> {
        self.blend_states.get(blend_mode as usize).copied()
    }

    pub fn raster_state(&self, culling_disabled: bool) -> RasterStateId {
        if culling_disabled {
            self.no_cull
        } else {
            self.cull
        }
    }

    pub fn sampler(&self) -> SamplerId {
        self.sampler
    }
}
