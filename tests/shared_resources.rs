use m2_batch::model::{SharedRenderResources, BLEND_MODES, M2_SHADER_SOURCE};
use m2_batch::renderer::{AddressMode, BlendFactor, FilterMode, HeadlessDevice};
use m2_batch::RenderError;

#[test]
fn initialization_creates_programs_states_and_sampler() {
    let mut device = HeadlessDevice::new();
    let shared = SharedRenderResources::initialize(&mut device).unwrap();

    let programs = shared.programs();
    assert_eq!(device.program_label(programs.no_blend), Some("M2NoBlend"));
    assert_eq!(device.program_label(programs.blend), Some("M2Blend"));
    assert_eq!(device.program_label(programs.blend_test), Some("M2BlendTest"));

    for (mode, expected) in BLEND_MODES.iter().enumerate() {
        let state = shared.blend_state(mode as u16).unwrap();
        assert_eq!(device.blend_descriptor(state), Some(expected));
    }
    assert_eq!(shared.blend_state(BLEND_MODES.len() as u16), None);

    let cull = device.raster_descriptor(shared.raster_state(false)).unwrap();
    let no_cull = device.raster_descriptor(shared.raster_state(true)).unwrap();
    assert!(cull.cull_enabled);
    assert!(!no_cull.cull_enabled);

    let sampler = device.sampler_descriptor(shared.sampler()).unwrap();
    assert_eq!(sampler.address_mode, AddressMode::Wrap);
    assert_eq!(sampler.min_filter, FilterMode::Linear);
    assert_eq!(sampler.mag_filter, FilterMode::Linear);
    assert_eq!(sampler.mip_filter, FilterMode::Linear);
}

#[test]
fn program_selection_follows_blend_mode() {
    let mut device = HeadlessDevice::new();
    let shared = SharedRenderResources::initialize(&mut device).unwrap();
    let programs = shared.programs();

    assert_eq!(shared.program_for_blend_mode(0), programs.no_blend);
    assert_eq!(shared.program_for_blend_mode(1), programs.blend_test);
    for mode in 2..7 {
        assert_eq!(shared.program_for_blend_mode(mode), programs.blend);
    }
}

#[test]
fn additive_mode_adds_onto_destination() {
    let additive = BLEND_MODES[4];
    assert!(additive.enabled);
    assert_eq!(additive.src_color, BlendFactor::SrcAlpha);
    assert_eq!(additive.dst_color, BlendFactor::One);
}

#[test]
fn missing_fragment_entry_fails_initialization() {
    let mut device = HeadlessDevice::new();
    let broken = M2_SHADER_SOURCE.replace("fn fs_blend_alpha_test", "fn fs_unused");

    let err = SharedRenderResources::initialize_with_source(&mut device, &broken).unwrap_err();
    match err {
        RenderError::ShaderCompilation { label, details } => {
            assert_eq!(label, "M2BlendTest");
            assert!(details.contains("fs_blend_alpha_test"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
