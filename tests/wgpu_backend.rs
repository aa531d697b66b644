//! Rendering through the wgpu backend. These need an adapter (a software
//! one is enough) and are ignored by default.

mod common;

use std::sync::Arc;

use common::quad_vertices;
use glam::{Mat4, Vec3};
use m2_batch::model::{
    ModelAsset, ModelManager, ModelPass, RenderFlags, SharedRenderResources, M2_SHADER_SOURCE,
};
use m2_batch::renderer::{BoundState, FrameTarget, TextureId, WgpuDevice};
use m2_batch::scene::SceneContext;
use m2_batch::{RenderError, RendererSettings};

const SIZE: u32 = 64;
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn create_device() -> WgpuDevice {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .expect("Failed to find adapter");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .expect("Failed to create device");

        WgpuDevice::new(device, queue, FORMAT, None)
    })
}

fn create_target(gpu: &WgpuDevice) -> wgpu::Texture {
    gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Target"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn read_pixels(gpu: &WgpuDevice, target: &wgpu::Texture) -> Vec<u8> {
    let bytes_per_row = SIZE * 4;
    let readback = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("Test Readback"),
        size: (bytes_per_row * SIZE) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_texture_to_buffer(
        target.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(SIZE),
            },
        },
        target.size(),
    );
    gpu.queue().submit(Some(encoder.finish()));

    let slice = readback.slice(..);
    slice.map_async(wgpu::MapMode::Read, |result| result.expect("Failed to map readback"));
    gpu.device()
        .poll(wgpu::PollType::wait_indefinitely())
        .expect("Failed to poll device");
    let pixels = slice.get_mapped_range().to_vec();
    readback.unmap();
    pixels
}

fn pixel(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
    let at = ((y * SIZE + x) * 4) as usize;
    [pixels[at], pixels[at + 1], pixels[at + 2], pixels[at + 3]]
}

/// Full-screen quad split into a lit lower-left triangle and an unlit,
/// two-sided upper-right triangle.
fn split_quad(texture: TextureId) -> ModelAsset {
    ModelAsset::new("split", quad_vertices(), vec![0, 1, 2, 2, 1, 3])
        .with_pass(ModelPass::new(0, 3, 0).with_texture(texture))
        .with_pass(
            ModelPass::new(3, 3, 0)
                .with_flags(RenderFlags::UNLIT | RenderFlags::TWO_SIDED)
                .with_texture(texture),
        )
}

#[test]
#[ignore]
fn model_shader_compiles_on_the_device() {
    let mut gpu = create_device();
    let shared = SharedRenderResources::initialize(&mut gpu);
    assert!(shared.is_ok(), "{:?}", shared.err());
}

#[test]
#[ignore]
fn invalid_shader_is_reported_as_compilation_error() {
    let mut gpu = create_device();
    let broken = M2_SHADER_SOURCE.replace("return shade(in);", "return shade(in) +;");

    let err = SharedRenderResources::initialize_with_source(&mut gpu, &broken).unwrap_err();
    assert!(matches!(err, RenderError::ShaderCompilation { .. }), "{err}");
}

#[test]
#[ignore]
fn passes_render_with_their_own_constants() {
    let mut gpu = create_device();
    let shared = Arc::new(SharedRenderResources::initialize(&mut gpu).unwrap());
    let white = gpu.create_texture_rgba8("white", 1, 1, &[255; 4]).unwrap();

    let context = Arc::new(SceneContext::new(RendererSettings::default()));
    context.set_view_matrix(Mat4::IDENTITY, Vec3::ZERO);
    let manager = ModelManager::new(shared, Arc::clone(&context));
    let asset = Arc::new(split_quad(white));
    manager.add_instance(&asset, 1, Vec3::ZERO, Vec3::ZERO, Vec3::ONE);

    let target = create_target(&gpu);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    let frame = FrameTarget {
        color: &view,
        depth: None,
        clear: Some(wgpu::Color::BLACK),
    };

    let mut bound = BoundState::new();
    let stats = manager.on_frame(&mut gpu, &mut bound);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(gpu.pending_draws(), 2);
    assert_eq!(gpu.submit_frame(&frame), 2);
    assert_eq!(gpu.pending_draws(), 0);
    assert_eq!(gpu.pipeline_count(), 2);

    let pixels = read_pixels(&gpu, &target);
    let lit = pixel(&pixels, 8, SIZE - 8);
    let unlit = pixel(&pixels, SIZE - 8, 8);

    // Diffuse for a +Z normal is about 0.65 of the texel.
    assert!((155..=180).contains(&lit[0]), "lit pixel {:?}", lit);
    assert_eq!(lit[3], 255);
    assert!(unlit[0] >= 250, "unlit pixel {:?}", unlit);

    // A second frame reuses the cached pipelines.
    bound.invalidate();
    manager.on_frame(&mut gpu, &mut bound);
    assert_eq!(gpu.submit_frame(&frame), 2);
    assert_eq!(gpu.pipeline_count(), 2);
}
