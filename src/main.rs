use std::sync::Arc;
use std::thread;

use glam::{Quat, Vec2, Vec3};
use m2_batch::animation::{AnimationClip, Bone, BoneTrack, Interpolation, Track};
use m2_batch::model::{ModelAsset, ModelManager, ModelPass, RenderFlags, SharedRenderResources};
use m2_batch::renderer::{BoundState, HeadlessDevice, M2Vertex};
use m2_batch::scene::{BrushHighlight, Camera, SceneContext};
use m2_batch::RendererSettings;

const GRID: u32 = 8;

/// A two-bone quad whose upper half sways, with a scrolling texture.
fn build_demo_model(texture: m2_batch::renderer::TextureId) -> ModelAsset {
    let vertex = |x: f32, y: f32, bone: u8| M2Vertex {
        position: [x, y, 0.0],
        bone_weights: [255, 0, 0, 0],
        bone_indices: [bone, 0, 0, 0],
        normal: [0.0, 0.0, 1.0],
        tex_coord0: [x + 0.5, 1.0 - y],
        tex_coord1: [0.0, 0.0],
    };
    let vertices = vec![
        vertex(-0.5, 0.0, 0),
        vertex(0.5, 0.0, 0),
        vertex(-0.5, 1.0, 1),
        vertex(0.5, 1.0, 1),
    ];
    let indices = vec![0, 1, 2, 2, 1, 3];

    let sway = BoneTrack {
        rotation: Some(Track::new(
            vec![0.0, 1.0, 2.0],
            vec![
                Quat::from_rotation_z(-0.3),
                Quat::from_rotation_z(0.3),
                Quat::from_rotation_z(-0.3),
            ],
            Interpolation::Linear,
        )),
        ..Default::default()
    };
    let clip = AnimationClip::new("sway")
        .with_bone_track(1, sway)
        .with_uv_track(Track::new(
            vec![0.0, 2.0],
            vec![Vec2::ZERO, Vec2::new(1.0, 0.0)],
            Interpolation::Linear,
        ));

    ModelAsset::new("demo_tree", vertices, indices)
        .with_pass(ModelPass::new(0, 6, 0).with_texture(texture))
        .with_pass(
            ModelPass::new(0, 6, 2)
                .with_flags(RenderFlags::TWO_SIDED | RenderFlags::UNLIT)
                .with_texture(texture)
                .with_tex_anim(0),
        )
        .with_animation(
            vec![Bone::root(Vec3::ZERO), Bone::child(0, Vec3::new(0.0, 0.5, 0.0))],
            vec![clip],
        )
}

fn main() {
    m2_batch::init_logging();

    let settings = RendererSettings::load();
    let mut device = HeadlessDevice::new();
    let shared = match SharedRenderResources::initialize(&mut device) {
        Ok(shared) => Arc::new(shared),
        Err(err) => {
            log::error!("Failed to initialize model resources: {}", err);
            std::process::exit(1);
        }
    };

    let context = Arc::new(SceneContext::new(settings.clone()));
    let camera = Camera {
        eye: Vec3::new(0.0, 10.0, 20.0),
        target: Vec3::new(0.0, 0.0, 0.0),
        far: 60.0,
        ..Camera::default()
    };
    context.set_view(&camera, 16.0 / 9.0);

    let ticker = match context
        .animations()
        .spawn_ticker(settings.animation_interval())
    {
        Ok(ticker) => Some(ticker),
        Err(err) => {
            log::warn!("Animation ticker unavailable: {}", err);
            None
        }
    };

    let manager = Arc::new(ModelManager::new(shared, Arc::clone(&context)));
    let asset = Arc::new(build_demo_model(device.register_texture()));

    // Placements stream in from a loader thread, as they would from map tiles.
    let loader = {
        let manager = Arc::clone(&manager);
        let asset = Arc::clone(&asset);
        thread::spawn(move || {
            for uuid in 0..GRID * GRID {
                let position = Vec3::new(
                    (uuid % GRID) as f32 * 4.0 - 14.0,
                    0.0,
                    (uuid / GRID) as f32 * -4.0,
                );
                let rotation = Vec3::new(0.0, (uuid * 45 % 360) as f32, 0.0);
                manager.add_instance(&asset, uuid, position, rotation, Vec3::ONE);
            }
        })
    };
    if loader.join().is_err() {
        log::error!("Loader thread panicked");
        return;
    }
    context.set_initial_load(false);

    let mut bound = BoundState::new();
    for frame in 0..4 {
        if frame == 2 {
            context.set_brush(Some(BrushHighlight {
                position: Vec3::ZERO,
                outer_radius: 6.0,
            }));
        }
        bound.invalidate();
        let stats = manager.on_frame(&mut device, &mut bound);
        log::info!(
            "Frame {}: {} draws, {} instances, {} state binds",
            frame,
            stats.draw_calls,
            stats.instances,
            stats.state_binds
        );
        thread::sleep(settings.animation_interval());
    }

    for uuid in 0..GRID * GRID {
        manager.remove_instance(&asset.name, uuid);
    }
    manager.on_frame(&mut device, &mut bound);
    log::info!(
        "Shut down with {} renderers and {} live buffers",
        manager.len(),
        device.live_buffers()
    );

    drop(ticker);
}
