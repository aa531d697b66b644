mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use common::{at_x, quad_asset, Fixture};
use glam::Vec3;
use m2_batch::model::ModelPass;
use m2_batch::renderer::BoundState;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[test]
fn random_add_remove_sequences_keep_counts_consistent() {
    let fx = Fixture::new();
    let renderer = fx.renderer(quad_asset("rng", fx.texture, vec![ModelPass::new(0, 6, 0)]));
    let mut rng = SmallRng::seed_from_u64(0x5EED);
    let mut expected: HashMap<u32, u32> = HashMap::new();

    for _ in 0..2_000 {
        let uuid = rng.gen_range(0..16);
        if rng.gen_bool(0.55) {
            renderer.add_instance(uuid, at_x(uuid as f32), Vec3::ZERO, Vec3::ONE);
            *expected.entry(uuid).or_insert(0) += 1;
        } else {
            let known = expected.contains_key(&uuid);
            let emptied = renderer.remove_instance(uuid);
            if known {
                let count = expected.get_mut(&uuid).unwrap();
                *count -= 1;
                if *count == 0 {
                    expected.remove(&uuid);
                }
            }
            assert_eq!(emptied, known && expected.is_empty());
        }

        for uuid in 0..16 {
            assert_eq!(renderer.reference_count(uuid), expected.get(&uuid).copied());
            assert_eq!(renderer.contains(uuid), expected.contains_key(&uuid));
        }
        assert_eq!(renderer.instance_count(), expected.len());
    }

    // Nothing limits the view, so the visible set mirrors the full set.
    let mut visible = renderer.visible_ids();
    visible.sort_unstable();
    let mut live: Vec<u32> = expected.keys().copied().collect();
    live.sort_unstable();
    assert_eq!(visible, live);
}

#[test]
fn remove_reports_empty_only_for_the_last_instance() {
    let fx = Fixture::new();
    let renderer = fx.renderer(quad_asset("last", fx.texture, vec![ModelPass::new(0, 6, 0)]));
    for uuid in 0..4 {
        renderer.add_instance(uuid, Vec3::ZERO, Vec3::ZERO, Vec3::ONE);
    }
    let results: Vec<bool> = (0..4).map(|uuid| renderer.remove_instance(uuid)).collect();
    assert_eq!(results, vec![false, false, false, true]);
    assert!(!renderer.remove_instance(0));
}

#[test]
fn placement_threads_run_alongside_rendering() {
    let mut fx = Fixture::new();
    let renderer = fx.renderer(quad_asset("busy", fx.texture, vec![ModelPass::new(0, 6, 0)]));
    let done = Arc::new(AtomicBool::new(false));

    let workers: Vec<_> = (0..4u32)
        .map(|worker| {
            let renderer = Arc::clone(&renderer);
            thread::spawn(move || {
                let mut rng = SmallRng::seed_from_u64(worker as u64);
                for round in 0..500u32 {
                    let uuid = worker * 1_000 + rng.gen_range(0..50);
                    renderer.add_instance(uuid, at_x(uuid as f32), Vec3::ZERO, Vec3::ONE);
                    if round % 3 == 0 {
                        renderer.remove_instance(uuid);
                    }
                    if round % 97 == 0 {
                        renderer.view_changed();
                        renderer.push_map_reference(uuid);
                    }
                }
            })
        })
        .collect();

    let mut device = std::mem::take(&mut fx.device);
    let render_thread = {
        let renderer = Arc::clone(&renderer);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut bound = BoundState::new();
            let mut frames = 0;
            while frames == 0 || !done.load(Ordering::Acquire) {
                renderer.on_frame(&mut device, &mut bound);
                frames += 1;
            }
            frames
        })
    };

    for worker in workers {
        worker.join().unwrap();
    }
    done.store(true, Ordering::Release);
    assert!(render_thread.join().unwrap() > 0);

    // No id is visible twice and every visible id is still placed.
    let visible = renderer.visible_ids();
    let mut unique = visible.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), visible.len());
    assert!(visible.iter().all(|&uuid| renderer.contains(uuid)));
    assert!(renderer.visible_count() <= renderer.instance_count());
}
