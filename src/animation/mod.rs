pub mod keyframe;

pub use keyframe::{
    AnimationClip, AnimationState, Bone, BoneTrack, Interpolation, KeyframeAnimator, Track,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use glam::Mat4;

/// Evaluates the pose of one model.
///
/// Updated from the animation registry (any thread) and read by the render
/// thread, so every method takes `&self`.
pub trait Animator: Send + Sync {
    fn set_animation_by_index(&self, index: usize);

    fn update(&self, elapsed: Duration);

    /// Writes the current bone matrices into `bones`. Returns false when the
    /// pose has not changed since the last call, leaving `bones` untouched.
    fn get_bones(&self, bones: &mut [Mat4]) -> bool;

    fn uv_anim_matrix(&self, index: usize) -> Mat4;
}

/// Process-wide set of animators advanced together.
pub struct AnimationRegistry {
    animators: Mutex<Vec<Arc<dyn Animator>>>,
    last_tick: Mutex<Instant>,
}

impl AnimationRegistry {
    pub fn new() -> Self {
        Self {
            animators: Mutex::new(Vec::new()),
            last_tick: Mutex::new(Instant::now()),
        }
    }

    pub fn add(&self, animator: Arc<dyn Animator>) {
        self.lock().push(animator);
        log::debug!("Registered animator ({} active)", self.len());
    }

    /// Returns false when `animator` was not registered.
    pub fn remove(&self, animator: &Arc<dyn Animator>) -> bool {
        let mut animators = self.lock();
        let before = animators.len();
        animators.retain(|a| !same_animator(a, animator));
        before != animators.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, animator: &Arc<dyn Animator>) -> bool {
        self.lock().iter().any(|a| same_animator(a, animator))
    }

    /// Advances every registered animator by `elapsed`.
    pub fn advance(&self, elapsed: Duration) {
        // Snapshot so animators are updated without holding the registry lock.
        let animators: Vec<Arc<dyn Animator>> = self.lock().clone();
        for animator in animators {
            animator.update(elapsed);
        }
    }

    /// Advances by the wall-clock time since the previous tick.
    pub fn tick(&self) {
        let now = Instant::now();
        let elapsed = {
            let mut last = self
                .last_tick
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let elapsed = now.duration_since(*last);
            *last = now;
            elapsed
        };
        self.advance(elapsed);
    }

    /// Ticks the registry from a background thread every `interval`.
    pub fn spawn_ticker(
        self: &Arc<Self>,
        interval: Duration,
    ) -> std::io::Result<AnimationTicker> {
        let stop = Arc::new(AtomicBool::new(false));
        let registry = Arc::clone(self);
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("animation-ticker".into())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    registry.tick();
                    thread::sleep(interval);
                }
            })?;
        log::info!("Animation ticker started ({:?} interval)", interval);
        Ok(AnimationTicker {
            stop,
            handle: Some(handle),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn Animator>>> {
        self.animators.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AnimationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn same_animator(a: &Arc<dyn Animator>, b: &Arc<dyn Animator>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Background ticking thread; stopped and joined on drop.
pub struct AnimationTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AnimationTicker {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Animation ticker thread panicked");
            }
        }
    }
}

impl Drop for AnimationTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[derive(Default)]
    struct CountingAnimator {
        updates: AtomicU64,
    }

    impl Animator for CountingAnimator {
        fn set_animation_by_index(&self, _index: usize) {}

        fn update(&self, _elapsed: Duration) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }

        fn get_bones(&self, _bones: &mut [Mat4]) -> bool {
            false
        }

        fn uv_anim_matrix(&self, _index: usize) -> Mat4 {
            Mat4::IDENTITY
        }
    }

    #[test]
    fn registry_adds_advances_and_removes() {
        let registry = AnimationRegistry::new();
        let counting = Arc::new(CountingAnimator::default());
        let animator: Arc<dyn Animator> = counting.clone();

        registry.add(animator.clone());
        assert!(registry.contains(&animator));
        registry.advance(Duration::from_millis(16));
        assert_eq!(counting.updates.load(Ordering::SeqCst), 1);

        assert!(registry.remove(&animator));
        assert!(!registry.remove(&animator));
        registry.advance(Duration::from_millis(16));
        assert_eq!(counting.updates.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn ticker_updates_until_dropped() {
        let registry = Arc::new(AnimationRegistry::new());
        let counting = Arc::new(CountingAnimator::default());
        registry.add(counting.clone());

        let ticker = registry.spawn_ticker(Duration::from_millis(1)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while counting.updates.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        ticker.stop();

        let after_stop = counting.updates.load(Ordering::SeqCst);
        assert!(after_stop >= 3);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(counting.updates.load(Ordering::SeqCst), after_stop);
    }
}
