use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use glam::{Mat4, Quat, Vec2, Vec3};

use super::Animator;
use crate::renderer::uniforms::MAX_BONES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
}

/// Values that can be blended between two keyframes.
pub trait Keyframe: Copy {
    fn interpolate(self, other: Self, factor: f32) -> Self;
}

impl Keyframe for Vec2 {
    fn interpolate(self, other: Self, factor: f32) -> Self {
        self.lerp(other, factor)
    }
}

impl Keyframe for Vec3 {
    fn interpolate(self, other: Self, factor: f32) -> Self {
        self.lerp(other, factor)
    }
}

impl Keyframe for Quat {
    fn interpolate(self, other: Self, factor: f32) -> Self {
        self.normalize().slerp(other.normalize(), factor).normalize()
    }
}

/// Keyframed values over time in seconds.
#[derive(Debug, Clone)]
pub struct Track<T> {
    times: Vec<f32>,
    values: Vec<T>,
    interpolation: Interpolation,
}

impl<T: Keyframe> Track<T> {
    /// Extra values or times without a partner are dropped.
    pub fn new(mut times: Vec<f32>, mut values: Vec<T>, interpolation: Interpolation) -> Self {
        let len = times.len().min(values.len());
        times.truncate(len);
        values.truncate(len);
        Self {
            times,
            values,
            interpolation,
        }
    }

    pub fn constant(value: T) -> Self {
        Self::new(vec![0.0], vec![value], Interpolation::Step)
    }

    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn sample(&self, time: f32) -> Option<T> {
        let (lower, upper, factor) = self.sample_indices(time)?;
        if lower == upper || self.interpolation == Interpolation::Step {
            return Some(self.values[lower]);
        }
        Some(self.values[lower].interpolate(self.values[upper], factor))
    }

    fn sample_indices(&self, time: f32) -> Option<(usize, usize, f32)> {
        if self.times.is_empty() {
            return None;
        }
        let last_index = self.times.len() - 1;
        if last_index == 0 || time <= self.times[0] {
            return Some((0, 0, 0.0));
        }
        if time >= self.times[last_index] {
            return Some((last_index, last_index, 0.0));
        }

        // First key strictly after `time`; 1..=last_index given the checks above.
        let upper = self.times.partition_point(|&t| t <= time);
        let lower = upper - 1;
        let start = self.times[lower];
        let span = self.times[upper] - start;
        let factor = if span.abs() < f32::EPSILON {
            0.0
        } else {
            ((time - start) / span).clamp(0.0, 1.0)
        };
        Some((lower, upper, factor))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bone {
    /// Must refer to an earlier bone.
    pub parent: Option<usize>,
    pub pivot: Vec3,
}

impl Bone {
    pub fn root(pivot: Vec3) -> Self {
        Self {
            parent: None,
            pivot,
        }
    }

    pub fn child(parent: usize, pivot: Vec3) -> Self {
        Self {
            parent: Some(parent),
            pivot,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoneTrack {
    pub translation: Option<Track<Vec3>>,
    pub rotation: Option<Track<Quat>>,
    pub scale: Option<Track<Vec3>>,
}

impl BoneTrack {
    fn local_matrix(&self, pivot: Vec3, time: f32) -> Mat4 {
        let translation = self
            .translation
            .as_ref()
            .and_then(|t| t.sample(time))
            .unwrap_or(Vec3::ZERO);
        let rotation = self
            .rotation
            .as_ref()
            .and_then(|t| t.sample(time))
            .unwrap_or(Quat::IDENTITY);
        let scale = self
            .scale
            .as_ref()
            .and_then(|t| t.sample(time))
            .unwrap_or(Vec3::ONE);

        Mat4::from_translation(pivot + translation)
            * Mat4::from_quat(rotation)
            * Mat4::from_scale(scale)
            * Mat4::from_translation(-pivot)
    }
}

#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub looping: bool,
    /// Indexed like the skeleton's bones; missing entries hold the bind pose.
    pub bones: Vec<BoneTrack>,
    /// Texture coordinate translation per texture animation index.
    pub uv_tracks: Vec<Track<Vec2>>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: 0.0,
            looping: true,
            bones: Vec::new(),
            uv_tracks: Vec::new(),
        }
    }

    pub fn with_bone_track(mut self, bone: usize, track: BoneTrack) -> Self {
        if self.bones.len() <= bone {
            self.bones.resize_with(bone + 1, BoneTrack::default);
        }
        let end = [
            track.translation.as_ref().map(Track::end_time),
            track.rotation.as_ref().map(Track::end_time),
            track.scale.as_ref().map(Track::end_time),
        ]
        .into_iter()
        .flatten()
        .fold(0.0, f32::max);
        self.duration = self.duration.max(end);
        self.bones[bone] = track;
        self
    }

    pub fn with_uv_track(mut self, track: Track<Vec2>) -> Self {
        self.duration = self.duration.max(track.end_time());
        self.uv_tracks.push(track);
        self
    }
}

#[derive(Debug, Clone)]
pub struct AnimationState {
    pub clip_index: usize,
    pub time: f32,
    pub speed: f32,
    pub looping: bool,
    pub playing: bool,
}

impl AnimationState {
    pub fn new(clip_index: usize, looping: bool) -> Self {
        Self {
            clip_index,
            time: 0.0,
            speed: 1.0,
            looping,
            playing: true,
        }
    }

    pub fn advance(&mut self, dt: f32, duration: f32) -> f32 {
        if !self.playing {
            return self.time;
        }

        let mut time = self.time + dt * self.speed;
        let duration = duration.max(0.0);

        if duration > 0.0 {
            if self.looping {
                time = time.rem_euclid(duration);
            } else if time >= duration {
                time = duration;
                self.playing = false;
            } else if time < 0.0 {
                time = 0.0;
            }
        }

        self.time = time;
        time
    }
}

struct Pose {
    state: Option<AnimationState>,
    bones: Vec<Mat4>,
    uv: Vec<Mat4>,
    changed: bool,
}

/// [`Animator`] over keyframed bone and texture tracks.
///
/// A model without clips keeps its bind pose and never reports a change.
pub struct KeyframeAnimator {
    skeleton: Vec<Bone>,
    clips: Vec<AnimationClip>,
    pose: Mutex<Pose>,
}

impl KeyframeAnimator {
    pub fn new(mut skeleton: Vec<Bone>, clips: Vec<AnimationClip>) -> Self {
        if skeleton.len() > MAX_BONES {
            log::warn!(
                "Skeleton has {} bones, only the first {} are animated",
                skeleton.len(),
                MAX_BONES
            );
            skeleton.truncate(MAX_BONES);
        }
        let bone_count = skeleton.len();
        Self {
            skeleton,
            clips,
            pose: Mutex::new(Pose {
                state: None,
                bones: vec![Mat4::IDENTITY; bone_count],
                uv: Vec::new(),
                changed: false,
            }),
        }
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    pub fn current_clip(&self) -> Option<usize> {
        self.lock().state.as_ref().map(|s| s.clip_index)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Pose> {
        self.pose.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evaluate(&self, clip: &AnimationClip, time: f32, pose: &mut Pose) {
        for (index, bone) in self.skeleton.iter().enumerate() {
            let local = clip
                .bones
                .get(index)
                .map_or(Mat4::IDENTITY, |track| track.local_matrix(bone.pivot, time));
            let parent = bone
                .parent
                .filter(|&parent| parent < index)
                .map_or(Mat4::IDENTITY, |parent| pose.bones[parent]);
            pose.bones[index] = parent * local;
        }

        pose.uv.clear();
        pose.uv.extend(clip.uv_tracks.iter().map(|track| {
            let offset = track.sample(time).unwrap_or(Vec2::ZERO);
            Mat4::from_translation(offset.extend(0.0))
        }));
        pose.changed = true;
    }
}

impl Animator for KeyframeAnimator {
    fn set_animation_by_index(&self, index: usize) {
        let Some(clip) = self.clips.get(index) else {
            if !self.clips.is_empty() {
                log::warn!(
                    "Animation index {} out of range ({} clips)",
                    index,
                    self.clips.len()
                );
            }
            return;
        };
        self.lock().state = Some(AnimationState::new(index, clip.looping));
    }

    fn update(&self, elapsed: Duration) {
        let mut pose = self.lock();
        let Some(state) = pose.state.as_mut() else {
            return;
        };
        let Some(clip) = self.clips.get(state.clip_index) else {
            return;
        };
        let time = state.advance(elapsed.as_secs_f32(), clip.duration);
        self.evaluate(clip, time, &mut pose);
    }

    fn get_bones(&self, bones: &mut [Mat4]) -> bool {
        let mut pose = self.lock();
        if !pose.changed {
            return false;
        }
        let count = bones.len().min(pose.bones.len());
        bones[..count].copy_from_slice(&pose.bones[..count]);
        pose.changed = false;
        true
    }

    fn uv_anim_matrix(&self, index: usize) -> Mat4 {
        self.lock().uv.get(index).copied().unwrap_or(Mat4::IDENTITY)
    }
}
