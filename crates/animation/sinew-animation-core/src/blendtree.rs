//! Blend tree sources.
//!
//! A blend tree produces per-channel transform samples as a function of
//! global time. Steady states own one tree each; trees may nest (e.g. a
//! `BinaryLerpSource` over two `ClipSource`s).

use hashbrown::HashMap;
use sinew_api_core::{blend_value, SourceDataMap, Transform, Value};

use crate::clip::{joint_channel_name, AnimationClip};

/// A node in a blend tree.
///
/// Sources own their playback state and refresh their sample cache in
/// `set_time`; `source_data` borrows that cache, so callers must not assume
/// a fresh map each call.
pub trait BlendTreeSource {
    /// Advance to the given global time. Returns false once the source has
    /// played out (signalling exhaustion to the owning state).
    fn set_time(&mut self, global_time: f64) -> bool;

    /// Whether this source is still contributing.
    fn is_active(&self) -> bool;

    /// The most recently sampled per-channel data.
    fn source_data(&self) -> &SourceDataMap;

    /// Re-anchor playback so the source starts at `global_start_time`.
    fn reset_clips(&mut self, global_start_time: f64);
}

/// Combines two source-data maps by matching elements with the same key,
/// blending values toward B by `blend_weight`. Keys that exist in only one
/// map are preserved; if one side is missing entirely, the other side is
/// used verbatim. Writes into `store` (cleared first, capacity kept) so a
/// caller can reuse one map across ticks.
pub fn combine_source_data(
    source_a: Option<&SourceDataMap>,
    source_b: Option<&SourceDataMap>,
    blend_weight: f64,
    store: &mut SourceDataMap,
) {
    store.clear();
    let (a, b) = match (source_a, source_b) {
        (Some(a), Some(b)) => (a, b),
        (Some(a), None) => {
            store.extend(a.iter().map(|(k, v)| (k.clone(), *v)));
            return;
        }
        (None, Some(b)) => {
            store.extend(b.iter().map(|(k, v)| (k.clone(), *v)));
            return;
        }
        (None, None) => return,
    };

    let t = blend_weight as f32;
    for (key, data_a) in a.iter() {
        match b.get(key) {
            Some(data_b) => {
                store.insert(key.clone(), blend_value(data_a, data_b, t));
            }
            None => {
                store.insert(key.clone(), *data_a);
            }
        }
    }
    for (key, data_b) in b.iter() {
        if !store.contains_key(key) {
            store.insert(key.clone(), *data_b);
        }
    }
}

/// Plays back a single `AnimationClip`.
#[derive(Debug)]
pub struct ClipSource {
    clip: AnimationClip,
    time_scale: f64,
    /// How many times to play through the clip; `None` loops forever.
    loop_count: Option<u32>,
    start_time: f64,
    active: bool,
    data: SourceDataMap,
}

impl ClipSource {
    pub fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            time_scale: 1.0,
            loop_count: Some(1),
            start_time: 0.0,
            active: true,
            data: HashMap::new(),
        }
    }

    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// `None` loops forever.
    pub fn with_loop_count(mut self, loop_count: Option<u32>) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }
}

impl BlendTreeSource for ClipSource {
    fn set_time(&mut self, global_time: f64) -> bool {
        if !self.active {
            return false;
        }
        let max_time = f64::from(self.clip.max_time());
        if max_time <= 0.0 {
            self.active = false;
            return false;
        }
        let clip_time = (global_time - self.start_time) * self.time_scale;
        if let Some(loops) = self.loop_count {
            if clip_time > max_time * f64::from(loops) {
                // Hold the end pose and go inactive.
                self.clip.sample_into(max_time, &mut self.data);
                self.active = false;
                return false;
            }
        }
        let clip_time = clip_time.max(0.0);
        let wrapped = if clip_time >= max_time && clip_time % max_time > 0.0 {
            clip_time % max_time
        } else {
            clip_time.min(max_time)
        };
        self.clip.sample_into(wrapped, &mut self.data);
        true
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn source_data(&self) -> &SourceDataMap {
        &self.data
    }

    fn reset_clips(&mut self, global_start_time: f64) {
        self.start_time = global_start_time;
        self.active = true;
    }
}

/// Takes two blend sources and linearly interpolates their data maps by a
/// fixed blend weight.
pub struct BinaryLerpSource {
    source_a: Option<Box<dyn BlendTreeSource>>,
    source_b: Option<Box<dyn BlendTreeSource>>,
    blend_weight: f64,
    data: SourceDataMap,
}

impl BinaryLerpSource {
    pub fn new(
        source_a: Box<dyn BlendTreeSource>,
        source_b: Box<dyn BlendTreeSource>,
        blend_weight: f64,
    ) -> Self {
        Self {
            source_a: Some(source_a),
            source_b: Some(source_b),
            blend_weight,
            data: HashMap::new(),
        }
    }

    pub fn blend_weight(&self) -> f64 {
        self.blend_weight
    }

    pub fn set_blend_weight(&mut self, blend_weight: f64) {
        self.blend_weight = blend_weight;
    }
}

impl BlendTreeSource for BinaryLerpSource {
    fn set_time(&mut self, global_time: f64) -> bool {
        let mut found_active = false;
        if let Some(a) = self.source_a.as_mut() {
            found_active |= a.set_time(global_time);
        }
        if let Some(b) = self.source_b.as_mut() {
            found_active |= b.set_time(global_time);
        }
        let a = self.source_a.as_ref().map(|s| s.source_data());
        let b = self.source_b.as_ref().map(|s| s.source_data());
        combine_source_data(a, b, self.blend_weight, &mut self.data);
        found_active
    }

    fn is_active(&self) -> bool {
        self.source_a.as_ref().is_some_and(|s| s.is_active())
            || self.source_b.as_ref().is_some_and(|s| s.is_active())
    }

    fn source_data(&self) -> &SourceDataMap {
        &self.data
    }

    fn reset_clips(&mut self, global_start_time: f64) {
        if let Some(a) = self.source_a.as_mut() {
            a.reset_clips(global_start_time);
        }
        if let Some(b) = self.source_b.as_mut() {
            b.reset_clips(global_start_time);
        }
    }
}

/// A source whose data is set programmatically rather than sampled from a
/// clip. Meant for controlling a particular joint or set of joints
/// directly; always active, never exhausts.
#[derive(Debug, Default)]
pub struct ManagedTransformSource {
    data: SourceDataMap,
}

impl ManagedTransformSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the full transform for a given joint index.
    pub fn set_joint_transform(&mut self, joint_index: usize, transform: Transform) {
        self.data
            .insert(joint_channel_name(joint_index), Value::Transform(transform));
    }

    pub fn set_joint_translation(&mut self, joint_index: usize, translation: [f32; 3]) {
        self.joint_mut(joint_index).translation = translation;
    }

    pub fn set_joint_rotation(&mut self, joint_index: usize, rotation: [f32; 4]) {
        self.joint_mut(joint_index).rotation = rotation;
    }

    pub fn set_joint_scale(&mut self, joint_index: usize, scale: [f32; 3]) {
        self.joint_mut(joint_index).scale = scale;
    }

    fn joint_mut(&mut self, joint_index: usize) -> &mut Transform {
        let entry = self
            .data
            .entry(joint_channel_name(joint_index))
            .or_insert(Value::Transform(Transform::default()));
        match entry {
            Value::Transform(t) => t,
            other => {
                *other = Value::Transform(Transform::default());
                match other {
                    Value::Transform(t) => t,
                    _ => unreachable!(),
                }
            }
        }
    }
}

impl BlendTreeSource for ManagedTransformSource {
    fn set_time(&mut self, _global_time: f64) -> bool {
        true
    }

    fn is_active(&self) -> bool {
        true
    }

    fn source_data(&self) -> &SourceDataMap {
        &self.data
    }

    fn reset_clips(&mut self, _global_start_time: f64) {}
}
