//! Animation clips and channels.
//!
//! A channel describes a single element of an animation (the motion of one
//! joint, typically) as a series of transform samples over time. Channels
//! are grouped into an `AnimationClip` to describe a full animation.

use serde::{Deserialize, Serialize};
use sinew_api_core::{lerp_vec3, slerp, SourceDataMap, Transform, Value};

use crate::error::AnimError;

/// Prefix prepended to joint indices to identify them as joint channels.
pub const JOINT_CHANNEL_PREFIX: &str = "_jnt";

/// Channel name for the joint with the given index.
pub fn joint_channel_name(joint_index: usize) -> String {
    format!("{JOINT_CHANNEL_PREFIX}{joint_index}")
}

/// An animation channel consisting of a series of transforms interpolated
/// over time. Time indices must be non-decreasing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransformChannel {
    name: String,
    times: Vec<f32>,
    rotations: Vec<[f32; 4]>,
    translations: Vec<[f32; 3]>,
    scales: Vec<[f32; 3]>,
}

impl TransformChannel {
    pub fn new(
        name: impl Into<String>,
        times: Vec<f32>,
        rotations: Vec<[f32; 4]>,
        translations: Vec<[f32; 3]>,
        scales: Vec<[f32; 3]>,
    ) -> Result<Self, AnimError> {
        let name = name.into();
        if rotations.len() != times.len()
            || translations.len() != times.len()
            || scales.len() != times.len()
        {
            return Err(AnimError::ChannelLengthMismatch(name));
        }
        Ok(Self {
            name,
            times,
            rotations,
            translations,
            scales,
        })
    }

    /// Convenience constructor from whole transform samples.
    pub fn from_transforms(
        name: impl Into<String>,
        times: Vec<f32>,
        transforms: &[Transform],
    ) -> Result<Self, AnimError> {
        let rotations = transforms.iter().map(|t| t.rotation).collect();
        let translations = transforms.iter().map(|t| t.translation).collect();
        let scales = transforms.iter().map(|t| t.scale).collect();
        Self::new(name, times, rotations, translations, scales)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_count(&self) -> usize {
        self.times.len()
    }

    /// Local time index of the last sample, or 0 for an empty channel.
    pub fn max_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Sample this channel at the given local clip time (0 == start of
    /// clip). Times before the first sample or past the last clamp to the
    /// end samples.
    pub fn sample(&self, clock_time: f64) -> Transform {
        if self.times.is_empty() {
            return Transform::default();
        }
        let last = self.times.len() - 1;
        if clock_time < 0.0 || self.times.len() == 1 {
            return self.sample_at(0, 0.0);
        }
        if clock_time >= f64::from(self.times[last]) {
            return self.sample_at(last, 0.0);
        }
        // Find the frames we are between and by how much.
        let mut start = 0;
        for i in 0..last {
            if f64::from(self.times[i]) < clock_time {
                start = i;
            }
        }
        let span = f64::from(self.times[start + 1]) - f64::from(self.times[start]);
        let progress = (clock_time - f64::from(self.times[start])) / span;
        self.sample_at(start, progress as f32)
    }

    fn sample_at(&self, index: usize, progress: f32) -> Transform {
        // Shortcut if we are fully on one sample or the next.
        if progress == 0.0 {
            return Transform {
                translation: self.translations[index],
                rotation: self.rotations[index],
                scale: self.scales[index],
            };
        }
        if progress == 1.0 {
            return Transform {
                translation: self.translations[index + 1],
                rotation: self.rotations[index + 1],
                scale: self.scales[index + 1],
            };
        }
        Transform {
            translation: lerp_vec3(
                self.translations[index],
                self.translations[index + 1],
                progress,
            ),
            rotation: slerp(self.rotations[index], self.rotations[index + 1], progress),
            scale: lerp_vec3(self.scales[index], self.scales[index + 1], progress),
        }
    }
}

/// A named collection of animation channels.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AnimationClip {
    name: String,
    channels: Vec<TransformChannel>,
    max_time: f32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Vec::new(),
            max_time: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_channel(&mut self, channel: TransformChannel) {
        self.max_time = self.max_time.max(channel.max_time());
        self.channels.push(channel);
    }

    pub fn channels(&self) -> &[TransformChannel] {
        &self.channels
    }

    /// Local time index of the last sample across all channels.
    pub fn max_time(&self) -> f32 {
        self.max_time
    }

    /// Sample every channel at the given local clip time into `store`.
    pub fn sample_into(&self, clip_time: f64, store: &mut SourceDataMap) {
        for channel in &self.channels {
            let sample = channel.sample(clip_time);
            store.insert(channel.name().to_string(), Value::Transform(sample));
        }
    }
}
