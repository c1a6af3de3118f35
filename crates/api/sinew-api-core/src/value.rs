//! Core value kinds for animation sampling/blending.

use serde::{Deserialize, Serialize};

/// A TRS transform sample for a single channel (usually one joint).
/// Rotation is a quaternion in (x, y, z, w) order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Transform,
}

/// A single sampled channel value. Channels are usually joint transforms,
/// but scalar channels (e.g. trigger weights) also occur.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    Float(f32),
    Transform(Transform),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Transform(_) => ValueKind::Transform,
        }
    }

    #[inline]
    pub fn as_transform(&self) -> Option<&Transform> {
        match self {
            Value::Transform(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Transform> for Value {
    fn from(t: Transform) -> Self {
        Value::Transform(t)
    }
}
