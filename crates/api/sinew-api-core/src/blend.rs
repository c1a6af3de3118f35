//! Blending utilities for Value types.
//! - f32 linear interpolation for floats and vector components
//! - quaternion slerp (shortest-arc, lerp fallback for nearly-equal inputs)
//! - transform TRS blending (translation/scale lerp, rotation slerp)

use crate::value::{Transform, Value};

/// Linear interpolation for f32.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp(a[0], b[0], t),
        lerp(a[1], b[1], t),
        lerp(a[2], b[2], t),
    ]
}

fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let mag = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if mag == 0.0 {
        [0.0, 0.0, 0.0, 1.0]
    } else {
        [q[0] / mag, q[1] / mag, q[2] / mag, q[3] / mag]
    }
}

/// Slerp between two unit quaternions.
pub fn slerp(q1: [f32; 4], q2: [f32; 4], t: f32) -> [f32; 4] {
    let qa = normalize_quat(q1);
    let mut qb = normalize_quat(q2);

    let mut dot = qa[0] * qb[0] + qa[1] * qb[1] + qa[2] * qb[2] + qa[3] * qb[3];

    // Reverse one side if needed so we take the short path.
    if dot < 0.0 {
        qb = [-qb[0], -qb[1], -qb[2], -qb[3]];
        dot = -dot;
    }

    // Nearly parallel: fall back to nlerp.
    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        let res = [
            lerp(qa[0], qb[0], t),
            lerp(qa[1], qb[1], t),
            lerp(qa[2], qb[2], t),
            lerp(qa[3], qb[3], t),
        ];
        return normalize_quat(res);
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();

    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;

    [
        s0 * qa[0] + s1 * qb[0],
        s0 * qa[1] + s1 * qb[1],
        s0 * qa[2] + s1 * qb[2],
        s0 * qa[3] + s1 * qb[3],
    ]
}

impl Transform {
    /// Blend toward `other` by `t` in [0,1]: translation/scale lerp,
    /// rotation slerp.
    pub fn blend(&self, other: &Transform, t: f32) -> Transform {
        Transform {
            translation: lerp_vec3(self.translation, other.translation, t),
            rotation: slerp(self.rotation, other.rotation, t),
            scale: lerp_vec3(self.scale, other.scale, t),
        }
    }
}

/// Blend two values of the same kind by `t`. Mismatched kinds prefer the
/// left value (fail-soft).
pub fn blend_value(a: &Value, b: &Value, t: f32) -> Value {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => Value::Float(lerp(*x, *y, t)),
        (Value::Transform(ta), Value::Transform(tb)) => Value::Transform(ta.blend(tb, t)),
        _ => *a,
    }
}
