//! Math utilities
//!
//! Re-exports from glam plus the axis conventions, tolerances and easing
//! curves shared by the gameplay crates.
//!
//! World space is right-handed with +Z up and +X forward, so +Y points to
//! the left of an unrotated actor.

pub use glam::{EulerRot, Mat3, Quat, Vec2, Vec3};

use serde::{Deserialize, Serialize};

/// World up axis
pub const UP: Vec3 = Vec3::Z;
/// World forward axis
pub const FORWARD: Vec3 = Vec3::X;
/// World right axis
pub const RIGHT: Vec3 = Vec3::NEG_Y;

/// Tolerance for "this length/angle is effectively zero"
pub const NEARLY_ZERO: f32 = 1.0e-4;
/// Tolerance for guarding divisions
pub const TINY: f32 = 1.0e-8;

/// Linear interpolation
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Inverse linear interpolation, 0 when the range is degenerate
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if (b - a).abs() < f32::EPSILON {
        0.0
    } else {
        (value - a) / (b - a)
    }
}

/// Check if a scalar is within `tolerance` of zero
pub fn is_nearly_zero(value: f32, tolerance: f32) -> bool {
    value.abs() <= tolerance
}

/// Project a vector onto the horizontal plane
pub fn flatten(v: Vec3) -> Vec3 {
    v - UP * v.dot(UP)
}

/// Vertical component of a vector
pub fn vertical(v: Vec3) -> f32 {
    v.dot(UP)
}

/// Wrap an angle in radians to (-PI, PI]
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + std::f32::consts::PI).rem_euclid(std::f32::consts::TAU) - std::f32::consts::PI;
    if wrapped <= -std::f32::consts::PI {
        wrapped + std::f32::consts::TAU
    } else {
        wrapped
    }
}

/// Yaw-only rotation facing along the horizontal part of `direction`.
///
/// Returns `None` when `direction` has no horizontal extent.
pub fn facing_rotation(direction: Vec3) -> Option<Quat> {
    let flat = flatten(direction);
    if flat.length_squared() <= TINY {
        return None;
    }
    Some(Quat::from_rotation_z(flat.y.atan2(flat.x)))
}

/// Yaw and pitch (radians) of a rotation, in that order
pub fn yaw_pitch(rotation: Quat) -> (f32, f32) {
    let (yaw, pitch, _roll) = rotation.to_euler(EulerRot::ZYX);
    (yaw, pitch)
}

/// Rotate `from` toward `to` by at most `max_angle` radians
pub fn rotate_towards(from: Quat, to: Quat, max_angle: f32) -> Quat {
    let angle = from.angle_between(to);
    if angle <= max_angle.max(0.0) || angle <= TINY {
        return to;
    }
    from.slerp(to, max_angle.max(0.0) / angle)
}

/// Easing curve used to shape interpolation alphas.
///
/// Every curve maps 0 to 0 and 1 to 1 exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaBlend {
    #[default]
    Linear,
    QuadraticIn,
    QuadraticOut,
    QuadraticInOut,
    CubicInOut,
    /// Smoothstep
    HermiteCubic,
    Sinusoidal,
    CircularInOut,
}

impl AlphaBlend {
    /// Evaluate the curve at `t`, clamped to [0, 1]
    pub fn evaluate(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }

        match self {
            Self::Linear => t,
            Self::QuadraticIn => t * t,
            Self::QuadraticOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::QuadraticInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) * 0.5
                }
            }
            Self::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) * 0.5
                }
            }
            Self::HermiteCubic => t * t * (3.0 - 2.0 * t),
            Self::Sinusoidal => 0.5 - 0.5 * (t * std::f32::consts::PI).cos(),
            Self::CircularInOut => {
                if t < 0.5 {
                    0.5 * (1.0 - (1.0 - 4.0 * t * t).max(0.0).sqrt())
                } else {
                    0.5 * ((1.0 - (-2.0 * t + 2.0).powi(2)).max(0.0).sqrt() + 1.0)
                }
            }
        }
    }
}
