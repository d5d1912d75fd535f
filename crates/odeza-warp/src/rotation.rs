//! Rotation warping
//!
//! Rotations are mesh-space: `remaining` is the clip rotation left until the
//! window end and `goal` is the target mesh rotation relative to the current
//! one. The returned delta replaces this frame's clip rotation.

use glam::{EulerRot, Quat};
use odeza_core::math::{rotate_towards, yaw_pitch, NEARLY_ZERO, TINY};
use serde::{Deserialize, Serialize};

/// Target rotation source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationTarget {
    /// The target's own rotation
    #[default]
    Default,
    /// Face the target location
    Facing,
    /// The target's rotation turned around
    OppositeDefault,
}

/// How the clip rotation is bent toward the goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMethod {
    /// Slerp the remaining rotation toward the goal over the window
    #[default]
    Slerp,
    /// Slerp, but never turn faster than the rate limit
    SlerpWithClampedRate,
    /// Turn toward the goal at exactly the rate limit
    ConstantRate,
    /// Scale the clip's own yaw and pitch
    Scale,
}

/// Per-frame inputs of a rotation warp
#[derive(Debug, Clone, Copy)]
pub struct RotationFrame {
    /// This frame's in-window clip rotation
    pub delta: Quat,
    /// Clip rotation left until the window end
    pub remaining: Quat,
    /// Goal relative to the current mesh rotation
    pub goal: Quat,
    /// Clip time consumed this frame inside the window
    pub frame_time: f32,
    /// Clip time left until the window end
    pub time_remaining: f32,
    pub delta_seconds: f32,
}

/// Rotation policy parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationParams {
    pub method: RotationMethod,
    /// Slerp reaches the goal when this fraction of the window has elapsed
    pub time_multiplier: f32,
    /// Degrees per second for the rate-limited methods
    pub max_rotation_rate: f32,
    /// Degrees per frame per axis for [`RotationMethod::Scale`]
    pub max_rotation_per_frame: f32,
}

/// Warped rotation delta for one frame
pub fn warp_rotation(frame: &RotationFrame, params: &RotationParams) -> Quat {
    if params.method == RotationMethod::Scale {
        return scale_rotation(frame, params.max_rotation_per_frame.to_radians());
    }

    let window = frame.time_remaining * params.time_multiplier.max(TINY);
    let alpha = if window > TINY {
        (frame.frame_time / window).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let max_angle = (params.max_rotation_rate * frame.delta_seconds).abs().to_radians();

    let this_frame = match params.method {
        RotationMethod::ConstantRate => rotate_towards(frame.remaining, frame.goal, max_angle),
        RotationMethod::SlerpWithClampedRate => {
            let slerped = frame.remaining.slerp(frame.goal, alpha);
            if frame.remaining.angle_between(slerped) > max_angle {
                rotate_towards(frame.remaining, frame.goal, max_angle)
            } else {
                slerped
            }
        }
        _ => frame.remaining.slerp(frame.goal, alpha),
    };

    (this_frame * frame.remaining.inverse() * frame.delta).normalize()
}

fn scale_axis(delta: f32, remaining: f32, goal: f32, fraction: f32, limit: f32) -> f32 {
    let scaled = if remaining.abs() > NEARLY_ZERO {
        delta * (goal / remaining)
    } else {
        goal * fraction
    };
    scaled.clamp(-limit, limit)
}

fn scale_rotation(frame: &RotationFrame, limit: f32) -> Quat {
    let fraction = if frame.time_remaining > TINY {
        (frame.frame_time / frame.time_remaining).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let (remaining_yaw, remaining_pitch) = yaw_pitch(frame.remaining);
    let (goal_yaw, goal_pitch) = yaw_pitch(frame.goal);
    let (delta_yaw, delta_pitch, delta_roll) = frame.delta.to_euler(EulerRot::ZYX);

    let yaw = scale_axis(delta_yaw, remaining_yaw, goal_yaw, fraction, limit);
    let pitch = scale_axis(delta_pitch, remaining_pitch, goal_pitch, fraction, limit);
    Quat::from_euler(EulerRot::ZYX, yaw, pitch, delta_roll)
}
