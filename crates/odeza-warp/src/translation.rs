//! Translation warping
//!
//! Functions here work on world-space vectors. Callers rotate mesh-space
//! root motion into world space first and convert the result back.

use glam::{Mat3, Quat, Vec2, Vec3};
use odeza_core::math::{flatten, vertical, NEARLY_ZERO, TINY, UP};
use serde::{Deserialize, Serialize};

/// Translation warping algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationAlgorithm {
    /// Scale along the path and shear toward the target
    #[default]
    Skew,
    /// Scale the horizontal and vertical parts independently
    Simple,
}

/// Orthonormal frame whose X axis is `forward`.
///
/// The reference up axis is whichever axis of `heading` is least aligned with
/// `forward`, so the frame never degenerates.
pub fn skew_frame(forward: Vec3, heading: Quat) -> Mat3 {
    let candidates = [heading * Vec3::Z, heading * Vec3::X, heading * Vec3::Y];
    let mut reference = candidates[0];
    let mut best = forward.dot(reference).abs();
    for axis in &candidates[1..] {
        let alignment = forward.dot(*axis).abs();
        if alignment < best {
            best = alignment;
            reference = *axis;
        }
    }
    let y = reference.cross(forward).normalize();
    let z = forward.cross(y);
    Mat3::from_cols(forward, y, z)
}

/// Tangent of the signed angle from `from` to `to`
fn skew_tangent(from: Vec2, to: Vec2) -> f32 {
    let cos = from.dot(to);
    if cos.abs() <= TINY {
        return 0.0;
    }
    from.perp_dot(to) / cos
}

/// Skew warp of one frame of translation.
///
/// `delta` is this frame's motion, `remaining` the motion left until the
/// window end and `to_target` the vector from the current location to the
/// target. Applying the result every frame lands exactly on the target when
/// the window completes.
pub fn skew_warp(delta: Vec3, remaining: Vec3, to_target: Vec3, heading: Quat) -> Vec3 {
    if delta.length_squared() <= TINY {
        return Vec3::ZERO;
    }
    let Some(forward) = remaining.try_normalize() else {
        return Vec3::ZERO;
    };

    let frame = skew_frame(forward, heading);
    let to_skew = frame.transpose();
    let delta_s = to_skew * delta;
    let world_s = to_skew * to_target;
    let anim_s = to_skew * remaining;

    let anim_length = anim_s.length();
    let anim_dir = anim_s / anim_length;
    let projected_scale = world_s.dot(anim_dir) / anim_length;

    let warped = if projected_scale.abs() > TINY {
        let yaw = skew_tangent(Vec2::new(anim_s.x, anim_s.y), Vec2::new(world_s.x, world_s.y));
        let pitch = skew_tangent(Vec2::new(anim_s.x, anim_s.z), Vec2::new(world_s.x, world_s.z));
        let scale = Mat3::from_diagonal(Vec3::new(projected_scale, 1.0, 1.0));
        let shear_yaw = Mat3::from_cols(Vec3::new(1.0, yaw, 0.0), Vec3::Y, Vec3::Z);
        let shear_pitch = Mat3::from_cols(Vec3::new(1.0, 0.0, pitch), Vec3::Y, Vec3::Z);
        shear_pitch * shear_yaw * scale * delta_s
    } else if world_s.length_squared() > TINY {
        // Target perpendicular to the path: move straight at it at a scaled speed
        let scale = world_s.length() / anim_length;
        world_s.normalize() * (scale * delta_s.length())
    } else {
        Vec3::ZERO
    };

    frame * warped
}

/// Simple warp of one frame of translation.
///
/// The horizontal part is scaled by the ratio of the horizontal distance to
/// the target over the remaining horizontal motion, the vertical part by the
/// same ratio for heights.
pub fn simple_warp(delta: Vec3, remaining: Vec3, to_target: Vec3) -> Vec3 {
    let delta_flat = flatten(delta);
    let remaining_flat = flatten(remaining);
    let target_flat = flatten(to_target);

    let horizontal = if remaining_flat.length_squared() > TINY {
        let scale = target_flat.length() / remaining_flat.length();
        match target_flat.try_normalize() {
            Some(direction) => direction * delta_flat.length() * scale,
            None => Vec3::ZERO,
        }
    } else {
        delta_flat
    };

    let remaining_vertical = vertical(remaining);
    let delta_vertical = vertical(delta);
    let vertical_motion = if remaining_vertical.abs() > NEARLY_ZERO {
        delta_vertical * (vertical(to_target) / remaining_vertical)
    } else {
        delta_vertical
    };

    horizontal + UP * vertical_motion
}

/// Limit `warped` to `ratio` times the length of `original`
pub fn clamp_speed(warped: Vec3, original: Vec3, ratio: f32, horizontal_only: bool) -> Vec3 {
    let ratio = ratio.max(0.0);
    if horizontal_only {
        let max_length = flatten(original).length() * ratio;
        let horizontal = flatten(warped).clamp_length_max(max_length);
        horizontal + UP * vertical(warped)
    } else {
        warped.clamp_length_max(original.length() * ratio)
    }
}
