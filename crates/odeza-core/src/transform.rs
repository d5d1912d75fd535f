//! Rigid transforms
//!
//! Position + rotation pairs used for actor placement, warp targets and
//! root-motion deltas. Composition follows glam's `Affine3A` convention:
//! `parent * local` expresses `local` in the space of `parent`.

use std::ops::Mul;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::{FORWARD, RIGHT, UP};

/// Rigid transform (no scale)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Translation
    pub position: Vec3,
    /// Rotation
    pub rotation: Quat,
}

impl Transform {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Create a transform from position and rotation
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Create a translation-only transform
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Create a rotation-only transform
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation,
        }
    }

    /// Create a transform at `position` yawed by `yaw` radians about the up axis
    pub fn from_position_yaw(position: Vec3, yaw: f32) -> Self {
        Self::new(position, Quat::from_rotation_z(yaw))
    }

    /// Inverse transform
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            position: rotation * -self.position,
            rotation,
        }
    }

    /// This transform expressed relative to `base`
    pub fn relative_to(&self, base: &Transform) -> Transform {
        base.inverse() * *self
    }

    /// The transform that carries `self` onto `other`, in `self`'s space
    pub fn delta_to(&self, other: &Transform) -> Transform {
        self.inverse() * *other
    }

    /// Transform a point from local to parent space
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }

    /// Rotate a direction from local to parent space
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Rotate a direction from parent to local space
    pub fn inverse_transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation.inverse() * vector
    }

    /// Forward direction (+X in local space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * FORWARD
    }

    /// Right direction (-Y in local space)
    pub fn right(&self) -> Vec3 {
        self.rotation * RIGHT
    }

    /// Up direction (+Z in local space)
    pub fn up(&self) -> Vec3 {
        self.rotation * UP
    }

    /// Interpolate between two transforms
    pub fn lerp(&self, other: &Transform, t: f32) -> Transform {
        Transform {
            position: self.position.lerp(other.position, t),
            rotation: self.rotation.slerp(other.rotation, t),
        }
    }

    /// Check that no component is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }

    /// Approximate equality, treating `q` and `-q` as the same rotation
    pub fn equals(&self, other: &Transform, tolerance: f32) -> bool {
        self.position.abs_diff_eq(other.position, tolerance)
            && self.rotation.dot(other.rotation).abs() >= 1.0 - tolerance
    }

    /// Re-normalize the rotation part
    pub fn normalized(mut self) -> Self {
        self.rotation = self.rotation.normalize();
        self
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * rhs.position,
            rotation: self.rotation * rhs.rotation,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
