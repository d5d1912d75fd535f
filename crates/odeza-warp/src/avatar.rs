//! Avatar adapters
//!
//! The warping engine reads the owner's placement through [`WarpAvatar`].
//! Two adapters are provided: a capsule character with a skeletal mesh and a
//! generic movement controller whose visual root is its actor origin.

use glam::{Quat, Vec3};
use odeza_core::Transform;
use odeza_core::math::UP;
use serde::{Deserialize, Serialize};

/// Placement capabilities of the actor being warped
pub trait WarpAvatar {
    /// Current actor transform in world space
    fn actor_transform(&self) -> Transform;

    /// World location that should land on warp targets (usually the feet)
    fn visual_root_location(&self) -> Vec3;

    /// Mesh transform relative to the actor
    fn mesh_offset(&self) -> Transform;

    /// Whether the adapter is bound to a live actor
    fn is_valid(&self) -> bool {
        true
    }

    /// World rotation of the mesh, the space root motion is authored in
    fn mesh_rotation(&self) -> Quat {
        self.actor_transform().rotation * self.mesh_offset().rotation
    }

    /// Visual root location plus mesh rotation
    fn visual_root_transform(&self) -> Transform {
        Transform::new(self.visual_root_location(), self.mesh_rotation())
    }
}

/// Apply a mesh-space root-motion delta to an actor transform
pub fn apply_local_root_motion(actor: &Transform, mesh_offset: &Transform, local: &Transform) -> Transform {
    let mesh_rotation = actor.rotation * mesh_offset.rotation;
    let position = actor.position + mesh_rotation * local.position;
    let rotation = (mesh_rotation * local.rotation * mesh_offset.rotation.inverse()).normalize();
    Transform::new(position, rotation)
}

/// Capsule-based character with a skeletal mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterAvatar {
    pub actor: Transform,
    pub capsule_half_height: f32,
    pub mesh_offset: Transform,
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

impl CharacterAvatar {
    /// Character standing with its capsule bottom at `feet`
    pub fn standing_at(feet: Vec3, yaw: f32, capsule_half_height: f32) -> Self {
        Self {
            actor: Transform::from_position_yaw(feet + UP * capsule_half_height, yaw),
            capsule_half_height,
            mesh_offset: Transform::from_position(-UP * capsule_half_height),
            valid: true,
        }
    }

    /// Move the character by a mesh-space root-motion delta
    pub fn apply_local_root_motion(&mut self, local: &Transform) {
        self.actor = apply_local_root_motion(&self.actor, &self.mesh_offset, local);
    }
}

impl WarpAvatar for CharacterAvatar {
    fn actor_transform(&self) -> Transform {
        self.actor
    }

    fn visual_root_location(&self) -> Vec3 {
        self.actor.position - self.actor.up() * self.capsule_half_height
    }

    fn mesh_offset(&self) -> Transform {
        self.mesh_offset
    }

    fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Generic movement controller without a capsule
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MovementAvatar {
    pub actor: Transform,
    #[serde(default)]
    pub mesh_offset: Transform,
}

impl MovementAvatar {
    pub fn new(actor: Transform) -> Self {
        Self {
            actor,
            mesh_offset: Transform::IDENTITY,
        }
    }

    /// Move the controller by a mesh-space root-motion delta
    pub fn apply_local_root_motion(&mut self, local: &Transform) {
        self.actor = apply_local_root_motion(&self.actor, &self.mesh_offset, local);
    }
}

impl WarpAvatar for MovementAvatar {
    fn actor_transform(&self) -> Transform {
        self.actor
    }

    fn visual_root_location(&self) -> Vec3 {
        self.actor.position
    }

    fn mesh_offset(&self) -> Transform {
        self.mesh_offset
    }
}
