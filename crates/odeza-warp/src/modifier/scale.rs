use glam::Vec3;
use odeza_core::Transform;
use serde::{Deserialize, Serialize};

/// Per-axis translation scale applied to the incoming delta
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleSettings {
    pub scale: Vec3,
}

impl Default for ScaleSettings {
    fn default() -> Self {
        Self { scale: Vec3::ONE }
    }
}

impl ScaleSettings {
    pub fn apply(&self, root_motion: &Transform) -> Transform {
        Transform::new(root_motion.position * self.scale, root_motion.rotation)
    }
}
