//! Warp targets
//!
//! A warp target is a named world transform that warp modifiers steer the
//! root toward. Targets are either frozen transforms or track a scene node,
//! optionally at a socket, with a location/rotation offset applied in one of
//! three [`OffsetDirection`] frames.

use bitflags::bitflags;
use glam::{Quat, Vec3};
use odeza_core::Transform;
use odeza_core::math::{flatten, NEARLY_ZERO, TINY, UP};
use serde::{Deserialize, Serialize};

use crate::scene::{NodeId, SceneQuery};
use crate::{WarpError, WarpResult};

bitflags! {
    /// Pause state set on a target by switch-off evaluation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TargetPause: u8 {
        /// Modifiers pass root motion through unwarped
        const WARP = 1 << 0;
        /// Modifiers suppress root motion entirely
        const ROOT_MOTION = 1 << 1;
    }
}

/// Frame in which a target's location offset is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetDirection {
    /// The tracked node's own axes
    #[default]
    TargetForward,
    /// Forward is the horizontal direction from the node to the avatar
    TargetToAvatar,
    /// World axes
    WorldSpace,
}

/// Offset components cached at registration.
///
/// The lateral and vertical components are only kept when they matter; a
/// purely forward offset is re-applied along the direction alone.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CachedOffset {
    forward: f32,
    lateral_vertical: Option<(f32, f32)>,
}

impl CachedOffset {
    fn from_components(offset: Vec3) -> Self {
        let lateral_vertical = (offset.y.abs() > NEARLY_ZERO || offset.z.abs() > NEARLY_ZERO).then_some((offset.y, offset.z));
        Self {
            forward: offset.x,
            lateral_vertical,
        }
    }

    fn apply(&self, forward: Vec3) -> Vec3 {
        match self.lateral_vertical {
            None => forward * self.forward,
            Some((lateral, vertical)) => {
                let left = UP.cross(forward).normalize_or_zero();
                let up = forward.cross(left);
                forward * self.forward + left * lateral + up * vertical
            }
        }
    }
}

/// How a target tracks a scene node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTracking {
    pub node: NodeId,
    pub socket: Option<String>,
    /// Recompute from the node every query instead of freezing at registration
    pub follow: bool,
    pub offset_direction: OffsetDirection,
    pub location_offset: Vec3,
    pub rotation_offset: Quat,
}

impl NodeTracking {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            socket: None,
            follow: false,
            offset_direction: OffsetDirection::TargetForward,
            location_offset: Vec3::ZERO,
            rotation_offset: Quat::IDENTITY,
        }
    }

    pub fn with_socket(mut self, socket: impl Into<String>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    pub fn following(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    pub fn with_offset(mut self, direction: OffsetDirection, location: Vec3, rotation: Quat) -> Self {
        self.offset_direction = direction;
        self.location_offset = location;
        self.rotation_offset = rotation;
        self
    }
}

/// A named world transform that warp modifiers steer toward
#[derive(Debug, Clone, PartialEq)]
pub struct WarpTarget {
    name: String,
    transform: Transform,
    tracking: Option<NodeTracking>,
    cached_offset: CachedOffset,
    pub pause: TargetPause,
}

impl WarpTarget {
    /// Target at a fixed transform
    pub fn from_transform(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
            tracking: None,
            cached_offset: CachedOffset::from_components(Vec3::ZERO),
            pause: TargetPause::empty(),
        }
    }

    /// Target at a fixed location and rotation
    pub fn from_location_rotation(name: impl Into<String>, location: Vec3, rotation: Quat) -> Self {
        Self::from_transform(name, Transform::new(location, rotation))
    }

    /// Target placed relative to a scene node.
    ///
    /// The transform is computed immediately; with `follow` it is recomputed
    /// from the node on every query.
    pub fn from_node(
        name: impl Into<String>,
        tracking: NodeTracking,
        scene: &dyn SceneQuery,
        avatar_location: Vec3,
    ) -> WarpResult<Self> {
        let base = scene
            .node_transform(tracking.node, tracking.socket.as_deref())
            .ok_or(WarpError::NodeNotFound(tracking.node))?;
        let mut target = Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            cached_offset: CachedOffset::from_components(tracking.location_offset),
            tracking: Some(tracking),
            pause: TargetPause::empty(),
        };
        target.transform = target.offset_from(&base, avatar_location);
        Ok(target)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last computed (or frozen) transform
    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn tracking(&self) -> Option<&NodeTracking> {
        self.tracking.as_ref()
    }

    /// Whether the target recomputes from its node on every query
    pub fn follows(&self) -> bool {
        self.tracking.as_ref().is_some_and(|tracking| tracking.follow)
    }

    /// Stop following and keep `transform` from now on
    pub fn freeze(&mut self, transform: Transform) {
        self.transform = transform;
        if let Some(tracking) = self.tracking.as_mut() {
            tracking.follow = false;
        }
    }

    /// Current world transform of the target.
    ///
    /// Following targets whose node has disappeared fall back to the last
    /// frozen transform.
    pub fn resolve(&self, scene: &dyn SceneQuery, avatar_location: Vec3) -> Transform {
        let Some(tracking) = self.tracking.as_ref().filter(|tracking| tracking.follow) else {
            return self.transform;
        };
        match scene.node_transform(tracking.node, tracking.socket.as_deref()) {
            Some(base) => self.offset_from(&base, avatar_location),
            None => {
                log::warn!(
                    "Warp target '{}' follows missing node {:?}; using its last known transform",
                    self.name,
                    tracking.node
                );
                self.transform
            }
        }
    }

    fn offset_from(&self, base: &Transform, avatar_location: Vec3) -> Transform {
        let Some(tracking) = &self.tracking else {
            return *base;
        };
        let world_offset = match tracking.offset_direction {
            OffsetDirection::TargetForward => base.rotation * tracking.location_offset,
            OffsetDirection::WorldSpace => tracking.location_offset,
            OffsetDirection::TargetToAvatar => {
                let to_avatar = flatten(avatar_location - base.position);
                let forward = if to_avatar.length_squared() > TINY {
                    to_avatar.normalize()
                } else {
                    flatten(base.forward()).normalize_or_zero()
                };
                self.cached_offset.apply(forward)
            }
        };
        Transform::new(base.position + world_offset, (base.rotation * tracking.rotation_offset).normalize())
    }
}

/// Named warp targets owned by one warper
#[derive(Debug, Clone, Default)]
pub struct WarpTargetRegistry {
    targets: Vec<WarpTarget>,
}

impl WarpTargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a target, replacing any target with the same name
    pub fn add_or_update(&mut self, target: WarpTarget) {
        match self.targets.iter_mut().find(|existing| existing.name == target.name) {
            Some(existing) => {
                log::debug!("Updating warp target '{}'", target.name);
                *existing = target;
            }
            None => {
                log::debug!("Adding warp target '{}'", target.name);
                self.targets.push(target);
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<&WarpTarget> {
        self.targets.iter().find(|target| target.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut WarpTarget> {
        self.targets.iter_mut().find(|target| target.name == name)
    }

    /// Remove a target by name, returning how many were removed
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.targets.len();
        self.targets.retain(|target| target.name != name);
        before - self.targets.len()
    }

    /// Remove several targets by name, returning how many were removed
    pub fn remove_many<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|name| self.remove(name.as_ref())).sum()
    }

    /// Remove every target, returning how many were removed
    pub fn remove_all(&mut self) -> usize {
        let count = self.targets.len();
        self.targets.clear();
        count
    }

    /// World transform of a named target
    pub fn resolve(&self, name: &str, scene: &dyn SceneQuery, avatar_location: Vec3) -> WarpResult<Transform> {
        self.find(name)
            .map(|target| target.resolve(scene, avatar_location))
            .ok_or_else(|| WarpError::TargetNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WarpTarget> {
        self.targets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WarpTarget> {
        self.targets.iter_mut()
    }
}
