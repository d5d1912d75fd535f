//! JSON scenario files
//!
//! A scenario bundles one clip asset, an avatar, a static scene and the warp
//! targets to register, plus the playback range to simulate.

use std::path::Path;

use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use glam::{Quat, Vec3};
use odeza_core::Transform;
use odeza_warp::{
    AnimationClip, CharacterAvatar, ClipAsset, ClipId, MovementAvatar, NodeId, NodeTracking, OffsetDirection,
    RootMotionSource, StaticScene, WarpAvatar, WarpConfig, WarpTarget,
};
use serde::{Deserialize, Serialize};

/// Avatar the scenario drives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AvatarSpec {
    Character(CharacterAvatar),
    Movement(MovementAvatar),
}

impl AvatarSpec {
    pub fn as_avatar(&self) -> &dyn WarpAvatar {
        match self {
            Self::Character(avatar) => avatar,
            Self::Movement(avatar) => avatar,
        }
    }

    pub fn apply_local_root_motion(&mut self, local: &Transform) {
        match self {
            Self::Character(avatar) => avatar.apply_local_root_motion(local),
            Self::Movement(avatar) => avatar.apply_local_root_motion(local),
        }
    }
}

/// Scene node placed in the scenario's static scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: u64,
    pub transform: Transform,
    #[serde(default)]
    pub sockets: AHashMap<String, Transform>,
}

/// Warp target registered before playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSpec {
    Fixed {
        name: String,
        transform: Transform,
    },
    Node {
        name: String,
        node: u64,
        #[serde(default)]
        socket: Option<String>,
        #[serde(default)]
        follow: bool,
        #[serde(default)]
        offset_direction: OffsetDirection,
        #[serde(default)]
        location_offset: Vec3,
        #[serde(default)]
        rotation_offset: Quat,
    },
}

impl TargetSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Fixed { name, .. } | Self::Node { name, .. } => name,
        }
    }
}

fn default_tick_rate() -> f32 {
    30.0
}

/// A complete simulation setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub clip: ClipAsset,
    pub avatar: AvatarSpec,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    #[serde(default)]
    pub start_time: f32,
    /// Defaults to the clip duration
    #[serde(default)]
    pub end_time: Option<f32>,
    /// Ticks per second
    #[serde(default = "default_tick_rate")]
    pub tick_rate: f32,
    #[serde(default = "default_play_rate")]
    pub play_rate: f32,
    /// Engine configuration embedded in the scenario
    #[serde(default)]
    pub config: Option<WarpConfig>,
}

fn default_play_rate() -> f32 {
    1.0
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    /// Playback end, clamped to the clip
    pub fn end_time(&self) -> f32 {
        self.end_time.unwrap_or(self.clip.duration).min(self.clip.duration)
    }

    /// Check values the simulation loop depends on
    pub fn validate(&self) -> Result<()> {
        if !(self.tick_rate > 0.0) {
            bail!("tick_rate must be positive, got {}", self.tick_rate);
        }
        if !(self.play_rate > 0.0) {
            bail!("play_rate must be positive, got {}", self.play_rate);
        }
        if !(self.start_time >= 0.0 && self.start_time <= self.end_time()) {
            bail!("start_time {} is outside [0, {}]", self.start_time, self.end_time());
        }
        if let Some(config) = &self.config {
            config.validate().context("Invalid embedded config")?;
        }
        Ok(())
    }

    pub fn build_clip(&self) -> Result<std::sync::Arc<dyn RootMotionSource>> {
        let clip = AnimationClip::from_asset(ClipId(1), self.clip.clone())
            .with_context(|| format!("Invalid clip '{}'", self.clip.name))?;
        Ok(clip.into_source())
    }

    pub fn build_scene(&self) -> StaticScene {
        let mut scene = StaticScene::new();
        for node in &self.nodes {
            scene.set_node(NodeId(node.id), node.transform);
            for (socket, local) in &node.sockets {
                scene.set_socket(NodeId(node.id), socket.clone(), *local);
            }
        }
        scene
    }

    pub fn build_targets(&self, scene: &StaticScene) -> Result<Vec<WarpTarget>> {
        let avatar_location = self.avatar.as_avatar().visual_root_location();
        self.targets
            .iter()
            .map(|spec| match spec {
                TargetSpec::Fixed { name, transform } => Ok(WarpTarget::from_transform(name.clone(), *transform)),
                TargetSpec::Node {
                    name,
                    node,
                    socket,
                    follow,
                    offset_direction,
                    location_offset,
                    rotation_offset,
                } => {
                    let mut tracking = NodeTracking::new(NodeId(*node))
                        .following(*follow)
                        .with_offset(*offset_direction, *location_offset, *rotation_offset);
                    tracking.socket = socket.clone();
                    WarpTarget::from_node(name.clone(), tracking, scene, avatar_location)
                        .with_context(|| format!("Cannot register warp target '{name}'"))
                }
            })
            .collect()
    }
}
