//! Root-motion modifiers
//!
//! One [`RootMotionModifier`] exists per active warp window. It follows the
//! clip timeline through a small state machine and, while active, rewrites
//! the root-motion delta of each tick.
//!
//! ```text
//! Waiting --(prev enters window)--> Active --(window left / scrub / clip swap)--> MarkedForRemoval
//!    |                                 |
//!    +------(missing target, invalid avatar)------> Disabled --(window left)--> MarkedForRemoval
//! ```

mod scale;
mod warp;

use std::fmt;
use std::sync::Arc;

use odeza_core::Transform;
use serde::{Deserialize, Serialize};

use crate::avatar::WarpAvatar;
use crate::clip::{ClipId, RootMotionSource};
use crate::config::WarpConfig;
use crate::scene::SceneQuery;
use crate::target::WarpTargetRegistry;

pub use scale::ScaleSettings;
pub use warp::{WarpModifier, WarpPointAnimProvider, WarpSettings};

use warp::TargetRefresh;

/// Lifecycle state of a modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierState {
    /// Window not reached yet
    Waiting,
    /// Inside the window, rewriting root motion
    Active,
    /// Finished; removed at the end of the update pass
    MarkedForRemoval,
    /// Stopped abnormally; never reactivates
    Disabled,
}

/// Activity change reported by [`RootMotionModifier::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierEvent {
    NoChange,
    BecameActive,
    StillActive,
    BecameInactive,
}

/// Identity of a modifier: its clip and window bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowKey {
    pub clip: ClipId,
    pub start_time: f32,
    pub end_time: f32,
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:.3}, {:.3}]", self.clip, self.start_time, self.end_time)
    }
}

/// Playback state for one modifier update
#[derive(Debug, Clone, Copy)]
pub struct UpdateContext<'a> {
    /// Clip currently driving root motion, if any
    pub clip: Option<&'a Arc<dyn RootMotionSource>>,
    pub previous_position: f32,
    pub current_position: f32,
    pub weight: f32,
    pub play_rate: f32,
    pub delta_seconds: f32,
}

/// Collaborators a modifier reads while updating and processing
#[derive(Clone, Copy)]
pub struct ModifierEnv<'a> {
    pub avatar: &'a dyn WarpAvatar,
    pub targets: &'a WarpTargetRegistry,
    pub scene: &'a dyn SceneQuery,
    pub config: &'a WarpConfig,
}

/// Algorithm attached to a warp window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModifierConfig {
    /// Steer translation and rotation toward a named target
    Warp(WarpSettings),
    /// Multiply translation per axis
    Scale(ScaleSettings),
}

/// Behaviour carried by a modifier
#[derive(Debug, Clone)]
pub enum ModifierKind {
    Warp(WarpModifier),
    Scale(ScaleSettings),
    /// Window without an algorithm
    Unconfigured,
}

impl ModifierKind {
    fn from_config(config: Option<ModifierConfig>) -> Self {
        match config {
            Some(ModifierConfig::Warp(settings)) => Self::Warp(WarpModifier::new(settings)),
            Some(ModifierConfig::Scale(settings)) => Self::Scale(settings),
            None => Self::Unconfigured,
        }
    }
}

/// Window state handed to the kind-specific processing
pub(crate) struct WindowProgress<'a> {
    pub clip: &'a dyn RootMotionSource,
    pub end_time: f32,
    pub previous_position: f32,
    pub current_position: f32,
    pub actual_start_time: f32,
    pub start_transform: Transform,
    pub window_motion: Transform,
    pub delta_seconds: f32,
}

/// Per-window root-motion modifier
#[derive(Debug, Clone)]
pub struct RootMotionModifier {
    clip: Arc<dyn RootMotionSource>,
    start_time: f32,
    end_time: f32,
    previous_position: f32,
    current_position: f32,
    weight: f32,
    play_rate: f32,
    state: ModifierState,
    start_transform: Transform,
    actual_start_time: f32,
    window_motion: Transform,
    kind: ModifierKind,
}

impl RootMotionModifier {
    /// Modifier for the window `[start_time, end_time]` of `clip`.
    ///
    /// A window without an algorithm starts out disabled.
    pub fn new(clip: Arc<dyn RootMotionSource>, start_time: f32, end_time: f32, config: Option<ModifierConfig>) -> Self {
        let kind = ModifierKind::from_config(config);
        let state = match kind {
            ModifierKind::Unconfigured => ModifierState::Disabled,
            _ => ModifierState::Waiting,
        };
        Self {
            clip,
            start_time,
            end_time,
            previous_position: 0.0,
            current_position: 0.0,
            weight: 0.0,
            play_rate: 1.0,
            state,
            start_transform: Transform::IDENTITY,
            actual_start_time: start_time,
            window_motion: Transform::IDENTITY,
            kind,
        }
    }

    pub fn key(&self) -> WindowKey {
        WindowKey {
            clip: self.clip.clip_id(),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    /// Whether this modifier was created for the given window
    pub fn matches(&self, clip: ClipId, start_time: f32, end_time: f32) -> bool {
        self.clip.clip_id() == clip && self.start_time == start_time && self.end_time == end_time
    }

    pub fn clip(&self) -> &Arc<dyn RootMotionSource> {
        &self.clip
    }

    pub fn state(&self) -> ModifierState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ModifierState::Active
    }

    pub fn start_time(&self) -> f32 {
        self.start_time
    }

    pub fn end_time(&self) -> f32 {
        self.end_time
    }

    pub fn previous_position(&self) -> f32 {
        self.previous_position
    }

    pub fn current_position(&self) -> f32 {
        self.current_position
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn play_rate(&self) -> f32 {
        self.play_rate
    }

    /// Visual root transform captured on activation (rebased on target change)
    pub fn start_transform(&self) -> Transform {
        self.start_transform
    }

    /// Clip time warping actually began at
    pub fn actual_start_time(&self) -> f32 {
        self.actual_start_time
    }

    /// Clip root motion over the whole window, captured on activation
    pub fn window_motion(&self) -> Transform {
        self.window_motion
    }

    pub fn kind(&self) -> &ModifierKind {
        &self.kind
    }

    /// Name of the target a warp modifier steers toward
    pub fn target_name(&self) -> Option<&str> {
        match &self.kind {
            ModifierKind::Warp(warp) => Some(warp.settings().target_name.as_str()),
            _ => None,
        }
    }

    /// Stop this modifier for good; returns whether it was active
    pub fn disable(&mut self) -> bool {
        let was_active = self.is_active();
        if self.state != ModifierState::MarkedForRemoval {
            self.state = ModifierState::Disabled;
        }
        was_active
    }

    /// Advance the state machine against the current playback
    pub fn update(&mut self, context: &UpdateContext<'_>, env: &ModifierEnv<'_>) -> ModifierEvent {
        let was_active = self.is_active();
        self.update_timeline(context, env);

        if self.is_active() {
            self.refresh_target(env);
        }

        match (was_active, self.is_active()) {
            (false, true) => ModifierEvent::BecameActive,
            (true, true) => ModifierEvent::StillActive,
            (true, false) => ModifierEvent::BecameInactive,
            (false, false) => ModifierEvent::NoChange,
        }
    }

    fn update_timeline(&mut self, context: &UpdateContext<'_>, env: &ModifierEnv<'_>) {
        if self.state == ModifierState::MarkedForRemoval {
            return;
        }

        let same_clip = context
            .clip
            .is_some_and(|clip| clip.clip_id() == self.clip.clip_id());
        if !same_clip {
            self.set_state(ModifierState::MarkedForRemoval, env);
            return;
        }

        self.previous_position = context.previous_position;
        self.current_position = context.current_position;
        self.weight = context.weight;
        self.play_rate = context.play_rate;

        if self.previous_position >= self.end_time {
            self.set_state(ModifierState::MarkedForRemoval, env);
            return;
        }

        if self.is_active() && (self.current_position > self.end_time || self.current_position < self.start_time) {
            let expected = context.delta_seconds * context.play_rate;
            let advanced = self.current_position - self.previous_position;
            if (advanced - expected).abs() > env.config.scrub_tolerance {
                if env.config.traces_lifecycle() {
                    log::debug!(
                        "Modifier {} left its window by a jump of {advanced:.4} (expected {expected:.4})",
                        self.key()
                    );
                }
                self.set_state(ModifierState::MarkedForRemoval, env);
                return;
            }
        }

        if self.state == ModifierState::Disabled {
            return;
        }

        if !env.avatar.is_valid() {
            log::warn!("Modifier {} disabled: avatar is no longer valid", self.key());
            self.set_state(ModifierState::Disabled, env);
            return;
        }

        if self.state == ModifierState::Waiting
            && self.previous_position >= self.start_time
            && self.previous_position < self.end_time
        {
            self.set_state(ModifierState::Active, env);
        }
    }

    fn refresh_target(&mut self, env: &ModifierEnv<'_>) {
        let refresh = match &mut self.kind {
            ModifierKind::Warp(warp) => warp.refresh_target(self.clip.as_ref(), self.end_time, env),
            _ => return,
        };
        match refresh {
            TargetRefresh::Missing => {
                log::warn!(
                    "Modifier {} disabled: warp target '{}' is not registered",
                    self.key(),
                    self.target_name().unwrap_or_default()
                );
                self.set_state(ModifierState::Disabled, env);
            }
            TargetRefresh::Invalid => {
                log::error!(
                    "Modifier {} disabled: warp target '{}' resolved to a non-finite transform",
                    self.key(),
                    self.target_name().unwrap_or_default()
                );
                self.set_state(ModifierState::Disabled, env);
            }
            TargetRefresh::Changed => {
                // Restart the remaining warp from where the root is now
                self.start_transform = env.avatar.visual_root_transform();
                self.actual_start_time = self.previous_position;
                if env.config.traces_lifecycle() {
                    log::debug!("Modifier {} rebased on target change at {:.3}", self.key(), self.previous_position);
                }
            }
            TargetRefresh::Acquired | TargetRefresh::Unchanged => {}
        }
    }

    fn set_state(&mut self, state: ModifierState, env: &ModifierEnv<'_>) {
        if self.state == state {
            return;
        }
        if state == ModifierState::Active {
            self.start_transform = env.avatar.visual_root_transform();
            self.actual_start_time = self.previous_position;
            self.window_motion = self.clip.extract_root_motion(self.start_time, self.end_time);
        }
        if env.config.traces_lifecycle() {
            log::debug!("Modifier {}: {:?} -> {:?}", self.key(), self.state, state);
        }
        self.state = state;
    }

    /// Rewrite this tick's root-motion delta.
    ///
    /// Only meaningful while active.
    pub fn process_root_motion(&mut self, root_motion: &Transform, delta_seconds: f32, env: &ModifierEnv<'_>) -> Transform {
        assert!(env.avatar.is_valid(), "root motion processed for an invalid avatar");

        let output = match &self.kind {
            ModifierKind::Warp(warp) => {
                let progress = WindowProgress {
                    clip: self.clip.as_ref(),
                    end_time: self.end_time,
                    previous_position: self.previous_position,
                    current_position: self.current_position,
                    actual_start_time: self.actual_start_time,
                    start_transform: self.start_transform,
                    window_motion: self.window_motion,
                    delta_seconds,
                };
                warp.process(&progress, root_motion, env)
            }
            ModifierKind::Scale(settings) => settings.apply(root_motion),
            ModifierKind::Unconfigured => *root_motion,
        };

        if env.config.traces_ticks() {
            log::trace!(
                "Modifier {} at {:.3}: {} -> {}",
                self.key(),
                self.current_position,
                root_motion.position,
                output.position
            );
        }
        output
    }
}
