//! # Odeza Warp
//!
//! Root-motion warping for the Odeza engine.
//!
//! Warping redirects the displacement of a playing clip so the character's
//! root lands on a runtime-chosen transform at the end of a timed window,
//! while keeping the speed curve and turning style of the authored motion.
//!
//! ## Features
//! - Named warp targets (static, node-tracking, offset)
//! - Per-window modifier state machine driven by the clip timeline
//! - Skew warp and simple warp for translation
//! - Rotation warp with slerp, clamped-rate, constant-rate and scale policies
//! - Switch-off hooks for pausing or cancelling targets
//!
//! The engine is single-threaded and deterministic: a tick is a pure
//! function of the warper state and the [`TickInput`], so network replay of
//! the same inputs reproduces the same output.

pub mod avatar;
pub mod clip;
pub mod config;
pub mod modifier;
pub mod rotation;
pub mod scene;
pub mod switch_off;
pub mod target;
pub mod translation;
pub mod warper;

pub use avatar::{CharacterAvatar, MovementAvatar, WarpAvatar};
pub use clip::{AnimationClip, ClipAsset, ClipId, RootMotionSource, SubClipSegment, WarpWindowDescriptor};
pub use config::{DebugLevel, WarpConfig};
pub use modifier::{
    ModifierConfig, ModifierEvent, ModifierState, RootMotionModifier, ScaleSettings, WarpPointAnimProvider,
    WarpSettings, WindowKey,
};
pub use rotation::{RotationMethod, RotationTarget};
pub use scene::{EmptyScene, NodeId, SceneQuery, StaticScene};
pub use switch_off::{SwitchOffContext, SwitchOffEffects, SwitchOffEvaluator};
pub use target::{NodeTracking, OffsetDirection, TargetPause, WarpTarget, WarpTargetRegistry};
pub use translation::TranslationAlgorithm;
pub use warper::{MotionWarper, TickInput, TickOutput, WarpEvent};

use thiserror::Error;

/// Warping errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WarpError {
    #[error("Invalid warp window [{start}, {end}]")]
    InvalidWindow { start: f32, end: f32 },

    #[error("Invalid keyframes: {0}")]
    InvalidKeyframes(String),

    #[error("Scene node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("Modifier already exists for {0}")]
    DuplicateModifier(String),

    #[error("Warp target not found: {0}")]
    TargetNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for warping operations
pub type WarpResult<T> = Result<T, WarpError>;
