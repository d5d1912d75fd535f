//! Warper configuration

use serde::{Deserialize, Serialize};

use crate::{WarpError, WarpResult};

/// Amount of activity tracing emitted through `log`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugLevel {
    #[default]
    Off,
    /// Modifier lifecycle and target changes
    Basic,
    /// Per-tick warped deltas
    Verbose,
}

/// Configuration passed to a [`MotionWarper`](crate::MotionWarper)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    /// Master switch; when off root motion passes through untouched
    pub enabled: bool,
    /// Activity trace level
    pub debug_level: DebugLevel,
    /// Also scan warp windows of clips embedded in composite clips
    pub search_sub_clips: bool,
    /// Allowed mismatch between timeline advance and `delta * rate` before a jump counts as a scrub
    pub scrub_tolerance: f32,
    /// Window translation below this length counts as "no translation"
    pub translation_epsilon: f32,
    /// How long an external debug observer should keep drawn paths, in seconds
    pub debug_draw_duration: f32,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug_level: DebugLevel::Off,
            search_sub_clips: true,
            scrub_tolerance: 1.0e-4,
            translation_epsilon: 1.0e-4,
            debug_draw_duration: 0.0,
        }
    }
}

impl WarpConfig {
    /// Reject values the warper cannot work with
    pub fn validate(&self) -> WarpResult<()> {
        if !(self.scrub_tolerance >= 0.0) {
            return Err(WarpError::InvalidConfig(format!(
                "scrub_tolerance must be non-negative, got {}",
                self.scrub_tolerance
            )));
        }
        if !(self.translation_epsilon >= 0.0) {
            return Err(WarpError::InvalidConfig(format!(
                "translation_epsilon must be non-negative, got {}",
                self.translation_epsilon
            )));
        }
        if !(self.debug_draw_duration >= 0.0) {
            return Err(WarpError::InvalidConfig(format!(
                "debug_draw_duration must be non-negative, got {}",
                self.debug_draw_duration
            )));
        }
        Ok(())
    }

    /// Whether lifecycle tracing is on
    pub fn traces_lifecycle(&self) -> bool {
        self.debug_level >= DebugLevel::Basic
    }

    /// Whether per-tick tracing is on
    pub fn traces_ticks(&self) -> bool {
        self.debug_level >= DebugLevel::Verbose
    }
}
