//! Switch-off conditions
//!
//! Gameplay code decides when an active target should stop steering the
//! character (it got too far, the target moved behind a wall, ...). The
//! warper asks a [`SwitchOffEvaluator`] once per tick for every registered
//! target and applies the returned [`SwitchOffEffects`].

use bitflags::bitflags;
use odeza_core::Transform;

use crate::avatar::WarpAvatar;
use crate::target::{TargetPause, WarpTarget};

bitflags! {
    /// Effects applied to a target when its switch-off condition holds
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SwitchOffEffects: u8 {
        /// Freeze a following target at its current transform
        const CANCEL_FOLLOW = 1 << 0;
        /// Remove the target altogether
        const CANCEL_WARP = 1 << 1;
        /// Pass root motion through unwarped while the condition holds
        const PAUSE_WARP = 1 << 2;
        /// Suppress root motion while the condition holds
        const PAUSE_ROOT_MOTION = 1 << 3;
    }
}

impl SwitchOffEffects {
    /// Pause flags a target should carry for these effects
    pub fn pause(self) -> TargetPause {
        let mut pause = TargetPause::empty();
        pause.set(TargetPause::WARP, self.contains(Self::PAUSE_WARP));
        pause.set(TargetPause::ROOT_MOTION, self.contains(Self::PAUSE_ROOT_MOTION));
        pause
    }
}

/// What an evaluator can see about one target
pub struct SwitchOffContext<'a> {
    pub target: &'a WarpTarget,
    /// Target transform resolved for this tick
    pub resolved: Transform,
    pub avatar: &'a dyn WarpAvatar,
}

/// Decides which switch-off effects apply to a target this tick
pub trait SwitchOffEvaluator {
    fn evaluate(&self, context: &SwitchOffContext<'_>) -> SwitchOffEffects;
}

impl<F> SwitchOffEvaluator for F
where
    F: Fn(&SwitchOffContext<'_>) -> SwitchOffEffects,
{
    fn evaluate(&self, context: &SwitchOffContext<'_>) -> SwitchOffEffects {
        self(context)
    }
}
