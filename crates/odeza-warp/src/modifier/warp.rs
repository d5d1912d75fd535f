use std::f32::consts::PI;

use glam::{Quat, Vec3};
use odeza_core::math::{facing_rotation, flatten, vertical, AlphaBlend, TINY, UP};
use odeza_core::Transform;
use serde::{Deserialize, Serialize};

use super::{ModifierEnv, WindowProgress};
use crate::clip::RootMotionSource;
use crate::rotation::{warp_rotation, RotationFrame, RotationMethod, RotationParams, RotationTarget};
use crate::target::TargetPause;
use crate::translation::{clamp_speed, simple_warp, skew_warp, TranslationAlgorithm};

/// Tolerance under which a re-resolved target counts as unchanged
const TARGET_CHANGE_TOLERANCE: f32 = 1.0e-5;

/// Point of the animated skeleton that should land on the target
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WarpPointAnimProvider {
    /// The root itself
    #[default]
    None,
    /// A fixed component-space transform
    Static { transform: Transform },
    /// A bone sampled at the window end
    Bone { name: String },
}

/// Settings of a warp window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpSettings {
    pub target_name: String,
    pub translation_algorithm: TranslationAlgorithm,
    pub warp_translation: bool,
    /// Warp only the horizontal plane, keeping the clip's vertical motion
    pub ignore_up_axis: bool,
    pub warp_point: WarpPointAnimProvider,
    /// Cap warped speed at this multiple of the clip speed
    pub max_speed_ratio: Option<f32>,
    pub clamp_horizontal_speed_only: bool,
    /// Curve for windows whose clip has no translation
    pub no_translation_easing: AlphaBlend,
    pub warp_rotation: bool,
    pub rotation_target: RotationTarget,
    pub rotation_method: RotationMethod,
    pub rotation_time_multiplier: f32,
    /// Degrees per second
    pub max_rotation_rate: f32,
    /// Degrees per frame
    pub max_rotation_per_frame: f32,
    /// Aim so the rotation left in the clip after the window ends on target
    pub subtract_remaining_root_motion: bool,
}

impl Default for WarpSettings {
    fn default() -> Self {
        Self {
            target_name: String::new(),
            translation_algorithm: TranslationAlgorithm::Skew,
            warp_translation: true,
            ignore_up_axis: true,
            warp_point: WarpPointAnimProvider::None,
            max_speed_ratio: None,
            clamp_horizontal_speed_only: false,
            no_translation_easing: AlphaBlend::Linear,
            warp_rotation: true,
            rotation_target: RotationTarget::Default,
            rotation_method: RotationMethod::Slerp,
            rotation_time_multiplier: 1.0,
            max_rotation_rate: 360.0,
            max_rotation_per_frame: 30.0,
            subtract_remaining_root_motion: false,
        }
    }
}

impl WarpSettings {
    pub fn new(target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            ..Self::default()
        }
    }

    fn rotation_params(&self) -> RotationParams {
        RotationParams {
            method: self.rotation_method,
            time_multiplier: self.rotation_time_multiplier,
            max_rotation_rate: self.max_rotation_rate,
            max_rotation_per_frame: self.max_rotation_per_frame,
        }
    }
}

pub(crate) enum TargetRefresh {
    Missing,
    Invalid,
    Acquired,
    Unchanged,
    Changed,
}

/// Warp state of an active window
#[derive(Debug, Clone)]
pub struct WarpModifier {
    settings: WarpSettings,
    target: Option<Transform>,
    warp_point_offset: Option<Transform>,
    pause: TargetPause,
}

impl WarpModifier {
    pub fn new(settings: WarpSettings) -> Self {
        Self {
            settings,
            target: None,
            warp_point_offset: None,
            pause: TargetPause::empty(),
        }
    }

    pub fn settings(&self) -> &WarpSettings {
        &self.settings
    }

    /// Where the root should end up, once a target has been acquired
    pub fn cached_target(&self) -> Option<Transform> {
        self.target
    }

    pub(crate) fn refresh_target(&mut self, clip: &dyn RootMotionSource, end_time: f32, env: &ModifierEnv<'_>) -> TargetRefresh {
        let Some(target) = env.targets.find(&self.settings.target_name) else {
            return TargetRefresh::Missing;
        };
        self.pause = target.pause;

        let resolved = target.resolve(env.scene, env.avatar.visual_root_location());
        if !resolved.is_finite() {
            return TargetRefresh::Invalid;
        }
        let goal = match self.warp_point_offset(clip, end_time, env) {
            Some(offset) => resolved * offset,
            None => resolved,
        };

        match self.target.replace(goal) {
            None => TargetRefresh::Acquired,
            Some(previous) if previous.equals(&goal, TARGET_CHANGE_TOLERANCE) => TargetRefresh::Unchanged,
            Some(_) => TargetRefresh::Changed,
        }
    }

    /// Root transform relative to the warp point, in actor-aligned space
    fn warp_point_offset(&mut self, clip: &dyn RootMotionSource, end_time: f32, env: &ModifierEnv<'_>) -> Option<Transform> {
        if let Some(offset) = self.warp_point_offset {
            return Some(offset);
        }
        let warp_point = match &self.settings.warp_point {
            WarpPointAnimProvider::None => return None,
            WarpPointAnimProvider::Static { transform } => *transform,
            WarpPointAnimProvider::Bone { name } => match clip.bone_transform_at(name, end_time) {
                Some(transform) => transform,
                None => {
                    log::warn!("Warp point bone '{name}' not found in '{}'; warping the root", clip.name());
                    self.warp_point_offset = Some(Transform::IDENTITY);
                    return self.warp_point_offset;
                }
            },
        };
        let root = clip.root_transform_at(end_time);
        let mesh = Transform::from_rotation(env.avatar.mesh_offset().rotation);
        let offset = (mesh * root.relative_to(&warp_point) * mesh.inverse()).normalized();
        self.warp_point_offset = Some(offset);
        self.warp_point_offset
    }

    pub(crate) fn process(&self, progress: &WindowProgress<'_>, root_motion: &Transform, env: &ModifierEnv<'_>) -> Transform {
        if self.pause.contains(TargetPause::ROOT_MOTION) {
            return Transform::IDENTITY;
        }
        if self.pause.contains(TargetPause::WARP) {
            return *root_motion;
        }
        let Some(goal) = self.target else {
            return *root_motion;
        };

        let clip = progress.clip;
        let window_end = progress.current_position.min(progress.end_time);
        let remaining = clip.extract_root_motion(progress.previous_position, progress.end_time);
        let delta = clip.extract_root_motion(progress.previous_position, window_end);
        let overrun = if progress.current_position > progress.end_time {
            clip.extract_root_motion(progress.end_time, progress.current_position)
        } else {
            Transform::IDENTITY
        };

        let mut output = *root_motion;
        // Orientation at the window end, the frame the overrun is expressed in
        let mut end_rotation = delta.rotation;
        if self.settings.warp_rotation {
            end_rotation = self.warp_rotation(progress, &delta, &remaining, &goal, env);
            output.rotation = (end_rotation * overrun.rotation).normalize();
        }
        if self.settings.warp_translation {
            output.position =
                self.warp_translation(progress, &delta, &remaining, &goal, env) + end_rotation * overrun.position;
        }
        output
    }

    fn warp_translation(
        &self,
        progress: &WindowProgress<'_>,
        delta: &Transform,
        remaining: &Transform,
        goal: &Transform,
        env: &ModifierEnv<'_>,
    ) -> Vec3 {
        let mesh_rotation = env.avatar.mesh_rotation();
        let current = env.avatar.visual_root_location();
        let ignore_up = self.settings.ignore_up_axis;
        let planar = |v: Vec3| if ignore_up { flatten(v) } else { v };

        let delta_world = mesh_rotation * delta.position;
        let remaining_world = mesh_rotation * remaining.position;
        let window_world = progress.start_transform.rotation * progress.window_motion.position;
        let target_location = if ignore_up {
            flatten(goal.position) + UP * vertical(current)
        } else {
            goal.position
        };

        let warped = if planar(window_world).length() < env.config.translation_epsilon {
            self.ease_without_translation(progress, target_location, current)
        } else {
            let delta_planar = planar(delta_world);
            let remaining_planar = planar(remaining_world);
            let to_target = target_location - current;
            let warped = match self.settings.translation_algorithm {
                TranslationAlgorithm::Skew => skew_warp(delta_planar, remaining_planar, to_target, mesh_rotation),
                TranslationAlgorithm::Simple => simple_warp(delta_planar, remaining_planar, to_target),
            };
            match self.settings.max_speed_ratio {
                Some(ratio) => clamp_speed(warped, delta_planar, ratio, self.settings.clamp_horizontal_speed_only),
                None => warped,
            }
        };

        let warped = if ignore_up {
            warped + UP * vertical(delta_world)
        } else {
            warped
        };
        mesh_rotation.inverse() * warped
    }

    /// Ease from the activation location toward the target over the window
    fn ease_without_translation(&self, progress: &WindowProgress<'_>, target_location: Vec3, current: Vec3) -> Vec3 {
        let duration = progress.end_time - progress.actual_start_time;
        let alpha = if duration > TINY {
            ((progress.current_position.min(progress.end_time) - progress.actual_start_time) / duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let eased = self.settings.no_translation_easing.evaluate(alpha);
        let start = if self.settings.ignore_up_axis {
            flatten(progress.start_transform.position) + UP * vertical(current)
        } else {
            progress.start_transform.position
        };
        start.lerp(target_location, eased) - current
    }

    fn warp_rotation(
        &self,
        progress: &WindowProgress<'_>,
        delta: &Transform,
        remaining: &Transform,
        goal: &Transform,
        env: &ModifierEnv<'_>,
    ) -> Quat {
        let target_rotation = match self.settings.rotation_target {
            RotationTarget::Default => goal.rotation,
            RotationTarget::Facing => facing_rotation(goal.position - env.avatar.visual_root_location())
                .unwrap_or_else(|| env.avatar.actor_transform().rotation),
            RotationTarget::OppositeDefault => goal.rotation * Quat::from_rotation_z(PI),
        };
        let mut target_mesh = target_rotation * env.avatar.mesh_offset().rotation;
        if self.settings.subtract_remaining_root_motion {
            let after = progress.clip.extract_root_motion(progress.end_time, progress.clip.length());
            target_mesh = target_mesh * after.rotation.inverse();
        }

        let frame = RotationFrame {
            delta: delta.rotation,
            remaining: remaining.rotation,
            goal: (env.avatar.mesh_rotation().inverse() * target_mesh).normalize(),
            frame_time: (progress.current_position.min(progress.end_time) - progress.previous_position).max(0.0),
            time_remaining: progress.end_time - progress.previous_position,
            delta_seconds: progress.delta_seconds,
        };
        warp_rotation(&frame, &self.settings.rotation_params())
    }
}
