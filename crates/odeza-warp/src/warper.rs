//! Per-avatar warping orchestrator
//!
//! [`MotionWarper`] owns the targets and modifiers of one avatar. Each tick
//! it spawns modifiers for warp windows the timeline has entered, advances
//! every modifier and threads the root-motion delta through the active ones
//! in creation order.

use std::sync::Arc;

use odeza_core::Transform;
use smallvec::SmallVec;

use crate::avatar::WarpAvatar;
use crate::clip::{ClipId, RootMotionSource, WarpWindowDescriptor};
use crate::config::WarpConfig;
use crate::modifier::{
    ModifierConfig, ModifierEnv, ModifierEvent, ModifierState, RootMotionModifier, UpdateContext, WindowKey,
};
use crate::scene::SceneQuery;
use crate::switch_off::{SwitchOffContext, SwitchOffEffects, SwitchOffEvaluator};
use crate::target::{WarpTarget, WarpTargetRegistry};
use crate::{WarpError, WarpResult};

/// Playback state and root motion of one tick
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    /// Clip currently contributing root motion
    pub clip: Option<&'a Arc<dyn RootMotionSource>>,
    pub previous_position: f32,
    pub current_position: f32,
    pub weight: f32,
    pub play_rate: f32,
    pub delta_seconds: f32,
    /// Mesh-space root-motion delta produced by playback this tick
    pub root_motion: Transform,
}

impl<'a> TickInput<'a> {
    /// Unit-rate, full-weight playback of `clip` from `previous` to `current`
    pub fn playing(clip: &'a Arc<dyn RootMotionSource>, previous: f32, current: f32, delta_seconds: f32) -> Self {
        Self {
            clip: Some(clip),
            previous_position: previous,
            current_position: current,
            weight: 1.0,
            play_rate: 1.0,
            delta_seconds,
            root_motion: clip.extract_root_motion(previous, current),
        }
    }

    /// No clip playing
    pub fn idle(root_motion: Transform, delta_seconds: f32) -> Self {
        Self {
            clip: None,
            previous_position: 0.0,
            current_position: 0.0,
            weight: 0.0,
            play_rate: 1.0,
            delta_seconds,
            root_motion,
        }
    }

    pub fn with_play_rate(mut self, play_rate: f32) -> Self {
        self.play_rate = play_rate;
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_root_motion(mut self, root_motion: Transform) -> Self {
        self.root_motion = root_motion;
        self
    }
}

/// Notification raised during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum WarpEvent {
    ModifierCreated(WindowKey),
    /// Raised after window scanning, before any modifier updates
    PreUpdate,
    ModifierActivated(WindowKey),
    ModifierUpdated(WindowKey),
    ModifierDeactivated(WindowKey),
    TargetSwitchedOff { name: String, effects: SwitchOffEffects },
}

/// Result of one tick
#[derive(Debug, Clone)]
pub struct TickOutput {
    /// Root motion as received
    pub original: Transform,
    /// Root motion after all active modifiers
    pub root_motion: Transform,
    pub events: SmallVec<[WarpEvent; 4]>,
}

impl TickOutput {
    fn passthrough(root_motion: Transform) -> Self {
        Self {
            original: root_motion,
            root_motion,
            events: SmallVec::new(),
        }
    }

    /// Whether any modifier changed the root motion
    pub fn was_warped(&self) -> bool {
        self.original != self.root_motion
    }
}

/// Root-motion warper for a single avatar
pub struct MotionWarper {
    config: WarpConfig,
    targets: WarpTargetRegistry,
    modifiers: Vec<RootMotionModifier>,
    switch_off: Option<Box<dyn SwitchOffEvaluator>>,
}

impl Default for MotionWarper {
    fn default() -> Self {
        Self {
            config: WarpConfig::default(),
            targets: WarpTargetRegistry::new(),
            modifiers: Vec::new(),
            switch_off: None,
        }
    }
}

impl MotionWarper {
    pub fn new(config: WarpConfig) -> WarpResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &WarpConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: WarpConfig) -> WarpResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Install the per-tick switch-off predicate
    pub fn set_switch_off_evaluator(&mut self, evaluator: impl SwitchOffEvaluator + 'static) {
        self.switch_off = Some(Box::new(evaluator));
    }

    pub fn clear_switch_off_evaluator(&mut self) {
        self.switch_off = None;
    }

    pub fn targets(&self) -> &WarpTargetRegistry {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut WarpTargetRegistry {
        &mut self.targets
    }

    pub fn add_or_update_warp_target(&mut self, target: WarpTarget) {
        self.targets.add_or_update(target);
    }

    pub fn find_warp_target(&self, name: &str) -> Option<&WarpTarget> {
        self.targets.find(name)
    }

    pub fn remove_warp_target(&mut self, name: &str) -> usize {
        self.targets.remove(name)
    }

    pub fn remove_warp_targets<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.targets.remove_many(names)
    }

    pub fn remove_all_warp_targets(&mut self) -> usize {
        self.targets.remove_all()
    }

    /// World transform of a named target as modifiers will see it
    pub fn resolve_warp_target(&self, name: &str, avatar: &dyn WarpAvatar, scene: &dyn SceneQuery) -> WarpResult<Transform> {
        self.targets.resolve(name, scene, avatar.visual_root_location())
    }

    /// Stop following a target, keeping its current transform
    pub fn cancel_follow(&mut self, name: &str, avatar: &dyn WarpAvatar, scene: &dyn SceneQuery) -> WarpResult<()> {
        let target = self
            .targets
            .find_mut(name)
            .ok_or_else(|| WarpError::TargetNotFound(name.to_string()))?;
        let frozen = target.resolve(scene, avatar.visual_root_location());
        target.freeze(frozen);
        Ok(())
    }

    pub fn modifiers(&self) -> &[RootMotionModifier] {
        &self.modifiers
    }

    /// Whether a modifier already exists for the given window
    pub fn contains_modifier(&self, clip: ClipId, start_time: f32, end_time: f32) -> bool {
        self.modifiers.iter().any(|modifier| modifier.matches(clip, start_time, end_time))
    }

    /// Register a modifier created outside window scanning.
    ///
    /// Rejected when one already exists for the same window.
    pub fn add_modifier(&mut self, modifier: RootMotionModifier) -> WarpResult<WindowKey> {
        let key = modifier.key();
        if modifier.end_time() < modifier.start_time() {
            return Err(WarpError::InvalidWindow {
                start: key.start_time,
                end: key.end_time,
            });
        }
        if self.contains_modifier(key.clip, key.start_time, key.end_time) {
            return Err(WarpError::DuplicateModifier(key.to_string()));
        }
        self.modifiers.push(modifier);
        Ok(key)
    }

    /// Disable every modifier, returning how many were active
    pub fn disable_all_modifiers(&mut self) -> usize {
        self.modifiers
            .iter_mut()
            .map(|modifier| modifier.disable())
            .filter(|was_active| *was_active)
            .count()
    }

    /// Advance warping by one tick
    pub fn tick(&mut self, input: &TickInput<'_>, avatar: &dyn WarpAvatar, scene: &dyn SceneQuery) -> TickOutput {
        let mut output = TickOutput::passthrough(input.root_motion);
        if !self.config.enabled {
            return output;
        }
        if !input.root_motion.is_finite() {
            log::error!("Non-finite root motion received; skipping warp this tick");
            return output;
        }

        if let Some(clip) = input.clip {
            self.scan_windows(clip, input.previous_position, &mut output.events);
        }
        output.events.push(WarpEvent::PreUpdate);

        self.apply_switch_off(avatar, scene, &mut output.events);

        let context = UpdateContext {
            clip: input.clip,
            previous_position: input.previous_position,
            current_position: input.current_position,
            weight: input.weight,
            play_rate: input.play_rate,
            delta_seconds: input.delta_seconds,
        };
        let env = ModifierEnv {
            avatar,
            targets: &self.targets,
            scene,
            config: &self.config,
        };

        for modifier in &mut self.modifiers {
            let key = modifier.key();
            match modifier.update(&context, &env) {
                ModifierEvent::BecameActive => {
                    output.events.push(WarpEvent::ModifierActivated(key));
                    output.events.push(WarpEvent::ModifierUpdated(key));
                }
                ModifierEvent::StillActive => output.events.push(WarpEvent::ModifierUpdated(key)),
                ModifierEvent::BecameInactive => output.events.push(WarpEvent::ModifierDeactivated(key)),
                ModifierEvent::NoChange => {}
            }
        }

        self.modifiers
            .retain(|modifier| modifier.state() != ModifierState::MarkedForRemoval);

        let mut root_motion = input.root_motion;
        for modifier in self.modifiers.iter_mut().filter(|modifier| modifier.is_active()) {
            root_motion = modifier.process_root_motion(&root_motion, input.delta_seconds, &env);
        }
        output.root_motion = root_motion;
        output
    }

    fn scan_windows(&mut self, clip: &Arc<dyn RootMotionSource>, previous_position: f32, events: &mut SmallVec<[WarpEvent; 4]>) {
        let length = clip.length();
        for window in clip.warp_windows() {
            let (start, end) = window.clamped(length);
            self.consider_window(clip, window, start, end, previous_position, events);
        }

        if !self.config.search_sub_clips {
            return;
        }
        for segment in clip.sub_clips() {
            let inner_length = segment.clip.length();
            for window in segment.clip.warp_windows() {
                let (start, end) = window.clamped(inner_length);
                let Some((start, end)) = segment.composite_window(start, end) else {
                    continue;
                };
                self.consider_window(clip, window, start, end, previous_position, events);
            }
        }
    }

    fn consider_window(
        &mut self,
        clip: &Arc<dyn RootMotionSource>,
        window: &WarpWindowDescriptor,
        start: f32,
        end: f32,
        previous_position: f32,
        events: &mut SmallVec<[WarpEvent; 4]>,
    ) {
        if !(previous_position >= start && previous_position < end) {
            return;
        }
        if self.contains_modifier(clip.clip_id(), start, end) {
            return;
        }

        let config: Option<ModifierConfig> = window.modifier.clone();
        if config.is_none() {
            log::warn!(
                "Warp window [{start:.3}, {end:.3}] of '{}' has no modifier configured; it will stay disabled",
                clip.name()
            );
        }
        let modifier = RootMotionModifier::new(Arc::clone(clip), start, end, config);
        let key = modifier.key();
        if self.config.traces_lifecycle() {
            log::debug!("Created modifier {key}");
        }
        events.push(WarpEvent::ModifierCreated(key));
        self.modifiers.push(modifier);
    }

    fn apply_switch_off(&mut self, avatar: &dyn WarpAvatar, scene: &dyn SceneQuery, events: &mut SmallVec<[WarpEvent; 4]>) {
        let Some(evaluator) = self.switch_off.as_ref() else {
            return;
        };
        let avatar_location = avatar.visual_root_location();
        let mut cancelled: SmallVec<[String; 2]> = SmallVec::new();

        for target in self.targets.iter_mut() {
            let resolved = target.resolve(scene, avatar_location);
            let effects = evaluator.evaluate(&SwitchOffContext {
                target: &*target,
                resolved,
                avatar,
            });
            target.pause = effects.pause();
            if effects.is_empty() {
                continue;
            }

            if effects.contains(SwitchOffEffects::CANCEL_FOLLOW) && target.follows() {
                target.freeze(resolved);
            }
            if effects.contains(SwitchOffEffects::CANCEL_WARP) {
                cancelled.push(target.name().to_string());
            }
            if self.config.traces_lifecycle() {
                log::debug!("Warp target '{}' switched off: {effects:?}", target.name());
            }
            events.push(WarpEvent::TargetSwitchedOff {
                name: target.name().to_string(),
                effects,
            });
        }

        for name in cancelled {
            self.targets.remove(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::{CharacterAvatar, MovementAvatar};
    use crate::clip::{AnimationClip, SubClipSegment};
    use crate::modifier::{ScaleSettings, WarpPointAnimProvider, WarpSettings};
    use crate::rotation::{RotationMethod, RotationTarget};
    use crate::scene::{EmptyScene, NodeId, StaticScene};
    use crate::target::NodeTracking;
    use glam::{Quat, Vec3};
    use odeza_core::math::{yaw_pitch, AlphaBlend};

    fn warp_window(start: f32, end: f32, settings: WarpSettings) -> WarpWindowDescriptor {
        WarpWindowDescriptor::new(start, end, ModifierConfig::Warp(settings)).unwrap()
    }

    /// Straight clip with an ease-in speed curve
    fn eased_line(id: u64, end: Vec3, duration: f32, window: WarpWindowDescriptor) -> Arc<dyn RootMotionSource> {
        let mut clip = AnimationClip::new(ClipId(id), "line", duration);
        for i in 0..=20 {
            let t = i as f32 / 20.0;
            clip = clip.with_root_key(duration * t, Transform::from_position(end * (t * t)));
        }
        clip.with_warp_window(window).unwrap().into_source()
    }

    /// Play the whole clip in `frames` ticks, returning the avatar and every output
    fn play<A>(
        warper: &mut MotionWarper,
        clip: &Arc<dyn RootMotionSource>,
        avatar: &mut A,
        scene: &dyn SceneQuery,
        frames: usize,
        apply: impl Fn(&mut A, &Transform),
    ) -> Vec<TickOutput>
    where
        A: WarpAvatar,
    {
        let length = clip.length();
        let dt = length / frames as f32;
        let mut outputs = Vec::new();
        let mut previous = 0.0;
        for i in 1..=frames {
            let current = length * i as f32 / frames as f32;
            let output = warper.tick(&TickInput::playing(clip, previous, current, dt), &*avatar, scene);
            apply(avatar, &output.root_motion);
            outputs.push(output);
            previous = current;
        }
        outputs
    }

    fn move_avatar(avatar: &mut MovementAvatar, delta: &Transform) {
        avatar.apply_local_root_motion(delta);
    }

    #[test]
    fn test_lateral_clip_lands_on_target() {
        // The clip walks 500 units to its left; the target is 300 units ahead
        let window = warp_window(0.0, 1.0, WarpSettings::new("target"));
        let clip = eased_line(1, Vec3::new(0.0, 500.0, 0.0), 1.0, window);

        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::from_position(Vec3::new(300.0, 0.0, 0.0))));
        let mut avatar = MovementAvatar::default();
        play(&mut warper, &clip, &mut avatar, &EmptyScene, 30, move_avatar);

        let landed = avatar.visual_root_location();
        assert!((landed - Vec3::new(300.0, 0.0, 0.0)).length() < 0.01, "landed at {landed}");
    }

    #[test]
    fn test_off_grid_ticks_land_and_overrun_unwarped() {
        // 500 units/s to the left, warped only inside [0.2, 0.8]
        let clip = AnimationClip::new(ClipId(1), "sidestep", 1.0)
            .with_root_key(0.0, Transform::IDENTITY)
            .with_root_key(1.0, Transform::from_position(Vec3::new(0.0, 500.0, 0.0)))
            .with_warp_window(warp_window(0.2, 0.8, WarpSettings::new("target")))
            .unwrap()
            .into_source();

        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::from_position(Vec3::new(300.0, 0.0, 0.0))));
        let mut avatar = MovementAvatar::default();

        let mut previous = 0.0;
        let mut tick = 1;
        while previous < 1.0 {
            let current = (tick as f32 * 0.07).min(1.0);
            let output = warper.tick(&TickInput::playing(&clip, previous, current, 0.07), &avatar, &EmptyScene);
            avatar.apply_local_root_motion(&output.root_motion);
            if tick == 12 {
                // The 0.77 -> 0.84 tick ends 0.04s past the window
                let placed = avatar.visual_root_location();
                assert!((placed - Vec3::new(300.0, 20.0, 0.0)).length() < 0.01, "placed at {placed}");
            }
            previous = current;
            tick += 1;
        }

        let landed = avatar.visual_root_location();
        assert!((landed - Vec3::new(300.0, 100.0, 0.0)).length() < 0.01, "landed at {landed}");
        assert!(warper.modifiers().is_empty());
    }

    #[test]
    fn test_overrun_follows_turn_at_window_end() {
        // Turns 90 degrees while reaching the window end, then walks forward
        let clip = AnimationClip::new(ClipId(1), "turn", 1.0)
            .with_root_key(0.0, Transform::IDENTITY)
            .with_root_key(0.5, Transform::new(Vec3::new(100.0, 0.0, 0.0), Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)))
            .with_root_key(1.0, Transform::new(Vec3::new(100.0, 100.0, 0.0), Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)))
            .with_warp_window(warp_window(
                0.0,
                0.5,
                WarpSettings {
                    warp_rotation: false,
                    ..WarpSettings::new("target")
                },
            ))
            .unwrap()
            .into_source();

        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::from_position(Vec3::new(100.0, 0.0, 0.0))));
        // Placed where the clip itself is at 0.4, so the warp leaves the in-window part untouched
        let avatar = MovementAvatar::new(Transform::new(Vec3::new(80.0, 0.0, 0.0), Quat::from_rotation_z(0.8 * std::f32::consts::FRAC_PI_2)));

        let output = warper.tick(&TickInput::playing(&clip, 0.4, 0.6, 0.2), &avatar, &EmptyScene);
        let expected = clip.extract_root_motion(0.4, 0.6).position;
        assert!(
            (output.root_motion.position - expected).length() < 0.05,
            "got {} expected {expected}",
            output.root_motion.position
        );
    }

    #[test]
    fn test_skew_keeps_speed_curve() {
        let window = warp_window(0.0, 1.0, WarpSettings::new("target"));
        let clip = eased_line(1, Vec3::new(200.0, 0.0, 0.0), 1.0, window);

        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::from_position(Vec3::new(400.0, 0.0, 0.0))));
        let mut avatar = MovementAvatar::default();
        let outputs = play(&mut warper, &clip, &mut avatar, &EmptyScene, 20, move_avatar);

        // Every frame is stretched by the same factor
        for output in &outputs {
            let ratio = output.root_motion.position.x / output.original.position.x;
            assert!((ratio - 2.0).abs() < 1e-2, "ratio {ratio}");
        }
        assert!((avatar.visual_root_location().x - 400.0).abs() < 0.01);
    }

    #[test]
    fn test_character_rotates_to_target() {
        let mut settings = WarpSettings::new("target");
        settings.rotation_method = RotationMethod::Slerp;
        let window = warp_window(0.0, 1.0, settings);
        let clip = eased_line(1, Vec3::new(200.0, 0.0, 0.0), 1.0, window);

        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform(
            "target",
            Transform::from_position_yaw(Vec3::new(150.0, 100.0, 0.0), 0.7),
        ));
        let mut avatar = CharacterAvatar::standing_at(Vec3::ZERO, 0.0, 90.0);
        play(&mut warper, &clip, &mut avatar, &EmptyScene, 30, |avatar, delta| avatar.apply_local_root_motion(delta));

        let landed = avatar.visual_root_location();
        assert!((landed - Vec3::new(150.0, 100.0, 0.0)).length() < 0.05, "landed at {landed}");
        let (yaw, _) = yaw_pitch(avatar.actor.rotation);
        assert!((yaw - 0.7).abs() < 1e-3, "yaw {yaw}");
    }

    #[test]
    fn test_facing_rotation_target() {
        let mut settings = WarpSettings::new("target");
        settings.rotation_target = RotationTarget::Facing;
        settings.warp_translation = false;
        let window = warp_window(0.0, 1.0, settings);
        let clip = eased_line(1, Vec3::new(100.0, 0.0, 0.0), 1.0, window);

        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::from_position(Vec3::new(0.0, 5000.0, 0.0))));
        let mut avatar = MovementAvatar::default();
        play(&mut warper, &clip, &mut avatar, &EmptyScene, 20, move_avatar);

        // Facing is re-aimed every frame, so it ends close to +Y
        let (yaw, _) = yaw_pitch(avatar.actor.rotation);
        assert!((yaw - std::f32::consts::FRAC_PI_2).abs() < 0.05, "yaw {yaw}");
    }

    #[test]
    fn test_no_translation_window_eases_to_target() {
        let window = warp_window(0.0, 1.0, WarpSettings {
            no_translation_easing: AlphaBlend::QuadraticInOut,
            ..WarpSettings::new("target")
        });
        let clip = AnimationClip::new(ClipId(3), "idle", 1.0).with_warp_window(window).unwrap().into_source();

        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::from_position(Vec3::new(50.0, -20.0, 0.0))));
        let mut avatar = MovementAvatar::default();
        let outputs = play(&mut warper, &clip, &mut avatar, &EmptyScene, 10, move_avatar);

        assert!(outputs.iter().all(|output| output.original.position == Vec3::ZERO));
        assert!((avatar.visual_root_location() - Vec3::new(50.0, -20.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_warp_point_offsets_landing() {
        let settings = WarpSettings {
            warp_point: WarpPointAnimProvider::Static {
                transform: Transform::from_position(Vec3::new(250.0, 0.0, 0.0)),
            },
            ..WarpSettings::new("ledge")
        };
        let clip = eased_line(4, Vec3::new(200.0, 0.0, 0.0), 1.0, warp_window(0.0, 1.0, settings));

        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("ledge", Transform::from_position(Vec3::new(300.0, 0.0, 0.0))));
        let mut avatar = MovementAvatar::default();
        play(&mut warper, &clip, &mut avatar, &EmptyScene, 20, move_avatar);

        // The warp point sits 50 units ahead of the root at the window end
        assert!((avatar.visual_root_location() - Vec3::new(250.0, 0.0, 0.0)).length() < 0.01);
    }

    #[test]
    fn test_follow_target_moving_mid_window() {
        let window = warp_window(0.0, 1.0, WarpSettings::new("door"));
        let clip = eased_line(5, Vec3::new(200.0, 0.0, 0.0), 1.0, window);

        let mut scene = StaticScene::new();
        scene.set_node(NodeId(1), Transform::from_position(Vec3::new(250.0, 0.0, 0.0)));
        let mut warper = MotionWarper::default();
        let door = WarpTarget::from_node("door", NodeTracking::new(NodeId(1)).following(true), &scene, Vec3::ZERO).unwrap();
        warper.add_or_update_warp_target(door);

        let mut avatar = MovementAvatar::default();
        let frames = 20;
        let mut previous = 0.0;
        for i in 1..=frames {
            if i == 10 {
                scene.set_node(NodeId(1), Transform::from_position(Vec3::new(260.0, 30.0, 0.0)));
            }
            let current = i as f32 / frames as f32;
            let output = warper.tick(&TickInput::playing(&clip, previous, current, 0.05), &avatar, &scene);
            avatar.apply_local_root_motion(&output.root_motion);
            previous = current;
        }
        assert!((avatar.visual_root_location() - Vec3::new(260.0, 30.0, 0.0)).length() < 0.01);
    }

    #[test]
    fn test_modifier_lifecycle_events() {
        let window = warp_window(0.2, 0.6, WarpSettings::new("target"));
        let clip = eased_line(1, Vec3::new(100.0, 0.0, 0.0), 1.0, window);
        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::from_position(Vec3::new(100.0, 0.0, 0.0))));
        let avatar = MovementAvatar::default();

        let early = warper.tick(&TickInput::playing(&clip, 0.0, 0.1, 0.1), &avatar, &EmptyScene);
        assert_eq!(early.events.as_slice(), &[WarpEvent::PreUpdate]);
        assert!(warper.modifiers().is_empty());

        let enter = warper.tick(&TickInput::playing(&clip, 0.2, 0.3, 0.1), &avatar, &EmptyScene);
        let key = warper.modifiers()[0].key();
        assert_eq!(
            enter.events.as_slice(),
            &[
                WarpEvent::ModifierCreated(key),
                WarpEvent::PreUpdate,
                WarpEvent::ModifierActivated(key),
                WarpEvent::ModifierUpdated(key),
            ]
        );

        // Re-entering the scan while inside the window does not duplicate it
        warper.tick(&TickInput::playing(&clip, 0.3, 0.6, 0.3), &avatar, &EmptyScene);
        assert_eq!(warper.modifiers().len(), 1);

        let leave = warper.tick(&TickInput::playing(&clip, 0.6, 0.7, 0.1), &avatar, &EmptyScene);
        assert!(leave.events.contains(&WarpEvent::ModifierDeactivated(key)));
        assert!(warper.modifiers().is_empty());
        assert!(!leave.was_warped());
    }

    #[test]
    fn test_clip_swap_removes_modifier() {
        let window = warp_window(0.0, 1.0, WarpSettings::new("target"));
        let clip = eased_line(1, Vec3::new(100.0, 0.0, 0.0), 1.0, window.clone());
        let other = eased_line(2, Vec3::new(100.0, 0.0, 0.0), 1.0, window);
        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::IDENTITY));
        let avatar = MovementAvatar::default();

        warper.tick(&TickInput::playing(&clip, 0.1, 0.2, 0.1), &avatar, &EmptyScene);
        assert_eq!(warper.modifiers()[0].key().clip, ClipId(1));
        warper.tick(&TickInput::playing(&other, 0.2, 0.3, 0.1), &avatar, &EmptyScene);
        assert_eq!(warper.modifiers().len(), 1);
        assert_eq!(warper.modifiers()[0].key().clip, ClipId(2));

        warper.tick(&TickInput::idle(Transform::IDENTITY, 0.1), &avatar, &EmptyScene);
        assert!(warper.modifiers().is_empty());
    }

    #[test]
    fn test_scrub_backwards_removes_modifier() {
        let window = warp_window(0.4, 0.8, WarpSettings::new("target"));
        let clip = eased_line(1, Vec3::new(100.0, 0.0, 0.0), 1.0, window);
        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::IDENTITY));
        let avatar = MovementAvatar::default();

        warper.tick(&TickInput::playing(&clip, 0.5, 0.6, 0.1), &avatar, &EmptyScene);
        assert!(warper.modifiers()[0].is_active());
        warper.tick(&TickInput::playing(&clip, 0.6, 0.1, 0.1), &avatar, &EmptyScene);
        assert!(warper.modifiers().is_empty());
    }

    #[test]
    fn test_removed_target_disables_modifier() {
        let window = warp_window(0.0, 1.0, WarpSettings::new("target"));
        let clip = eased_line(1, Vec3::new(100.0, 0.0, 0.0), 1.0, window);
        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::from_position(Vec3::new(300.0, 0.0, 0.0))));
        let avatar = MovementAvatar::default();

        let first = warper.tick(&TickInput::playing(&clip, 0.1, 0.2, 0.1), &avatar, &EmptyScene);
        assert!(first.was_warped());
        assert_eq!(warper.remove_warp_target("target"), 1);

        let second = warper.tick(&TickInput::playing(&clip, 0.2, 0.3, 0.1), &avatar, &EmptyScene);
        assert_eq!(warper.modifiers()[0].state(), ModifierState::Disabled);
        assert!(second.events.contains(&WarpEvent::ModifierDeactivated(warper.modifiers()[0].key())));
        assert!(!second.was_warped());
    }

    #[test]
    fn test_unconfigured_window_passes_through() {
        let window = WarpWindowDescriptor::unconfigured(0.0, 1.0).unwrap();
        let clip = eased_line(1, Vec3::new(100.0, 0.0, 0.0), 1.0, window);
        let mut warper = MotionWarper::default();
        let avatar = MovementAvatar::default();

        let output = warper.tick(&TickInput::playing(&clip, 0.1, 0.2, 0.1), &avatar, &EmptyScene);
        assert_eq!(warper.modifiers()[0].state(), ModifierState::Disabled);
        assert!(!output.was_warped());
    }

    #[test]
    fn test_sub_clip_windows_are_scanned() {
        let inner_window = warp_window(0.5, 1.0, WarpSettings::new("target"));
        let inner = eased_line(7, Vec3::new(100.0, 0.0, 0.0), 1.0, inner_window);
        let composite = AnimationClip::new(ClipId(8), "montage", 3.0)
            .with_sub_clip(SubClipSegment::whole(inner, 1.0))
            .into_source();
        let avatar = MovementAvatar::default();

        let mut warper = MotionWarper::default();
        warper.tick(&TickInput::playing(&composite, 1.6, 1.7, 0.1), &avatar, &EmptyScene);
        let key = warper.modifiers()[0].key();
        assert_eq!(key.clip, ClipId(8));
        assert!((key.start_time - 1.5).abs() < 1e-6 && (key.end_time - 2.0).abs() < 1e-6);

        let mut no_search = MotionWarper::new(WarpConfig {
            search_sub_clips: false,
            ..WarpConfig::default()
        })
        .unwrap();
        no_search.tick(&TickInput::playing(&composite, 1.6, 1.7, 0.1), &avatar, &EmptyScene);
        assert!(no_search.modifiers().is_empty());
    }

    #[test]
    fn test_sub_clip_windows_outside_played_range_are_skipped() {
        let inner = AnimationClip::new(ClipId(7), "inner", 1.0)
            .with_root_key(0.0, Transform::IDENTITY)
            .with_root_key(1.0, Transform::from_position(Vec3::new(100.0, 0.0, 0.0)))
            .with_warp_window(warp_window(0.0, 0.3, WarpSettings::new("target")))
            .unwrap()
            .with_warp_window(warp_window(0.3, 0.7, WarpSettings::new("target")))
            .unwrap()
            .into_source();
        let segment = SubClipSegment {
            clip: inner,
            start_position: 1.0,
            clip_start_time: 0.5,
            clip_end_time: 1.0,
            play_rate: 1.0,
        };
        let composite = AnimationClip::new(ClipId(8), "montage", 2.0)
            .with_sub_clip(segment)
            .into_source();
        let avatar = MovementAvatar::default();

        let mut warper = MotionWarper::default();
        warper.tick(&TickInput::playing(&composite, 0.6, 0.7, 0.1), &avatar, &EmptyScene);
        assert!(warper.modifiers().is_empty());

        warper.tick(&TickInput::playing(&composite, 1.0, 1.1, 0.1), &avatar, &EmptyScene);
        assert_eq!(warper.modifiers().len(), 1);
        let key = warper.modifiers()[0].key();
        assert!((key.start_time - 1.0).abs() < 1e-6 && (key.end_time - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_switch_off_pause_and_cancel() {
        let window = warp_window(0.0, 1.0, WarpSettings::new("target"));
        let clip = eased_line(1, Vec3::new(100.0, 0.0, 0.0), 1.0, window);
        let avatar = MovementAvatar::default();

        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::from_position(Vec3::new(300.0, 0.0, 0.0))));
        warper.set_switch_off_evaluator(|_: &SwitchOffContext<'_>| SwitchOffEffects::PAUSE_ROOT_MOTION);
        let frozen = warper.tick(&TickInput::playing(&clip, 0.1, 0.2, 0.1), &avatar, &EmptyScene);
        assert_eq!(frozen.root_motion, Transform::IDENTITY);

        warper.set_switch_off_evaluator(|_: &SwitchOffContext<'_>| SwitchOffEffects::PAUSE_WARP);
        let paused = warper.tick(&TickInput::playing(&clip, 0.2, 0.3, 0.1), &avatar, &EmptyScene);
        assert!(!paused.was_warped());

        warper.set_switch_off_evaluator(|_: &SwitchOffContext<'_>| SwitchOffEffects::CANCEL_WARP);
        let cancelled = warper.tick(&TickInput::playing(&clip, 0.3, 0.4, 0.1), &avatar, &EmptyScene);
        assert!(warper.targets().is_empty());
        assert_eq!(warper.modifiers()[0].state(), ModifierState::Disabled);
        assert!(cancelled.events.iter().any(|event| matches!(event, WarpEvent::TargetSwitchedOff { .. })));
    }

    #[test]
    fn test_switch_off_cancel_follow_freezes() {
        let mut scene = StaticScene::new();
        scene.set_node(NodeId(1), Transform::from_position(Vec3::new(100.0, 0.0, 0.0)));
        let avatar = MovementAvatar::default();
        let mut warper = MotionWarper::default();
        let door = WarpTarget::from_node("door", NodeTracking::new(NodeId(1)).following(true), &scene, Vec3::ZERO).unwrap();
        warper.add_or_update_warp_target(door);
        warper.set_switch_off_evaluator(|_: &SwitchOffContext<'_>| SwitchOffEffects::CANCEL_FOLLOW);

        warper.tick(&TickInput::idle(Transform::IDENTITY, 0.1), &avatar, &scene);
        scene.set_node(NodeId(1), Transform::IDENTITY);
        let resolved = warper.resolve_warp_target("door", &avatar, &scene).unwrap();
        assert!((resolved.position.x - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_modifiers_chain_in_order() {
        let avatar = MovementAvatar::default();
        let clip = AnimationClip::new(ClipId(9), "walk", 1.0)
            .with_root_key(0.0, Transform::IDENTITY)
            .with_root_key(1.0, Transform::from_position(Vec3::new(10.0, 0.0, 0.0)))
            .into_source();
        let mut warper = MotionWarper::default();
        for (start, factor) in [(0.0, 2.0), (0.1, 3.0)] {
            let scale = ScaleSettings {
                scale: Vec3::splat(factor),
            };
            let modifier = RootMotionModifier::new(Arc::clone(&clip), start, 1.0, Some(ModifierConfig::Scale(scale)));
            warper.add_modifier(modifier).unwrap();
        }
        let output = warper.tick(&TickInput::playing(&clip, 0.2, 0.3, 0.1), &avatar, &EmptyScene);
        assert!((output.root_motion.position.x - 6.0).abs() < 1e-4);

        let duplicate = RootMotionModifier::new(Arc::clone(&clip), 0.0, 1.0, None);
        assert!(warper.add_modifier(duplicate).is_err());
        assert_eq!(warper.disable_all_modifiers(), 2);
        assert!(warper.modifiers().iter().all(|modifier| modifier.state() == ModifierState::Disabled));
        assert_eq!(warper.disable_all_modifiers(), 0);
    }

    #[test]
    fn test_disabled_config_and_bad_input_pass_through() {
        let window = warp_window(0.0, 1.0, WarpSettings::new("target"));
        let clip = eased_line(1, Vec3::new(100.0, 0.0, 0.0), 1.0, window);
        let avatar = MovementAvatar::default();

        let mut warper = MotionWarper::new(WarpConfig {
            enabled: false,
            ..WarpConfig::default()
        })
        .unwrap();
        warper.add_or_update_warp_target(WarpTarget::from_transform("target", Transform::from_position(Vec3::new(300.0, 0.0, 0.0))));
        let output = warper.tick(&TickInput::playing(&clip, 0.1, 0.2, 0.1), &avatar, &EmptyScene);
        assert!(!output.was_warped());
        assert!(output.events.is_empty());

        let mut warper = MotionWarper::default();
        let nan = Transform::from_position(Vec3::new(f32::NAN, 0.0, 0.0));
        let input = TickInput::playing(&clip, 0.1, 0.2, 0.1).with_root_motion(nan);
        let output = warper.tick(&input, &avatar, &EmptyScene);
        assert!(output.root_motion.position.x.is_nan());
        assert!(warper.modifiers().is_empty());
    }

    #[test]
    fn test_constant_rate_turn_is_rate_limited() {
        let settings = WarpSettings {
            rotation_method: RotationMethod::ConstantRate,
            max_rotation_rate: 90.0,
            warp_translation: false,
            ..WarpSettings::new("target")
        };
        let clip = eased_line(1, Vec3::new(100.0, 0.0, 0.0), 1.0, warp_window(0.0, 1.0, settings));
        let mut warper = MotionWarper::default();
        warper.add_or_update_warp_target(WarpTarget::from_location_rotation(
            "target",
            Vec3::ZERO,
            Quat::from_rotation_z(std::f32::consts::PI * 0.75),
        ));
        let avatar = MovementAvatar::default();
        let output = warper.tick(&TickInput::playing(&clip, 0.0, 0.1, 0.1), &avatar, &EmptyScene);
        let angle = output.root_motion.rotation.angle_between(Quat::IDENTITY);
        assert!((angle - 9.0f32.to_radians()).abs() < 1e-3, "angle {angle}");
    }
}
