//! Animation clips as root-motion sources
//!
//! The engine only needs a narrow view of clip playback: accumulated root
//! motion over a time range, root/bone transforms at a time, and the warp
//! windows annotated on the timeline. [`RootMotionSource`] is that contract;
//! [`AnimationClip`] is a keyframed implementation of it.

use std::fmt;
use std::sync::Arc;

use odeza_core::Transform;
use odeza_core::math::inverse_lerp;
use serde::{Deserialize, Serialize};

use crate::modifier::ModifierConfig;
use crate::{WarpError, WarpResult};

/// Clip identifier, compared to decide whether a window's clip is still playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipId(pub u64);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip#{}", self.0)
    }
}

/// Timeline provider consumed by the warping engine
pub trait RootMotionSource: Send + Sync + fmt::Debug {
    /// Stable identity of this clip
    fn clip_id(&self) -> ClipId;

    /// Human-readable name for diagnostics
    fn name(&self) -> &str;

    /// Playable length in seconds
    fn length(&self) -> f32;

    /// Accumulated root motion from `start` to `end`, in the root's space at `start`
    fn extract_root_motion(&self, start: f32, end: f32) -> Transform;

    /// Component-space root transform at `time`
    fn root_transform_at(&self, time: f32) -> Transform;

    /// Component-space transform of a named bone at `time`
    fn bone_transform_at(&self, bone: &str, time: f32) -> Option<Transform>;

    /// Warp windows annotated directly on this clip
    fn warp_windows(&self) -> &[WarpWindowDescriptor];

    /// Segments of other clips played inside this one
    fn sub_clips(&self) -> &[SubClipSegment] {
        &[]
    }
}

/// A timed warp annotation on a clip timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpWindowDescriptor {
    /// Window start in clip time
    pub start_time: f32,
    /// Window end in clip time
    pub end_time: f32,
    /// Algorithm used by modifiers spawned for this window
    #[serde(default)]
    pub modifier: Option<ModifierConfig>,
}

impl WarpWindowDescriptor {
    /// Create a window with an algorithm
    pub fn new(start_time: f32, end_time: f32, modifier: ModifierConfig) -> WarpResult<Self> {
        let window = Self {
            start_time,
            end_time,
            modifier: Some(modifier),
        };
        window.validate()?;
        Ok(window)
    }

    /// Create a window that carries no algorithm
    pub fn unconfigured(start_time: f32, end_time: f32) -> WarpResult<Self> {
        let window = Self {
            start_time,
            end_time,
            modifier: None,
        };
        window.validate()?;
        Ok(window)
    }

    /// Check that the window bounds are usable
    pub fn validate(&self) -> WarpResult<()> {
        if !self.start_time.is_finite() || !self.end_time.is_finite() || self.end_time < self.start_time {
            return Err(WarpError::InvalidWindow {
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(())
    }

    /// Window bounds clamped to a clip of `length` seconds
    pub fn clamped(&self, length: f32) -> (f32, f32) {
        (
            self.start_time.clamp(0.0, length.max(0.0)),
            self.end_time.clamp(0.0, length.max(0.0)),
        )
    }
}

/// A range of another clip played inside a composite clip
#[derive(Debug, Clone)]
pub struct SubClipSegment {
    /// The referenced clip
    pub clip: Arc<dyn RootMotionSource>,
    /// Where the segment starts on the composite timeline
    pub start_position: f32,
    /// First played time of the referenced clip
    pub clip_start_time: f32,
    /// Last played time of the referenced clip
    pub clip_end_time: f32,
    /// Playback rate of the referenced clip inside the segment
    pub play_rate: f32,
}

impl SubClipSegment {
    /// Segment playing `clip` from its start to its end at rate 1
    pub fn whole(clip: Arc<dyn RootMotionSource>, start_position: f32) -> Self {
        let clip_end_time = clip.length();
        Self {
            clip,
            start_position,
            clip_start_time: 0.0,
            clip_end_time,
            play_rate: 1.0,
        }
    }

    /// Convert a time of the referenced clip into composite time
    pub fn to_composite_time(&self, local_time: f32) -> f32 {
        let rate = if self.play_rate.abs() > f32::EPSILON { self.play_rate } else { 1.0 };
        (local_time - self.clip_start_time) / rate + self.start_position
    }

    /// Composite range of the part of an inner window this segment plays, if any
    pub fn composite_window(&self, start: f32, end: f32) -> Option<(f32, f32)> {
        let start = start.max(self.clip_start_time);
        let end = end.min(self.clip_end_time);
        if end <= start {
            return None;
        }
        let (first, last) = (self.to_composite_time(start), self.to_composite_time(end));
        Some((first.min(last), first.max(last)))
    }
}

/// Time-stamped transform key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformKey {
    pub time: f32,
    pub transform: Transform,
}

impl TransformKey {
    pub fn new(time: f32, transform: Transform) -> Self {
        Self { time, transform }
    }
}

/// Component-space track for a single bone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneTrack {
    pub bone_name: String,
    pub keys: Vec<TransformKey>,
}

/// Serialized clip description, as authored in scenario files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipAsset {
    pub name: String,
    pub duration: f32,
    #[serde(default)]
    pub root_keys: Vec<TransformKey>,
    #[serde(default)]
    pub bone_tracks: Vec<BoneTrack>,
    #[serde(default)]
    pub warp_windows: Vec<WarpWindowDescriptor>,
}

/// Keyframed animation clip
#[derive(Debug, Clone)]
pub struct AnimationClip {
    id: ClipId,
    name: String,
    duration: f32,
    root_track: Vec<TransformKey>,
    bone_tracks: Vec<BoneTrack>,
    warp_windows: Vec<WarpWindowDescriptor>,
    sub_clips: Vec<SubClipSegment>,
}

impl AnimationClip {
    /// Create an empty clip with no root motion
    pub fn new(id: ClipId, name: impl Into<String>, duration: f32) -> Self {
        Self {
            id,
            name: name.into(),
            duration: duration.max(0.0),
            root_track: Vec::new(),
            bone_tracks: Vec::new(),
            warp_windows: Vec::new(),
            sub_clips: Vec::new(),
        }
    }

    /// Build a clip from an authored asset
    pub fn from_asset(id: ClipId, asset: ClipAsset) -> WarpResult<Self> {
        let mut clip = Self::new(id, asset.name, asset.duration).with_root_keys(asset.root_keys)?;
        for track in asset.bone_tracks {
            clip = clip.with_bone_track(track)?;
        }
        for window in asset.warp_windows {
            clip = clip.with_warp_window(window)?;
        }
        Ok(clip)
    }

    /// Insert a root key, replacing any key at the same time
    pub fn with_root_key(mut self, time: f32, transform: Transform) -> Self {
        let index = self.root_track.partition_point(|key| key.time < time);
        match self.root_track.get_mut(index) {
            Some(existing) if existing.time == time => existing.transform = transform,
            _ => self.root_track.insert(index, TransformKey::new(time, transform)),
        }
        self
    }

    /// Replace the root track; keys must be finite and strictly increasing in time
    pub fn with_root_keys(mut self, keys: Vec<TransformKey>) -> WarpResult<Self> {
        validate_keys(&self.name, &keys)?;
        self.root_track = keys;
        Ok(self)
    }

    /// Add a bone track
    pub fn with_bone_track(mut self, track: BoneTrack) -> WarpResult<Self> {
        validate_keys(&track.bone_name, &track.keys)?;
        self.bone_tracks.push(track);
        Ok(self)
    }

    /// Annotate a warp window
    pub fn with_warp_window(mut self, window: WarpWindowDescriptor) -> WarpResult<Self> {
        window.validate()?;
        self.warp_windows.push(window);
        Ok(self)
    }

    /// Embed a segment of another clip
    pub fn with_sub_clip(mut self, segment: SubClipSegment) -> Self {
        self.sub_clips.push(segment);
        self
    }

    /// Shared handle usable as a timeline provider
    pub fn into_source(self) -> Arc<dyn RootMotionSource> {
        Arc::new(self)
    }
}

impl RootMotionSource for AnimationClip {
    fn clip_id(&self) -> ClipId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn length(&self) -> f32 {
        self.duration
    }

    fn extract_root_motion(&self, start: f32, end: f32) -> Transform {
        let from = self.root_transform_at(start);
        let to = self.root_transform_at(end);
        from.delta_to(&to).normalized()
    }

    fn root_transform_at(&self, time: f32) -> Transform {
        sample_keys(&self.root_track, time.clamp(0.0, self.duration))
    }

    fn bone_transform_at(&self, bone: &str, time: f32) -> Option<Transform> {
        self.bone_tracks
            .iter()
            .find(|track| track.bone_name == bone)
            .map(|track| sample_keys(&track.keys, time.clamp(0.0, self.duration)))
    }

    fn warp_windows(&self) -> &[WarpWindowDescriptor] {
        &self.warp_windows
    }

    fn sub_clips(&self) -> &[SubClipSegment] {
        &self.sub_clips
    }
}

fn validate_keys(track: &str, keys: &[TransformKey]) -> WarpResult<()> {
    for key in keys {
        if !key.time.is_finite() || !key.transform.is_finite() {
            return Err(WarpError::InvalidKeyframes(format!("{track}: non-finite key at {}", key.time)));
        }
    }
    if let Some(pair) = keys.windows(2).find(|pair| pair[1].time <= pair[0].time) {
        return Err(WarpError::InvalidKeyframes(format!(
            "{track}: key at {} does not follow {}",
            pair[1].time, pair[0].time
        )));
    }
    Ok(())
}

fn sample_keys(keys: &[TransformKey], time: f32) -> Transform {
    match keys {
        [] => Transform::IDENTITY,
        [only] => only.transform,
        _ => {
            let index = keys.partition_point(|key| key.time <= time);
            if index == 0 {
                return keys[0].transform;
            }
            if index >= keys.len() {
                return keys[keys.len() - 1].transform;
            }
            let a = &keys[index - 1];
            let b = &keys[index];
            a.transform.lerp(&b.transform, inverse_lerp(a.time, b.time, time))
        }
    }
}
