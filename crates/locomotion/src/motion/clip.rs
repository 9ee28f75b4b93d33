//! Baked motion clip data: speed and cumulative-rotation curves for
//! curve-driven starts, stops and turns.

use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::curve::Curve;
use crate::error::{LocomotionError, Result};

const MIN_TARGET_DURATION: f32 = 1e-4;

/// Which foot is planted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Reflect)]
pub enum FootPhase {
    #[default]
    Left,
    Right,
}

impl FootPhase {
    /// Phase of a two-step loop at the given normalized time.
    pub fn from_cycle(normalized_time: f32) -> Self {
        if normalized_time.rem_euclid(1.0) < 0.5 {
            FootPhase::Left
        } else {
            FootPhase::Right
        }
    }
}

/// Direction of desired motion relative to current facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Reflect)]
pub enum MotionDirection {
    Forward,
    Left,
    Right,
    Back,
    BackLeft,
    BackRight,
}

impl MotionDirection {
    /// Five-way bucket used for start clips. `relative_yaw` is in degrees,
    /// positive to the right.
    pub fn start_bucket(relative_yaw: f32) -> Self {
        let a = crate::motion::smoothing::delta_angle(0.0, relative_yaw);
        if a.abs() <= 45.0 {
            MotionDirection::Forward
        } else if (45.0..=135.0).contains(&a) {
            MotionDirection::Right
        } else if (-135.0..=-45.0).contains(&a) {
            MotionDirection::Left
        } else if a > 0.0 {
            MotionDirection::BackRight
        } else {
            MotionDirection::BackLeft
        }
    }

    /// Four-way bucket used for dodges.
    pub fn cardinal_bucket(relative_yaw: f32) -> Self {
        let a = crate::motion::smoothing::delta_angle(0.0, relative_yaw);
        if a.abs() <= 45.0 {
            MotionDirection::Forward
        } else if (45.0..=135.0).contains(&a) {
            MotionDirection::Right
        } else if (-135.0..=-45.0).contains(&a) {
            MotionDirection::Left
        } else {
            MotionDirection::Back
        }
    }
}

/// Playback speed that stretches a clip of `clip_duration` to `target_duration`.
///
/// Near-zero targets fall back to 1.
pub fn playback_speed_for(clip_duration: f32, target_duration: f32) -> f32 {
    if target_duration.abs() < MIN_TARGET_DURATION || clip_duration <= 0.0 {
        warn!(
            "Cannot fit clip of {:.3}s into {:.5}s, using playback speed 1",
            clip_duration, target_duration
        );
        return 1.0;
    }
    clip_duration / target_duration
}

fn default_playback_speed() -> f32 {
    1.0
}

/// Baked root motion for a start/stop/turn clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionClipData {
    /// Animation clip to play
    pub clip: String,
    /// Root speed (m/s) over clip seconds
    pub speed: Curve,
    /// Cumulative yaw (degrees) over clip seconds
    pub rotation: Curve,
    #[serde(default = "default_playback_speed")]
    pub playback_speed: f32,
    /// Foot planted at the end of the clip
    #[serde(default)]
    pub end_phase: FootPhase,
    /// Clip time after which the authored turn is complete
    #[serde(default)]
    pub rotation_finished_time: f32,
    /// Optional wall-clock duration to fit the clip into
    #[serde(default)]
    pub target_duration: Option<f32>,
}

impl MotionClipData {
    pub fn new(clip: impl Into<String>, speed: Curve, rotation: Curve) -> Self {
        Self {
            clip: clip.into(),
            speed,
            rotation,
            playback_speed: 1.0,
            end_phase: FootPhase::Left,
            rotation_finished_time: 0.0,
            target_duration: None,
        }
    }

    pub fn with_end_phase(mut self, phase: FootPhase) -> Self {
        self.end_phase = phase;
        self
    }

    pub fn with_rotation_finished_time(mut self, time: f32) -> Self {
        self.rotation_finished_time = time;
        self
    }

    pub fn with_playback_speed(mut self, speed: f32) -> Self {
        self.playback_speed = speed;
        self
    }

    /// Clip length in seconds, from the longest curve.
    pub fn duration(&self) -> f32 {
        self.speed.end_time().max(self.rotation.end_time())
    }

    /// Effective playback speed, honouring `target_duration` when set.
    pub fn resolved_playback_speed(&self) -> f32 {
        match self.target_duration {
            Some(target) => playback_speed_for(self.duration(), target),
            None if self.playback_speed > 0.0 => self.playback_speed,
            None => 1.0,
        }
    }

    /// Clip time reached after `state_time` seconds in the state.
    pub fn clip_time(&self, state_time: f32) -> f32 {
        state_time * self.resolved_playback_speed()
    }

    /// Wall-clock seconds until the clip completes.
    pub fn wall_duration(&self) -> f32 {
        self.duration() / self.resolved_playback_speed()
    }

    /// Wall-clock time after which the turn is complete.
    pub fn wall_rotation_finished_time(&self) -> f32 {
        self.rotation_finished_time / self.resolved_playback_speed()
    }

    pub fn is_finished(&self, state_time: f32) -> bool {
        self.clip_time(state_time) >= self.duration()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || !self.rotation.is_finite() {
            return Err(LocomotionError::InvalidClipData {
                clip: self.clip.clone(),
                reason: "curve contains non-finite keys".into(),
            });
        }
        if self.playback_speed < 0.0 {
            return Err(LocomotionError::InvalidClipData {
                clip: self.clip.clone(),
                reason: format!("negative playback speed {}", self.playback_speed),
            });
        }
        Ok(())
    }
}
