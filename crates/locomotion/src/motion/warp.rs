//! # Motion Warping
//!
//! Rescales a baked clip so its root lands exactly on anchors detected at
//! runtime (ledge tops, landing spots) while keeping the authored
//! acceleration profile.
//!
//! ## Algorithm
//!
//! Warp points split the clip into segments. Each segment stores the local
//! offset the animation itself produces between its bracketing points. When
//! the warp begins, every segment with a runtime target gets a per-axis
//! scale `(target_n - target_{n-1}) / baked_offset_n`, computed once in the
//! entry frame's local space. Axes whose baked offset is near zero cannot be
//! scaled; they keep scale 1 and the part of the target the curve cannot
//! reach is spread linearly over the segment instead.
//!
//! Each frame the local velocity curves are integrated over the frame's
//! normalized-time interval, multiplied by the active segment's scale, and
//! rotated into world space by the entry rotation. When a segment ends, the
//! accumulated offset is snapped to that segment's anchor so float error
//! never builds up across segments.

use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::curve::Curve;
use crate::error::{LocomotionError, Result};
use crate::motion::smoothing::yaw_rotation;

/// Baked offsets smaller than this on an axis are treated as zero.
pub const WARP_AXIS_EPSILON: f32 = 1e-4;

fn default_exit_time() -> f32 {
    1.0
}

/// Anchor in a baked clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpPoint {
    /// Normalized clip time of the anchor
    pub normalized_time: f32,
    /// Local root displacement since the previous warp point (or clip start)
    pub baked_offset: Vec3,
}

impl WarpPoint {
    pub fn new(normalized_time: f32, baked_offset: Vec3) -> Self {
        Self {
            normalized_time,
            baked_offset,
        }
    }
}

/// Baked root motion for a warpable clip (vault, dodge, roll).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpedMotionData {
    pub clip: String,
    /// Baked clip length in seconds
    pub duration: f32,
    /// Time-ordered anchors
    #[serde(default)]
    pub points: Vec<WarpPoint>,
    /// Local root velocity (m/s) per axis over normalized time
    pub velocity_x: Curve,
    pub velocity_y: Curve,
    pub velocity_z: Curve,
    /// Yaw velocity (deg/s) over normalized time
    #[serde(default)]
    pub rotation_velocity: Curve,
    /// Hand IK weight over normalized time
    #[serde(default)]
    pub hand_ik_weight: Curve,
    /// Normalized time at which the owning state may leave
    #[serde(default = "default_exit_time")]
    pub exit_normalized_time: f32,
}

impl WarpedMotionData {
    pub fn new(clip: impl Into<String>, duration: f32) -> Self {
        Self {
            clip: clip.into(),
            duration,
            points: Vec::new(),
            velocity_x: Curve::default(),
            velocity_y: Curve::default(),
            velocity_z: Curve::default(),
            rotation_velocity: Curve::default(),
            hand_ik_weight: Curve::default(),
            exit_normalized_time: 1.0,
        }
    }

    pub fn with_point(mut self, normalized_time: f32, baked_offset: Vec3) -> Self {
        self.points.push(WarpPoint::new(normalized_time, baked_offset));
        self
    }

    pub fn with_velocity(mut self, x: Curve, y: Curve, z: Curve) -> Self {
        self.velocity_x = x;
        self.velocity_y = y;
        self.velocity_z = z;
        self
    }

    pub fn with_rotation_velocity(mut self, curve: Curve) -> Self {
        self.rotation_velocity = curve;
        self
    }

    pub fn with_hand_ik_weight(mut self, curve: Curve) -> Self {
        self.hand_ik_weight = curve;
        self
    }

    /// Local root velocity at normalized time `t`.
    pub fn local_velocity(&self, t: f32) -> Vec3 {
        Vec3::new(
            self.velocity_x.evaluate(t),
            self.velocity_y.evaluate(t),
            self.velocity_z.evaluate(t),
        )
    }

    /// Local displacement the unwarped clip produces over `[t0, t1]`.
    pub fn baked_displacement(&self, t0: f32, t1: f32) -> Vec3 {
        Vec3::new(
            self.velocity_x.integrate(t0, t1),
            self.velocity_y.integrate(t0, t1),
            self.velocity_z.integrate(t0, t1),
        ) * self.duration
    }

    /// Yaw (degrees) the clip turns over `[t0, t1]`.
    pub fn yaw_delta(&self, t0: f32, t1: f32) -> f32 {
        self.rotation_velocity.integrate(t0, t1) * self.duration
    }

    /// Sum of all baked incremental offsets.
    pub fn total_baked_offset(&self) -> Vec3 {
        self.points.iter().map(|p| p.baked_offset).sum()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| LocomotionError::InvalidWarpData {
            clip: self.clip.clone(),
            reason,
        };
        if !(self.duration > 0.0) {
            return Err(invalid(format!("duration must be positive, got {}", self.duration)));
        }
        let mut previous = 0.0;
        for (i, point) in self.points.iter().enumerate() {
            if !(0.0..=1.0).contains(&point.normalized_time) {
                return Err(invalid(format!(
                    "point {} time {} outside [0, 1]",
                    i, point.normalized_time
                )));
            }
            if point.normalized_time < previous {
                return Err(invalid(format!("point {} is out of time order", i)));
            }
            if !point.baked_offset.is_finite() {
                return Err(invalid(format!("point {} has a non-finite offset", i)));
            }
            previous = point.normalized_time;
        }
        let curves = [
            &self.velocity_x,
            &self.velocity_y,
            &self.velocity_z,
            &self.rotation_velocity,
            &self.hand_ik_weight,
        ];
        if curves.iter().any(|c| !c.is_finite()) {
            return Err(invalid("curve contains non-finite keys".into()));
        }
        Ok(())
    }
}

/// Per-axis correction: target over baked, or 1 where the baked offset is ~0.
pub fn axis_scale(target: Vec3, baked: Vec3) -> Vec3 {
    let axis = |t: f32, b: f32| {
        if b.abs() < WARP_AXIS_EPSILON {
            1.0
        } else {
            t / b
        }
    };
    Vec3::new(
        axis(target.x, baked.x),
        axis(target.y, baked.y),
        axis(target.z, baked.z),
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct WarpSegment {
    start: f32,
    end: f32,
    scale: Vec3,
    /// Offset not reachable by scaling, spread linearly over the segment
    residual: Vec3,
    /// Accumulated local offset at the segment end
    end_local: Vec3,
}

/// One frame of warped motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpStep {
    /// World displacement for this frame
    pub displacement: Vec3,
    /// World rotation after this frame
    pub rotation: Quat,
    pub normalized_time: f32,
}

/// Runtime state of one warped clip activation.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionWarper {
    entry_position: Vec3,
    entry_rotation: Quat,
    segments: Vec<WarpSegment>,
    normalized_time: f32,
    accumulated: Vec3,
    yaw: f32,
}

impl MotionWarper {
    /// Start warping `data` from the given entry pose.
    ///
    /// `targets` are world anchors matched to warp points in order. Missing
    /// targets leave their segments unwarped; an empty slice plays the baked
    /// curves unchanged.
    pub fn begin(
        data: &WarpedMotionData,
        entry_position: Vec3,
        entry_rotation: Quat,
        targets: &[Vec3],
    ) -> Self {
        if targets.len() > data.points.len() {
            warn!(
                "Warp '{}' has {} points but {} targets; extra targets ignored",
                data.clip,
                data.points.len(),
                targets.len()
            );
        }

        let to_local = entry_rotation.inverse();
        let mut segments = Vec::with_capacity(data.points.len() + 1);
        let mut start = 0.0_f32;
        let mut previous_target = entry_position;
        let mut cursor = Vec3::ZERO;

        for (i, point) in data.points.iter().enumerate() {
            let end = point.normalized_time.clamp(start, 1.0);
            let curve_offset = data.baked_displacement(start, end);
            let (scale, residual, local_delta) = match targets.get(i) {
                Some(&target) => {
                    let local_delta = to_local * (target - previous_target);
                    previous_target = target;
                    let scale = axis_scale(local_delta, point.baked_offset);
                    (scale, local_delta - scale * curve_offset, local_delta)
                }
                None => (Vec3::ONE, Vec3::ZERO, curve_offset),
            };
            cursor += local_delta;
            trace!(
                "Warp '{}' segment {} [{:.3}, {:.3}] scale {:?}",
                data.clip,
                i,
                start,
                end,
                scale
            );
            segments.push(WarpSegment {
                start,
                end,
                scale,
                residual,
                end_local: cursor,
            });
            start = end;
        }

        // Tail after the last anchor plays as authored
        if start < 1.0 {
            segments.push(WarpSegment {
                start,
                end: 1.0,
                scale: Vec3::ONE,
                residual: Vec3::ZERO,
                end_local: cursor + data.baked_displacement(start, 1.0),
            });
        }

        Self {
            entry_position,
            entry_rotation,
            segments,
            normalized_time: 0.0,
            accumulated: Vec3::ZERO,
            yaw: 0.0,
        }
    }

    /// Advance to `normalized_time` and return this frame's world motion.
    ///
    /// Time only moves forward; earlier times produce a zero step.
    pub fn advance(&mut self, data: &WarpedMotionData, normalized_time: f32) -> WarpStep {
        let t0 = self.normalized_time;
        let t1 = normalized_time.clamp(t0, 1.0);
        let before = self.accumulated;

        for segment in &self.segments {
            if segment.end > t0 && segment.end <= t1 {
                self.accumulated = segment.end_local;
                continue;
            }
            let a = t0.max(segment.start);
            let b = t1.min(segment.end);
            if b > a {
                let length = segment.end - segment.start;
                self.accumulated += segment.scale * data.baked_displacement(a, b)
                    + segment.residual * ((b - a) / length);
            }
        }

        self.yaw += data.yaw_delta(t0, t1);
        self.normalized_time = t1;

        WarpStep {
            displacement: self.entry_rotation * (self.accumulated - before),
            rotation: self.rotation(),
            normalized_time: t1,
        }
    }

    pub fn normalized_time(&self) -> f32 {
        self.normalized_time
    }

    pub fn entry_position(&self) -> Vec3 {
        self.entry_position
    }

    pub fn entry_rotation(&self) -> Quat {
        self.entry_rotation
    }

    /// Current world rotation: entry rotation composed with the clip's turn.
    pub fn rotation(&self) -> Quat {
        self.entry_rotation * yaw_rotation(self.yaw)
    }

    /// World offset from the entry position accumulated so far.
    pub fn cumulative_offset(&self) -> Vec3 {
        self.entry_rotation * self.accumulated
    }

    /// Scale applied to anchor segment `index`.
    pub fn segment_scale(&self, index: usize) -> Option<Vec3> {
        self.segments.get(index).map(|s| s.scale)
    }

    /// Index of the segment containing the current time.
    pub fn active_segment(&self) -> usize {
        self.segments
            .iter()
            .position(|s| self.normalized_time < s.end)
            .unwrap_or(self.segments.len().saturating_sub(1))
    }

    pub fn is_complete(&self) -> bool {
        self.normalized_time >= 1.0
    }
}
