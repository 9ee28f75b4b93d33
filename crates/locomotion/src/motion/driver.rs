//! # Motion Driver
//!
//! Turns the active state's motion source into one displacement and one
//! rotation per frame, applied to the [`CharacterBody`].
//!
//! ## Modes
//! - `Stationary`: decelerate in place
//! - `Input`: turn toward the input direction, move at the tier speed
//! - `Strafe`: face the authority yaw, move along the input direction
//! - `Curve`: baked speed and rotation curves
//! - `Mixed`: `Curve` until the clip's turn is finished, then `Input`
//! - `Warped`: motion warping toward runtime anchors
//!
//! Vertical velocity is integrated separately in every mode except `Warped`.

use bevy::math::{Quat, Vec3};
use tracing::{trace, warn};

use crate::blackboard::RuntimeData;
use crate::config::{LocomotionConfig, MovementConfig};
use crate::facade::CharacterBody;
use crate::motion::clip::MotionClipData;
use crate::motion::smoothing::{
    damp_rotation, direction_from_yaw, smooth_damp, smooth_damp_angle, yaw_of, yaw_rotation,
};
use crate::motion::warp::{MotionWarper, WarpedMotionData};

/// How horizontal motion is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveMode {
    Stationary,
    Input,
    Strafe,
    Curve,
    Mixed,
    Warped,
}

#[derive(Debug, Clone)]
struct ClipDrive {
    clip: MotionClipData,
    entry_rotation: Quat,
}

#[derive(Debug, Clone)]
struct WarpDrive {
    data: WarpedMotionData,
    warper: MotionWarper,
}

#[derive(Debug, Clone)]
enum Drive {
    Stationary,
    Input,
    Strafe,
    Curve(ClipDrive),
    Mixed(ClipDrive),
    Warped(Box<WarpDrive>),
}

/// Result of one driver step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    pub displacement: Vec3,
    pub rotation: Quat,
    /// Mode that actually produced the motion (`Mixed` resolves to `Curve` or `Input`)
    pub mode: DriveMode,
}

/// Per-character motion integrator.
#[derive(Debug, Clone)]
pub struct MotionDriver {
    drive: Drive,
    facing_yaw: f32,
    yaw_velocity: f32,
    speed: f32,
    speed_velocity: f32,
    /// Direction of horizontal travel
    heading: Vec3,
    rotation: Quat,
    last_step: Option<MotionStep>,
}

impl Default for MotionDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionDriver {
    pub fn new() -> Self {
        Self {
            drive: Drive::Stationary,
            facing_yaw: 0.0,
            yaw_velocity: 0.0,
            speed: 0.0,
            speed_velocity: 0.0,
            heading: Vec3::Z,
            rotation: Quat::IDENTITY,
            last_step: None,
        }
    }

    /// Sync facing with the body and drop all momentum.
    pub fn reset(&mut self, rotation: Quat) {
        *self = Self::new();
        self.rotation = rotation;
        self.facing_yaw = yaw_of(rotation);
        self.heading = direction_from_yaw(self.facing_yaw);
    }

    pub fn mode(&self) -> DriveMode {
        match self.drive {
            Drive::Stationary => DriveMode::Stationary,
            Drive::Input => DriveMode::Input,
            Drive::Strafe => DriveMode::Strafe,
            Drive::Curve(_) => DriveMode::Curve,
            Drive::Mixed(_) => DriveMode::Mixed,
            Drive::Warped(_) => DriveMode::Warped,
        }
    }

    /// Mode that will produce motion at `state_time`.
    pub fn active_mode(&self, state_time: f32) -> DriveMode {
        match &self.drive {
            Drive::Mixed(drive) => {
                let clip = &drive.clip;
                if clip.clip_time(state_time) < clip.rotation_finished_time {
                    DriveMode::Curve
                } else {
                    DriveMode::Input
                }
            }
            _ => self.mode(),
        }
    }

    /// Switch to a mode that needs no motion data.
    pub fn set_mode(&mut self, mode: DriveMode) {
        self.drive = match mode {
            DriveMode::Stationary => Drive::Stationary,
            DriveMode::Input => Drive::Input,
            DriveMode::Strafe => Drive::Strafe,
            DriveMode::Curve | DriveMode::Mixed | DriveMode::Warped => {
                warn!("{:?} drive needs motion data, falling back to Input", mode);
                Drive::Input
            }
        };
    }

    /// Drive from a baked clip, starting from `entry_rotation`.
    pub fn set_clip(&mut self, clip: MotionClipData, mode: DriveMode, entry_rotation: Quat) {
        let drive = ClipDrive {
            clip,
            entry_rotation,
        };
        self.drive = match mode {
            DriveMode::Mixed => Drive::Mixed(drive),
            DriveMode::Curve => Drive::Curve(drive),
            other => {
                warn!("Clip drive requested with {:?}, using Curve", other);
                Drive::Curve(drive)
            }
        };
    }

    /// Start warping a baked clip toward `targets` (empty plays it unwarped).
    pub fn begin_warp(
        &mut self,
        data: WarpedMotionData,
        entry_position: Vec3,
        entry_rotation: Quat,
        targets: &[Vec3],
    ) {
        let warper = MotionWarper::begin(&data, entry_position, entry_rotation, targets);
        self.rotation = entry_rotation;
        self.facing_yaw = yaw_of(entry_rotation);
        self.drive = Drive::Warped(Box::new(WarpDrive { data, warper }));
    }

    /// Normalized time of the active warp.
    pub fn warp_progress(&self) -> Option<f32> {
        match &self.drive {
            Drive::Warped(warp) => Some(warp.warper.normalized_time()),
            _ => None,
        }
    }

    /// Hand IK weight of the active warp at its current time.
    pub fn warp_hand_ik_weight(&self) -> Option<f32> {
        match &self.drive {
            Drive::Warped(warp) => Some(
                warp.data
                    .hand_ik_weight
                    .evaluate(warp.warper.normalized_time())
                    .clamp(0.0, 1.0),
            ),
            _ => None,
        }
    }

    /// Drop clip and warp data.
    pub fn clear(&mut self) {
        self.drive = Drive::Stationary;
    }

    /// Set an upward launch velocity (jumps).
    pub fn launch(&mut self, data: &mut RuntimeData, velocity: f32) {
        data.vertical_velocity = velocity;
    }

    pub fn facing_yaw(&self) -> f32 {
        self.facing_yaw
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn last_step(&self) -> Option<MotionStep> {
        self.last_step
    }

    /// Compute and apply this frame's motion.
    pub fn step(
        &mut self,
        data: &mut RuntimeData,
        config: &LocomotionConfig,
        body: &mut dyn CharacterBody,
        state_time: f32,
        dt: f32,
    ) -> MotionStep {
        if dt <= 0.0 {
            return MotionStep {
                displacement: Vec3::ZERO,
                rotation: self.rotation,
                mode: self.mode(),
            };
        }
        if let Drive::Warped(warp) = &mut self.drive {
            let normalized = (state_time / warp.data.duration).clamp(0.0, 1.0);
            let warp_step = warp.warper.advance(&warp.data, normalized);
            return self.apply_warp_step(data, body, warp_step.displacement, warp_step.rotation, dt);
        }

        let movement = &config.movement;
        let mode = self.active_mode(state_time);
        let horizontal = match mode {
            DriveMode::Curve => self.curve_motion(state_time, movement, dt),
            DriveMode::Input => self.input_motion(data, movement, dt),
            DriveMode::Strafe => self.strafe_motion(data, movement, dt),
            _ => {
                self.damp_speed(0.0, movement, dt);
                self.heading * self.speed
            }
        };

        integrate_vertical(data, movement, dt);
        let displacement = (horizontal + Vec3::Y * data.vertical_velocity) * dt;
        body.move_by(displacement);
        body.set_rotation(self.rotation);

        data.horizontal_velocity = horizontal;
        data.rotation = self.rotation;
        data.position = body.position();

        trace!(
            "Motion {:?}: speed {:.2} yaw {:.1} vv {:.2}",
            mode,
            self.speed,
            self.facing_yaw,
            data.vertical_velocity
        );
        let step = MotionStep {
            displacement,
            rotation: self.rotation,
            mode,
        };
        self.last_step = Some(step);
        step
    }

    fn input_motion(&mut self, data: &RuntimeData, movement: &MovementConfig, dt: f32) -> Vec3 {
        let mut target_speed = 0.0;
        if data.has_move_input {
            self.facing_yaw = smooth_damp_angle(
                self.facing_yaw,
                data.desired_move_yaw,
                &mut self.yaw_velocity,
                movement.turn_smooth_time,
                movement.max_turn_rate,
                dt,
            );
            target_speed = movement.speed_for(data.tier);
            if !data.is_grounded {
                target_speed *= movement.air_control;
            }
        }
        self.rotation = yaw_rotation(self.facing_yaw);
        self.heading = direction_from_yaw(self.facing_yaw);
        self.damp_speed(target_speed, movement, dt);
        self.heading * self.speed
    }

    fn strafe_motion(&mut self, data: &RuntimeData, movement: &MovementConfig, dt: f32) -> Vec3 {
        self.facing_yaw = smooth_damp_angle(
            self.facing_yaw,
            data.authority_yaw,
            &mut self.yaw_velocity,
            movement.turn_smooth_time,
            movement.max_turn_rate,
            dt,
        );
        self.rotation = yaw_rotation(self.facing_yaw);

        let mut target_speed = 0.0;
        if data.has_move_input {
            if let Some(direction) = data.move_direction.try_normalize() {
                self.heading = direction;
            }
            target_speed = movement.aim_speed * data.move_input.length().min(1.0);
        }
        self.damp_speed(target_speed, movement, dt);
        self.heading * self.speed
    }

    fn curve_motion(&mut self, state_time: f32, movement: &MovementConfig, dt: f32) -> Vec3 {
        let (target_rotation, curve_speed) = match &self.drive {
            Drive::Curve(drive) | Drive::Mixed(drive) => {
                let clip = &drive.clip;
                let t = clip.clip_time(state_time);
                (
                    drive.entry_rotation * yaw_rotation(clip.rotation.evaluate(t)),
                    clip.speed.evaluate(t) * clip.resolved_playback_speed(),
                )
            }
            _ => return self.heading * self.speed,
        };

        self.rotation = damp_rotation(
            self.rotation,
            target_rotation,
            movement.curve_rotation_sharpness,
            dt,
        );
        self.facing_yaw = yaw_of(self.rotation);
        self.yaw_velocity = 0.0;
        self.heading = direction_from_yaw(self.facing_yaw);
        // Seed the speed spring so a later switch to Input is continuous
        self.speed = curve_speed;
        self.speed_velocity = 0.0;
        self.heading * self.speed
    }

    fn apply_warp_step(
        &mut self,
        data: &mut RuntimeData,
        body: &mut dyn CharacterBody,
        displacement: Vec3,
        rotation: Quat,
        dt: f32,
    ) -> MotionStep {
        self.rotation = rotation;
        self.facing_yaw = yaw_of(rotation);
        self.yaw_velocity = 0.0;

        let horizontal = Vec3::new(displacement.x, 0.0, displacement.z) / dt;
        self.speed = horizontal.length();
        self.speed_velocity = 0.0;
        if let Some(heading) = horizontal.try_normalize() {
            self.heading = heading;
        }

        data.vertical_velocity = 0.0;
        body.move_by(displacement);
        body.set_rotation(rotation);
        data.horizontal_velocity = horizontal;
        data.rotation = rotation;
        data.position = body.position();

        let step = MotionStep {
            displacement,
            rotation,
            mode: DriveMode::Warped,
        };
        self.last_step = Some(step);
        step
    }

    fn damp_speed(&mut self, target: f32, movement: &MovementConfig, dt: f32) {
        self.speed = smooth_damp(
            self.speed,
            target,
            &mut self.speed_velocity,
            movement.speed_smooth_time,
            f32::INFINITY,
            dt,
        )
        .max(0.0);
    }
}

/// Stick to the ground while grounded and descending, otherwise fall.
pub fn integrate_vertical(data: &mut RuntimeData, movement: &MovementConfig, dt: f32) {
    if data.is_grounded && data.vertical_velocity <= 0.0 {
        data.vertical_velocity = movement.stick_velocity;
    } else {
        data.vertical_velocity =
            (data.vertical_velocity - movement.gravity * dt).max(-movement.terminal_velocity);
    }
}
