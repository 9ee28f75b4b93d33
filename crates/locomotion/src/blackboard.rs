//! # Runtime Data
//!
//! The per-character blackboard shared by every component of a frame.
//!
//! Each field group has one writer phase per frame:
//! - input, view, intents, tier, aim and stamina: the intent pipeline
//! - grounded flag, air time and pose: the controller's physics sync
//! - vertical and horizontal velocity, rotation: the motion driver
//! - active state ids: the state machines
//!
//! Intents are one-shot. They are written by the intent pipeline, read by
//! interceptors and states, then cleared at the end of the frame.

use bevy::math::{Quat, Vec2, Vec3};
use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};

use crate::facade::{PlayOptions, VaultObstacleInfo};
use crate::input::InputFrame;
use crate::motion::clip::FootPhase;
use crate::motion::smoothing::yaw_of;
use crate::state::body::BodyStateId;
use crate::state::upper::UpperStateId;

/// Discrete movement speed class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize, Reflect,
)]
pub enum LocomotionTier {
    #[default]
    Idle,
    Walk,
    Jog,
    Sprint,
}

/// Which vault the arbitration chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Reflect)]
pub enum VaultKind {
    Low,
    High,
}

/// One-shot semantic decisions for the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Intents {
    pub wants_to_jump: bool,
    pub wants_to_double_jump: bool,
    pub wants_to_vault: bool,
    pub wants_to_dodge: bool,
    pub wants_to_roll: bool,
    pub wants_to_attack: bool,
}

impl Intents {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn any(&self) -> bool {
        *self != Self::default()
    }
}

/// Per-character blackboard.
#[derive(Debug, Clone)]
pub struct RuntimeData {
    // Input
    pub input: InputFrame,
    /// Dead-zoned move input, length at most 1
    pub move_input: Vec2,
    pub has_move_input: bool,
    /// Smoothed world-space move direction (last non-zero direction is kept)
    pub move_direction: Vec3,
    /// World yaw the input points at this frame
    pub desired_move_yaw: f32,

    // View
    pub authority_yaw: f32,
    pub authority_pitch: f32,
    pub authority_rotation: Quat,

    // Locomotion
    pub tier: LocomotionTier,
    /// Last tier with move input, used to pick stop clips
    pub last_moving_tier: LocomotionTier,
    pub is_running: bool,
    pub intents: Intents,
    pub vault_kind: Option<VaultKind>,
    pub vault_obstacle: Option<VaultObstacleInfo>,

    // Aim
    pub is_aiming: bool,
    pub aim_release_timer: f32,

    // Stamina
    pub stamina: f32,
    pub max_stamina: f32,
    pub is_stamina_depleted: bool,
    /// Seconds since sprinting last drained stamina
    pub stamina_regen_timer: f32,

    // Physics
    pub is_grounded: bool,
    pub air_time: f32,
    /// Air time of the most recent landing
    pub landed_air_time: f32,
    pub vertical_velocity: f32,
    pub horizontal_velocity: Vec3,
    pub double_jump_used: bool,
    pub position: Vec3,
    pub rotation: Quat,
    pub foot_phase: FootPhase,

    // Equipment
    pub equipped_slot: Option<usize>,
    pub desired_slot: Option<usize>,

    // States
    pub body_state: BodyStateId,
    pub upper_state: UpperStateId,

    next_state_play_options: Option<PlayOptions>,

    /// Frames ticked since attach
    pub frame: u64,
}

impl RuntimeData {
    pub fn new(max_stamina: f32) -> Self {
        Self {
            input: InputFrame::default(),
            move_input: Vec2::ZERO,
            has_move_input: false,
            move_direction: Vec3::ZERO,
            desired_move_yaw: 0.0,
            authority_yaw: 0.0,
            authority_pitch: 0.0,
            authority_rotation: Quat::IDENTITY,
            tier: LocomotionTier::Idle,
            last_moving_tier: LocomotionTier::Jog,
            is_running: false,
            intents: Intents::default(),
            vault_kind: None,
            vault_obstacle: None,
            is_aiming: false,
            aim_release_timer: 0.0,
            stamina: max_stamina,
            max_stamina,
            is_stamina_depleted: false,
            stamina_regen_timer: 0.0,
            is_grounded: true,
            air_time: 0.0,
            landed_air_time: 0.0,
            vertical_velocity: 0.0,
            horizontal_velocity: Vec3::ZERO,
            double_jump_used: false,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            foot_phase: FootPhase::Left,
            equipped_slot: None,
            desired_slot: None,
            body_state: BodyStateId::Idle,
            upper_state: UpperStateId::Idle,
            next_state_play_options: None,
            frame: 0,
        }
    }

    /// Current facing yaw of the body.
    pub fn facing_yaw(&self) -> f32 {
        yaw_of(self.rotation)
    }

    /// A slot is requested that is not equipped yet.
    pub fn equip_pending(&self) -> bool {
        self.desired_slot.is_some() && self.desired_slot != self.equipped_slot
    }

    /// Holstering is requested while something is equipped.
    pub fn unequip_pending(&self) -> bool {
        self.desired_slot.is_none() && self.equipped_slot.is_some()
    }

    /// Hand play options to whichever state enters next.
    pub fn set_next_state_play_options(&mut self, options: PlayOptions) {
        self.next_state_play_options = Some(options);
    }

    /// Take the pending play options; only the first reader sees them.
    pub fn take_next_state_play_options(&mut self) -> Option<PlayOptions> {
        self.next_state_play_options.take()
    }

    pub fn has_next_state_play_options(&self) -> bool {
        self.next_state_play_options.is_some()
    }

    /// End-of-frame clear of one-shot intents and their payloads.
    pub fn clear_consumed_intents(&mut self) {
        self.intents.clear();
        self.vault_kind = None;
        self.vault_obstacle = None;
    }
}

impl Default for RuntimeData {
    fn default() -> Self {
        Self::new(100.0)
    }
}
