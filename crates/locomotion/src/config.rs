//! # Locomotion Configuration
//!
//! Central, read-only tuning data for the locomotion core: movement speeds,
//! stamina rates, baked motion tables and the ordered interceptor lists.
//!
//! Loaded from RON. Every group uses `#[serde(default)]`, so a config file
//! only needs to name the values it changes.

use std::collections::HashMap;
use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::blackboard::{LocomotionTier, VaultKind};
use crate::error::{LocomotionError, Result};
use crate::ik::IkBackend;
use crate::interrupt::{BodyInterceptorKind, UpperInterceptorKind};
use crate::motion::clip::{FootPhase, MotionClipData, MotionDirection};
use crate::motion::warp::WarpedMotionData;
use crate::state::body::BodyStateId;
use crate::state::upper::UpperStateId;

// ============================================================================
// Main Config
// ============================================================================

/// Locomotion configuration resource.
///
/// Insert this (or let [`LocomotionPlugin`](crate::plugin::LocomotionPlugin)
/// load it) before building controllers.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocomotionConfig {
    /// Tier speeds, turning and gravity
    pub movement: MovementConfig,

    /// Look sensitivity and pitch limits
    pub view: ViewConfig,

    /// Sprint stamina
    pub stamina: StaminaConfig,

    /// Aim debounce
    pub aim: AimConfig,

    /// Jumping and landing
    pub jump: JumpConfig,

    /// Vault detection ranges
    pub vault: VaultConfig,

    /// Equipment slots and attach timing
    pub equipment: EquipmentConfig,

    /// IK backends and blending
    pub ik: IkConfig,

    /// Animation clip names
    pub clips: ClipNames,

    /// Baked motion tables
    pub motion: MotionTables,

    /// Ordered interceptor lists per layer
    pub interceptors: InterceptorLists,

    /// States registered per layer
    pub roster: StateRoster,
}

impl LocomotionConfig {
    /// Parse and validate a RON config.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self =
            ron::from_str(source).map_err(|e| LocomotionError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|source| LocomotionError::ConfigIo {
                path: path.display().to_string(),
                source,
            })?;
        let config = Self::from_ron_str(&contents)?;
        info!("Loaded locomotion config from {}", path.display());
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| LocomotionError::ConfigSerialize(e.to_string()))
    }

    /// Reject values the runtime cannot recover from.
    pub fn validate(&self) -> Result<()> {
        self.movement.validate()?;
        self.view.validate()?;
        self.stamina.validate()?;
        self.equipment.validate()?;
        self.motion.validate()?;

        if self.aim.release_hold < 0.0 {
            return Err(invalid("aim.release_hold must not be negative"));
        }
        if self.jump.jump_velocity < 0.0 || self.jump.double_jump_velocity < 0.0 {
            return Err(invalid("jump velocities must not be negative"));
        }
        if self.vault.low_min_height > self.vault.low_max_height
            || self.vault.high_min_height > self.vault.high_max_height
        {
            return Err(invalid("vault height ranges are inverted"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> LocomotionError {
    LocomotionError::InvalidConfig(message.into())
}

// ============================================================================
// Movement
// ============================================================================

/// Ground speeds, turning and vertical integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct MovementConfig {
    pub walk_speed: f32,
    pub jog_speed: f32,
    pub sprint_speed: f32,
    /// Strafe speed while aiming
    pub aim_speed: f32,
    /// Fraction of ground speed available while airborne
    pub air_control: f32,
    /// Smoothing time for turning toward the input direction (seconds)
    pub turn_smooth_time: f32,
    /// Maximum turn rate (degrees/second)
    pub max_turn_rate: f32,
    /// Smoothing time for horizontal speed changes (seconds)
    pub speed_smooth_time: f32,
    /// Slerp rate hiding jitter in baked rotation curves
    pub curve_rotation_sharpness: f32,
    /// Sharpness of the desired move-direction smoothing
    pub direction_sharpness: f32,
    pub gravity: f32,
    /// Downward velocity held while grounded
    pub stick_velocity: f32,
    pub terminal_velocity: f32,
    /// Stick magnitude below which there is no move input
    pub input_deadzone: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 1.8,
            jog_speed: 3.5,
            sprint_speed: 6.0,
            aim_speed: 2.0,
            air_control: 0.3,
            turn_smooth_time: 0.12,
            max_turn_rate: 720.0,
            speed_smooth_time: 0.1,
            curve_rotation_sharpness: 12.0,
            direction_sharpness: 10.0,
            gravity: 20.0,
            stick_velocity: -2.0,
            terminal_velocity: 50.0,
            input_deadzone: 0.1,
        }
    }
}

impl MovementConfig {
    /// Ground speed for a locomotion tier.
    pub fn speed_for(&self, tier: LocomotionTier) -> f32 {
        match tier {
            LocomotionTier::Idle => 0.0,
            LocomotionTier::Walk => self.walk_speed,
            LocomotionTier::Jog => self.jog_speed,
            LocomotionTier::Sprint => self.sprint_speed,
        }
    }

    fn validate(&self) -> Result<()> {
        let speeds = [self.walk_speed, self.jog_speed, self.sprint_speed, self.aim_speed];
        if speeds.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(invalid("movement speeds must be finite and non-negative"));
        }
        if !(0.0..=1.0).contains(&self.air_control) {
            return Err(invalid("movement.air_control must be within [0, 1]"));
        }
        if self.gravity < 0.0 || self.terminal_velocity <= 0.0 {
            return Err(invalid("gravity must be non-negative and terminal velocity positive"));
        }
        if self.max_turn_rate <= 0.0 {
            return Err(invalid("movement.max_turn_rate must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// View
// ============================================================================

/// Look input integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct ViewConfig {
    /// Degrees per input unit
    pub sensitivity: f32,
    pub invert_pitch: bool,
    pub min_pitch: f32,
    pub max_pitch: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.15,
            invert_pitch: false,
            min_pitch: -70.0,
            max_pitch: 80.0,
        }
    }
}

impl ViewConfig {
    fn validate(&self) -> Result<()> {
        if self.min_pitch > self.max_pitch {
            return Err(invalid(format!(
                "view pitch limits are inverted ({} > {})",
                self.min_pitch, self.max_pitch
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Stamina
// ============================================================================

/// Sprint stamina drain and recovery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct StaminaConfig {
    pub max: f32,
    /// Drain per second while sprinting
    pub drain_rate: f32,
    /// Regeneration per second
    pub regen_rate: f32,
    /// Seconds without sprinting before regeneration starts
    pub regen_delay: f32,
    /// Fraction of max stamina needed to sprint again after depletion
    pub recovery_fraction: f32,
}

impl Default for StaminaConfig {
    fn default() -> Self {
        Self {
            max: 100.0,
            drain_rate: 20.0,
            regen_rate: 15.0,
            regen_delay: 0.5,
            recovery_fraction: 0.2,
        }
    }
}

impl StaminaConfig {
    /// Stamina that must be exceeded to clear depletion.
    pub fn recovery_threshold(&self) -> f32 {
        self.max * self.recovery_fraction
    }

    fn validate(&self) -> Result<()> {
        if self.max <= 0.0 {
            return Err(invalid("stamina.max must be positive"));
        }
        if !(0.0..=1.0).contains(&self.recovery_fraction) {
            return Err(invalid("stamina.recovery_fraction must be within [0, 1]"));
        }
        if self.drain_rate < 0.0 || self.regen_rate < 0.0 || self.regen_delay < 0.0 {
            return Err(invalid("stamina rates must not be negative"));
        }
        Ok(())
    }
}

// ============================================================================
// Aim / Jump / Vault
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct AimConfig {
    /// Seconds aim stays active after the aim control is released
    pub release_hold: f32,
    /// Aiming needs something equipped
    pub requires_equipment: bool,
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            release_hold: 0.25,
            requires_equipment: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct JumpConfig {
    pub jump_velocity: f32,
    pub double_jump_velocity: f32,
    pub double_jump_enabled: bool,
    /// Air time before a grounded state gives way to Fall
    pub min_air_time: f32,
    /// Seconds Land holds before handing back control
    pub land_buffer: f32,
    /// Air time that turns a landing into a hard landing
    pub hard_land_air_time: f32,
    pub hard_land_buffer: f32,
    /// Fade used by the state entered after landing
    pub next_state_fade: f32,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            jump_velocity: 6.0,
            double_jump_velocity: 5.5,
            double_jump_enabled: true,
            min_air_time: 0.15,
            land_buffer: 0.15,
            hard_land_air_time: 0.9,
            hard_land_buffer: 0.4,
            next_state_fade: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct VaultConfig {
    pub low_min_height: f32,
    pub low_max_height: f32,
    pub high_min_height: f32,
    pub high_max_height: f32,
    /// Forward probe distance
    pub reach: f32,
    /// Reject vaults with no ground found beyond the obstacle
    pub require_landing: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            low_min_height: 0.4,
            low_max_height: 1.1,
            high_min_height: 1.1,
            high_max_height: 2.0,
            reach: 1.2,
            require_landing: true,
        }
    }
}

impl VaultConfig {
    pub fn height_range(&self, kind: VaultKind) -> (f32, f32) {
        match kind {
            VaultKind::Low => (self.low_min_height, self.low_max_height),
            VaultKind::High => (self.high_min_height, self.high_max_height),
        }
    }
}

// ============================================================================
// Equipment / IK
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct EquipmentConfig {
    pub slot_count: usize,
    /// Normalized equip-clip time at which the model is attached
    pub attach_normalized_time: f32,
    /// Normalized unequip-clip time at which the model is removed
    pub detach_normalized_time: f32,
    /// Seconds after which Equip finishes without a clip-end event
    pub equip_duration: f32,
    /// Seconds after which Unequip finishes without a clip-end event
    pub unequip_duration: f32,
    /// Seconds after which Attack finishes without a clip-end event
    pub attack_duration: f32,
}

impl Default for EquipmentConfig {
    fn default() -> Self {
        Self {
            slot_count: 4,
            attach_normalized_time: 0.45,
            detach_normalized_time: 0.5,
            equip_duration: 0.8,
            unequip_duration: 0.7,
            attack_duration: 0.9,
        }
    }
}

impl EquipmentConfig {
    fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.attach_normalized_time) || !unit.contains(&self.detach_normalized_time) {
            return Err(invalid("equipment attach/detach times must be within [0, 1]"));
        }
        let durations = [self.equip_duration, self.unequip_duration, self.attack_duration];
        if durations.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(invalid("equipment action durations must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IkConfig {
    /// Weight change per second
    pub blend_speed: f32,
    pub left_hand: IkBackend,
    pub right_hand: IkBackend,
    pub aim_reference: IkBackend,
    pub head_look: IkBackend,
    /// Distance of the aim point along the authority forward
    pub aim_distance: f32,
    /// Height of the view origin above the body position
    pub eye_height: f32,
}

impl Default for IkConfig {
    fn default() -> Self {
        Self {
            blend_speed: 8.0,
            left_hand: IkBackend::Limb { reach: 0.75 },
            right_hand: IkBackend::Limb { reach: 0.75 },
            aim_reference: IkBackend::LookAt { max_angle: 80.0 },
            head_look: IkBackend::LookAt { max_angle: 70.0 },
            aim_distance: 20.0,
            eye_height: 1.6,
        }
    }
}

// ============================================================================
// Clip Names
// ============================================================================

/// Animation clip names played by the states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipNames {
    pub idle: String,
    /// Blend space driven by the local velocity
    pub move_loop: String,
    pub jump: String,
    pub double_jump: String,
    pub fall: String,
    pub land: String,
    pub hard_land: String,
    pub aim_idle: String,
    /// Strafe blend space
    pub aim_move: String,
    pub equip: String,
    pub unequip: String,
    pub aim: String,
    pub attack: String,
}

impl Default for ClipNames {
    fn default() -> Self {
        Self {
            idle: "Idle".into(),
            move_loop: "Locomotion".into(),
            jump: "Jump".into(),
            double_jump: "DoubleJump".into(),
            fall: "Fall".into(),
            land: "Land".into(),
            hard_land: "HardLand".into(),
            aim_idle: "AimIdle".into(),
            aim_move: "AimStrafe".into(),
            equip: "Equip".into(),
            unequip: "Unequip".into(),
            aim: "AimUpper".into(),
            attack: "Attack".into(),
        }
    }
}

// ============================================================================
// Motion Tables
// ============================================================================

/// Left/right foot variants of a stop clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopClips {
    pub left: Option<MotionClipData>,
    pub right: Option<MotionClipData>,
}

impl StopClips {
    /// Clip for the planted foot, falling back to the mirrored one.
    pub fn for_phase(&self, phase: FootPhase) -> Option<&MotionClipData> {
        let (preferred, other) = match phase {
            FootPhase::Left => (&self.left, &self.right),
            FootPhase::Right => (&self.right, &self.left),
        };
        preferred.as_ref().or_else(|| {
            let fallback = other.as_ref();
            if fallback.is_some() {
                warn!("No {:?}-foot stop clip, using the mirrored one", phase);
            }
            fallback
        })
    }
}

/// Baked root-motion data, keyed by tier and direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionTables {
    pub starts: HashMap<LocomotionTier, HashMap<MotionDirection, MotionClipData>>,
    pub stops: HashMap<LocomotionTier, StopClips>,
    pub dodges: HashMap<MotionDirection, WarpedMotionData>,
    pub roll: Option<WarpedMotionData>,
    pub low_vault: Option<WarpedMotionData>,
    pub high_vault: Option<WarpedMotionData>,
}

impl MotionTables {
    /// Start clip for a tier and direction, falling back to Jog, then Forward.
    pub fn start_clip(
        &self,
        tier: LocomotionTier,
        direction: MotionDirection,
    ) -> Option<&MotionClipData> {
        let candidates = [
            (tier, direction),
            (LocomotionTier::Jog, direction),
            (tier, MotionDirection::Forward),
            (LocomotionTier::Jog, MotionDirection::Forward),
        ];
        for (i, (t, d)) in candidates.iter().enumerate() {
            if let Some(clip) = self.starts.get(t).and_then(|table| table.get(d)) {
                if i > 0 {
                    warn!(
                        "No start clip for {:?}/{:?}, falling back to {:?}/{:?}",
                        tier, direction, t, d
                    );
                }
                return Some(clip);
            }
        }
        warn!("No start clip configured for {:?}/{:?}", tier, direction);
        None
    }

    /// Stop clip for a tier and planted foot, falling back to Jog.
    pub fn stop_clip(&self, tier: LocomotionTier, phase: FootPhase) -> Option<&MotionClipData> {
        if let Some(clip) = self.stops.get(&tier).and_then(|s| s.for_phase(phase)) {
            return Some(clip);
        }
        let fallback = self
            .stops
            .get(&LocomotionTier::Jog)
            .and_then(|s| s.for_phase(phase));
        match fallback {
            Some(_) => warn!("No {:?} stop clip, falling back to Jog", tier),
            None => warn!("No stop clip configured for {:?}", tier),
        }
        fallback
    }

    /// Dodge warp for a direction, falling back to Back, then Forward.
    pub fn dodge(&self, direction: MotionDirection) -> Option<&WarpedMotionData> {
        if let Some(data) = self.dodges.get(&direction) {
            return Some(data);
        }
        let fallback = self
            .dodges
            .get(&MotionDirection::Back)
            .or_else(|| self.dodges.get(&MotionDirection::Forward));
        warn!(
            "No {:?} dodge configured, fallback found: {}",
            direction,
            fallback.is_some()
        );
        fallback
    }

    pub fn vault(&self, kind: VaultKind) -> Option<&WarpedMotionData> {
        match kind {
            VaultKind::Low => self.low_vault.as_ref(),
            VaultKind::High => self.high_vault.as_ref(),
        }
    }

    fn validate(&self) -> Result<()> {
        let clips = self
            .starts
            .values()
            .flat_map(|table| table.values())
            .chain(
                self.stops
                    .values()
                    .flat_map(|s| s.left.iter().chain(s.right.iter())),
            );
        for clip in clips {
            clip.validate()?;
        }

        let warps = self
            .dodges
            .values()
            .chain(self.roll.iter())
            .chain(self.low_vault.iter())
            .chain(self.high_vault.iter());
        for warp in warps {
            warp.validate()?;
        }
        Ok(())
    }
}

// ============================================================================
// Interceptors / Roster
// ============================================================================

/// Ordered interceptor tags; earlier entries win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorLists {
    pub body: Vec<BodyInterceptorKind>,
    pub upper: Vec<UpperInterceptorKind>,
}

impl Default for InterceptorLists {
    fn default() -> Self {
        Self {
            body: vec![
                BodyInterceptorKind::Vault,
                BodyInterceptorKind::DoubleJump,
                BodyInterceptorKind::Jump,
                BodyInterceptorKind::Dodge,
                BodyInterceptorKind::Roll,
                BodyInterceptorKind::Fall,
                BodyInterceptorKind::AimEnter,
                BodyInterceptorKind::AimExit,
            ],
            upper: vec![
                UpperInterceptorKind::Unavailable,
                UpperInterceptorKind::Unequip,
                UpperInterceptorKind::Equip,
                UpperInterceptorKind::Attack,
                UpperInterceptorKind::AimEnter,
                UpperInterceptorKind::AimExit,
            ],
        }
    }
}

/// State tags to construct per layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateRoster {
    pub body: Vec<BodyStateId>,
    pub upper: Vec<UpperStateId>,
}

impl Default for StateRoster {
    fn default() -> Self {
        Self {
            body: BodyStateId::ALL.to_vec(),
            upper: UpperStateId::ALL.to_vec(),
        }
    }
}
