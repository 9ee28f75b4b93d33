//! # Collaborator Facades
//!
//! Interfaces to the systems the locomotion core drives but does not own:
//! clip playback, IK, the physics body, obstacle detection and equipment.
//!
//! The host engine implements these traits (e.g. over Bevy's `AnimationPlayer`
//! and an Avian kinematic body) and passes them to
//! [`CharacterController::tick`](crate::controller::CharacterController::tick)
//! every frame.

use bevy::ecs::entity::Entity;
use bevy::math::{Quat, Vec2, Vec3};
use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// Animation Playback
// ============================================================================

/// Animation layers driven by the two state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Reflect)]
pub enum AnimLayer {
    /// Full-body locomotion layer
    Base,
    /// Upper-body action layer (masked to spine and arms)
    UpperBody,
}

impl AnimLayer {
    pub const COUNT: usize = 2;

    pub fn index(self) -> usize {
        match self {
            AnimLayer::Base => 0,
            AnimLayer::UpperBody => 1,
        }
    }

    /// Resolve a layer index coming from data; out-of-range is a logged no-op.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(AnimLayer::Base),
            1 => Some(AnimLayer::UpperBody),
            _ => {
                warn!("Animation layer index {} out of range (0..{})", index, Self::COUNT);
                None
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AnimLayer::Base => "base",
            AnimLayer::UpperBody => "upper",
        }
    }
}

/// Options for starting a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayOptions {
    /// Crossfade duration; `None` uses the player's default
    pub fade_duration: Option<f32>,
    pub layer: AnimLayer,
    pub speed: f32,
    /// Start offset in normalized time
    pub start_normalized_time: Option<f32>,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            fade_duration: None,
            layer: AnimLayer::Base,
            speed: 1.0,
            start_normalized_time: None,
        }
    }
}

impl PlayOptions {
    pub fn on(layer: AnimLayer) -> Self {
        Self {
            layer,
            ..Default::default()
        }
    }

    pub fn with_fade(mut self, fade: f32) -> Self {
        self.fade_duration = Some(fade);
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn starting_at(mut self, normalized_time: f32) -> Self {
        self.start_normalized_time = Some(normalized_time);
        self
    }
}

/// Handle for an animation callback, returned to the controller when it fires.
///
/// Tokens are issued by a state machine's [`CompletionSlot`](crate::state::CompletionSlot)
/// and are never reused, so a callback left over from a previous state is
/// recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompletionToken(pub(crate) u64);

impl CompletionToken {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Clip playback and blending engine.
pub trait AnimationFacade {
    /// Start a clip immediately (or with the optional fade).
    fn play_clip(&mut self, clip: &str, options: &PlayOptions);

    /// Crossfade into a clip from whatever is playing on the layer.
    fn play_transition(&mut self, clip: &str, options: &PlayOptions);

    /// Drive the layer's blend-space parameter.
    fn set_mixer_parameter(&mut self, layer: AnimLayer, value: Vec2);

    /// Arm the single end-of-clip callback for the layer, replacing any previous one.
    fn set_on_end_callback(&mut self, layer: AnimLayer, token: CompletionToken);

    fn clear_on_end_callback(&mut self, layer: AnimLayer);

    /// Fire `token` when the layer's clip passes `normalized_time`.
    fn add_callback(&mut self, layer: AnimLayer, normalized_time: f32, token: CompletionToken);

    fn set_layer_weight(&mut self, layer: AnimLayer, weight: f32, fade_duration: f32);

    /// Seconds into the current clip on the layer.
    fn current_time(&self, layer: AnimLayer) -> f32;

    /// Progress of the current clip on the layer (may exceed 1 for loops).
    fn current_normalized_time(&self, layer: AnimLayer) -> f32;
}

// ============================================================================
// Inverse Kinematics
// ============================================================================

/// Body parts with IK channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Reflect)]
pub enum IkBodyPart {
    LeftHand,
    RightHand,
    AimReference,
    HeadLook,
}

impl IkBodyPart {
    pub const COUNT: usize = 4;

    pub const ALL: [IkBodyPart; Self::COUNT] = [
        IkBodyPart::LeftHand,
        IkBodyPart::RightHand,
        IkBodyPart::AimReference,
        IkBodyPart::HeadLook,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// IK goal: either a world pose or a transform to follow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IkTarget {
    Pose { position: Vec3, rotation: Quat },
    Entity(Entity),
}

impl IkTarget {
    pub fn at(position: Vec3) -> Self {
        IkTarget::Pose {
            position,
            rotation: Quat::IDENTITY,
        }
    }
}

/// IK solver interface.
pub trait IkFacade {
    fn set_ik_target(&mut self, part: IkBodyPart, target: IkTarget, weight: f32);

    fn update_ik_weight(&mut self, part: IkBodyPart, weight: f32);
}

// ============================================================================
// Physics Body
// ============================================================================

/// Kinematic body the motion driver moves.
pub trait CharacterBody {
    fn is_grounded(&self) -> bool;

    fn position(&self) -> Vec3;

    fn rotation(&self) -> Quat;

    fn set_rotation(&mut self, rotation: Quat);

    /// Apply this frame's displacement; called once per frame.
    fn move_by(&mut self, displacement: Vec3);
}

// ============================================================================
// Obstacle Detection
// ============================================================================

/// Height-range probe for vaultable obstacles ahead of the character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VaultQuery {
    pub origin: Vec3,
    pub forward: Vec3,
    pub min_height: f32,
    pub max_height: f32,
    pub reach: f32,
}

/// Geometry found by the obstacle detector, consumed once by the Vault state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VaultObstacleInfo {
    pub is_valid: bool,
    pub wall_point: Vec3,
    pub wall_normal: Vec3,
    pub ledge_point: Vec3,
    pub left_hand: Vec3,
    pub right_hand: Vec3,
    /// Ground on the far side, if any was found
    pub landing_point: Option<Vec3>,
    pub height: f32,
}

impl VaultObstacleInfo {
    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Ray-cast based ledge/obstacle detection.
pub trait ObstacleDetector {
    fn detect(&mut self, query: &VaultQuery) -> VaultObstacleInfo;
}

// ============================================================================
// Equipment
// ============================================================================

/// Instantiates and removes physical equipment models.
pub trait EquipmentDriver {
    fn equip(&mut self, slot: usize);

    fn unequip(&mut self);
}

/// Detector that never finds anything; for hosts without ledge probes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObstacles;

impl ObstacleDetector for NoObstacles {
    fn detect(&mut self, _query: &VaultQuery) -> VaultObstacleInfo {
        VaultObstacleInfo::invalid()
    }
}
