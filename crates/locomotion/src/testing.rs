//! Mock collaborators and a synthetic configuration for unit tests.

use bevy::math::{Quat, Vec2, Vec3};

use crate::blackboard::{LocomotionTier, RuntimeData};
use crate::config::{LocomotionConfig, StopClips};
use crate::curve::Curve;
use crate::facade::{
    AnimLayer, AnimationFacade, CharacterBody, CompletionToken, EquipmentDriver, ObstacleDetector,
    PlayOptions, VaultObstacleInfo, VaultQuery,
};
use crate::ik::IkRig;
use crate::motion::clip::{FootPhase, MotionClipData, MotionDirection};
use crate::motion::driver::MotionDriver;
use crate::motion::warp::WarpedMotionData;
use crate::state::FrameEnv;
use crate::controller::Collaborators;

// ============================================================================
// Animation
// ============================================================================

/// Records every facade call; times are set by the test.
#[derive(Debug, Default)]
pub struct RecordingAnimation {
    pub plays: Vec<(String, PlayOptions)>,
    pub on_end: [Option<CompletionToken>; AnimLayer::COUNT],
    pub callbacks: Vec<(AnimLayer, f32, CompletionToken)>,
    pub layer_weights: [f32; AnimLayer::COUNT],
    pub mixer: [Vec2; AnimLayer::COUNT],
    pub normalized_time: [f32; AnimLayer::COUNT],
    pub time: [f32; AnimLayer::COUNT],
}

impl RecordingAnimation {
    pub fn last_clip(&self) -> Option<&str> {
        self.plays.last().map(|(clip, _)| clip.as_str())
    }

    /// Last clip started on a layer.
    pub fn last_clip_on(&self, layer: AnimLayer) -> Option<&str> {
        self.plays
            .iter()
            .rev()
            .find(|(_, options)| options.layer == layer)
            .map(|(clip, _)| clip.as_str())
    }

    pub fn take_on_end(&mut self, layer: AnimLayer) -> Option<CompletionToken> {
        self.on_end[layer.index()].take()
    }

    /// Remove and return the callbacks armed on a layer.
    pub fn take_callbacks(&mut self, layer: AnimLayer) -> Vec<CompletionToken> {
        let (taken, kept) = self
            .callbacks
            .drain(..)
            .partition::<Vec<_>, _>(|(l, _, _)| *l == layer);
        self.callbacks = kept;
        taken.into_iter().map(|(_, _, token)| token).collect()
    }
}

impl AnimationFacade for RecordingAnimation {
    fn play_clip(&mut self, clip: &str, options: &PlayOptions) {
        self.plays.push((clip.to_string(), options.clone()));
        self.normalized_time[options.layer.index()] = options.start_normalized_time.unwrap_or(0.0);
        self.time[options.layer.index()] = 0.0;
    }

    fn play_transition(&mut self, clip: &str, options: &PlayOptions) {
        self.play_clip(clip, options);
    }

    fn set_mixer_parameter(&mut self, layer: AnimLayer, value: Vec2) {
        self.mixer[layer.index()] = value;
    }

    fn set_on_end_callback(&mut self, layer: AnimLayer, token: CompletionToken) {
        self.on_end[layer.index()] = Some(token);
    }

    fn clear_on_end_callback(&mut self, layer: AnimLayer) {
        self.on_end[layer.index()] = None;
    }

    fn add_callback(&mut self, layer: AnimLayer, normalized_time: f32, token: CompletionToken) {
        self.callbacks.push((layer, normalized_time, token));
    }

    fn set_layer_weight(&mut self, layer: AnimLayer, weight: f32, _fade_duration: f32) {
        self.layer_weights[layer.index()] = weight;
    }

    fn current_time(&self, layer: AnimLayer) -> f32 {
        self.time[layer.index()]
    }

    fn current_normalized_time(&self, layer: AnimLayer) -> f32 {
        self.normalized_time[layer.index()]
    }
}

// ============================================================================
// Body / Detector / Equipment
// ============================================================================

/// Kinematic body over an optional flat floor.
#[derive(Debug, Clone)]
pub struct MockBody {
    pub position: Vec3,
    pub rotation: Quat,
    pub grounded: bool,
    pub floor: Option<f32>,
}

impl MockBody {
    pub fn on_floor() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            grounded: true,
            floor: Some(0.0),
        }
    }

    pub fn airborne(height: f32) -> Self {
        Self {
            position: Vec3::Y * height,
            grounded: false,
            ..Self::on_floor()
        }
    }
}

impl CharacterBody for MockBody {
    fn is_grounded(&self) -> bool {
        self.grounded
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    fn move_by(&mut self, displacement: Vec3) {
        self.position += displacement;
        if let Some(floor) = self.floor {
            if self.position.y <= floor {
                self.position.y = floor;
                self.grounded = true;
            } else {
                self.grounded = false;
            }
        }
    }
}

/// Returns its obstacle for queries whose height range contains it.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    pub obstacle: Option<VaultObstacleInfo>,
    pub queries: Vec<VaultQuery>,
}

impl ScriptedDetector {
    pub fn with_obstacle(obstacle: VaultObstacleInfo) -> Self {
        Self {
            obstacle: Some(obstacle),
            queries: Vec::new(),
        }
    }
}

impl ObstacleDetector for ScriptedDetector {
    fn detect(&mut self, query: &VaultQuery) -> VaultObstacleInfo {
        self.queries.push(*query);
        match self.obstacle {
            Some(info) if info.height >= query.min_height && info.height < query.max_height => info,
            _ => VaultObstacleInfo::invalid(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingEquipment {
    pub equipped: Vec<usize>,
    pub unequips: u32,
}

impl EquipmentDriver for RecordingEquipment {
    fn equip(&mut self, slot: usize) {
        self.equipped.push(slot);
    }

    fn unequip(&mut self) {
        self.unequips += 1;
    }
}

/// A wall 1 m ahead (+Z) whose top is `height` above the floor.
pub fn obstacle(height: f32, landing: Option<Vec3>) -> VaultObstacleInfo {
    VaultObstacleInfo {
        is_valid: true,
        wall_point: Vec3::new(0.0, height * 0.5, 1.0),
        wall_normal: Vec3::NEG_Z,
        ledge_point: Vec3::new(0.0, height, 1.0),
        left_hand: Vec3::new(-0.3, height, 1.0),
        right_hand: Vec3::new(0.3, height, 1.0),
        landing_point: landing,
        height,
    }
}

// ============================================================================
// Synthetic Config
// ============================================================================

fn tier_name(tier: LocomotionTier) -> &'static str {
    match tier {
        LocomotionTier::Idle => "idle",
        LocomotionTier::Walk => "walk",
        LocomotionTier::Jog => "jog",
        LocomotionTier::Sprint => "sprint",
    }
}

fn direction_name(direction: MotionDirection) -> &'static str {
    match direction {
        MotionDirection::Forward => "forward",
        MotionDirection::Left => "left",
        MotionDirection::Right => "right",
        MotionDirection::Back => "back",
        MotionDirection::BackLeft => "back_left",
        MotionDirection::BackRight => "back_right",
    }
}

fn vault_warp(clip: &str, height: f32) -> WarpedMotionData {
    // Rise onto the ledge 1 m ahead by 40%, then drop 1.5 m further on
    let rise = 0.4;
    let up = height / rise;
    let down = -height / (1.0 - rise);
    WarpedMotionData::new(clip, 1.0)
        .with_point(rise, Vec3::new(0.0, height, 1.0))
        .with_point(1.0, Vec3::new(0.0, -height, 1.5))
        .with_velocity(
            Curve::constant(0.0),
            Curve::from_pairs(&[(0.0, up), (rise, up), (rise + 1e-4, down), (1.0, down)]),
            Curve::constant(2.5),
        )
        .with_hand_ik_weight(Curve::from_pairs(&[
            (0.0, 0.0),
            (0.3, 1.0),
            (0.5, 1.0),
            (0.7, 0.0),
        ]))
}

/// Default config plus baked tables for every tier, direction and action.
pub fn synthetic_config() -> LocomotionConfig {
    let mut config = LocomotionConfig::default();
    let tiers = [LocomotionTier::Walk, LocomotionTier::Jog, LocomotionTier::Sprint];
    let starts = [
        (MotionDirection::Forward, 0.0),
        (MotionDirection::Left, -90.0),
        (MotionDirection::Right, 90.0),
        (MotionDirection::BackLeft, -150.0),
        (MotionDirection::BackRight, 150.0),
    ];

    for tier in tiers {
        let speed = config.movement.speed_for(tier);
        let table = config.motion.starts.entry(tier).or_default();
        for (direction, turn) in starts {
            let clip = MotionClipData::new(
                format!("start_{}_{}", tier_name(tier), direction_name(direction)),
                Curve::linear(0.0, 0.0, 0.6, speed),
                Curve::linear(0.0, 0.0, 0.3, turn),
            )
            .with_rotation_finished_time(0.3)
            .with_end_phase(FootPhase::Right);
            table.insert(direction, clip);
        }

        let stop = |phase: &str| {
            Some(MotionClipData::new(
                format!("stop_{}_{}", tier_name(tier), phase),
                Curve::linear(0.0, speed, 0.5, 0.0),
                Curve::constant(0.0),
            ))
        };
        config.motion.stops.insert(
            tier,
            StopClips {
                left: stop("left"),
                right: stop("right"),
            },
        );
    }

    let dodges = [
        (MotionDirection::Forward, Vec3::Z),
        (MotionDirection::Back, Vec3::NEG_Z),
        (MotionDirection::Left, Vec3::NEG_X),
        (MotionDirection::Right, Vec3::X),
    ];
    for (direction, axis) in dodges {
        let velocity = axis * 3.0;
        config.motion.dodges.insert(
            direction,
            WarpedMotionData::new(format!("dodge_{}", direction_name(direction)), 0.5).with_velocity(
                Curve::constant(velocity.x),
                Curve::constant(velocity.y),
                Curve::constant(velocity.z),
            ),
        );
    }

    let mut roll = WarpedMotionData::new("roll", 0.8).with_velocity(
        Curve::constant(0.0),
        Curve::constant(0.0),
        Curve::linear(0.0, 5.0, 1.0, 2.0),
    );
    roll.exit_normalized_time = 0.9;
    config.motion.roll = Some(roll);

    config.motion.low_vault = Some(vault_warp("vault_low", 0.8));
    config.motion.high_vault = Some(vault_warp("vault_high", 1.5));
    config
}

// ============================================================================
// Harness
// ============================================================================

/// Owns one character's collaborators for state and machine tests.
pub struct Harness {
    pub data: RuntimeData,
    pub config: LocomotionConfig,
    pub anim: RecordingAnimation,
    pub ik: IkRig,
    pub body: MockBody,
    pub equipment: RecordingEquipment,
    pub motion: MotionDriver,
    pub detector: ScriptedDetector,
}

impl Harness {
    pub fn new() -> Self {
        let config = synthetic_config();
        Self {
            data: RuntimeData::new(config.stamina.max),
            ik: IkRig::new(&config.ik),
            config,
            anim: RecordingAnimation::default(),
            body: MockBody::on_floor(),
            equipment: RecordingEquipment::default(),
            motion: MotionDriver::new(),
            detector: ScriptedDetector::default(),
        }
    }

    pub fn env(&mut self, dt: f32) -> FrameEnv<'_> {
        FrameEnv {
            data: &mut self.data,
            config: &self.config,
            anim: &mut self.anim,
            ik: &mut self.ik,
            body: &mut self.body,
            equipment: &mut self.equipment,
            motion: &mut self.motion,
            dt,
        }
    }

    /// Collaborators for driving a [`CharacterController`](crate::controller::CharacterController).
    pub fn collaborators(&mut self) -> Collaborators<'_> {
        Collaborators {
            animation: &mut self.anim,
            body: &mut self.body,
            detector: &mut self.detector,
            equipment: &mut self.equipment,
        }
    }
}
