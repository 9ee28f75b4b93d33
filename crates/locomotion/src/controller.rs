//! # Character Controller
//!
//! Owns one character's blackboard, pipelines, state machines, motion driver
//! and IK rig, and runs them in a fixed order every frame.
//!
//! ## Frame order
//! 1. Physics sync (grounded, air time, pose) from the body
//! 2. Intent pipeline
//! 3. Body layer: interrupts, physics step, logic step
//! 4. Upper layer: interrupts, physics step, logic step
//! 5. IK blending, then one-shot intents are cleared
//!
//! ## Lifecycle
//! `attach` enters Idle on both layers; `detach` exits the active states and
//! drops any pending completion events. Animation events delivered by the
//! host go through `on_animation_event`.

use bevy::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::blackboard::RuntimeData;
use crate::config::LocomotionConfig;
use crate::error::Result;
use crate::facade::{
    AnimLayer, AnimationFacade, CharacterBody, CompletionToken, EquipmentDriver, ObstacleDetector,
};
use crate::ik::IkRig;
use crate::input::InputFrame;
use crate::intent::{IntentContext, IntentPipeline};
use crate::interrupt::{body_interceptors, upper_interceptors};
use crate::motion::driver::MotionDriver;
use crate::state::body::{self, BodyStateId};
use crate::state::upper::{self, UpperStateId};
use crate::state::{FrameEnv, StateMachine};

/// Host-side collaborators borrowed for one call.
pub struct Collaborators<'a> {
    pub animation: &'a mut dyn AnimationFacade,
    pub body: &'a mut dyn CharacterBody,
    pub detector: &'a mut dyn ObstacleDetector,
    pub equipment: &'a mut dyn EquipmentDriver,
}

/// Layered locomotion controller for a single character.
#[derive(Component, Debug)]
pub struct CharacterController {
    config: LocomotionConfig,
    data: RuntimeData,
    intents: IntentPipeline,
    body_machine: StateMachine<BodyStateId>,
    upper_machine: StateMachine<UpperStateId>,
    motion: MotionDriver,
    ik: IkRig,
    attached: bool,
}

fn frame_env<'e>(
    data: &'e mut RuntimeData,
    config: &'e LocomotionConfig,
    ik: &'e mut IkRig,
    motion: &'e mut MotionDriver,
    collab: &'e mut Collaborators<'_>,
    dt: f32,
) -> FrameEnv<'e> {
    FrameEnv {
        data,
        config,
        anim: &mut *collab.animation,
        ik,
        body: &mut *collab.body,
        equipment: &mut *collab.equipment,
        motion,
        dt,
    }
}

impl CharacterController {
    /// Validate the config and build both layers from its rosters.
    pub fn new(config: LocomotionConfig) -> Result<Self> {
        config.validate()?;

        let body_states = body::registry().build(&config.roster.body, &config);
        let body_interrupts = body_interceptors().build(&config.interceptors.body, &config);
        let body_machine = StateMachine::new(
            AnimLayer::Base,
            body_states,
            BodyStateId::Idle,
            body_interrupts,
        )?;

        let upper_states = upper::registry().build(&config.roster.upper, &config);
        let upper_interrupts = upper_interceptors().build(&config.interceptors.upper, &config);
        let upper_machine = StateMachine::new(
            AnimLayer::UpperBody,
            upper_states,
            UpperStateId::Idle,
            upper_interrupts,
        )?;

        debug!(
            "Controller built: body interceptors {:?}, upper interceptors {:?}",
            body_machine.interrupts(),
            upper_machine.interrupts()
        );

        Ok(Self {
            data: RuntimeData::new(config.stamina.max),
            ik: IkRig::new(&config.ik),
            intents: IntentPipeline::standard(),
            body_machine,
            upper_machine,
            motion: MotionDriver::new(),
            attached: false,
            config,
        })
    }

    /// Replace the intent pipeline.
    pub fn with_intents(mut self, intents: IntentPipeline) -> Self {
        self.intents = intents;
        self
    }

    pub fn config(&self) -> &LocomotionConfig {
        &self.config
    }

    pub fn data(&self) -> &RuntimeData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut RuntimeData {
        &mut self.data
    }

    pub fn body_state(&self) -> Option<BodyStateId> {
        self.body_machine.current()
    }

    pub fn upper_state(&self) -> Option<UpperStateId> {
        self.upper_machine.current()
    }

    pub fn body_machine(&self) -> &StateMachine<BodyStateId> {
        &self.body_machine
    }

    pub fn upper_machine(&self) -> &StateMachine<UpperStateId> {
        &self.upper_machine
    }

    pub fn motion(&self) -> &MotionDriver {
        &self.motion
    }

    pub fn ik(&self) -> &IkRig {
        &self.ik
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Sync with the body and enter Idle on both layers.
    pub fn attach(&mut self, collab: &mut Collaborators<'_>) {
        if self.attached {
            warn!("Character controller attached twice; restarting both layers");
        }
        let rotation = collab.body.rotation();
        self.data.position = collab.body.position();
        self.data.rotation = rotation;
        self.data.is_grounded = collab.body.is_grounded();
        self.motion.reset(rotation);

        let mut env = frame_env(
            &mut self.data,
            &self.config,
            &mut self.ik,
            &mut self.motion,
            collab,
            0.0,
        );
        self.body_machine.initialize(&mut env, BodyStateId::Idle);
        self.upper_machine.initialize(&mut env, UpperStateId::Idle);
        self.attached = true;

        info!(
            "Character controller attached ({} body states, {} upper states)",
            self.config.roster.body.len(),
            self.config.roster.upper.len()
        );
    }

    /// Exit the active states; pending animation events are dropped.
    pub fn detach(&mut self, collab: &mut Collaborators<'_>) {
        if !self.attached {
            return;
        }
        let mut env = frame_env(
            &mut self.data,
            &self.config,
            &mut self.ik,
            &mut self.motion,
            collab,
            0.0,
        );
        self.upper_machine.shutdown(&mut env);
        self.body_machine.shutdown(&mut env);
        self.ik.reset();
        self.motion.clear();
        self.attached = false;
        info!("Character controller detached");
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Run one frame.
    pub fn tick(&mut self, input: InputFrame, collab: &mut Collaborators<'_>, dt: f32) {
        if !self.attached {
            warn!("Tick on a detached character controller ignored");
            return;
        }
        self.data.frame += 1;
        self.data.input = input;
        self.sync_physics(&*collab.body, dt);

        let mut intent_ctx = IntentContext {
            data: &mut self.data,
            config: &self.config,
            detector: &mut *collab.detector,
            dt,
        };
        self.intents.run(&mut intent_ctx);

        let mut env = frame_env(
            &mut self.data,
            &self.config,
            &mut self.ik,
            &mut self.motion,
            collab,
            dt,
        );
        self.body_machine.check_interrupts(&mut env);
        self.body_machine.physics_update(&mut env);
        self.body_machine.logic_update(&mut env);

        self.upper_machine.check_interrupts(&mut env);
        self.upper_machine.physics_update(&mut env);
        self.upper_machine.logic_update(&mut env);

        self.ik.update(dt);
        IntentPipeline::clear_consumed_intents(&mut self.data);
    }

    /// Deliver an on-end or marker event armed by one of the layers.
    pub fn on_animation_event(
        &mut self,
        layer: AnimLayer,
        token: CompletionToken,
        collab: &mut Collaborators<'_>,
    ) {
        if !self.attached {
            trace!("Animation event {} after detach ignored", token.id());
            return;
        }
        let mut env = frame_env(
            &mut self.data,
            &self.config,
            &mut self.ik,
            &mut self.motion,
            collab,
            0.0,
        );
        match layer {
            AnimLayer::Base => self.body_machine.handle_animation_event(&mut env, token),
            AnimLayer::UpperBody => self.upper_machine.handle_animation_event(&mut env, token),
        }
    }

    /// Same as [`on_animation_event`](Self::on_animation_event) for hosts that
    /// report layers by index. Unknown indices are dropped with a warning.
    pub fn on_layer_event(
        &mut self,
        layer_index: usize,
        token: CompletionToken,
        collab: &mut Collaborators<'_>,
    ) {
        if let Some(layer) = AnimLayer::from_index(layer_index) {
            self.on_animation_event(layer, token, collab);
        }
    }

    fn sync_physics(&mut self, body: &dyn CharacterBody, dt: f32) {
        let grounded = body.is_grounded();
        let data = &mut self.data;
        if grounded {
            if !data.is_grounded {
                data.landed_air_time = data.air_time;
                debug!("Landed after {:.2}s airborne", data.air_time);
            }
            data.air_time = 0.0;
            data.double_jump_used = false;
        } else {
            data.air_time += dt;
        }
        data.is_grounded = grounded;
        data.position = body.position();
        data.rotation = body.rotation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::IkBodyPart;
    use crate::input::InputButton;
    use crate::testing::{obstacle, Harness};
    use bevy::math::{Vec2, Vec3};

    const DT: f32 = 1.0 / 60.0;

    fn attached(harness: &mut Harness) -> CharacterController {
        let mut controller = CharacterController::new(harness.config.clone()).unwrap();
        controller.attach(&mut harness.collaborators());
        controller
    }

    fn step(controller: &mut CharacterController, harness: &mut Harness, input: InputFrame) {
        controller.tick(input, &mut harness.collaborators(), DT);
    }

    /// Tick with `input` until `done` holds, returning the frame count.
    fn run_until(
        controller: &mut CharacterController,
        harness: &mut Harness,
        input: &InputFrame,
        max_frames: usize,
        done: impl Fn(&CharacterController) -> bool,
    ) -> Option<usize> {
        for frame in 1..=max_frames {
            step(controller, harness, input.clone());
            if done(controller) {
                return Some(frame);
            }
        }
        None
    }

    #[test]
    fn test_attach_enters_idle_on_both_layers() {
        let mut harness = Harness::new();
        let controller = attached(&mut harness);
        assert!(controller.is_attached());
        assert_eq!(controller.body_state(), Some(BodyStateId::Idle));
        assert_eq!(controller.upper_state(), Some(UpperStateId::Idle));
        assert_eq!(harness.anim.last_clip_on(AnimLayer::Base), Some("Idle"));
        assert_eq!(controller.body_machine().transition_counts(), (1, 0));
    }

    #[test]
    fn test_missing_fallback_is_rejected() {
        let mut config = Harness::new().config;
        config.roster.body.retain(|id| *id != BodyStateId::Idle);
        let err = CharacterController::new(config).unwrap_err();
        assert!(matches!(
            err,
            crate::error::LocomotionError::MissingFallbackState { .. }
        ));
    }

    #[test]
    fn test_detach_pairs_every_enter_with_exit() {
        let mut harness = Harness::new();
        let mut controller = attached(&mut harness);
        let forward = InputFrame::new().with_move(Vec2::Y);
        for _ in 0..30 {
            step(&mut controller, &mut harness, forward.clone());
        }
        for _ in 0..60 {
            step(&mut controller, &mut harness, InputFrame::new());
        }
        controller.detach(&mut harness.collaborators());

        let (enters, exits) = controller.body_machine().transition_counts();
        assert!(enters > 1);
        assert_eq!(enters, exits);
        let (enters, exits) = controller.upper_machine().transition_counts();
        assert_eq!(enters, exits);
        assert_eq!(controller.body_state(), None);
        assert!(harness.anim.on_end.iter().all(Option::is_none));
    }

    #[test]
    fn test_walk_start_loop_stop_cycle() {
        let mut harness = Harness::new();
        let mut controller = attached(&mut harness);
        let forward = InputFrame::new().with_move(Vec2::Y);

        step(&mut controller, &mut harness, forward.clone());
        assert_eq!(controller.body_state(), Some(BodyStateId::MoveStart));
        assert_eq!(harness.anim.last_clip(), Some("start_jog_forward"));

        let frames = run_until(&mut controller, &mut harness, &forward, 120, |c| {
            c.body_state() == Some(BodyStateId::MoveLoop)
        });
        assert!(frames.is_some());
        assert!(harness.body.position.z > 0.5);

        step(&mut controller, &mut harness, InputFrame::new());
        assert_eq!(controller.body_state(), Some(BodyStateId::Stop));
        let frames = run_until(&mut controller, &mut harness, &InputFrame::new(), 120, |c| {
            c.body_state() == Some(BodyStateId::Idle)
        });
        assert!(frames.is_some());
    }

    #[test]
    fn test_jump_fall_land_sequence() {
        let mut harness = Harness::new();
        let mut controller = attached(&mut harness);

        step(
            &mut controller,
            &mut harness,
            InputFrame::new().with_press(InputButton::Jump),
        );
        assert_eq!(controller.body_state(), Some(BodyStateId::Jump));
        assert!(harness.body.position.y > 0.0);

        let idle = InputFrame::new();
        assert!(run_until(&mut controller, &mut harness, &idle, 120, |c| {
            c.body_state() == Some(BodyStateId::Fall)
        })
        .is_some());
        assert!(run_until(&mut controller, &mut harness, &idle, 120, |c| {
            c.body_state() == Some(BodyStateId::Land)
        })
        .is_some());
        assert!(controller.data().landed_air_time > 0.3);
        assert!(run_until(&mut controller, &mut harness, &idle, 60, |c| {
            c.body_state() == Some(BodyStateId::Idle)
        })
        .is_some());
        assert!(harness.body.position.y.abs() < 1e-4);
    }

    #[test]
    fn test_double_jump_once_per_airborne_period() {
        let mut harness = Harness::new();
        let mut controller = attached(&mut harness);
        let jump = InputFrame::new().with_press(InputButton::Jump);

        step(&mut controller, &mut harness, jump.clone());
        for _ in 0..10 {
            step(&mut controller, &mut harness, InputFrame::new());
        }
        step(&mut controller, &mut harness, jump.clone());
        assert_eq!(controller.body_state(), Some(BodyStateId::DoubleJump));
        assert!(controller.data().double_jump_used);

        // A third press in the same airborne period does nothing
        step(&mut controller, &mut harness, InputFrame::new());
        let counts = controller.body_machine().transition_counts();
        step(&mut controller, &mut harness, jump);
        assert_eq!(controller.body_state(), Some(BodyStateId::DoubleJump));
        assert_eq!(controller.body_machine().transition_counts(), counts);
    }

    #[test]
    fn test_sprint_depletes_and_recovers_with_hysteresis() {
        let mut harness = Harness::new();
        harness.config.stamina.max = 1000.0;
        harness.config.stamina.drain_rate = 20.0;
        let mut controller = attached(&mut harness);
        controller.data_mut().stamina = 50.0;

        let sprint = InputFrame::new()
            .with_move(Vec2::Y)
            .with_hold(InputButton::Sprint);
        let mut depleted_frame = None;
        for frame in 0..180 {
            step(&mut controller, &mut harness, sprint.clone());
            let data = controller.data();
            assert!((0.0..=data.max_stamina).contains(&data.stamina));
            if data.stamina <= 0.0 && depleted_frame.is_none() {
                assert!(data.is_stamina_depleted);
                depleted_frame = Some(frame);
            }
            if depleted_frame.is_some() {
                assert!(!data.is_running);
            }
        }
        assert!(depleted_frame.is_some());

        // Regenerate below the recovery threshold: still no sprint
        controller.data_mut().stamina = 150.0;
        step(&mut controller, &mut harness, sprint.clone());
        assert!(!controller.data().is_running);

        controller.data_mut().stamina = 250.0;
        step(&mut controller, &mut harness, sprint.clone());
        step(&mut controller, &mut harness, sprint);
        assert!(controller.data().is_running);
    }

    #[test]
    fn test_vault_end_to_end() {
        let mut harness = Harness::new();
        let landing = Vec3::new(0.0, 0.0, 2.5);
        harness.detector = crate::testing::ScriptedDetector::with_obstacle(obstacle(
            0.8,
            Some(landing),
        ));
        let mut controller = attached(&mut harness);

        step(
            &mut controller,
            &mut harness,
            InputFrame::new().with_press(InputButton::Jump),
        );
        assert_eq!(controller.body_state(), Some(BodyStateId::Vault));
        assert_eq!(controller.upper_state(), Some(UpperStateId::Unavailable));
        assert_eq!(harness.anim.last_clip_on(AnimLayer::Base), Some("vault_low"));
        assert!(controller.data().vault_obstacle.is_none());

        let mut peak_hand_weight: f32 = 0.0;
        let mut frames = 0;
        while controller.body_state() == Some(BodyStateId::Vault) && frames < 240 {
            step(&mut controller, &mut harness, InputFrame::new());
            peak_hand_weight =
                peak_hand_weight.max(controller.ik().requested_weight(IkBodyPart::LeftHand));
            frames += 1;
        }
        assert_ne!(controller.body_state(), Some(BodyStateId::Vault));
        assert!(peak_hand_weight > 0.5);
        assert_eq!(controller.ik().requested_weight(IkBodyPart::LeftHand), 0.0);
        assert!((harness.body.position - landing).length() < 0.05);

        assert!(run_until(&mut controller, &mut harness, &InputFrame::new(), 60, |c| {
            c.body_state() == Some(BodyStateId::Idle)
                && c.upper_state() == Some(UpperStateId::Idle)
        })
        .is_some());
    }

    #[test]
    fn test_vault_without_landing_falls_back_to_jump() {
        let mut harness = Harness::new();
        harness.detector = crate::testing::ScriptedDetector::with_obstacle(obstacle(0.8, None));
        let mut controller = attached(&mut harness);
        step(
            &mut controller,
            &mut harness,
            InputFrame::new().with_press(InputButton::Jump),
        );
        assert_eq!(controller.body_state(), Some(BodyStateId::Jump));
    }

    #[test]
    fn test_equip_attaches_on_marker() {
        let mut harness = Harness::new();
        let mut controller = attached(&mut harness);

        step(&mut controller, &mut harness, InputFrame::new().with_hotbar(1));
        assert_eq!(controller.upper_state(), Some(UpperStateId::Equip));
        assert_eq!(harness.anim.last_clip_on(AnimLayer::UpperBody), Some("Equip"));

        let markers = harness.anim.take_callbacks(AnimLayer::UpperBody);
        assert_eq!(markers.len(), 1);
        controller.on_animation_event(AnimLayer::UpperBody, markers[0], &mut harness.collaborators());
        assert_eq!(harness.equipment.equipped, vec![1]);
        assert_eq!(controller.data().equipped_slot, Some(1));
        assert_eq!(controller.upper_state(), Some(UpperStateId::Equip));

        let end = harness.anim.take_on_end(AnimLayer::UpperBody).unwrap();
        controller.on_animation_event(AnimLayer::UpperBody, end, &mut harness.collaborators());
        assert_eq!(controller.upper_state(), Some(UpperStateId::Idle));
        // The model is attached exactly once
        assert_eq!(harness.equipment.equipped, vec![1]);

        // Replaying either token is ignored
        let counts = controller.upper_machine().transition_counts();
        controller.on_animation_event(AnimLayer::UpperBody, end, &mut harness.collaborators());
        controller.on_animation_event(AnimLayer::UpperBody, markers[0], &mut harness.collaborators());
        assert_eq!(controller.upper_machine().transition_counts(), counts);
    }

    #[test]
    fn test_upper_actions_finish_without_animation_events() {
        let mut harness = Harness::new();
        let mut controller = attached(&mut harness);
        let equipment = harness.config.equipment;
        let frames = |seconds: f32| (seconds / DT).ceil() as usize + 2;

        step(&mut controller, &mut harness, InputFrame::new().with_hotbar(1));
        assert_eq!(controller.upper_state(), Some(UpperStateId::Equip));
        let idle = |c: &CharacterController| c.upper_state() == Some(UpperStateId::Idle);
        assert!(run_until(
            &mut controller,
            &mut harness,
            &InputFrame::new(),
            frames(equipment.equip_duration),
            idle
        )
        .is_some());
        assert_eq!(harness.equipment.equipped, vec![1]);
        assert_eq!(controller.data().equipped_slot, Some(1));

        step(
            &mut controller,
            &mut harness,
            InputFrame::new().with_press(InputButton::Attack),
        );
        assert_eq!(controller.upper_state(), Some(UpperStateId::Attack));
        assert!(run_until(
            &mut controller,
            &mut harness,
            &InputFrame::new(),
            frames(equipment.attack_duration),
            idle
        )
        .is_some());

        step(
            &mut controller,
            &mut harness,
            InputFrame::new().with_press(InputButton::Holster),
        );
        assert_eq!(controller.upper_state(), Some(UpperStateId::Unequip));
        assert!(run_until(
            &mut controller,
            &mut harness,
            &InputFrame::new(),
            frames(equipment.unequip_duration),
            idle
        )
        .is_some());
        assert_eq!(harness.equipment.unequips, 1);
        assert_eq!(controller.data().equipped_slot, None);
    }

    #[test]
    fn test_layer_event_by_index() {
        let mut harness = Harness::new();
        let mut controller = attached(&mut harness);
        step(&mut controller, &mut harness, InputFrame::new().with_hotbar(0));
        let end = harness.anim.take_on_end(AnimLayer::UpperBody).unwrap();

        // Out of range is a no-op
        controller.on_layer_event(7, end, &mut harness.collaborators());
        assert_eq!(controller.upper_state(), Some(UpperStateId::Equip));

        controller.on_layer_event(AnimLayer::UpperBody.index(), end, &mut harness.collaborators());
        assert_eq!(controller.upper_state(), Some(UpperStateId::Idle));
        assert_eq!(controller.data().equipped_slot, Some(0));
    }

    #[test]
    fn test_stale_token_after_interrupt_is_ignored() {
        let mut harness = Harness::new();
        let mut controller = attached(&mut harness);

        step(&mut controller, &mut harness, InputFrame::new().with_move(Vec2::Y));
        assert_eq!(controller.body_state(), Some(BodyStateId::MoveStart));
        let stale = harness.anim.on_end[AnimLayer::Base.index()].unwrap();

        step(
            &mut controller,
            &mut harness,
            InputFrame::new()
                .with_move(Vec2::Y)
                .with_press(InputButton::Jump),
        );
        assert_eq!(controller.body_state(), Some(BodyStateId::Jump));

        let counts = controller.body_machine().transition_counts();
        controller.on_animation_event(AnimLayer::Base, stale, &mut harness.collaborators());
        assert_eq!(controller.body_state(), Some(BodyStateId::Jump));
        assert_eq!(controller.body_machine().transition_counts(), counts);
    }

    #[test]
    fn test_dodge_is_not_interrupted_by_jump() {
        let mut harness = Harness::new();
        let mut controller = attached(&mut harness);

        step(
            &mut controller,
            &mut harness,
            InputFrame::new().with_press(InputButton::Dodge),
        );
        assert_eq!(controller.body_state(), Some(BodyStateId::Dodge));
        step(
            &mut controller,
            &mut harness,
            InputFrame::new().with_press(InputButton::Jump),
        );
        assert_eq!(controller.body_state(), Some(BodyStateId::Dodge));
        assert!(!controller.data().intents.wants_to_jump);
    }

    #[test]
    fn test_aim_switches_both_layers() {
        let mut harness = Harness::new();
        harness.config.aim.requires_equipment = false;
        let mut controller = attached(&mut harness);
        let aim = InputFrame::new().with_press(InputButton::Aim);

        step(&mut controller, &mut harness, aim);
        assert_eq!(controller.body_state(), Some(BodyStateId::AimIdle));
        assert_eq!(controller.upper_state(), Some(UpperStateId::Aim));

        step(
            &mut controller,
            &mut harness,
            InputFrame::new()
                .with_hold(InputButton::Aim)
                .with_move(Vec2::X),
        );
        assert_eq!(controller.body_state(), Some(BodyStateId::AimMove));

        // Release is debounced before both layers leave aim
        let release = InputFrame::new().with_move(Vec2::X);
        step(&mut controller, &mut harness, release.clone());
        assert_eq!(controller.body_state(), Some(BodyStateId::AimMove));
        let frames = run_until(&mut controller, &mut harness, &release, 60, |c| {
            c.upper_state() == Some(UpperStateId::Idle)
        });
        assert!(frames.is_some());
        assert_eq!(controller.body_state(), Some(BodyStateId::MoveLoop));
    }

    #[test]
    fn test_tick_before_attach_is_ignored() {
        let mut harness = Harness::new();
        let mut controller = CharacterController::new(harness.config.clone()).unwrap();
        step(&mut controller, &mut harness, InputFrame::new().with_move(Vec2::Y));
        assert_eq!(controller.data().frame, 0);
        assert!(harness.anim.plays.is_empty());
    }
}
