//! # State Machines
//!
//! Two independently clocked machines share the blackboard each frame: the
//! full-body locomotion layer and the upper-body action layer.
//!
//! ## Classes
//! - `State`: Enter / LogicUpdate / PhysicsUpdate / Exit for one state
//! - `StateMachine`: exactly one active state, atomic transitions, interrupts
//! - `StateRegistry`: tag to constructor map built from the config roster
//! - `CompletionSlot`: the single pending clip-end event plus markers
//!
//! A state's `exit` must undo what its `enter` set up. The machine clears the
//! completion slot and the layer's on-end callback after every `exit`, so an
//! animation event from a previous activation can never reach a new state.

pub mod body;
pub mod machine;
pub mod registry;
pub mod upper;

use std::fmt::Debug;
use std::hash::Hash;

use tracing::trace;

use crate::blackboard::RuntimeData;
use crate::config::LocomotionConfig;
use crate::facade::{
    AnimLayer, AnimationFacade, CharacterBody, CompletionToken, EquipmentDriver, IkFacade,
    PlayOptions,
};
use crate::motion::driver::{MotionDriver, MotionStep};

pub use machine::{StateMachine, TransitionCause};
pub use registry::{StateConstructor, StateRegistry};

// ============================================================================
// State Contract
// ============================================================================

/// Closed tag set identifying the states of one layer.
pub trait StateId: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Record this id as the layer's active state on the blackboard.
    fn publish(self, data: &mut RuntimeData);
}

/// One state of a layer. Instances are long-lived and reused across activations.
pub trait State<Id: StateId>: Send + Sync {
    fn id(&self) -> Id;

    fn enter(&mut self, ctx: &mut StateContext<'_>);

    /// Decide whether to leave; runs after `physics_update`.
    fn logic_update(&mut self, _ctx: &mut StateContext<'_>) -> Option<Id> {
        None
    }

    /// Apply motion for the frame.
    fn physics_update(&mut self, _ctx: &mut StateContext<'_>) {}

    fn exit(&mut self, _ctx: &mut StateContext<'_>) {}

    /// Atomic actions return `false` to opt out of the interrupt pipeline.
    fn accepts_interrupts(&self) -> bool {
        true
    }

    /// The clip armed with [`StateContext::arm_on_end`] finished.
    fn on_clip_end(&mut self, _ctx: &mut StateContext<'_>) -> Option<Id> {
        None
    }

    /// A marker added with [`StateContext::add_marker`] was reached.
    fn on_clip_marker(&mut self, _marker: u32, _ctx: &mut StateContext<'_>) -> Option<Id> {
        None
    }
}

// ============================================================================
// Frame Environment
// ============================================================================

/// Collaborators and shared data for one frame of one character.
pub struct FrameEnv<'a> {
    pub data: &'a mut RuntimeData,
    pub config: &'a LocomotionConfig,
    pub anim: &'a mut dyn AnimationFacade,
    pub ik: &'a mut dyn IkFacade,
    pub body: &'a mut dyn CharacterBody,
    pub equipment: &'a mut dyn EquipmentDriver,
    pub motion: &'a mut MotionDriver,
    pub dt: f32,
}

/// What a state sees during a callback.
pub struct StateContext<'s> {
    pub data: &'s mut RuntimeData,
    pub config: &'s LocomotionConfig,
    pub anim: &'s mut dyn AnimationFacade,
    pub ik: &'s mut dyn IkFacade,
    pub body: &'s mut dyn CharacterBody,
    pub equipment: &'s mut dyn EquipmentDriver,
    pub motion: &'s mut MotionDriver,
    pub completion: &'s mut CompletionSlot,
    pub layer: AnimLayer,
    /// Seconds since the state was entered
    pub state_time: f32,
    pub dt: f32,
}

impl<'s> StateContext<'s> {
    pub(crate) fn new(
        env: &'s mut FrameEnv<'_>,
        completion: &'s mut CompletionSlot,
        layer: AnimLayer,
        state_time: f32,
    ) -> Self {
        Self {
            data: &mut *env.data,
            config: env.config,
            anim: &mut *env.anim,
            ik: &mut *env.ik,
            body: &mut *env.body,
            equipment: &mut *env.equipment,
            motion: &mut *env.motion,
            completion,
            layer,
            state_time,
            dt: env.dt,
        }
    }

    /// Play options for this layer, honouring a pending hand-off from the
    /// previous body state.
    pub fn play_options(&mut self) -> PlayOptions {
        let handed_off = if self.layer == AnimLayer::Base {
            self.data.take_next_state_play_options()
        } else {
            None
        };
        let mut options = handed_off.unwrap_or_default();
        options.layer = self.layer;
        options
    }

    /// Crossfade into `clip` on this layer.
    pub fn play(&mut self, clip: &str) {
        let options = self.play_options();
        self.anim.play_transition(clip, &options);
    }

    /// Crossfade into `clip` at a playback speed.
    pub fn play_at_speed(&mut self, clip: &str, speed: f32) {
        let options = self.play_options().with_speed(speed);
        self.anim.play_transition(clip, &options);
    }

    /// Arm the single on-end event for the current clip.
    pub fn arm_on_end(&mut self) -> CompletionToken {
        self.completion.arm_on_end(&mut *self.anim, self.layer)
    }

    /// Fire `on_clip_marker(marker)` when the clip passes `normalized_time`.
    pub fn add_marker(&mut self, normalized_time: f32, marker: u32) -> CompletionToken {
        self.completion
            .add_marker(&mut *self.anim, self.layer, normalized_time, marker)
    }

    /// Run the motion driver for this frame.
    pub fn drive(&mut self) -> MotionStep {
        self.motion.step(
            &mut *self.data,
            self.config,
            &mut *self.body,
            self.state_time,
            self.dt,
        )
    }
}

// ============================================================================
// Completion Slot
// ============================================================================

/// What a resolved animation event means to the active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    End,
    Marker(u32),
}

/// At most one pending on-end event plus normalized-time markers, owned by
/// the active state of one machine.
///
/// Tokens increase monotonically and are never reissued.
#[derive(Debug, Default)]
pub struct CompletionSlot {
    next_token: u64,
    on_end: Option<CompletionToken>,
    markers: Vec<(CompletionToken, u32)>,
}

impl CompletionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self) -> CompletionToken {
        self.next_token += 1;
        CompletionToken(self.next_token)
    }

    /// Arm the on-end event, replacing any previous one.
    pub fn arm_on_end(&mut self, anim: &mut dyn AnimationFacade, layer: AnimLayer) -> CompletionToken {
        let token = self.issue();
        self.on_end = Some(token);
        anim.set_on_end_callback(layer, token);
        token
    }

    pub fn add_marker(
        &mut self,
        anim: &mut dyn AnimationFacade,
        layer: AnimLayer,
        normalized_time: f32,
        marker: u32,
    ) -> CompletionToken {
        let token = self.issue();
        self.markers.push((token, marker));
        anim.add_callback(layer, normalized_time, token);
        token
    }

    /// Match a fired token against what is pending; each token resolves once.
    pub fn resolve(&mut self, token: CompletionToken) -> Option<Completion> {
        if self.on_end == Some(token) {
            self.on_end = None;
            return Some(Completion::End);
        }
        if let Some(index) = self.markers.iter().position(|(t, _)| *t == token) {
            let (_, marker) = self.markers.swap_remove(index);
            return Some(Completion::Marker(marker));
        }
        trace!("Token {} is not pending", token.id());
        None
    }

    pub fn is_armed(&self) -> bool {
        self.on_end.is_some()
    }

    pub fn pending_markers(&self) -> usize {
        self.markers.len()
    }

    /// Drop everything pending; later events for these tokens are stale.
    pub fn clear(&mut self) {
        self.on_end = None;
        self.markers.clear();
    }
}
