//! Generic layered state machine with an interrupt pipeline.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace, warn};

use super::{Completion, CompletionSlot, FrameEnv, State, StateContext, StateId};
use crate::error::{LocomotionError, Result};
use crate::facade::{AnimLayer, CompletionToken};
use crate::interrupt::InterruptPipeline;

/// Why a transition happened; logged with every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    Initial,
    Interrupt,
    Logic,
    AnimationEvent,
}

/// Holds exactly one active state per layer once initialized.
pub struct StateMachine<Id: StateId> {
    layer: AnimLayer,
    states: HashMap<Id, Box<dyn State<Id>>>,
    current: Option<Id>,
    fallback: Id,
    interrupts: InterruptPipeline<Id>,
    completion: CompletionSlot,
    state_time: f32,
    enter_count: u64,
    exit_count: u64,
}

impl<Id: StateId> fmt::Debug for StateMachine<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("layer", &self.layer)
            .field("current", &self.current)
            .field("state_time", &self.state_time)
            .field("states", &self.states.len())
            .field("interrupts", &self.interrupts)
            .finish()
    }
}

impl<Id: StateId> StateMachine<Id> {
    /// Build a machine; the roster must contain the fallback state.
    pub fn new(
        layer: AnimLayer,
        states: HashMap<Id, Box<dyn State<Id>>>,
        fallback: Id,
        interrupts: InterruptPipeline<Id>,
    ) -> Result<Self> {
        if !states.contains_key(&fallback) {
            return Err(LocomotionError::MissingFallbackState {
                layer: layer.name(),
                state: format!("{:?}", fallback),
            });
        }
        Ok(Self {
            layer,
            states,
            current: None,
            fallback,
            interrupts,
            completion: CompletionSlot::new(),
            state_time: 0.0,
            enter_count: 0,
            exit_count: 0,
        })
    }

    pub fn layer(&self) -> AnimLayer {
        self.layer
    }

    pub fn current(&self) -> Option<Id> {
        self.current
    }

    pub fn state_time(&self) -> f32 {
        self.state_time
    }

    pub fn contains(&self, id: Id) -> bool {
        self.states.contains_key(&id)
    }

    pub fn interrupts(&self) -> &InterruptPipeline<Id> {
        &self.interrupts
    }

    /// Enter and exit totals; they differ by one while a state is active.
    pub fn transition_counts(&self) -> (u64, u64) {
        (self.enter_count, self.exit_count)
    }

    pub fn completion(&self) -> &CompletionSlot {
        &self.completion
    }

    /// Set the first active state and enter it.
    pub fn initialize(&mut self, env: &mut FrameEnv<'_>, initial: Id) {
        if self.current.is_some() {
            warn!("{} machine initialized twice; restarting", self.layer.name());
        }
        self.change_state(env, initial, TransitionCause::Initial);
    }

    /// Exit the current state and enter `next` within this call.
    ///
    /// Unregistered targets are replaced by the fallback state.
    pub fn change_state(&mut self, env: &mut FrameEnv<'_>, next: Id, cause: TransitionCause) {
        let target = if self.states.contains_key(&next) {
            next
        } else {
            warn!(
                "{} state {:?} is not registered, using {:?}",
                self.layer.name(),
                next,
                self.fallback
            );
            self.fallback
        };

        self.exit_current(env);

        debug!(
            "{} state {:?} -> {:?} ({:?})",
            self.layer.name(),
            self.current,
            target,
            cause
        );
        self.current = Some(target);
        self.state_time = 0.0;
        target.publish(env.data);

        if let Some(state) = self.states.get_mut(&target) {
            let mut ctx = StateContext::new(env, &mut self.completion, self.layer, 0.0);
            state.enter(&mut ctx);
            self.enter_count += 1;
        }
    }

    /// Exit the active state, leaving the machine without one.
    pub fn shutdown(&mut self, env: &mut FrameEnv<'_>) {
        self.exit_current(env);
        self.current = None;
        self.state_time = 0.0;
    }

    fn exit_current(&mut self, env: &mut FrameEnv<'_>) {
        if let Some(current) = self.current {
            if let Some(state) = self.states.get_mut(&current) {
                let mut ctx =
                    StateContext::new(env, &mut self.completion, self.layer, self.state_time);
                state.exit(&mut ctx);
                self.exit_count += 1;
            }
        }
        // Nothing armed by the old state may fire into the next one
        self.completion.clear();
        env.anim.clear_on_end_callback(self.layer);
    }

    /// Run the interrupt pipeline unless the active state opted out.
    ///
    /// Returns `true` when a transition happened.
    pub fn check_interrupts(&mut self, env: &mut FrameEnv<'_>) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let accepts = self
            .states
            .get(&current)
            .map_or(true, |state| state.accepts_interrupts());
        if !accepts {
            return false;
        }
        match self.interrupts.evaluate(env.data, current) {
            Some(next) => {
                self.change_state(env, next, TransitionCause::Interrupt);
                true
            }
            None => false,
        }
    }

    /// Advance state time and let the active state move the body.
    pub fn physics_update(&mut self, env: &mut FrameEnv<'_>) {
        let Some(current) = self.current else {
            return;
        };
        self.state_time += env.dt;
        if let Some(state) = self.states.get_mut(&current) {
            let mut ctx = StateContext::new(env, &mut self.completion, self.layer, self.state_time);
            state.physics_update(&mut ctx);
        }
    }

    /// Let the active state decide whether to transition.
    pub fn logic_update(&mut self, env: &mut FrameEnv<'_>) {
        let Some(current) = self.current else {
            return;
        };
        let next = match self.states.get_mut(&current) {
            Some(state) => {
                let mut ctx =
                    StateContext::new(env, &mut self.completion, self.layer, self.state_time);
                state.logic_update(&mut ctx)
            }
            None => None,
        };
        if let Some(next) = next {
            self.change_state(env, next, TransitionCause::Logic);
        }
    }

    /// Route an animation event to the active state if its token is pending.
    pub fn handle_animation_event(&mut self, env: &mut FrameEnv<'_>, token: CompletionToken) {
        let Some(current) = self.current else {
            trace!("{} event {} with no active state", self.layer.name(), token.id());
            return;
        };
        let Some(completion) = self.completion.resolve(token) else {
            trace!("Stale {} animation event {} ignored", self.layer.name(), token.id());
            return;
        };
        let next = match self.states.get_mut(&current) {
            Some(state) => {
                let mut ctx =
                    StateContext::new(env, &mut self.completion, self.layer, self.state_time);
                match completion {
                    Completion::End => state.on_clip_end(&mut ctx),
                    Completion::Marker(marker) => state.on_clip_marker(marker, &mut ctx),
                }
            }
            None => None,
        };
        if let Some(next) = next {
            self.change_state(env, next, TransitionCause::AnimationEvent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::RuntimeData;
    use crate::interrupt::{Interceptor, RuleInterceptor};
    use crate::testing::Harness;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Minimal id set for exercising the machine on its own.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Toy {
        Rest,
        Busy,
        Locked,
        Ghost,
    }

    impl StateId for Toy {
        fn publish(self, data: &mut RuntimeData) {
            data.frame = self as u64;
        }
    }

    #[derive(Default)]
    struct Counters {
        enters: AtomicU32,
        exits: AtomicU32,
        ends: AtomicU32,
    }

    struct ToyState {
        id: Toy,
        counters: Arc<Counters>,
        next_on_end: Option<Toy>,
    }

    impl State<Toy> for ToyState {
        fn id(&self) -> Toy {
            self.id
        }

        fn enter(&mut self, ctx: &mut StateContext<'_>) {
            self.counters.enters.fetch_add(1, Ordering::SeqCst);
            ctx.arm_on_end();
        }

        fn exit(&mut self, _ctx: &mut StateContext<'_>) {
            self.counters.exits.fetch_add(1, Ordering::SeqCst);
        }

        fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<Toy> {
            (self.id == Toy::Busy && ctx.state_time > 0.45).then_some(Toy::Rest)
        }

        fn accepts_interrupts(&self) -> bool {
            self.id != Toy::Locked
        }

        fn on_clip_end(&mut self, _ctx: &mut StateContext<'_>) -> Option<Toy> {
            self.counters.ends.fetch_add(1, Ordering::SeqCst);
            self.next_on_end
        }
    }

    fn machine(counters: &Arc<Counters>, rules: Vec<Box<dyn Interceptor<Toy>>>) -> StateMachine<Toy> {
        let mut states: HashMap<Toy, Box<dyn State<Toy>>> = HashMap::new();
        for (id, next_on_end) in [
            (Toy::Rest, None),
            (Toy::Busy, Some(Toy::Rest)),
            (Toy::Locked, Some(Toy::Rest)),
        ] {
            states.insert(
                id,
                Box::new(ToyState {
                    id,
                    counters: counters.clone(),
                    next_on_end,
                }),
            );
        }
        StateMachine::new(AnimLayer::Base, states, Toy::Rest, InterruptPipeline::new(rules)).unwrap()
    }

    fn busy_when_jumping() -> Box<dyn Interceptor<Toy>> {
        Box::new(RuleInterceptor::new("busy", |data: &RuntimeData, current: Toy| {
            (data.intents.wants_to_jump && current != Toy::Busy).then_some(Toy::Busy)
        }))
    }

    #[test]
    fn test_missing_fallback_is_rejected() {
        let result = StateMachine::<Toy>::new(
            AnimLayer::Base,
            HashMap::new(),
            Toy::Rest,
            InterruptPipeline::new(Vec::new()),
        );
        assert!(matches!(result, Err(LocomotionError::MissingFallbackState { .. })));
    }

    #[test]
    fn test_enter_exit_pairing() {
        let counters = Arc::new(Counters::default());
        let mut machine = machine(&counters, Vec::new());
        let mut harness = Harness::new();
        let mut env = harness.env(1.0 / 60.0);

        machine.initialize(&mut env, Toy::Rest);
        machine.change_state(&mut env, Toy::Busy, TransitionCause::Logic);
        machine.change_state(&mut env, Toy::Locked, TransitionCause::Logic);
        assert_eq!(machine.current(), Some(Toy::Locked));
        assert_eq!(machine.transition_counts(), (3, 2));

        machine.shutdown(&mut env);
        assert_eq!(machine.current(), None);
        assert_eq!(machine.transition_counts(), (3, 3));
        assert_eq!(counters.enters.load(Ordering::SeqCst), 3);
        assert_eq!(counters.exits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unregistered_target_uses_fallback() {
        let counters = Arc::new(Counters::default());
        let mut machine = machine(&counters, Vec::new());
        let mut harness = Harness::new();
        let mut env = harness.env(1.0 / 60.0);
        machine.initialize(&mut env, Toy::Busy);
        machine.change_state(&mut env, Toy::Ghost, TransitionCause::Logic);
        assert_eq!(machine.current(), Some(Toy::Rest));
    }

    #[test]
    fn test_interrupts_respect_opt_out() {
        let counters = Arc::new(Counters::default());
        let mut machine = machine(&counters, vec![busy_when_jumping()]);
        let mut harness = Harness::new();
        let mut env = harness.env(1.0 / 60.0);
        env.data.intents.wants_to_jump = true;

        machine.initialize(&mut env, Toy::Locked);
        assert!(!machine.check_interrupts(&mut env));
        assert_eq!(machine.current(), Some(Toy::Locked));

        machine.change_state(&mut env, Toy::Rest, TransitionCause::Logic);
        assert!(machine.check_interrupts(&mut env));
        assert_eq!(machine.current(), Some(Toy::Busy));
    }

    #[test]
    fn test_logic_transition_uses_state_time() {
        let counters = Arc::new(Counters::default());
        let mut machine = machine(&counters, Vec::new());
        let mut harness = Harness::new();
        let mut env = harness.env(0.1);
        machine.initialize(&mut env, Toy::Busy);
        for _ in 0..4 {
            machine.physics_update(&mut env);
            machine.logic_update(&mut env);
            assert_eq!(machine.current(), Some(Toy::Busy));
        }
        machine.physics_update(&mut env);
        machine.logic_update(&mut env);
        assert_eq!(machine.current(), Some(Toy::Rest));
        assert_eq!(machine.state_time(), 0.0);
    }

    #[test]
    fn test_stale_end_event_is_ignored() {
        let counters = Arc::new(Counters::default());
        let mut machine = machine(&counters, Vec::new());
        let mut harness = Harness::new();
        let base = AnimLayer::Base.index();

        machine.initialize(&mut harness.env(1.0 / 60.0), Toy::Busy);
        let stale = harness.anim.on_end[base].unwrap();
        machine.change_state(&mut harness.env(1.0 / 60.0), Toy::Locked, TransitionCause::Interrupt);
        let live = harness.anim.on_end[base].unwrap();
        assert_ne!(stale, live);

        let mut env = harness.env(1.0 / 60.0);
        machine.handle_animation_event(&mut env, stale);
        assert_eq!(machine.current(), Some(Toy::Locked));
        assert_eq!(counters.ends.load(Ordering::SeqCst), 0);

        machine.handle_animation_event(&mut env, live);
        assert_eq!(machine.current(), Some(Toy::Rest));
        assert_eq!(counters.ends.load(Ordering::SeqCst), 1);
    }
}
