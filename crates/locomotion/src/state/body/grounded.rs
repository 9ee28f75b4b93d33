//! On-foot locomotion: Idle, MoveStart, MoveLoop and Stop.
//!
//! Starts and stops are driven by baked clips so the feet plant where the
//! animation expects; the loop is input driven and tracks the foot phase so
//! the next stop can pick the matching left/right clip.

use bevy::math::Vec2;
use tracing::debug;

use super::BodyStateId;
use crate::blackboard::LocomotionTier;
use crate::facade::AnimLayer;
use crate::motion::clip::{FootPhase, MotionClipData, MotionDirection};
use crate::motion::driver::DriveMode;
use crate::motion::smoothing::delta_angle;
use crate::state::{State, StateContext};

/// Start clips and stop clips are authored for moving tiers only.
fn moving_tier(tier: LocomotionTier) -> LocomotionTier {
    match tier {
        LocomotionTier::Idle => LocomotionTier::Jog,
        other => other,
    }
}

/// Play a baked clip on the base layer and hand it to the motion driver.
fn start_clip(ctx: &mut StateContext<'_>, clip: &MotionClipData, mode: DriveMode) {
    ctx.play_at_speed(&clip.clip, clip.resolved_playback_speed());
    ctx.motion.set_clip(clip.clone(), mode, ctx.data.rotation);
    ctx.arm_on_end();
}

// ============================================================================
// Idle
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct IdleState;

impl State<BodyStateId> for IdleState {
    fn id(&self) -> BodyStateId {
        BodyStateId::Idle
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        ctx.play(&config.clips.idle);
        ctx.motion.set_mode(DriveMode::Stationary);
    }

    fn physics_update(&mut self, ctx: &mut StateContext<'_>) {
        ctx.drive();
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        ctx.data.has_move_input.then_some(BodyStateId::MoveStart)
    }
}

// ============================================================================
// MoveStart
// ============================================================================

/// Plant-and-turn start clip, then free control once the turn is done.
#[derive(Debug, Clone, Default)]
pub struct MoveStartState {
    clip: Option<MotionClipData>,
}

impl State<BodyStateId> for MoveStartState {
    fn id(&self) -> BodyStateId {
        BodyStateId::MoveStart
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        let relative = delta_angle(ctx.data.facing_yaw(), ctx.data.desired_move_yaw);
        let direction = MotionDirection::start_bucket(relative);
        let tier = moving_tier(ctx.data.tier);

        match config.motion.start_clip(tier, direction) {
            Some(clip) => {
                debug!("Move start {:?}/{:?} ({:.0} deg)", tier, direction, relative);
                start_clip(ctx, clip, DriveMode::Mixed);
                ctx.data.foot_phase = clip.end_phase;
                self.clip = Some(clip.clone());
            }
            None => {
                ctx.play(&config.clips.move_loop);
                ctx.motion.set_mode(DriveMode::Input);
                self.clip = None;
            }
        }
    }

    fn physics_update(&mut self, ctx: &mut StateContext<'_>) {
        ctx.drive();
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        if !ctx.data.has_move_input {
            return Some(BodyStateId::Stop);
        }
        match &self.clip {
            Some(clip) if !clip.is_finished(ctx.state_time) => None,
            _ => Some(BodyStateId::MoveLoop),
        }
    }

    fn on_clip_end(&mut self, _ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        Some(BodyStateId::MoveLoop)
    }

    fn exit(&mut self, ctx: &mut StateContext<'_>) {
        self.clip = None;
        ctx.motion.clear();
    }
}

// ============================================================================
// MoveLoop
// ============================================================================

/// Input-driven locomotion blend space.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveLoopState;

impl State<BodyStateId> for MoveLoopState {
    fn id(&self) -> BodyStateId {
        BodyStateId::MoveLoop
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        // Continue the cycle on the foot the previous clip ended on
        let start = match ctx.data.foot_phase {
            FootPhase::Left => 0.0,
            FootPhase::Right => 0.5,
        };
        let options = ctx.play_options().starting_at(start);
        ctx.anim.play_transition(&config.clips.move_loop, &options);
        ctx.motion.set_mode(DriveMode::Input);
    }

    fn physics_update(&mut self, ctx: &mut StateContext<'_>) {
        ctx.drive();
        let local = ctx.data.rotation.inverse() * ctx.data.horizontal_velocity;
        ctx.anim
            .set_mixer_parameter(AnimLayer::Base, Vec2::new(local.x, local.z));
        ctx.data.foot_phase =
            FootPhase::from_cycle(ctx.anim.current_normalized_time(AnimLayer::Base));
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        (!ctx.data.has_move_input).then_some(BodyStateId::Stop)
    }
}

// ============================================================================
// Stop
// ============================================================================

/// Foot-matched stop clip.
#[derive(Debug, Clone, Default)]
pub struct StopState {
    clip: Option<MotionClipData>,
}

impl State<BodyStateId> for StopState {
    fn id(&self) -> BodyStateId {
        BodyStateId::Stop
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        let tier = moving_tier(ctx.data.last_moving_tier);
        let phase = ctx.data.foot_phase;

        match config.motion.stop_clip(tier, phase) {
            Some(clip) => {
                debug!("Stop {:?} on {:?} foot", tier, phase);
                start_clip(ctx, clip, DriveMode::Curve);
                self.clip = Some(clip.clone());
            }
            None => {
                ctx.play(&config.clips.idle);
                ctx.motion.set_mode(DriveMode::Stationary);
                self.clip = None;
            }
        }
    }

    fn physics_update(&mut self, ctx: &mut StateContext<'_>) {
        ctx.drive();
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        if ctx.data.has_move_input {
            return Some(BodyStateId::MoveStart);
        }
        match &self.clip {
            Some(clip) if !clip.is_finished(ctx.state_time) => None,
            _ => Some(BodyStateId::Idle),
        }
    }

    fn on_clip_end(&mut self, _ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        Some(BodyStateId::Idle)
    }

    fn exit(&mut self, ctx: &mut StateContext<'_>) {
        self.clip = None;
        ctx.motion.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::smoothing::yaw_rotation;
    use crate::testing::Harness;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_idle_starts_moving_on_input() {
        let mut harness = Harness::new();
        let mut state = IdleState;
        let mut slot = crate::state::CompletionSlot::new();
        let mut env = harness.env(DT);
        let mut ctx = StateContext::new(&mut env, &mut slot, AnimLayer::Base, 0.0);
        state.enter(&mut ctx);
        assert_eq!(state.logic_update(&mut ctx), None);
        ctx.data.has_move_input = true;
        assert_eq!(state.logic_update(&mut ctx), Some(BodyStateId::MoveStart));
        assert_eq!(harness.anim.last_clip(), Some("Idle"));
    }

    #[test]
    fn test_move_start_picks_direction_bucket() {
        let mut harness = Harness::new();
        harness.data.rotation = yaw_rotation(0.0);
        harness.data.has_move_input = true;
        harness.data.tier = LocomotionTier::Sprint;
        harness.data.desired_move_yaw = 90.0;

        let mut state = MoveStartState::default();
        let mut slot = crate::state::CompletionSlot::new();
        {
            let mut env = harness.env(DT);
            let mut ctx = StateContext::new(&mut env, &mut slot, AnimLayer::Base, 0.0);
            state.enter(&mut ctx);
        }
        assert_eq!(harness.anim.last_clip(), Some("start_sprint_right"));
        assert_eq!(harness.motion.mode(), DriveMode::Mixed);
        assert!(slot.is_armed());
    }

    #[test]
    fn test_move_start_without_input_stops() {
        let mut harness = Harness::new();
        let mut state = MoveStartState::default();
        let mut slot = crate::state::CompletionSlot::new();
        let mut env = harness.env(DT);
        let mut ctx = StateContext::new(&mut env, &mut slot, AnimLayer::Base, 0.0);
        ctx.data.has_move_input = true;
        state.enter(&mut ctx);
        ctx.data.has_move_input = false;
        assert_eq!(state.logic_update(&mut ctx), Some(BodyStateId::Stop));
    }

    #[test]
    fn test_move_loop_starts_on_planted_foot() {
        let mut harness = Harness::new();
        harness.data.foot_phase = FootPhase::Right;
        let mut slot = crate::state::CompletionSlot::new();
        {
            let mut env = harness.env(DT);
            let mut ctx = StateContext::new(&mut env, &mut slot, AnimLayer::Base, 0.0);
            MoveLoopState.enter(&mut ctx);
        }
        let (clip, options) = harness.anim.plays.last().unwrap();
        assert_eq!(clip, "Locomotion");
        assert_eq!(options.start_normalized_time, Some(0.5));
        assert_eq!(harness.motion.mode(), DriveMode::Input);
    }

    #[test]
    fn test_stop_uses_foot_phase_and_tier() {
        let mut harness = Harness::new();
        harness.data.last_moving_tier = LocomotionTier::Walk;
        harness.data.foot_phase = FootPhase::Right;
        let mut state = StopState::default();
        let mut slot = crate::state::CompletionSlot::new();
        {
            let mut env = harness.env(DT);
            let mut ctx = StateContext::new(&mut env, &mut slot, AnimLayer::Base, 0.0);
            state.enter(&mut ctx);
        }
        assert_eq!(harness.anim.last_clip(), Some("stop_walk_right"));
        assert_eq!(harness.motion.mode(), DriveMode::Curve);

        let mut env = harness.env(DT);
        let mut ctx = StateContext::new(&mut env, &mut slot, AnimLayer::Base, 10.0);
        assert_eq!(state.logic_update(&mut ctx), Some(BodyStateId::Idle));
    }
}
