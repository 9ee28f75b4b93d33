//! Airborne states: Jump, DoubleJump, Fall and the Land buffer.

use tracing::debug;

use super::{grounded_next, BodyStateId};
use crate::config::LocomotionConfig;
use crate::facade::{AnimLayer, PlayOptions};
use crate::motion::driver::DriveMode;
use crate::state::{State, StateContext};

/// Ignore the ground for a moment after take-off.
const TAKEOFF_GRACE: f32 = 0.1;

// ============================================================================
// Jump / DoubleJump
// ============================================================================

/// Launch with an upward velocity, then steer with air control.
#[derive(Debug, Clone, Copy)]
pub struct JumpState {
    id: BodyStateId,
    velocity: f32,
}

impl JumpState {
    pub fn single(config: &LocomotionConfig) -> Self {
        Self {
            id: BodyStateId::Jump,
            velocity: config.jump.jump_velocity,
        }
    }

    pub fn double(config: &LocomotionConfig) -> Self {
        Self {
            id: BodyStateId::DoubleJump,
            velocity: config.jump.double_jump_velocity,
        }
    }

    fn is_double(&self) -> bool {
        self.id == BodyStateId::DoubleJump
    }
}

impl State<BodyStateId> for JumpState {
    fn id(&self) -> BodyStateId {
        self.id
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        let clip = if self.is_double() {
            ctx.data.double_jump_used = true;
            &config.clips.double_jump
        } else {
            &config.clips.jump
        };
        ctx.play(clip);
        ctx.motion.set_mode(DriveMode::Input);
        ctx.motion.launch(ctx.data, self.velocity);
        debug!("{:?} launched at {:.2} m/s", self.id, self.velocity);
    }

    fn physics_update(&mut self, ctx: &mut StateContext<'_>) {
        ctx.drive();
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        if ctx.data.is_grounded && ctx.state_time > TAKEOFF_GRACE {
            return Some(BodyStateId::Land);
        }
        (ctx.data.vertical_velocity <= 0.0).then_some(BodyStateId::Fall)
    }
}

// ============================================================================
// Fall
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct FallState;

impl State<BodyStateId> for FallState {
    fn id(&self) -> BodyStateId {
        BodyStateId::Fall
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        ctx.play(&config.clips.fall);
        ctx.motion.set_mode(DriveMode::Input);
    }

    fn physics_update(&mut self, ctx: &mut StateContext<'_>) {
        ctx.drive();
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        ctx.data.is_grounded.then_some(BodyStateId::Land)
    }
}

// ============================================================================
// Land
// ============================================================================

/// Uninterruptible landing buffer; long falls use the hard-landing clip.
#[derive(Debug, Clone, Copy, Default)]
pub struct LandState {
    buffer: f32,
    hard: bool,
}

impl State<BodyStateId> for LandState {
    fn id(&self) -> BodyStateId {
        BodyStateId::Land
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        let (jump, clips) = (&config.jump, &config.clips);
        self.hard = ctx.data.landed_air_time >= jump.hard_land_air_time;
        if self.hard {
            debug!("Hard landing after {:.2}s airborne", ctx.data.landed_air_time);
            self.buffer = jump.hard_land_buffer;
            ctx.play(&clips.hard_land);
            ctx.motion.set_mode(DriveMode::Stationary);
        } else {
            self.buffer = jump.land_buffer;
            ctx.play(&clips.land);
            ctx.motion.set_mode(DriveMode::Input);
        }
    }

    fn physics_update(&mut self, ctx: &mut StateContext<'_>) {
        ctx.drive();
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        if ctx.state_time < self.buffer {
            return None;
        }
        let fade = ctx.config.jump.next_state_fade;
        ctx.data
            .set_next_state_play_options(PlayOptions::on(AnimLayer::Base).with_fade(fade));
        Some(grounded_next(ctx.data))
    }

    fn exit(&mut self, _ctx: &mut StateContext<'_>) {
        self.hard = false;
    }

    fn accepts_interrupts(&self) -> bool {
        false
    }
}
