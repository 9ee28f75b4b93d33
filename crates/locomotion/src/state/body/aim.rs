//! Aim locomotion: strafing while facing the authority yaw.

use super::BodyStateId;
use crate::facade::AnimLayer;
use crate::motion::driver::DriveMode;
use crate::state::{State, StateContext};

/// `AimIdle` or `AimMove`; the pair swaps on move input.
#[derive(Debug, Clone, Copy)]
pub struct AimState {
    id: BodyStateId,
}

impl AimState {
    pub fn idle() -> Self {
        Self {
            id: BodyStateId::AimIdle,
        }
    }

    pub fn moving() -> Self {
        Self {
            id: BodyStateId::AimMove,
        }
    }
}

impl State<BodyStateId> for AimState {
    fn id(&self) -> BodyStateId {
        self.id
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        let clip = match self.id {
            BodyStateId::AimMove => &config.clips.aim_move,
            _ => &config.clips.aim_idle,
        };
        ctx.play(clip);
        ctx.motion.set_mode(DriveMode::Strafe);
    }

    fn physics_update(&mut self, ctx: &mut StateContext<'_>) {
        ctx.drive();
        if self.id == BodyStateId::AimMove {
            ctx.anim
                .set_mixer_parameter(AnimLayer::Base, ctx.data.move_input);
        }
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        match (self.id, ctx.data.has_move_input) {
            (BodyStateId::AimIdle, true) => Some(BodyStateId::AimMove),
            (BodyStateId::AimMove, false) => Some(BodyStateId::AimIdle),
            _ => None,
        }
    }
}
