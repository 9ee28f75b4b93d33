//! Atomic full-body actions played through the motion warper.
//!
//! Dodge and roll use the unwarped path (no runtime anchors). Vault warps its
//! clip onto the detected ledge and landing points and drives hand IK from
//! the warp's weight curve. None of these accept interrupts.

use bevy::math::{Quat, Vec3};
use tracing::{debug, warn};

use super::{grounded_next, BodyStateId};
use crate::facade::{IkBodyPart, IkTarget};
use crate::motion::clip::MotionDirection;
use crate::motion::smoothing::{delta_angle, yaw_from_direction, yaw_rotation};
use crate::motion::warp::WarpedMotionData;
use crate::state::{State, StateContext};

/// Start a warp clip from the body's current position.
fn begin_warp(
    ctx: &mut StateContext<'_>,
    data: &WarpedMotionData,
    entry_rotation: Quat,
    targets: &[Vec3],
) {
    ctx.play(&data.clip);
    let position = ctx.data.position;
    ctx.motion
        .begin_warp(data.clone(), position, entry_rotation, targets);
}

/// Leave once the warp passes its exit time, or at once if it never started.
fn warp_exit(ctx: &StateContext<'_>, active: bool, exit_at: f32) -> Option<BodyStateId> {
    if !active {
        return Some(grounded_next(ctx.data));
    }
    let progress = ctx.motion.warp_progress().unwrap_or(1.0);
    (progress >= exit_at).then(|| grounded_next(ctx.data))
}

// ============================================================================
// Dodge / Roll
// ============================================================================

/// Directional dodge or forward roll.
#[derive(Debug, Clone, Copy)]
pub struct EvasiveState {
    id: BodyStateId,
    active: bool,
    exit_at: f32,
}

impl EvasiveState {
    pub fn dodge() -> Self {
        Self {
            id: BodyStateId::Dodge,
            active: false,
            exit_at: 1.0,
        }
    }

    pub fn roll() -> Self {
        Self {
            id: BodyStateId::Roll,
            ..Self::dodge()
        }
    }
}

impl State<BodyStateId> for EvasiveState {
    fn id(&self) -> BodyStateId {
        self.id
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        let facing = ctx.data.facing_yaw();
        let (warp, entry_yaw) = if self.id == BodyStateId::Dodge {
            // Dodges keep facing; no input steps back
            let direction = if ctx.data.has_move_input {
                MotionDirection::cardinal_bucket(delta_angle(facing, ctx.data.desired_move_yaw))
            } else {
                MotionDirection::Back
            };
            debug!("Dodge {:?}", direction);
            (config.motion.dodge(direction), facing)
        } else {
            let yaw = if ctx.data.has_move_input {
                ctx.data.desired_move_yaw
            } else {
                facing
            };
            (config.motion.roll.as_ref(), yaw)
        };

        match warp {
            Some(warp) => {
                begin_warp(ctx, warp, yaw_rotation(entry_yaw), &[]);
                self.exit_at = warp.exit_normalized_time;
                self.active = true;
            }
            None => {
                warn!("No warp data configured for {:?}", self.id);
                self.active = false;
            }
        }
    }

    fn physics_update(&mut self, ctx: &mut StateContext<'_>) {
        if self.active {
            ctx.drive();
        }
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        warp_exit(ctx, self.active, self.exit_at)
    }

    fn exit(&mut self, ctx: &mut StateContext<'_>) {
        self.active = false;
        ctx.motion.clear();
    }

    fn accepts_interrupts(&self) -> bool {
        false
    }
}

// ============================================================================
// Vault
// ============================================================================

/// Warped vault over a detected obstacle.
#[derive(Debug, Clone, Copy)]
pub struct VaultState {
    active: bool,
    exit_at: f32,
}

impl Default for VaultState {
    fn default() -> Self {
        Self {
            active: false,
            exit_at: 1.0,
        }
    }
}

impl State<BodyStateId> for VaultState {
    fn id(&self) -> BodyStateId {
        BodyStateId::Vault
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        let kind = ctx.data.vault_kind.take();
        let obstacle = ctx.data.vault_obstacle.take().filter(|o| o.is_valid);
        let (Some(kind), Some(obstacle)) = (kind, obstacle) else {
            warn!("Vault entered without obstacle data");
            self.active = false;
            return;
        };
        let Some(warp) = config.motion.vault(kind) else {
            warn!("No {:?} vault warp configured", kind);
            self.active = false;
            return;
        };

        // Face the wall; fall back to the current heading for degenerate normals
        let toward_wall = Vec3::new(-obstacle.wall_normal.x, 0.0, -obstacle.wall_normal.z);
        let entry_rotation = if toward_wall.length_squared() > 1e-6 {
            yaw_rotation(yaw_from_direction(toward_wall))
        } else {
            ctx.data.rotation
        };

        let mut targets = vec![obstacle.ledge_point];
        targets.extend(obstacle.landing_point);
        debug!(
            "{:?} vault: height {:.2}, {} anchor(s)",
            kind,
            obstacle.height,
            targets.len()
        );
        begin_warp(ctx, warp, entry_rotation, &targets);

        ctx.ik
            .set_ik_target(IkBodyPart::LeftHand, IkTarget::at(obstacle.left_hand), 0.0);
        ctx.ik
            .set_ik_target(IkBodyPart::RightHand, IkTarget::at(obstacle.right_hand), 0.0);
        self.exit_at = warp.exit_normalized_time;
        self.active = true;
    }

    fn physics_update(&mut self, ctx: &mut StateContext<'_>) {
        if !self.active {
            return;
        }
        ctx.drive();
        let weight = ctx.motion.warp_hand_ik_weight().unwrap_or(0.0);
        ctx.ik.update_ik_weight(IkBodyPart::LeftHand, weight);
        ctx.ik.update_ik_weight(IkBodyPart::RightHand, weight);
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<BodyStateId> {
        warp_exit(ctx, self.active, self.exit_at)
    }

    fn exit(&mut self, ctx: &mut StateContext<'_>) {
        ctx.ik.update_ik_weight(IkBodyPart::LeftHand, 0.0);
        ctx.ik.update_ik_weight(IkBodyPart::RightHand, 0.0);
        ctx.motion.clear();
        self.active = false;
    }

    fn accepts_interrupts(&self) -> bool {
        false
    }
}
