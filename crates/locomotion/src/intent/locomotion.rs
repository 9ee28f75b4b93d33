//! Locomotion processor: desired move direction, stamina and tier.

use bevy::math::{Vec2, Vec3};
use tracing::debug;

use super::{IntentContext, IntentProcessor};
use crate::blackboard::{LocomotionTier, RuntimeData};
use crate::config::StaminaConfig;
use crate::input::InputButton;
use crate::motion::smoothing::{direction_from_yaw, wrap_degrees};

/// Tier by priority: no input, sprint, walk modifier, jog.
pub fn select_tier(data: &RuntimeData) -> LocomotionTier {
    if !data.has_move_input {
        LocomotionTier::Idle
    } else if data.input.held(InputButton::Sprint)
        && !data.is_stamina_depleted
        && data.stamina > 0.0
    {
        LocomotionTier::Sprint
    } else if data.input.held(InputButton::Walk) {
        LocomotionTier::Walk
    } else {
        LocomotionTier::Jog
    }
}

/// Drain while running, regenerate after the regen delay, and track the
/// depletion hysteresis.
///
/// Uses the previous frame's `is_running`; stamina stays within
/// `[0, max_stamina]`.
pub fn update_stamina(data: &mut RuntimeData, stamina: &StaminaConfig, dt: f32) {
    if data.is_running {
        data.stamina -= stamina.drain_rate * dt;
        data.stamina_regen_timer = 0.0;
    } else {
        data.stamina_regen_timer += dt;
        if data.stamina_regen_timer >= stamina.regen_delay {
            data.stamina += stamina.regen_rate * dt;
        }
    }
    data.stamina = data.stamina.clamp(0.0, data.max_stamina);

    if data.stamina <= 0.0 {
        if !data.is_stamina_depleted {
            debug!("Stamina depleted");
        }
        data.is_stamina_depleted = true;
    } else if data.is_stamina_depleted
        && data.stamina > data.max_stamina * stamina.recovery_fraction
    {
        data.is_stamina_depleted = false;
        debug!("Stamina recovered ({:.1})", data.stamina);
    }
}

/// Frame-rate independent blend of a direction toward `desired`.
pub fn smooth_direction(current: Vec3, desired: Vec3, sharpness: f32, dt: f32) -> Vec3 {
    if current.length_squared() < 1e-6 {
        return desired;
    }
    let t = 1.0 - (-sharpness * dt).exp();
    // Opposite directions can cancel out; snap instead of passing through zero
    current.lerp(desired, t).try_normalize().unwrap_or(desired)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocomotionProcessor;

impl IntentProcessor for LocomotionProcessor {
    fn name(&self) -> &'static str {
        "locomotion"
    }

    fn process(&mut self, ctx: &mut IntentContext<'_>) {
        let movement = &ctx.config.movement;
        let data = &mut *ctx.data;

        let axis = data.input.move_axis;
        data.has_move_input = axis.length() > movement.input_deadzone;
        if data.has_move_input {
            data.move_input = axis.clamp_length_max(1.0);
            let yaw = wrap_degrees(axis.x.atan2(axis.y).to_degrees() + data.authority_yaw);
            data.desired_move_yaw = yaw;
            data.move_direction = smooth_direction(
                data.move_direction,
                direction_from_yaw(yaw),
                movement.direction_sharpness,
                ctx.dt,
            );
        } else {
            data.move_input = Vec2::ZERO;
        }

        update_stamina(data, &ctx.config.stamina, ctx.dt);

        let tier = select_tier(data);
        if tier != data.tier {
            debug!("Locomotion tier {:?} -> {:?}", data.tier, tier);
        }
        data.tier = tier;
        data.is_running = tier == LocomotionTier::Sprint;
        if tier != LocomotionTier::Idle {
            data.last_moving_tier = tier;
        }
    }
}
