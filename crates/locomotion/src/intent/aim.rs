//! Aim processor: immediate aim entry, delayed aim exit.

use tracing::debug;

use super::{IntentContext, IntentProcessor};
use crate::input::InputButton;

/// Debounces the aim control so quick taps do not flicker the aim layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AimProcessor;

impl IntentProcessor for AimProcessor {
    fn name(&self) -> &'static str {
        "aim"
    }

    fn process(&mut self, ctx: &mut IntentContext<'_>) {
        let aim = &ctx.config.aim;
        let data = &mut *ctx.data;

        let can_aim = !aim.requires_equipment || data.equipped_slot.is_some();
        if !can_aim {
            data.is_aiming = false;
            data.aim_release_timer = 0.0;
            return;
        }

        if data.input.held(InputButton::Aim) {
            if !data.is_aiming {
                debug!("Aim entered");
            }
            data.is_aiming = true;
            data.aim_release_timer = 0.0;
        } else if data.is_aiming {
            data.aim_release_timer += ctx.dt;
            if data.aim_release_timer >= aim.release_hold {
                data.is_aiming = false;
                data.aim_release_timer = 0.0;
                debug!("Aim released");
            }
        }
    }
}
