//! View processor: integrates look input into the authority rotation.

use bevy::math::Quat;

use super::{IntentContext, IntentProcessor};
use crate::motion::smoothing::{wrap_degrees, yaw_rotation};

/// Authority rotation for a yaw and pitch in degrees. Positive pitch looks up.
pub fn authority_rotation(yaw: f32, pitch: f32) -> Quat {
    yaw_rotation(yaw) * Quat::from_rotation_x(-pitch.to_radians())
}

/// Integrates the raw look delta and publishes the authority rotation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewProcessor;

impl IntentProcessor for ViewProcessor {
    fn name(&self) -> &'static str {
        "view"
    }

    fn process(&mut self, ctx: &mut IntentContext<'_>) {
        let view = &ctx.config.view;
        let data = &mut *ctx.data;

        let look = data.input.look_delta * view.sensitivity;
        let pitch_delta = if view.invert_pitch { look.y } else { -look.y };
        data.authority_yaw = wrap_degrees(data.authority_yaw + look.x);
        data.authority_pitch =
            (data.authority_pitch + pitch_delta).clamp(view.min_pitch, view.max_pitch);
        data.authority_rotation = authority_rotation(data.authority_yaw, data.authority_pitch);

        // Nothing downstream may apply the same delta again
        data.input.consume_look();
    }
}
