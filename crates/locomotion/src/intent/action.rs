//! Action processor: dodge, roll and attack edges.

use tracing::{debug, trace};

use super::{IntentContext, IntentProcessor};
use crate::input::InputButton;

#[derive(Debug, Clone, Copy, Default)]
pub struct ActionProcessor;

impl IntentProcessor for ActionProcessor {
    fn name(&self) -> &'static str {
        "action"
    }

    fn process(&mut self, ctx: &mut IntentContext<'_>) {
        let data = &mut *ctx.data;
        let grounded = data.is_grounded && data.body_state.is_grounded_locomotion();

        if data.input.pressed(InputButton::Dodge) {
            if grounded {
                data.input.consume(InputButton::Dodge);
                data.intents.wants_to_dodge = true;
                debug!("Dodge intent");
            } else {
                trace!("Dodge ignored in {:?}", data.body_state);
            }
        }

        if data.input.pressed(InputButton::Roll) {
            if grounded {
                data.input.consume(InputButton::Roll);
                data.intents.wants_to_roll = true;
                debug!("Roll intent");
            } else {
                trace!("Roll ignored in {:?}", data.body_state);
            }
        }

        if data.input.pressed(InputButton::Attack) && data.equipped_slot.is_some() {
            data.input.consume(InputButton::Attack);
            data.intents.wants_to_attack = true;
            debug!("Attack intent");
        }
    }
}
