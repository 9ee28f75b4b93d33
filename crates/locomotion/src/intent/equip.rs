//! Equip processor: hotbar and holster edges to a desired equipment slot.
//!
//! Only the request is recorded here. The upper-body Equip/Unequip states
//! hand the physical swap to the equipment driver.

use tracing::{debug, warn};

use super::{IntentContext, IntentProcessor};
use crate::input::InputButton;

#[derive(Debug, Clone, Copy, Default)]
pub struct EquipProcessor;

impl IntentProcessor for EquipProcessor {
    fn name(&self) -> &'static str {
        "equip"
    }

    fn process(&mut self, ctx: &mut IntentContext<'_>) {
        let data = &mut *ctx.data;

        if data.input.pressed(InputButton::Holster) {
            data.input.consume(InputButton::Holster);
            if data.desired_slot.take().is_some() {
                debug!("Holster requested");
            }
        }

        let Some(slot) = data.input.take_hotbar() else {
            return;
        };
        let slot_count = ctx.config.equipment.slot_count;
        if slot >= slot_count {
            warn!("Hotbar slot {} out of range (0..{})", slot, slot_count);
            return;
        }

        // Pressing the equipped slot again holsters it
        if data.equipped_slot == Some(slot) && data.desired_slot == Some(slot) {
            data.desired_slot = None;
        } else {
            data.desired_slot = Some(slot);
        }
        debug!("Desired equipment slot: {:?}", data.desired_slot);
    }
}
