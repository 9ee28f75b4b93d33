//! # Upper-Body Layer
//!
//! Equipment and aim actions on the masked upper-body animation layer.
//! The layer weight is 0 while idle, so the body layer shows through.

use bevy::math::Vec3;
use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{State, StateConstructor, StateContext, StateId, StateRegistry};
use crate::blackboard::RuntimeData;
use crate::facade::{IkBodyPart, IkTarget};

/// Marker fired when the equip clip reaches the attach point.
pub const ATTACH_MARKER: u32 = 1;
/// Marker fired when the unequip clip reaches the detach point.
pub const DETACH_MARKER: u32 = 2;

const LAYER_FADE: f32 = 0.2;

/// Upper-layer state tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Reflect)]
pub enum UpperStateId {
    #[default]
    Idle,
    Equip,
    Unequip,
    Aim,
    Attack,
    Unavailable,
}

impl UpperStateId {
    pub const ALL: [UpperStateId; 6] = [
        UpperStateId::Idle,
        UpperStateId::Equip,
        UpperStateId::Unequip,
        UpperStateId::Aim,
        UpperStateId::Attack,
        UpperStateId::Unavailable,
    ];

    /// States a new upper-body action may start from.
    pub fn is_ready(self) -> bool {
        matches!(self, UpperStateId::Idle | UpperStateId::Aim)
    }
}

impl StateId for UpperStateId {
    fn publish(self, data: &mut RuntimeData) {
        data.upper_state = self;
    }
}

pub fn registry_entry(id: UpperStateId) -> StateConstructor<UpperStateId> {
    match id {
        UpperStateId::Idle => |_| Box::new(UpperIdleState),
        UpperStateId::Equip => |_| Box::new(EquipState::default()),
        UpperStateId::Unequip => |_| Box::new(UnequipState),
        UpperStateId::Aim => |_| Box::new(AimUpperState),
        UpperStateId::Attack => |_| Box::new(AttackState),
        UpperStateId::Unavailable => |_| Box::new(UnavailableState),
    }
}

/// Registry with every upper-body state.
pub fn registry() -> StateRegistry<UpperStateId> {
    UpperStateId::ALL
        .into_iter()
        .fold(StateRegistry::new(), |registry, id| {
            registry.register(id, registry_entry(id))
        })
}

/// Aim or idle, whichever the blackboard asks for once an action ends.
fn settle(data: &RuntimeData) -> UpperStateId {
    if data.is_aiming {
        UpperStateId::Aim
    } else {
        UpperStateId::Idle
    }
}

/// An action whose clip-end event never arrived finishes on its configured duration.
fn timed_out(ctx: &StateContext<'_>, duration: f32) -> bool {
    if ctx.state_time < duration {
        return false;
    }
    warn!(
        "{} action ran {:.2}s without a clip-end event, finishing",
        ctx.layer.name(),
        ctx.state_time
    );
    true
}

// ============================================================================
// Idle
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct UpperIdleState;

impl State<UpperStateId> for UpperIdleState {
    fn id(&self) -> UpperStateId {
        UpperStateId::Idle
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        ctx.anim.set_layer_weight(ctx.layer, 0.0, LAYER_FADE);
    }
}

// ============================================================================
// Equip / Unequip
// ============================================================================

/// Draw the requested slot; the model is attached at the clip's attach marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquipState {
    slot: Option<usize>,
    empty: bool,
}

impl EquipState {
    fn attach(&mut self, ctx: &mut StateContext<'_>) {
        if let Some(slot) = self.slot.take() {
            debug!("Attaching equipment slot {}", slot);
            ctx.equipment.equip(slot);
            ctx.data.equipped_slot = Some(slot);
        }
    }
}

impl State<UpperStateId> for EquipState {
    fn id(&self) -> UpperStateId {
        UpperStateId::Equip
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        self.slot = ctx.data.desired_slot;
        self.empty = self.slot.is_none();
        if self.empty {
            warn!("Equip entered with no slot requested");
            return;
        }
        ctx.anim.set_layer_weight(ctx.layer, 1.0, LAYER_FADE);
        ctx.play(&config.clips.equip);
        ctx.add_marker(config.equipment.attach_normalized_time, ATTACH_MARKER);
        ctx.arm_on_end();
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<UpperStateId> {
        // Nothing was requested, so there is no clip to wait for
        if self.empty {
            return Some(settle(ctx.data));
        }
        if timed_out(ctx, ctx.config.equipment.equip_duration) {
            self.attach(ctx);
            return Some(settle(ctx.data));
        }
        None
    }

    fn on_clip_marker(&mut self, marker: u32, ctx: &mut StateContext<'_>) -> Option<UpperStateId> {
        if marker == ATTACH_MARKER {
            self.attach(ctx);
        }
        None
    }

    fn on_clip_end(&mut self, ctx: &mut StateContext<'_>) -> Option<UpperStateId> {
        self.attach(ctx);
        Some(settle(ctx.data))
    }

    fn exit(&mut self, _ctx: &mut StateContext<'_>) {
        self.slot = None;
        self.empty = false;
    }

    fn accepts_interrupts(&self) -> bool {
        false
    }
}

/// Holster the equipped item at the clip's detach marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnequipState;

fn detach(ctx: &mut StateContext<'_>) {
    if let Some(slot) = ctx.data.equipped_slot.take() {
        debug!("Detaching equipment slot {}", slot);
        ctx.equipment.unequip();
    }
}

impl State<UpperStateId> for UnequipState {
    fn id(&self) -> UpperStateId {
        UpperStateId::Unequip
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        ctx.anim.set_layer_weight(ctx.layer, 1.0, LAYER_FADE);
        ctx.play(&config.clips.unequip);
        ctx.add_marker(config.equipment.detach_normalized_time, DETACH_MARKER);
        ctx.arm_on_end();
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<UpperStateId> {
        if timed_out(ctx, ctx.config.equipment.unequip_duration) {
            detach(ctx);
            return Some(UpperStateId::Idle);
        }
        None
    }

    fn on_clip_marker(&mut self, marker: u32, ctx: &mut StateContext<'_>) -> Option<UpperStateId> {
        if marker == DETACH_MARKER {
            detach(ctx);
        }
        None
    }

    fn on_clip_end(&mut self, ctx: &mut StateContext<'_>) -> Option<UpperStateId> {
        detach(ctx);
        Some(UpperStateId::Idle)
    }

    fn accepts_interrupts(&self) -> bool {
        false
    }
}

// ============================================================================
// Aim / Attack
// ============================================================================

/// Raised weapon with aim-reference and head-look IK on the view ray.
#[derive(Debug, Clone, Copy, Default)]
pub struct AimUpperState;

impl AimUpperState {
    fn aim_point(ctx: &StateContext<'_>) -> Vec3 {
        let ik = &ctx.config.ik;
        let eye = ctx.data.position + Vec3::Y * ik.eye_height;
        eye + ctx.data.authority_rotation * Vec3::Z * ik.aim_distance
    }

    fn track(ctx: &mut StateContext<'_>) {
        let target = IkTarget::at(Self::aim_point(ctx));
        ctx.ik.set_ik_target(IkBodyPart::AimReference, target, 1.0);
        ctx.ik.set_ik_target(IkBodyPart::HeadLook, target, 1.0);
    }
}

impl State<UpperStateId> for AimUpperState {
    fn id(&self) -> UpperStateId {
        UpperStateId::Aim
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        ctx.anim.set_layer_weight(ctx.layer, 1.0, LAYER_FADE);
        ctx.play(&config.clips.aim);
        Self::track(ctx);
    }

    fn physics_update(&mut self, ctx: &mut StateContext<'_>) {
        Self::track(ctx);
    }

    fn exit(&mut self, ctx: &mut StateContext<'_>) {
        ctx.ik.update_ik_weight(IkBodyPart::AimReference, 0.0);
        ctx.ik.update_ik_weight(IkBodyPart::HeadLook, 0.0);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttackState;

impl State<UpperStateId> for AttackState {
    fn id(&self) -> UpperStateId {
        UpperStateId::Attack
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        let config = ctx.config;
        ctx.anim.set_layer_weight(ctx.layer, 1.0, LAYER_FADE);
        ctx.play(&config.clips.attack);
        ctx.arm_on_end();
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<UpperStateId> {
        timed_out(ctx, ctx.config.equipment.attack_duration).then(|| settle(ctx.data))
    }

    fn on_clip_end(&mut self, ctx: &mut StateContext<'_>) -> Option<UpperStateId> {
        Some(settle(ctx.data))
    }

    fn accepts_interrupts(&self) -> bool {
        false
    }
}

// ============================================================================
// Unavailable
// ============================================================================

/// Upper layer handed back to the body while a full-body action runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableState;

impl State<UpperStateId> for UnavailableState {
    fn id(&self) -> UpperStateId {
        UpperStateId::Unavailable
    }

    fn enter(&mut self, ctx: &mut StateContext<'_>) {
        ctx.anim.set_layer_weight(ctx.layer, 0.0, LAYER_FADE);
    }

    fn logic_update(&mut self, ctx: &mut StateContext<'_>) -> Option<UpperStateId> {
        (!ctx.data.body_state.blocks_upper_body()).then(|| settle(ctx.data))
    }

    fn accepts_interrupts(&self) -> bool {
        false
    }
}
