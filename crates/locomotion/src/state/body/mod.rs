//! # Body Layer
//!
//! Full-body locomotion states driven on the base animation layer.
//!
//! ## Classes
//! - grounded: `Idle`, `MoveStart`, `MoveLoop`, `Stop`
//! - airborne: `Jump`, `DoubleJump`, `Fall`, `Land`
//! - action: `Dodge`, `Roll`, `Vault`
//! - aim: `AimIdle`, `AimMove`

mod action;
mod airborne;
mod aim;
mod grounded;

use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};

use super::{StateConstructor, StateId, StateRegistry};
use crate::blackboard::RuntimeData;

pub use action::{EvasiveState, VaultState};
pub use airborne::{FallState, JumpState, LandState};
pub use aim::AimState;
pub use grounded::{IdleState, MoveLoopState, MoveStartState, StopState};

/// Body-layer state tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Reflect)]
pub enum BodyStateId {
    #[default]
    Idle,
    MoveStart,
    MoveLoop,
    Stop,
    Jump,
    DoubleJump,
    Fall,
    Land,
    Dodge,
    Roll,
    Vault,
    AimIdle,
    AimMove,
}

impl BodyStateId {
    pub const ALL: [BodyStateId; 13] = [
        BodyStateId::Idle,
        BodyStateId::MoveStart,
        BodyStateId::MoveLoop,
        BodyStateId::Stop,
        BodyStateId::Jump,
        BodyStateId::DoubleJump,
        BodyStateId::Fall,
        BodyStateId::Land,
        BodyStateId::Dodge,
        BodyStateId::Roll,
        BodyStateId::Vault,
        BodyStateId::AimIdle,
        BodyStateId::AimMove,
    ];

    /// Full-body actions that take the upper body with them.
    pub fn blocks_upper_body(self) -> bool {
        matches!(self, BodyStateId::Dodge | BodyStateId::Roll | BodyStateId::Vault)
    }

    /// On-foot states that dodge, roll and ledge fall-off may leave from.
    pub fn is_grounded_locomotion(self) -> bool {
        matches!(
            self,
            BodyStateId::Idle
                | BodyStateId::MoveStart
                | BodyStateId::MoveLoop
                | BodyStateId::Stop
                | BodyStateId::AimIdle
                | BodyStateId::AimMove
        )
    }

    pub fn is_airborne(self) -> bool {
        matches!(
            self,
            BodyStateId::Jump | BodyStateId::DoubleJump | BodyStateId::Fall
        )
    }

    pub fn is_aim(self) -> bool {
        matches!(self, BodyStateId::AimIdle | BodyStateId::AimMove)
    }
}

impl StateId for BodyStateId {
    fn publish(self, data: &mut RuntimeData) {
        data.body_state = self;
    }
}

/// Constructor for one body state tag.
pub fn registry_entry(id: BodyStateId) -> StateConstructor<BodyStateId> {
    match id {
        BodyStateId::Idle => |_| Box::new(IdleState),
        BodyStateId::MoveStart => |_| Box::new(MoveStartState::default()),
        BodyStateId::MoveLoop => |_| Box::new(MoveLoopState),
        BodyStateId::Stop => |_| Box::new(StopState::default()),
        BodyStateId::Jump => |config| Box::new(JumpState::single(config)),
        BodyStateId::DoubleJump => |config| Box::new(JumpState::double(config)),
        BodyStateId::Fall => |_| Box::new(FallState),
        BodyStateId::Land => |_| Box::new(LandState::default()),
        BodyStateId::Dodge => |_| Box::new(EvasiveState::dodge()),
        BodyStateId::Roll => |_| Box::new(EvasiveState::roll()),
        BodyStateId::Vault => |_| Box::new(VaultState::default()),
        BodyStateId::AimIdle => |_| Box::new(AimState::idle()),
        BodyStateId::AimMove => |_| Box::new(AimState::moving()),
    }
}

/// Registry with every body state.
pub fn registry() -> StateRegistry<BodyStateId> {
    BodyStateId::ALL
        .into_iter()
        .fold(StateRegistry::new(), |registry, id| {
            registry.register(id, registry_entry(id))
        })
}

/// Where on-foot motion resumes after an action finishes.
pub(crate) fn grounded_next(data: &RuntimeData) -> BodyStateId {
    if !data.is_grounded {
        BodyStateId::Fall
    } else if data.has_move_input {
        BodyStateId::MoveLoop
    } else {
        BodyStateId::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::AnimLayer;
    use crate::interrupt::body_interceptors;
    use crate::state::{StateMachine, TransitionCause};
    use crate::testing::Harness;

    #[test]
    fn test_tag_groups() {
        for id in BodyStateId::ALL {
            assert!(!(id.is_grounded_locomotion() && id.is_airborne()));
            assert!(!(id.blocks_upper_body() && id.is_grounded_locomotion()));
        }
        assert!(BodyStateId::AimMove.is_aim());
    }

    #[test]
    fn test_grounded_next() {
        let mut data = RuntimeData::default();
        assert_eq!(grounded_next(&data), BodyStateId::Idle);
        data.has_move_input = true;
        assert_eq!(grounded_next(&data), BodyStateId::MoveLoop);
        data.is_grounded = false;
        assert_eq!(grounded_next(&data), BodyStateId::Fall);
    }

    #[test]
    fn test_every_state_enters_and_exits_cleanly() {
        let mut harness = Harness::new();
        let config = harness.config.clone();
        let states = registry().build(&config.roster.body, &config);
        let pipeline = body_interceptors().build(&config.interceptors.body, &config);
        let mut machine =
            StateMachine::new(AnimLayer::Base, states, BodyStateId::Idle, pipeline).unwrap();

        let mut env = harness.env(1.0 / 60.0);
        machine.initialize(&mut env, BodyStateId::Idle);
        for id in BodyStateId::ALL {
            machine.change_state(&mut env, id, TransitionCause::Logic);
            machine.physics_update(&mut env);
            assert_eq!(env.data.body_state, machine.current().unwrap());
        }
        let (enters, exits) = machine.transition_counts();
        assert_eq!(enters, exits + 1);
    }
}
