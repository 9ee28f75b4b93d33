//! # Interrupt Pipeline
//!
//! Global override rules evaluated ahead of a state's own logic.
//!
//! Each layer owns one ordered [`InterruptPipeline`]. Every frame the machine
//! hands it the blackboard and the active state id; the first interceptor that
//! returns a target wins and the walk stops. States that opt out of
//! interrupts skip the pipeline entirely.
//!
//! ## Classes
//! - `Interceptor`: one predicate/target rule
//! - `RuleInterceptor`: a rule backed by a plain function
//! - `FallInterceptor`: leaves grounded locomotion after a short air time
//! - `InterceptorRegistry`: config tag to constructor map

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::blackboard::RuntimeData;
use crate::config::LocomotionConfig;
use crate::state::body::BodyStateId;
use crate::state::upper::UpperStateId;
use crate::state::StateId;

// ============================================================================
// Interceptors
// ============================================================================

/// A global transition rule for one layer.
pub trait Interceptor<Id: StateId>: Send + Sync {
    fn name(&self) -> &str;

    /// Replacement state for `current`, if this rule fires.
    fn intercept(&self, data: &RuntimeData, current: Id) -> Option<Id>;
}

/// Interceptor backed by a stateless rule function.
pub struct RuleInterceptor<Id: StateId> {
    name: &'static str,
    rule: fn(&RuntimeData, Id) -> Option<Id>,
}

impl<Id: StateId> RuleInterceptor<Id> {
    pub fn new(name: &'static str, rule: fn(&RuntimeData, Id) -> Option<Id>) -> Self {
        Self { name, rule }
    }
}

impl<Id: StateId> Interceptor<Id> for RuleInterceptor<Id> {
    fn name(&self) -> &str {
        self.name
    }

    fn intercept(&self, data: &RuntimeData, current: Id) -> Option<Id> {
        (self.rule)(data, current)
    }
}

/// Leaves grounded locomotion once the body has been off the ground for
/// `min_air_time`, so stepping off small ledges does not flicker into Fall.
#[derive(Debug, Clone, Copy)]
pub struct FallInterceptor {
    pub min_air_time: f32,
}

impl Interceptor<BodyStateId> for FallInterceptor {
    fn name(&self) -> &str {
        "fall"
    }

    fn intercept(&self, data: &RuntimeData, current: BodyStateId) -> Option<BodyStateId> {
        (!data.is_grounded
            && data.air_time >= self.min_air_time
            && current.is_grounded_locomotion())
        .then_some(BodyStateId::Fall)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Ordered interceptor list; earlier entries win.
pub struct InterruptPipeline<Id: StateId> {
    interceptors: Vec<Box<dyn Interceptor<Id>>>,
}

impl<Id: StateId> fmt::Debug for InterruptPipeline<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<Id: StateId> Default for InterruptPipeline<Id> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<Id: StateId> InterruptPipeline<Id> {
    pub fn new(interceptors: Vec<Box<dyn Interceptor<Id>>>) -> Self {
        Self { interceptors }
    }

    /// First matching rule's target. A first match that names `current`
    /// keeps the state and ends the walk.
    pub fn evaluate(&self, data: &RuntimeData, current: Id) -> Option<Id> {
        for interceptor in &self.interceptors {
            if let Some(next) = interceptor.intercept(data, current) {
                if next == current {
                    trace!("Interceptor '{}' keeps {:?}", interceptor.name(), current);
                    return None;
                }
                trace!(
                    "Interceptor '{}' fired: {:?} -> {:?}",
                    interceptor.name(),
                    current,
                    next
                );
                return Some(next);
            }
        }
        None
    }

    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Builds one interceptor from the config.
pub type InterceptorConstructor<Id> = fn(&LocomotionConfig) -> Box<dyn Interceptor<Id>>;

/// Config tag to interceptor constructor.
pub struct InterceptorRegistry<Kind, Id: StateId> {
    constructors: HashMap<Kind, InterceptorConstructor<Id>>,
}

impl<Kind, Id> InterceptorRegistry<Kind, Id>
where
    Kind: Copy + Eq + Hash + fmt::Debug,
    Id: StateId,
{
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register(mut self, kind: Kind, constructor: InterceptorConstructor<Id>) -> Self {
        self.constructors.insert(kind, constructor);
        self
    }

    pub fn contains(&self, kind: Kind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Build a pipeline in the order of `kinds`; unknown tags are skipped.
    pub fn build(&self, kinds: &[Kind], config: &LocomotionConfig) -> InterruptPipeline<Id> {
        let interceptors = kinds
            .iter()
            .filter_map(|kind| match self.constructors.get(kind) {
                Some(constructor) => Some(constructor(config)),
                None => {
                    warn!("No interceptor registered for {:?}", kind);
                    None
                }
            })
            .collect();
        InterruptPipeline::new(interceptors)
    }
}

impl<Kind, Id> Default for InterceptorRegistry<Kind, Id>
where
    Kind: Copy + Eq + Hash + fmt::Debug,
    Id: StateId,
{
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Body Layer Rules
// ============================================================================

/// Body-layer interceptor tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Reflect)]
pub enum BodyInterceptorKind {
    Vault,
    DoubleJump,
    Jump,
    Dodge,
    Roll,
    Fall,
    AimEnter,
    AimExit,
}

/// Every body interceptor.
pub fn body_interceptors() -> InterceptorRegistry<BodyInterceptorKind, BodyStateId> {
    InterceptorRegistry::new()
        .register(BodyInterceptorKind::Vault, |_| {
            Box::new(RuleInterceptor::new("vault", vault_rule))
        })
        .register(BodyInterceptorKind::DoubleJump, |_| {
            Box::new(RuleInterceptor::new("double_jump", |data, _: BodyStateId| {
                data.intents
                    .wants_to_double_jump
                    .then_some(BodyStateId::DoubleJump)
            }))
        })
        .register(BodyInterceptorKind::Jump, |_| {
            Box::new(RuleInterceptor::new("jump", |data, _: BodyStateId| {
                data.intents.wants_to_jump.then_some(BodyStateId::Jump)
            }))
        })
        .register(BodyInterceptorKind::Dodge, |_| {
            Box::new(RuleInterceptor::new("dodge", |data, current: BodyStateId| {
                (data.intents.wants_to_dodge && current.is_grounded_locomotion())
                    .then_some(BodyStateId::Dodge)
            }))
        })
        .register(BodyInterceptorKind::Roll, |_| {
            Box::new(RuleInterceptor::new("roll", |data, current: BodyStateId| {
                (data.intents.wants_to_roll && current.is_grounded_locomotion())
                    .then_some(BodyStateId::Roll)
            }))
        })
        .register(BodyInterceptorKind::Fall, |config| {
            Box::new(FallInterceptor {
                min_air_time: config.jump.min_air_time,
            })
        })
        .register(BodyInterceptorKind::AimEnter, |_| {
            Box::new(RuleInterceptor::new("aim_enter", aim_enter_rule))
        })
        .register(BodyInterceptorKind::AimExit, |_| {
            Box::new(RuleInterceptor::new("aim_exit", aim_exit_rule))
        })
}

fn vault_rule(data: &RuntimeData, _current: BodyStateId) -> Option<BodyStateId> {
    let ready = data.intents.wants_to_vault
        && data.vault_kind.is_some()
        && data.vault_obstacle.is_some_and(|o| o.is_valid);
    ready.then_some(BodyStateId::Vault)
}

fn aim_enter_rule(data: &RuntimeData, current: BodyStateId) -> Option<BodyStateId> {
    let from_locomotion = matches!(
        current,
        BodyStateId::Idle | BodyStateId::MoveStart | BodyStateId::MoveLoop | BodyStateId::Stop
    );
    if !(data.is_aiming && data.is_grounded && from_locomotion) {
        return None;
    }
    Some(if data.has_move_input {
        BodyStateId::AimMove
    } else {
        BodyStateId::AimIdle
    })
}

fn aim_exit_rule(data: &RuntimeData, current: BodyStateId) -> Option<BodyStateId> {
    if data.is_aiming || !current.is_aim() {
        return None;
    }
    Some(if data.has_move_input {
        BodyStateId::MoveLoop
    } else {
        BodyStateId::Idle
    })
}

// ============================================================================
// Upper Layer Rules
// ============================================================================

/// Upper-layer interceptor tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Reflect)]
pub enum UpperInterceptorKind {
    Unavailable,
    Unequip,
    Equip,
    Attack,
    AimEnter,
    AimExit,
}

/// Every upper-body interceptor.
pub fn upper_interceptors() -> InterceptorRegistry<UpperInterceptorKind, UpperStateId> {
    InterceptorRegistry::new()
        .register(UpperInterceptorKind::Unavailable, |_| {
            Box::new(RuleInterceptor::new("unavailable", |data, _: UpperStateId| {
                data.body_state
                    .blocks_upper_body()
                    .then_some(UpperStateId::Unavailable)
            }))
        })
        .register(UpperInterceptorKind::Unequip, |_| {
            Box::new(RuleInterceptor::new("unequip", |data, current: UpperStateId| {
                (data.unequip_pending() && current.is_ready()).then_some(UpperStateId::Unequip)
            }))
        })
        .register(UpperInterceptorKind::Equip, |_| {
            Box::new(RuleInterceptor::new("equip", |data, current: UpperStateId| {
                (data.equip_pending() && current.is_ready()).then_some(UpperStateId::Equip)
            }))
        })
        .register(UpperInterceptorKind::Attack, |_| {
            Box::new(RuleInterceptor::new("attack", |data, current: UpperStateId| {
                (data.intents.wants_to_attack && data.equipped_slot.is_some() && current.is_ready())
                    .then_some(UpperStateId::Attack)
            }))
        })
        .register(UpperInterceptorKind::AimEnter, |_| {
            Box::new(RuleInterceptor::new("aim_enter", |data, current: UpperStateId| {
                (data.is_aiming && current == UpperStateId::Idle).then_some(UpperStateId::Aim)
            }))
        })
        .register(UpperInterceptorKind::AimExit, |_| {
            Box::new(RuleInterceptor::new("aim_exit", |data, current: UpperStateId| {
                (!data.is_aiming && current == UpperStateId::Aim).then_some(UpperStateId::Idle)
            }))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::VaultObstacleInfo;
    use crate::blackboard::VaultKind;

    fn body_pipeline() -> InterruptPipeline<BodyStateId> {
        let config = LocomotionConfig::default();
        body_interceptors().build(&config.interceptors.body, &config)
    }

    fn upper_pipeline() -> InterruptPipeline<UpperStateId> {
        let config = LocomotionConfig::default();
        upper_interceptors().build(&config.interceptors.upper, &config)
    }

    #[test]
    fn test_default_lists_build_in_order() {
        let body = body_pipeline();
        assert_eq!(
            body.names(),
            vec!["vault", "double_jump", "jump", "dodge", "roll", "fall", "aim_enter", "aim_exit"]
        );
        assert_eq!(upper_pipeline().len(), 6);
    }

    #[test]
    fn test_first_match_wins() {
        let pipeline = body_pipeline();
        let mut data = RuntimeData::default();
        data.intents.wants_to_jump = true;
        data.intents.wants_to_dodge = true;
        assert_eq!(pipeline.evaluate(&data, BodyStateId::Idle), Some(BodyStateId::Jump));

        // Same snapshot, same answer
        for _ in 0..10 {
            assert_eq!(pipeline.evaluate(&data, BodyStateId::Idle), Some(BodyStateId::Jump));
        }

        data.intents.wants_to_vault = true;
        data.vault_kind = Some(VaultKind::Low);
        data.vault_obstacle = Some(VaultObstacleInfo {
            is_valid: true,
            ..VaultObstacleInfo::default()
        });
        assert_eq!(pipeline.evaluate(&data, BodyStateId::Idle), Some(BodyStateId::Vault));
    }

    #[test]
    fn test_match_on_current_state_stops_the_walk() {
        let pipeline = InterruptPipeline::new(vec![
            Box::new(RuleInterceptor::new("stay", |_: &RuntimeData, _: BodyStateId| {
                Some(BodyStateId::Idle)
            })) as Box<dyn Interceptor<BodyStateId>>,
            Box::new(RuleInterceptor::new("fall", |_: &RuntimeData, _: BodyStateId| {
                Some(BodyStateId::Fall)
            })),
        ]);
        let data = RuntimeData::default();
        assert_eq!(pipeline.evaluate(&data, BodyStateId::Idle), None);
        assert_eq!(pipeline.evaluate(&data, BodyStateId::MoveLoop), Some(BodyStateId::Idle));
    }

    #[test]
    fn test_order_follows_config_list() {
        let config = LocomotionConfig::default();
        let pipeline = body_interceptors().build(
            &[BodyInterceptorKind::Dodge, BodyInterceptorKind::Jump],
            &config,
        );
        let mut data = RuntimeData::default();
        data.intents.wants_to_jump = true;
        data.intents.wants_to_dodge = true;
        assert_eq!(pipeline.evaluate(&data, BodyStateId::MoveLoop), Some(BodyStateId::Dodge));
    }

    #[test]
    fn test_fall_waits_for_min_air_time() {
        let pipeline = body_pipeline();
        let mut data = RuntimeData::default();
        data.is_grounded = false;
        data.air_time = 0.05;
        assert_eq!(pipeline.evaluate(&data, BodyStateId::MoveLoop), None);
        data.air_time = 0.2;
        assert_eq!(pipeline.evaluate(&data, BodyStateId::MoveLoop), Some(BodyStateId::Fall));
        assert_eq!(pipeline.evaluate(&data, BodyStateId::Jump), None);
    }

    #[test]
    fn test_aim_enter_and_exit() {
        let pipeline = body_pipeline();
        let mut data = RuntimeData::default();
        data.is_aiming = true;
        assert_eq!(pipeline.evaluate(&data, BodyStateId::Idle), Some(BodyStateId::AimIdle));
        data.has_move_input = true;
        assert_eq!(pipeline.evaluate(&data, BodyStateId::MoveLoop), Some(BodyStateId::AimMove));
        assert_eq!(pipeline.evaluate(&data, BodyStateId::AimMove), None);

        data.is_aiming = false;
        assert_eq!(pipeline.evaluate(&data, BodyStateId::AimMove), Some(BodyStateId::MoveLoop));
    }

    #[test]
    fn test_upper_blocked_by_body_action() {
        let pipeline = upper_pipeline();
        let mut data = RuntimeData::default();
        data.body_state = BodyStateId::Roll;
        data.desired_slot = Some(0);
        assert_eq!(pipeline.evaluate(&data, UpperStateId::Idle), Some(UpperStateId::Unavailable));
        assert_eq!(pipeline.evaluate(&data, UpperStateId::Unavailable), None);

        data.body_state = BodyStateId::Idle;
        assert_eq!(pipeline.evaluate(&data, UpperStateId::Idle), Some(UpperStateId::Equip));
    }

    #[test]
    fn test_unknown_kind_is_skipped() {
        let config = LocomotionConfig::default();
        let registry = InterceptorRegistry::<BodyInterceptorKind, BodyStateId>::new()
            .register(BodyInterceptorKind::Jump, |_| {
                Box::new(RuleInterceptor::new("jump", |data, _: BodyStateId| {
                    data.intents.wants_to_jump.then_some(BodyStateId::Jump)
                }))
            });
        let pipeline = registry.build(&[BodyInterceptorKind::Roll, BodyInterceptorKind::Jump], &config);
        assert_eq!(pipeline.names(), vec!["jump"]);
    }
}
