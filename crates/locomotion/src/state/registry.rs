//! State registry: closed tag set to constructor functions.

use std::collections::HashMap;

use tracing::warn;

use super::{State, StateId};
use crate::config::LocomotionConfig;

/// Builds one long-lived state instance from the config.
pub type StateConstructor<Id> = fn(&LocomotionConfig) -> Box<dyn State<Id>>;

/// Constructors for every state tag a layer knows how to build.
pub struct StateRegistry<Id: StateId> {
    constructors: HashMap<Id, StateConstructor<Id>>,
}

impl<Id: StateId> Default for StateRegistry<Id> {
    fn default() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }
}

impl<Id: StateId> StateRegistry<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, id: Id, constructor: StateConstructor<Id>) -> Self {
        self.constructors.insert(id, constructor);
        self
    }

    pub fn contains(&self, id: Id) -> bool {
        self.constructors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Instantiate every rostered state once. Unknown tags are skipped.
    pub fn build(&self, roster: &[Id], config: &LocomotionConfig) -> HashMap<Id, Box<dyn State<Id>>> {
        let mut states = HashMap::with_capacity(roster.len());
        for &id in roster {
            match self.constructors.get(&id) {
                Some(constructor) => {
                    let state = constructor(config);
                    debug_assert_eq!(state.id(), id);
                    states.insert(id, state);
                }
                None => warn!("No constructor registered for state {:?}", id),
            }
        }
        states
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LocomotionConfig;
    use crate::state::body::{self, BodyStateId};
    use crate::state::upper::{self, UpperStateId};

    #[test]
    fn test_full_rosters_build() {
        let config = LocomotionConfig::default();
        let body_states = body::registry().build(&config.roster.body, &config);
        assert_eq!(body_states.len(), BodyStateId::ALL.len());
        for (id, state) in &body_states {
            assert_eq!(state.id(), *id);
        }
        let upper_states = upper::registry().build(&config.roster.upper, &config);
        assert_eq!(upper_states.len(), UpperStateId::ALL.len());
    }

    #[test]
    fn test_unregistered_tags_are_skipped() {
        let config = LocomotionConfig::default();
        let partial = crate::state::StateRegistry::<BodyStateId>::new()
            .register(BodyStateId::Idle, body::registry_entry(BodyStateId::Idle));
        assert!(partial.contains(BodyStateId::Idle));
        assert!(!partial.contains(BodyStateId::Vault));

        let states = partial.build(&[BodyStateId::Idle, BodyStateId::Vault], &config);
        assert_eq!(states.len(), 1);
        assert!(states.contains_key(&BodyStateId::Idle));
    }
}
