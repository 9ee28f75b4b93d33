//! # Eustress Locomotion
//!
//! Character locomotion core: decides which locomotion or action state a
//! character is in, which baked motion applies, and how far the body moves
//! and turns each frame.
//!
//! ## Modules
//!
//! - [`intent`]: ordered processors turning input into one-shot intents
//! - [`interrupt`]: per-layer global overrides evaluated before state logic
//! - [`state`]: body and upper-body state machines
//! - [`motion`]: input, curve, mixed, strafe and warped motion driving
//! - [`controller`]: per-character frame loop and lifecycle
//! - [`plugin`]: Bevy plugin for the config resource and reflected types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Character Controller                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Intent Pipeline                                                │
//! │  ├── view -> equip -> aim -> locomotion -> jump -> action       │
//! │  └── writes the RuntimeData blackboard                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Body Layer                      Upper Layer                    │
//! │  ├── interrupt pipeline          ├── interrupt pipeline         │
//! │  ├── physics step (motion)       ├── physics step (IK)          │
//! │  └── logic step                  └── logic step                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Motion Driver                                                  │
//! │  ├── Input / Curve / Mixed / Strafe / Stationary                │
//! │  └── Warped: baked velocity curves rescaled onto world anchors  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Animation playback, IK solving, physics movement, obstacle probes and
//! equipment models stay with the host behind the traits in [`facade`].

pub mod blackboard;
pub mod config;
pub mod controller;
pub mod curve;
pub mod error;
pub mod facade;
pub mod ik;
pub mod input;
pub mod intent;
pub mod interrupt;
pub mod motion;
pub mod plugin;
pub mod state;

#[cfg(test)]
mod testing;

pub use blackboard::{LocomotionTier, RuntimeData, VaultKind};
pub use config::LocomotionConfig;
pub use controller::{CharacterController, Collaborators};
pub use error::{LocomotionError, Result};
pub use plugin::LocomotionPlugin;

pub mod prelude {
    pub use crate::blackboard::{LocomotionTier, RuntimeData, VaultKind};
    pub use crate::config::LocomotionConfig;
    pub use crate::controller::{CharacterController, Collaborators};
    pub use crate::error::{LocomotionError, Result};
    pub use crate::facade::{
        AnimLayer, AnimationFacade, CharacterBody, CompletionToken, EquipmentDriver, IkBodyPart,
        IkFacade, IkTarget, NoObstacles, ObstacleDetector, PlayOptions, VaultObstacleInfo,
        VaultQuery,
    };
    pub use crate::input::{InputButton, InputFrame, InputSampler, RawInput};
    pub use crate::plugin::LocomotionPlugin;
    pub use crate::state::body::BodyStateId;
    pub use crate::state::upper::UpperStateId;
}
