//! # Locomotion Plugin
//!
//! Inserts the [`LocomotionConfig`] resource and registers the reflected tag
//! and tuning types. Controllers are built per character from the resource
//! with [`CharacterController::new`](crate::controller::CharacterController::new).

use std::path::PathBuf;

use bevy::prelude::*;
use tracing::{info, warn};

use crate::blackboard::{LocomotionTier, VaultKind};
use crate::config::{
    AimConfig, EquipmentConfig, JumpConfig, LocomotionConfig, MovementConfig, StaminaConfig,
    VaultConfig, ViewConfig,
};
use crate::facade::{AnimLayer, IkBodyPart};
use crate::input::InputButton;
use crate::interrupt::{BodyInterceptorKind, UpperInterceptorKind};
use crate::motion::clip::{FootPhase, MotionDirection};
use crate::state::body::BodyStateId;
use crate::state::upper::UpperStateId;

// ============================================================================
// Locomotion Plugin
// ============================================================================

/// Locomotion plugin.
///
/// # Example
/// ```rust,ignore
/// use bevy::prelude::*;
/// use eustress_locomotion::plugin::LocomotionPlugin;
///
/// App::new()
///     .add_plugins(LocomotionPlugin::from_path("assets/locomotion.ron"))
///     .run();
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocomotionPlugin {
    /// RON config to load; defaults are used when unset or unreadable
    pub config_path: Option<PathBuf>,
}

impl LocomotionPlugin {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    fn load_config(&self) -> LocomotionConfig {
        let Some(path) = &self.config_path else {
            return LocomotionConfig::default();
        };
        match LocomotionConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load locomotion config, using defaults: {}", e);
                LocomotionConfig::default()
            }
        }
    }
}

impl Plugin for LocomotionPlugin {
    fn build(&self, app: &mut App) {
        // A config inserted by the host wins over the plugin's
        if !app.world().contains_resource::<LocomotionConfig>() {
            app.insert_resource(self.load_config());
        }

        app.register_type::<BodyStateId>()
            .register_type::<UpperStateId>()
            .register_type::<BodyInterceptorKind>()
            .register_type::<UpperInterceptorKind>()
            .register_type::<LocomotionTier>()
            .register_type::<VaultKind>()
            .register_type::<FootPhase>()
            .register_type::<MotionDirection>()
            .register_type::<AnimLayer>()
            .register_type::<IkBodyPart>()
            .register_type::<InputButton>()
            .register_type::<MovementConfig>()
            .register_type::<ViewConfig>()
            .register_type::<StaminaConfig>()
            .register_type::<AimConfig>()
            .register_type::<JumpConfig>()
            .register_type::<VaultConfig>()
            .register_type::<EquipmentConfig>();

        info!("Locomotion plugin initialized");
    }
}
