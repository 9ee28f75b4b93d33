//! Jump/vault arbitration.
//!
//! On a jump press, the first satisfied option wins:
//! low vault, high vault, grounded jump, then double jump while airborne.

use tracing::{debug, trace};

use super::{IntentContext, IntentProcessor};
use crate::blackboard::{RuntimeData, VaultKind};
use crate::config::LocomotionConfig;
use crate::facade::{ObstacleDetector, VaultObstacleInfo, VaultQuery};
use crate::input::InputButton;
use crate::motion::smoothing::direction_from_yaw;

#[derive(Debug, Clone, Copy, Default)]
pub struct JumpArbitrationProcessor;

/// Probe for a vaultable obstacle of the given kind.
///
/// Kinds without warp data are never offered. Obstacles without landing
/// ground are rejected when the config requires one.
pub fn detect_vault(
    data: &RuntimeData,
    config: &LocomotionConfig,
    detector: &mut dyn ObstacleDetector,
    kind: VaultKind,
) -> Option<VaultObstacleInfo> {
    if config.motion.vault(kind).is_none() {
        trace!("No {:?} vault data configured", kind);
        return None;
    }
    let (min_height, max_height) = config.vault.height_range(kind);
    let query = VaultQuery {
        origin: data.position,
        forward: direction_from_yaw(data.facing_yaw()),
        min_height,
        max_height,
        reach: config.vault.reach,
    };
    let info = detector.detect(&query);
    if !info.is_valid {
        return None;
    }
    if config.vault.require_landing && info.landing_point.is_none() {
        debug!("{:?} vault rejected: no landing ground beyond obstacle", kind);
        return None;
    }
    Some(info)
}

impl IntentProcessor for JumpArbitrationProcessor {
    fn name(&self) -> &'static str {
        "jump_arbitration"
    }

    fn process(&mut self, ctx: &mut IntentContext<'_>) {
        if !ctx.data.input.pressed(InputButton::Jump) {
            return;
        }
        let config = ctx.config;

        // Grounded states keep jump available for a short while after leaving a ledge
        let grounded = ctx.data.is_grounded
            || (ctx.data.body_state.is_grounded_locomotion()
                && ctx.data.air_time < config.jump.min_air_time);

        if grounded {
            for kind in [VaultKind::Low, VaultKind::High] {
                if let Some(info) = detect_vault(ctx.data, config, ctx.detector, kind) {
                    let data = &mut *ctx.data;
                    data.intents.wants_to_vault = true;
                    data.vault_kind = Some(kind);
                    data.vault_obstacle = Some(info);
                    data.input.consume(InputButton::Jump);
                    debug!("{:?} vault intent (height {:.2})", kind, info.height);
                    return;
                }
            }
            ctx.data.intents.wants_to_jump = true;
            ctx.data.input.consume(InputButton::Jump);
            debug!("Jump intent");
            return;
        }

        if config.jump.double_jump_enabled && !ctx.data.double_jump_used {
            ctx.data.intents.wants_to_double_jump = true;
            ctx.data.input.consume(InputButton::Jump);
            debug!("Double jump intent");
        }
    }
}
