//! # IK Rig
//!
//! Per-body-part IK channels behind the [`IkFacade`] the states talk to.
//!
//! Each part gets one [`IkBackend`] when the rig is built. States only set
//! targets and requested weights; the rig blends the live weight toward the
//! request every frame and applies the backend's constraint when the host
//! asks for goals to feed its solver.

use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::IkConfig;
use crate::facade::{IkBodyPart, IkFacade, IkTarget};

/// Weights below this are treated as off.
const MIN_ACTIVE_WEIGHT: f32 = 1e-3;

/// Solver backend for one body part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IkBackend {
    /// Two-bone limb; goals beyond `reach` of the anchor are pulled in
    Limb { reach: f32 },
    /// Look/aim constraint limited to `max_angle` degrees off body forward
    LookAt { max_angle: f32 },
    Disabled,
}

/// Live state of one IK channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkChannel {
    pub backend: IkBackend,
    pub target: Option<IkTarget>,
    /// Blended weight sent to the solver
    pub weight: f32,
    /// Weight the active state asked for
    pub requested_weight: f32,
}

impl IkChannel {
    fn new(backend: IkBackend) -> Self {
        Self {
            backend,
            target: None,
            weight: 0.0,
            requested_weight: 0.0,
        }
    }
}

/// A goal ready for the host's solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkGoal {
    pub part: IkBodyPart,
    pub backend: IkBackend,
    pub target: IkTarget,
    pub weight: f32,
}

/// IK facade implementation with weight blending.
#[derive(Debug, Clone, PartialEq)]
pub struct IkRig {
    channels: [IkChannel; IkBodyPart::COUNT],
    blend_speed: f32,
}

impl IkRig {
    pub fn new(config: &IkConfig) -> Self {
        let backend_for = |part: IkBodyPart| match part {
            IkBodyPart::LeftHand => config.left_hand,
            IkBodyPart::RightHand => config.right_hand,
            IkBodyPart::AimReference => config.aim_reference,
            IkBodyPart::HeadLook => config.head_look,
        };
        Self {
            channels: IkBodyPart::ALL.map(|part| IkChannel::new(backend_for(part))),
            blend_speed: config.blend_speed,
        }
    }

    pub fn channel(&self, part: IkBodyPart) -> &IkChannel {
        &self.channels[part.index()]
    }

    pub fn backend(&self, part: IkBodyPart) -> IkBackend {
        self.channel(part).backend
    }

    pub fn weight(&self, part: IkBodyPart) -> f32 {
        self.channel(part).weight
    }

    pub fn requested_weight(&self, part: IkBodyPart) -> f32 {
        self.channel(part).requested_weight
    }

    /// Blend live weights toward their requested values.
    pub fn update(&mut self, dt: f32) {
        let blend = (dt * self.blend_speed).clamp(0.0, 1.0);
        for channel in &mut self.channels {
            channel.weight += (channel.requested_weight - channel.weight) * blend;
            if (channel.weight - channel.requested_weight).abs() < MIN_ACTIVE_WEIGHT {
                channel.weight = channel.requested_weight;
            }
            if channel.weight <= 0.0 && channel.requested_weight <= 0.0 {
                channel.target = None;
            }
        }
    }

    /// Active goals, skipping disabled parts and zero weights.
    pub fn goals(&self) -> impl Iterator<Item = IkGoal> + '_ {
        IkBodyPart::ALL.into_iter().filter_map(move |part| {
            let channel = self.channel(part);
            if channel.backend == IkBackend::Disabled || channel.weight < MIN_ACTIVE_WEIGHT {
                return None;
            }
            channel.target.map(|target| IkGoal {
                part,
                backend: channel.backend,
                target,
                weight: channel.weight,
            })
        })
    }

    /// Constrained goal position for a pose target.
    ///
    /// `anchor` is the limb root or view origin, `forward` the body forward.
    /// Entity targets are resolved by the host and return `None`.
    pub fn resolve(&self, part: IkBodyPart, anchor: Vec3, forward: Vec3) -> Option<Vec3> {
        let channel = self.channel(part);
        let position = match channel.target? {
            IkTarget::Pose { position, .. } => position,
            IkTarget::Entity(_) => return None,
        };
        match channel.backend {
            IkBackend::Disabled => None,
            IkBackend::Limb { reach } => {
                let offset = position - anchor;
                Some(anchor + offset.clamp_length_max(reach.max(0.0)))
            }
            IkBackend::LookAt { max_angle } => {
                let offset = position - anchor;
                let distance = offset.length();
                let (Some(direction), Some(forward)) =
                    (offset.try_normalize(), forward.try_normalize())
                else {
                    return Some(position);
                };
                let angle = forward.angle_between(direction).to_degrees();
                if angle <= max_angle {
                    return Some(position);
                }
                let arc = Quat::from_rotation_arc(forward, direction);
                let clamped = Quat::IDENTITY.slerp(arc, max_angle / angle) * forward;
                Some(anchor + clamped * distance)
            }
        }
    }

    /// Drop every target and weight immediately.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.target = None;
            channel.weight = 0.0;
            channel.requested_weight = 0.0;
        }
    }
}

impl IkFacade for IkRig {
    fn set_ik_target(&mut self, part: IkBodyPart, target: IkTarget, weight: f32) {
        let channel = &mut self.channels[part.index()];
        if channel.backend == IkBackend::Disabled {
            trace!("IK target for disabled part {:?} ignored", part);
            return;
        }
        channel.target = Some(target);
        channel.requested_weight = weight.clamp(0.0, 1.0);
    }

    fn update_ik_weight(&mut self, part: IkBodyPart, weight: f32) {
        let channel = &mut self.channels[part.index()];
        if channel.backend == IkBackend::Disabled {
            return;
        }
        channel.requested_weight = weight.clamp(0.0, 1.0);
    }
}
