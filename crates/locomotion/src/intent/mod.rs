//! # Intent Pipeline
//!
//! Ordered, single-purpose processors that turn the sampled input frame and
//! the blackboard into semantic, one-shot intents.
//!
//! ## Processors (run order)
//! 1. `ViewProcessor`: look delta to authority yaw/pitch
//! 2. `EquipProcessor`: hotbar and holster edges to a desired slot
//! 3. `AimProcessor`: debounced aim flag
//! 4. `LocomotionProcessor`: move direction, stamina and tier
//! 5. `JumpArbitrationProcessor`: vault, jump or double jump
//! 6. `ActionProcessor`: dodge, roll and attack edges

pub mod action;
pub mod aim;
pub mod equip;
pub mod jump;
pub mod locomotion;
pub mod view;

use std::fmt;

use crate::blackboard::RuntimeData;
use crate::config::LocomotionConfig;
use crate::facade::ObstacleDetector;

pub use action::ActionProcessor;
pub use aim::AimProcessor;
pub use equip::EquipProcessor;
pub use jump::JumpArbitrationProcessor;
pub use locomotion::{select_tier, update_stamina, LocomotionProcessor};
pub use view::{authority_rotation, ViewProcessor};

/// Everything an intent processor may read or write.
pub struct IntentContext<'a> {
    pub data: &'a mut RuntimeData,
    pub config: &'a LocomotionConfig,
    pub detector: &'a mut dyn ObstacleDetector,
    pub dt: f32,
}

/// One stage of the intent pipeline.
pub trait IntentProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&mut self, ctx: &mut IntentContext<'_>);
}

/// Fixed-order chain of intent processors.
#[derive(Default)]
pub struct IntentPipeline {
    processors: Vec<Box<dyn IntentProcessor>>,
}

impl fmt::Debug for IntentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl IntentPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard dependency order.
    pub fn standard() -> Self {
        Self::new()
            .with(ViewProcessor)
            .with(EquipProcessor)
            .with(AimProcessor)
            .with(LocomotionProcessor)
            .with(JumpArbitrationProcessor)
            .with(ActionProcessor)
    }

    pub fn with(mut self, processor: impl IntentProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    pub fn run(&mut self, ctx: &mut IntentContext<'_>) {
        for processor in &mut self.processors {
            processor.process(ctx);
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// End-of-frame step: no intent survives into the next frame.
    pub fn clear_consumed_intents(data: &mut RuntimeData) {
        data.clear_consumed_intents();
    }
}
