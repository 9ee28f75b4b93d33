//! # Motion
//!
//! Baked clip data, motion warping and the per-frame motion driver.

pub mod clip;
pub mod driver;
pub mod smoothing;
pub mod warp;

pub use clip::{playback_speed_for, FootPhase, MotionClipData, MotionDirection};
pub use driver::{DriveMode, MotionDriver, MotionStep};
pub use warp::{MotionWarper, WarpPoint, WarpStep, WarpedMotionData};
