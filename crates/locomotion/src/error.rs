//! # Locomotion Errors
//!
//! Error types for loading and validating locomotion configuration.
//!
//! Per-frame code never returns these: missing motion data, bad slot indices and
//! similar runtime problems are logged and recovered locally. Only construction
//! paths (`LocomotionConfig::load`, `CharacterController::new`) surface errors.

use thiserror::Error;

/// Locomotion error types.
#[derive(Error, Debug)]
pub enum LocomotionError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================

    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Motion Data Errors
    // ========================================================================

    #[error("Warp data '{clip}' is malformed: {reason}")]
    InvalidWarpData { clip: String, reason: String },

    #[error("Motion clip '{clip}' is malformed: {reason}")]
    InvalidClipData { clip: String, reason: String },

    // ========================================================================
    // Registry Errors
    // ========================================================================

    #[error("Roster for {layer} layer does not contain its fallback state {state}")]
    MissingFallbackState { layer: &'static str, state: String },
}

/// Result type for locomotion operations.
pub type Result<T> = std::result::Result<T, LocomotionError>;
