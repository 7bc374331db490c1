//! Custom error types for the application.
//!
//! This module defines the primary error type, `ServoError`, for the whole crate.
//! Using the `thiserror` crate, it gives a single place to describe what can go
//! wrong between the serial link, the frame source and the configuration layer.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps [`ConfigError`], raised while loading or validating settings.
//! - **`Io`**: Wraps standard `std::io::Error`, covering file and port I/O.
//! - **`Transport`**: A write to the actuator link failed. The physical position
//!   can no longer be trusted, so callers treat this as process-fatal.
//! - **`TransportTimeout`**: A write did not complete within the configured bound.
//! - **`Camera`**: A frame could not be acquired from the frame source.
//! - **`Image`**: A frame file exists but could not be decoded.
//! - **`Calibration`**: A calibration artifact is present but semantically invalid.
//!
//! Command decoding and batch parsing failures are *not* part of this enum: they
//! are recoverable per record and live in [`crate::command`].

use crate::config::ConfigError;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, ServoError>;

/// Primary error type for the crate.
#[derive(Error, Debug)]
pub enum ServoError {
    /// Settings could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Plain I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The actuator link rejected or failed a write.
    #[error("Transport error on '{port}': {reason}")]
    Transport {
        /// Port or transport name.
        port: String,
        /// Underlying cause.
        reason: String,
    },

    /// A write to the actuator link exceeded its time bound.
    #[error("Transport write to '{port}' timed out after {timeout_ms}ms")]
    TransportTimeout {
        /// Port or transport name.
        port: String,
        /// Configured bound.
        timeout_ms: u64,
    },

    /// Built without serial support.
    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,

    /// No frame could be acquired.
    #[error("Camera error: {0}")]
    Camera(String),

    /// A frame file could not be decoded.
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Calibration artifact rejected.
    #[error("Calibration error: {0}")]
    Calibration(String),
}

impl ServoError {
    /// Whether this error means the actuator link can no longer be trusted.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            ServoError::Transport { .. }
                | ServoError::TransportTimeout { .. }
                | ServoError::SerialFeatureDisabled
        )
    }
}
