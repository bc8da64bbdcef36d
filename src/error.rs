// src/error.rs
//! Unified error type for the EMG mapping pipeline
//!
//! Module errors stay typed at their origin and convert into [`EmgError`]
//! at the crate surface. Only startup problems and device failures surface
//! here: an empty window is a neutral value and buffer overrun is counted,
//! so neither is ever reported as an error.

use crate::acquisition::BufferError;
use crate::classifier::ModelError;
use crate::config::ConfigError;
use crate::hal::DeviceError;
use crate::processing::angles::CalibrationError;
use thiserror::Error;

/// Crate-level error
#[derive(Debug, Error)]
pub enum EmgError {
    /// Inconsistent wiring detected while assembling the pipeline
    #[error("[CONFIG] Configuration error in {component}: {reason}")]
    Configuration {
        /// Part of the pipeline that was misconfigured
        component: String,
        /// Human-readable cause
        reason: String,
    },

    /// Configuration could not be loaded or failed validation
    #[error("[CONFIG] {0}")]
    Config(#[from] ConfigError),

    /// Mapper calibration rejected
    #[error("[CALIBRATION] {0}")]
    Calibration(#[from] CalibrationError),

    /// Sample buffer could not be built
    #[error("[BUFFER] {0}")]
    Buffer(#[from] BufferError),

    /// Gesture model could not be loaded
    #[error("[MODEL] {0}")]
    Model(#[from] ModelError),

    /// Armband failure
    #[error("[DEVICE] {0}")]
    Device(#[from] DeviceError),
}

impl EmgError {
    /// Shorthand for [`EmgError::Configuration`]
    pub fn configuration(component: impl Into<String>, reason: impl Into<String>) -> Self {
        EmgError::Configuration {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Device failures end the pipeline instance; everything else is caught
    /// before streaming starts
    pub fn is_device_failure(&self) -> bool {
        matches!(self, EmgError::Device(_))
    }
}

/// Result type alias for EMG operations
pub type EmgResult<T> = Result<T, EmgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_keep_context() {
        let err: EmgError = BufferError::InvalidCapacity(0).into();
        assert!(err.to_string().contains("Invalid buffer capacity 0"));
        assert!(!err.is_device_failure());

        let err: EmgError = DeviceError::NotConnected.into();
        assert!(err.is_device_failure());
        assert_eq!(err.to_string(), "[DEVICE] Device is not connected");
    }

    #[test]
    fn test_configuration_helper() {
        let err = EmgError::configuration("pipeline", "model window mismatch");
        assert_eq!(
            err.to_string(),
            "[CONFIG] Configuration error in pipeline: model window mismatch"
        );
    }
}
