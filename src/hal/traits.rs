// src/hal/traits.rs
//! Boundary traits between the armband collaborator and the pipeline

use crate::hal::types::DeviceEvent;
use thiserror::Error;

/// Device lifecycle errors; terminal for the pipeline instance
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    /// The armband never completed the handshake
    #[error("Device handshake failed: {0}")]
    HandshakeFailed(String),

    /// Command sent while no armband is connected
    #[error("Device is not connected")]
    NotConnected,

    /// Rejected device settings
    #[error("Invalid device configuration: {0}")]
    Configuration(String),

    /// The device I/O thread could not start or panicked
    #[error("Device thread error: {0}")]
    Thread(String),
}

/// Control surface the device exposes to its listener
pub trait DeviceControl: Send + Sync {
    /// Enable or disable raw EMG streaming
    fn stream_emg(&self, enabled: bool) -> Result<(), DeviceError>;
}

/// Receiver of device events, invoked on the device-I/O thread
pub trait DeviceListener: Send + Sync {
    /// Handle one event; must return promptly
    fn on_event(&self, event: DeviceEvent, device: &dyn DeviceControl);
}
