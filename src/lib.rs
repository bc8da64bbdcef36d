//! EMG-Mapping: real-time mapping from 8-channel forearm EMG to hand output
//!
//! This library turns a live stream of armband samples into either thumb
//! joint angles or discrete gesture labels. It features:
//!
//! - A bounded, thread-safe sample buffer shared by the device thread and
//!   any number of consumers
//! - Per-channel window features (mean, RMS, padded waveform)
//! - Two angle heuristics (absolute intensity, differential antagonist RMS)
//! - A pluggable gesture model with a JSON decision-tree implementation
//! - A tick-driven pipeline that publishes the latest output
//! - Timed trial capture for recording training data
//! - A simulated armband and layered TOML configuration
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use emg_mapping::config::PipelineConfig;
//! use emg_mapping::hal::SimulatedHub;
//! use emg_mapping::processing::{spawn_ticker, Pipeline};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let pipeline = Arc::new(Pipeline::from_config(&config)?);
//!
//!     let hub = SimulatedHub::run_in_background(config.device.clone(), pipeline.clone())?;
//!     let ticker = spawn_ticker(pipeline.clone(), config.driver.tick_interval())?;
//!
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//!     println!("{}", pipeline.angles_json()?);
//!
//!     ticker.stop();
//!     hub.stop()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acquisition;
pub mod classifier;
pub mod config;
pub mod error;
pub mod hal;
pub mod processing;

// Re-export commonly used types for convenience
pub use acquisition::{ProtocolPlan, SampleBuffer, TrialCapture};
pub use classifier::{DecisionTreeModel, GestureClassifier, GestureLabel, GestureModel};
pub use config::{ConfigLoader, PipelineConfig};
pub use error::{EmgError, EmgResult};
pub use hal::{DeviceEvent, PipelineState, Sample, CHANNEL_COUNT};
pub use processing::{AngleMapper, AngleState, OutputMode, Pipeline, TickOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Real-time EMG to joint angle and gesture mapping".to_string(),
        features: vec![
            "Bounded concurrent sample buffer".to_string(),
            "Absolute and differential angle heuristics".to_string(),
            "Decision-tree gesture classification".to_string(),
            "Timed trial recording protocol".to_string(),
            "Simulated 8-channel armband".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert!(!info.features.is_empty());
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "emg-mapping");
    }
}
