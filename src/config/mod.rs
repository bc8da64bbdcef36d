// src/config/mod.rs
//! Pipeline configuration: typed sections, defaults and validation

pub mod constants;
pub mod loader;

pub use loader::{ConfigError, ConfigLoader};

use crate::hal::simulator::SimulatorConfig;
use crate::processing::angles::{AbsoluteCalibration, DifferentialCalibration};
use constants::buffer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Complete pipeline configuration
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Shared sample buffer
    #[serde(default)]
    pub buffer: BufferConfig,
    /// Output mode and cadence
    #[serde(default)]
    pub driver: DriverConfig,
    /// Angle strategy and calibration
    #[serde(default)]
    pub mapping: MappingConfig,
    /// Gesture model
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Simulated armband
    #[serde(default)]
    pub device: SimulatorConfig,
}

/// Shared sample buffer sizing
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BufferConfig {
    /// Also the gesture classifier's window length
    #[serde(default = "defaults::capacity")]
    pub capacity: usize,
}

/// Driver behaviour and cadence
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DriverConfig {
    /// Angles or gestures
    #[serde(default = "defaults::mode")]
    pub mode: OutputKind,

    /// Milliseconds between pipeline ticks
    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Milliseconds between display refreshes
    #[serde(default = "defaults::render_interval_ms")]
    pub render_interval_ms: u64,

    /// Drop buffered samples when the device disconnects
    #[serde(default = "defaults::clear_on_disconnect")]
    pub clear_on_disconnect: bool,
}

/// Which output the driver publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Publish thumb joint angles
    Angles,
    /// Publish gesture labels
    Gesture,
}

/// Angle strategy and the calibration of each variant
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MappingConfig {
    /// Heuristic used in angles mode
    #[serde(default = "defaults::strategy")]
    pub strategy: MappingStrategy,
    /// Used when `strategy = "absolute"`
    #[serde(default)]
    pub absolute: AbsoluteCalibration,
    /// Used when `strategy = "differential"`
    #[serde(default)]
    pub differential: DifferentialCalibration,
}

/// Angle heuristic selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStrategy {
    /// Mean magnitude of two channels
    Absolute,
    /// RMS difference of an antagonist pair
    Differential,
}

/// Gesture classifier settings
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Decision-tree JSON exported by the trainer; required in gesture mode
    pub model_path: Option<PathBuf>,
}

/// Default value providers using constants
mod defaults {
    use super::{MappingStrategy, OutputKind};
    use crate::config::constants::*;

    pub fn capacity() -> usize { buffer::DEFAULT_CAPACITY }

    pub fn mode() -> OutputKind { OutputKind::Angles }
    pub fn tick_interval_ms() -> u64 { driver::DEFAULT_TICK_INTERVAL_MS }
    pub fn render_interval_ms() -> u64 { driver::DEFAULT_RENDER_INTERVAL_MS }
    pub fn clear_on_disconnect() -> bool { false }

    pub fn strategy() -> MappingStrategy { MappingStrategy::Absolute }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: defaults::capacity() }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            mode: defaults::mode(),
            tick_interval_ms: defaults::tick_interval_ms(),
            render_interval_ms: defaults::render_interval_ms(),
            clear_on_disconnect: defaults::clear_on_disconnect(),
        }
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            strategy: defaults::strategy(),
            absolute: AbsoluteCalibration::default(),
            differential: DifferentialCalibration::default(),
        }
    }
}

impl DriverConfig {
    /// Tick cadence as a `Duration`
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Render cadence as a `Duration`
    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }
}

/// One rejected configuration field
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Validation error for '{field}': {message} (value: {value})")]
pub struct ValidationError {
    /// Dotted path of the field, e.g. `buffer.capacity`
    pub field: String,
    /// What is wrong
    pub message: String,
    /// Rejected value
    pub value: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            value: value.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Check every section, collecting all problems rather than the first
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.buffer.capacity == 0 || self.buffer.capacity > buffer::MAX_CAPACITY {
            errors.push(ValidationError::new(
                "buffer.capacity",
                format!("must be in [1, {}]", buffer::MAX_CAPACITY),
                self.buffer.capacity,
            ));
        }

        if self.driver.tick_interval_ms == 0 {
            errors.push(ValidationError::new("driver.tick_interval_ms", "must be positive", 0));
        }
        if self.driver.render_interval_ms == 0 {
            errors.push(ValidationError::new("driver.render_interval_ms", "must be positive", 0));
        }

        match self.driver.mode {
            OutputKind::Angles => {
                let calibration = match self.mapping.strategy {
                    MappingStrategy::Absolute => self.mapping.absolute.validate().err().map(|e| ("mapping.absolute", e)),
                    MappingStrategy::Differential => {
                        self.mapping.differential.validate().err().map(|e| ("mapping.differential", e))
                    }
                };
                if let Some((field, err)) = calibration {
                    errors.push(ValidationError::new(field, err.to_string(), "calibration"));
                }

                let smoothing = self.mapping.differential.smoothing_window;
                if self.mapping.strategy == MappingStrategy::Differential && smoothing > self.buffer.capacity {
                    errors.push(ValidationError::new(
                        "mapping.differential.smoothing_window",
                        format!("must not exceed buffer capacity {}", self.buffer.capacity),
                        smoothing,
                    ));
                }
            }
            OutputKind::Gesture => {
                if self.classifier.model_path.is_none() {
                    errors.push(ValidationError::new(
                        "classifier.model_path",
                        "gesture mode requires a model file",
                        "none",
                    ));
                }
            }
        }

        if let Err(err) = self.device.validate() {
            errors.push(ValidationError::new("device", err.to_string(), "simulator"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::constants::driver;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer.capacity, buffer::DEFAULT_CAPACITY);
        assert_eq!(config.driver.tick_interval(), Duration::from_millis(10));
        assert_eq!(config.mapping.strategy, MappingStrategy::Absolute);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: PipelineConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
[driver]
mode = "gesture"

[mapping.differential]
smoothing_window = 25
"#,
        )
        .unwrap();

        assert_eq!(config.driver.mode, OutputKind::Gesture);
        assert_eq!(config.driver.render_interval_ms, driver::DEFAULT_RENDER_INTERVAL_MS);
        assert_eq!(config.mapping.differential.smoothing_window, 25);
        assert_eq!(config.mapping.differential.channel_b, 5);
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = PipelineConfig::default();
        config.buffer.capacity = 0;
        config.driver.tick_interval_ms = 0;
        config.mapping.absolute.intensity_ceiling = 0.0;

        let errors = config.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["buffer.capacity", "driver.tick_interval_ms", "mapping.absolute"]);
    }

    #[test]
    fn test_smoothing_window_must_fit_buffer() {
        let mut config = PipelineConfig::default();
        config.buffer.capacity = 10;
        config.mapping.strategy = MappingStrategy::Differential;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "mapping.differential.smoothing_window");
        assert_eq!(errors[0].value, "50");

        config.mapping.differential.smoothing_window = 10;
        assert!(config.validate().is_ok());

        // The absolute strategy ignores the differential section
        config.mapping.differential.smoothing_window = 50;
        config.mapping.strategy = MappingStrategy::Absolute;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_gesture_mode_requires_model() {
        let mut config = PipelineConfig::default();
        config.driver.mode = OutputKind::Gesture;
        assert_eq!(config.validate().unwrap_err()[0].field, "classifier.model_path");

        config.classifier.model_path = Some(PathBuf::from("model.json"));
        assert!(config.validate().is_ok());
    }
}
