// src/processing/angles.rs
//! Heuristic mapping from EMG windows to thumb joint angles
//!
//! Two stateless strategies, both deterministic and total once constructed:
//!
//! - [`AbsoluteIntensityMapper`] reads two channels of the newest sample and
//!   scales a fixed flexion/extension pose by their mean magnitude.
//! - [`DifferentialRmsMapper`] compares the smoothed RMS of an antagonist
//!   channel pair and drives both joints from the normalised difference.
//!
//! Calibration is checked once at construction; the per-window maths only
//! clamps.

use crate::config::constants::{absolute, differential};
use crate::config::MappingConfig;
use crate::config::MappingStrategy;
use crate::hal::types::{Sample, CHANNEL_COUNT};
use crate::processing::features::channel_rms;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Published joint angles in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleState {
    /// Metacarpophalangeal joint; negative is extension
    #[serde(rename = "MCP")]
    pub mcp: f32,
    /// Interphalangeal joint
    #[serde(rename = "IP")]
    pub ip: f32,
}

impl AngleState {
    /// Pose with the given joint angles
    pub fn new(mcp: f32, ip: f32) -> Self {
        Self { mcp, ip }
    }
}

/// Rejected calibration parameters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    /// NaN or infinite parameter
    #[error("Calibration value '{field}' must be finite")]
    NonFinite {
        /// Calibration field name
        field: &'static str,
    },

    /// Floor negative or not below the ceiling
    #[error("Intensity range invalid: need 0 <= floor ({floor}) < ceiling ({ceiling})")]
    IntensityRange {
        /// Configured floor
        floor: f32,
        /// Configured ceiling
        ceiling: f32,
    },

    /// Extension bound above zero
    #[error("MCP extension bound must not be positive, got {0}")]
    ExtensionSign(f32),

    /// Full-scale RMS zero or negative
    #[error("Full-scale RMS must be positive, got {0}")]
    FullScale(f32),

    /// Extension damping outside `[0, 1]`
    #[error("Extension damping must lie in [0, 1], got {0}")]
    Damping(f32),

    /// Channel index beyond the armband
    #[error("Channel index {0} out of range")]
    ChannelOutOfRange(usize),

    /// Both sides of the pair on one channel
    #[error("Antagonist pair uses channel {0} twice")]
    DuplicateChannel(usize),

    /// Zero-sample smoothing window
    #[error("Smoothing window must hold at least one sample")]
    EmptySmoothingWindow,
}

fn finite(field: &'static str, value: f32) -> Result<(), CalibrationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CalibrationError::NonFinite { field })
    }
}

fn channel(index: usize) -> Result<(), CalibrationError> {
    if index < CHANNEL_COUNT {
        Ok(())
    } else {
        Err(CalibrationError::ChannelOutOfRange(index))
    }
}

/// Tuning for the absolute-intensity strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbsoluteCalibration {
    /// Pair of channels whose readings are averaged
    pub channels: [usize; 2],
    /// MCP angle at full intensity with a non-negative mean
    pub mcp_flexion_deg: f32,
    /// Negative bound reached at full intensity with a negative mean
    pub mcp_extension_deg: f32,
    /// IP angle at full flexion intensity
    pub ip_flexion_deg: f32,
    /// Mean magnitude below which the sample is ignored
    pub intensity_floor: f32,
    /// Mean magnitude treated as full intensity
    pub intensity_ceiling: f32,
}

impl Default for AbsoluteCalibration {
    fn default() -> Self {
        Self {
            channels: absolute::DEFAULT_CHANNELS,
            mcp_flexion_deg: absolute::MCP_FLEXION_DEG,
            mcp_extension_deg: absolute::MCP_EXTENSION_DEG,
            ip_flexion_deg: absolute::IP_FLEXION_DEG,
            intensity_floor: absolute::INTENSITY_FLOOR,
            intensity_ceiling: absolute::INTENSITY_CEILING,
        }
    }
}

impl AbsoluteCalibration {
    /// Check every parameter before any sample is mapped
    pub fn validate(&self) -> Result<(), CalibrationError> {
        finite("mcp_flexion_deg", self.mcp_flexion_deg)?;
        finite("mcp_extension_deg", self.mcp_extension_deg)?;
        finite("ip_flexion_deg", self.ip_flexion_deg)?;
        finite("intensity_floor", self.intensity_floor)?;
        finite("intensity_ceiling", self.intensity_ceiling)?;
        if self.mcp_extension_deg > 0.0 {
            return Err(CalibrationError::ExtensionSign(self.mcp_extension_deg));
        }
        if self.intensity_floor < 0.0 || self.intensity_floor >= self.intensity_ceiling {
            return Err(CalibrationError::IntensityRange {
                floor: self.intensity_floor,
                ceiling: self.intensity_ceiling,
            });
        }
        self.channels.iter().try_for_each(|&index| channel(index))
    }
}

/// Tuning for the differential-RMS strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifferentialCalibration {
    /// Extensor-side channel
    pub channel_a: usize,
    /// Flexor-side channel
    pub channel_b: usize,
    /// Newest samples per RMS estimate
    pub smoothing_window: usize,
    /// RMS treated as full activation
    pub full_scale_rms: f32,
    /// MCP angle at full flexion
    pub max_mcp_deg: f32,
    /// IP angle at full flexion
    pub max_ip_deg: f32,
    /// Fraction of the flexion range used for extension
    pub extension_damping: f32,
}

impl Default for DifferentialCalibration {
    fn default() -> Self {
        Self {
            channel_a: differential::DEFAULT_CHANNEL_A,
            channel_b: differential::DEFAULT_CHANNEL_B,
            smoothing_window: differential::SMOOTHING_WINDOW,
            full_scale_rms: differential::FULL_SCALE_RMS,
            max_mcp_deg: differential::MAX_MCP_DEG,
            max_ip_deg: differential::MAX_IP_DEG,
            extension_damping: differential::EXTENSION_DAMPING,
        }
    }
}

impl DifferentialCalibration {
    /// Check every parameter before any window is mapped
    pub fn validate(&self) -> Result<(), CalibrationError> {
        finite("full_scale_rms", self.full_scale_rms)?;
        finite("max_mcp_deg", self.max_mcp_deg)?;
        finite("max_ip_deg", self.max_ip_deg)?;
        finite("extension_damping", self.extension_damping)?;
        if self.full_scale_rms <= 0.0 {
            return Err(CalibrationError::FullScale(self.full_scale_rms));
        }
        if !(0.0..=1.0).contains(&self.extension_damping) {
            return Err(CalibrationError::Damping(self.extension_damping));
        }
        channel(self.channel_a)?;
        channel(self.channel_b)?;
        if self.channel_a == self.channel_b {
            return Err(CalibrationError::DuplicateChannel(self.channel_a));
        }
        if self.smoothing_window == 0 {
            return Err(CalibrationError::EmptySmoothingWindow);
        }
        Ok(())
    }
}

/// Thumb pose scaled by the mean magnitude of two channels
#[derive(Debug, Clone, PartialEq)]
pub struct AbsoluteIntensityMapper {
    calibration: AbsoluteCalibration,
}

impl AbsoluteIntensityMapper {
    /// Mapper over validated `calibration`
    pub fn new(calibration: AbsoluteCalibration) -> Result<Self, CalibrationError> {
        calibration.validate()?;
        Ok(Self { calibration })
    }

    /// Active calibration
    pub fn calibration(&self) -> &AbsoluteCalibration {
        &self.calibration
    }

    /// Map two raw readings; `None` means intensity below the floor
    pub fn map_readings(&self, a: f32, b: f32) -> Option<AngleState> {
        let cal = &self.calibration;
        let intensity = (a.abs() + b.abs()) / 2.0;
        if intensity < cal.intensity_floor {
            return None;
        }

        let norm = (intensity / cal.intensity_ceiling).clamp(0.0, 1.0);
        let mean = (a + b) / 2.0;
        let state = if mean >= 0.0 {
            AngleState::new(cal.mcp_flexion_deg * norm, cal.ip_flexion_deg * norm)
        } else {
            // IP stays straight on extension
            AngleState::new(cal.mcp_extension_deg * norm, 0.0)
        };
        Some(state)
    }

    /// Map the calibrated channel pair of one sample
    pub fn map_sample(&self, sample: &Sample) -> Option<AngleState> {
        let [a, b] = self.calibration.channels;
        self.map_readings(f32::from(sample.channels[a]), f32::from(sample.channels[b]))
    }
}

/// Joint angles driven by the RMS difference of an antagonist pair
#[derive(Debug, Clone, PartialEq)]
pub struct DifferentialRmsMapper {
    calibration: DifferentialCalibration,
}

impl DifferentialRmsMapper {
    /// Mapper over validated `calibration`
    pub fn new(calibration: DifferentialCalibration) -> Result<Self, CalibrationError> {
        calibration.validate()?;
        Ok(Self { calibration })
    }

    /// Active calibration
    pub fn calibration(&self) -> &DifferentialCalibration {
        &self.calibration
    }

    /// Map already-smoothed RMS levels of channel A and channel B
    pub fn map_rms(&self, rms_a: f32, rms_b: f32) -> AngleState {
        let cal = &self.calibration;
        let norm_a = (rms_a / cal.full_scale_rms).clamp(0.0, 1.0);
        let norm_b = (rms_b / cal.full_scale_rms).clamp(0.0, 1.0);
        let diff = norm_b - norm_a;
        let magnitude = diff.abs();

        if diff >= 0.0 {
            AngleState::new(cal.max_mcp_deg * magnitude, cal.max_ip_deg * magnitude)
        } else {
            let scale = -cal.extension_damping * magnitude;
            AngleState::new(cal.max_mcp_deg * scale, cal.max_ip_deg * scale)
        }
    }

    /// Smooth over the newest `smoothing_window` samples, then map
    pub fn map_samples(&self, window: &[Sample]) -> AngleState {
        let cal = &self.calibration;
        let recent = &window[window.len().saturating_sub(cal.smoothing_window)..];
        self.map_rms(channel_rms(recent, cal.channel_a), channel_rms(recent, cal.channel_b))
    }
}

/// Angle strategy selected at construction
#[derive(Debug, Clone, PartialEq)]
pub enum AngleMapper {
    /// Newest sample, mean magnitude of two channels
    AbsoluteIntensity(AbsoluteIntensityMapper),
    /// Smoothed RMS difference of an antagonist pair
    DifferentialRms(DifferentialRmsMapper),
}

impl AngleMapper {
    /// Absolute-intensity mapper
    pub fn absolute(calibration: AbsoluteCalibration) -> Result<Self, CalibrationError> {
        AbsoluteIntensityMapper::new(calibration).map(Self::AbsoluteIntensity)
    }

    /// Differential-RMS mapper
    pub fn differential(calibration: DifferentialCalibration) -> Result<Self, CalibrationError> {
        DifferentialRmsMapper::new(calibration).map(Self::DifferentialRms)
    }

    /// Mapper for the configured strategy
    pub fn from_config(config: &MappingConfig) -> Result<Self, CalibrationError> {
        match config.strategy {
            MappingStrategy::Absolute => Self::absolute(config.absolute.clone()),
            MappingStrategy::Differential => Self::differential(config.differential.clone()),
        }
    }

    /// Number of newest samples this strategy reads per window
    pub fn window_len(&self) -> usize {
        match self {
            Self::AbsoluteIntensity(_) => 1,
            Self::DifferentialRms(mapper) => mapper.calibration.smoothing_window,
        }
    }

    /// Map a window in arrival order. `None` is the no-movement sentinel and
    /// is only produced by the absolute strategy.
    pub fn map_window(&self, window: &[Sample]) -> Option<AngleState> {
        match self {
            Self::AbsoluteIntensity(mapper) => window.last().and_then(|s| mapper.map_sample(s)),
            Self::DifferentialRms(mapper) => Some(mapper.map_samples(window)),
        }
    }

    /// Strategy name as written in configuration
    pub fn name(&self) -> &'static str {
        match self {
            Self::AbsoluteIntensity(_) => "absolute",
            Self::DifferentialRms(_) => "differential",
        }
    }
}
