// src/hal/types.rs
//! Core types shared between the armband collaborator and the pipeline

use serde::{Deserialize, Serialize};

/// Number of EMG channels delivered per sample by the armband
pub const CHANNEL_COUNT: usize = 8;

/// Raw per-channel readings of one sample
pub type ChannelReadings = [i16; CHANNEL_COUNT];

/// Per-channel aggregate computed over a window (mean, RMS)
pub type ChannelVector = [f32; CHANNEL_COUNT];

/// Single timestamped EMG sample
///
/// Channels carry raw EMG units, typically in `[-128, 127]`. A sample is
/// immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Device time in microseconds
    pub timestamp: u64,
    /// Raw readings, channel 1 first
    pub channels: ChannelReadings,
}

impl Sample {
    /// Sample taken at `timestamp`
    pub fn new(timestamp: u64, channels: ChannelReadings) -> Self {
        Self { timestamp, channels }
    }

    /// Reading of one channel, `None` when the index is out of range
    pub fn channel(&self, index: usize) -> Option<i16> {
        self.channels.get(index).copied()
    }
}

/// Events delivered by the device collaborator on its own thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Handshake completed; the listener may enable EMG streaming
    Connected,
    /// One EMG sample
    Emg(Sample),
    /// Link lost or hub stopped
    Disconnected,
}

/// Pipeline lifecycle as driven by device events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// No device streaming; ticks do nothing
    Idle,
    /// Samples are arriving and ticks publish output
    Streaming,
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState::Idle
    }
}
