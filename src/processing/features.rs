// src/processing/features.rs
//! Per-channel window statistics
//!
//! All functions are total: an empty window produces zeros rather than an
//! error, so an empty snapshot flows through the mappers' neutral policies.

use crate::hal::types::{ChannelVector, Sample, CHANNEL_COUNT};
use ndarray::Array2;

/// Arithmetic mean of each channel
pub fn mean_per_channel(window: &[Sample]) -> ChannelVector {
    let mut sums = [0.0f64; CHANNEL_COUNT];
    for sample in window {
        for (sum, &value) in sums.iter_mut().zip(sample.channels.iter()) {
            *sum += f64::from(value);
        }
    }
    finish(sums, window.len(), |sum, n| sum / n)
}

/// Root mean square of each channel
pub fn rms_per_channel(window: &[Sample]) -> ChannelVector {
    let mut squares = [0.0f64; CHANNEL_COUNT];
    for sample in window {
        for (acc, &value) in squares.iter_mut().zip(sample.channels.iter()) {
            let value = f64::from(value);
            *acc += value * value;
        }
    }
    finish(squares, window.len(), |sum, n| (sum / n).sqrt())
}

/// RMS of a single channel; out-of-range indices read as silence
pub fn channel_rms(window: &[Sample], channel: usize) -> f32 {
    if window.is_empty() || channel >= CHANNEL_COUNT {
        return 0.0;
    }
    let energy: f64 = window
        .iter()
        .map(|sample| {
            let value = f64::from(sample.channels[channel]);
            value * value
        })
        .sum();
    (energy / window.len() as f64).sqrt() as f32
}

/// Raw channel series as a `(CHANNEL_COUNT, width)` matrix.
///
/// Windows shorter than `width` are left-padded with zeros so the newest
/// sample always sits in the last column; longer windows keep only their
/// newest `width` samples.
pub fn padded_window(window: &[Sample], width: usize) -> Array2<f32> {
    let mut matrix = Array2::<f32>::zeros((CHANNEL_COUNT, width));
    let used = window.len().min(width);
    let recent = &window[window.len() - used..];
    let offset = width - used;

    for (column, sample) in recent.iter().enumerate() {
        for (channel, &value) in sample.channels.iter().enumerate() {
            matrix[[channel, offset + column]] = f32::from(value);
        }
    }
    matrix
}

fn finish(acc: [f64; CHANNEL_COUNT], count: usize, reduce: impl Fn(f64, f64) -> f64) -> ChannelVector {
    let mut out = [0.0f32; CHANNEL_COUNT];
    if count == 0 {
        return out;
    }
    for (slot, &value) in out.iter_mut().zip(acc.iter()) {
        *slot = reduce(value, count as f64) as f32;
    }
    out
}
