// src/acquisition/trial.rs
//! Timed trial capture and the recording protocol built on it
//!
//! A trial is an externally triggered, fixed-duration collection interval:
//! clear the buffer, let the producer fill it, read everything back. The
//! protocol runner repeats that over every (group, movement, repetition)
//! combination and hands back rows for whoever persists them.

use crate::acquisition::sample_buffer::SampleBuffer;
use crate::config::constants::protocol;
use crate::hal::types::{ChannelReadings, ChannelVector, Sample};
use crate::processing::features::mean_per_channel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One-shot coordinator: clear, wait, snapshot
#[derive(Debug, Clone)]
pub struct TrialCapture {
    buffer: Arc<SampleBuffer>,
    duration: Duration,
}

impl TrialCapture {
    /// Capture trials of `duration` from `buffer`
    pub fn new(buffer: Arc<SampleBuffer>, duration: Duration) -> Self {
        Self { buffer, duration }
    }

    /// Length of one trial window
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Collect whatever the producer appends during one trial window.
    ///
    /// Samples from before the call never leak into the result. If the
    /// producer outruns the buffer, only the newest `capacity` samples of the
    /// trial are returned.
    pub fn capture(&self) -> Vec<Sample> {
        self.buffer.clear();
        thread::sleep(self.duration);
        self.buffer.snapshot()
    }
}

/// Identity of one trial: the compound key used for training labels
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrialId {
    /// Finger or movement group, 1-based
    pub group: u32,
    /// Movement name, e.g. `Flexion`
    pub movement: String,
    /// Repetition number, 1-based
    pub repetition: u32,
}

/// One recorded sample: `[group, movement, repetition, timestamp, ch1..ch8]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    /// Group of the trial this row belongs to
    pub group: u32,
    /// Movement of the trial
    pub movement: String,
    /// Repetition of the trial
    pub repetition: u32,
    /// Device timestamp in microseconds
    pub timestamp: u64,
    /// Raw readings, channel 1 first
    pub channels: ChannelReadings,
}

impl RecordRow {
    /// Key of the trial that produced this row
    pub fn trial_id(&self) -> TrialId {
        TrialId {
            group: self.group,
            movement: self.movement.clone(),
            repetition: self.repetition,
        }
    }
}

/// Which trials to run and for how long
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolPlan {
    /// Groups in execution order
    pub groups: Vec<u32>,
    /// Movements run for each group
    pub movements: Vec<String>,
    /// Repetitions of each movement
    pub repetitions: u32,
    /// Capture window per trial
    pub trial_duration: Duration,
}

impl ProtocolPlan {
    /// Fingers 1-5, extension then flexion, 30 one-second repetitions each
    pub fn finger_protocol() -> Self {
        Self {
            groups: (1..=protocol::FINGER_COUNT).collect(),
            movements: protocol::FINGER_MOVEMENTS.iter().map(|m| m.to_string()).collect(),
            repetitions: protocol::FINGER_REPETITIONS,
            trial_duration: Duration::from_millis(protocol::FINGER_TRIAL_MS),
        }
    }

    /// Thumb only, eight movements, 10 half-second repetitions each
    pub fn thumb_protocol() -> Self {
        Self {
            groups: vec![protocol::THUMB_GROUP],
            movements: protocol::THUMB_MOVEMENTS.iter().map(|m| m.to_string()).collect(),
            repetitions: protocol::THUMB_REPETITIONS,
            trial_duration: Duration::from_millis(protocol::THUMB_TRIAL_MS),
        }
    }

    /// Trials in execution order: group, then movement, then repetition
    pub fn trials(&self) -> Vec<TrialId> {
        let mut trials = Vec::with_capacity(self.trial_count());
        for &group in &self.groups {
            for movement in &self.movements {
                for repetition in 1..=self.repetitions {
                    trials.push(TrialId {
                        group,
                        movement: movement.clone(),
                        repetition,
                    });
                }
            }
        }
        trials
    }

    /// Total number of trials the plan runs
    pub fn trial_count(&self) -> usize {
        self.groups.len() * self.movements.len() * self.repetitions as usize
    }
}

/// Operator cue that starts each trial
pub trait TrialTrigger {
    /// Block until the operator is ready; `false` aborts the protocol
    fn wait_for_start(&mut self, trial: &TrialId) -> bool;
}

/// Trigger that starts every trial immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

impl TrialTrigger for Immediate {
    fn wait_for_start(&mut self, _trial: &TrialId) -> bool {
        true
    }
}

/// Rows collected by a protocol run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtocolRecording {
    /// Every captured sample, grouped by trial
    pub rows: Vec<RecordRow>,
    /// Finished trials with their sample counts
    pub completed_trials: Vec<(TrialId, usize)>,
    /// The trigger stopped the protocol early
    pub aborted: bool,
}

impl ProtocolRecording {
    /// Number of trials that ran to completion
    pub fn trial_count(&self) -> usize {
        self.completed_trials.len()
    }

    /// Per-trial channel means: the feature vectors the offline trainer
    /// consumes. Trials that captured no samples are omitted.
    pub fn trial_features(&self) -> BTreeMap<TrialId, ChannelVector> {
        let mut grouped: BTreeMap<TrialId, Vec<Sample>> = BTreeMap::new();
        for row in &self.rows {
            grouped
                .entry(row.trial_id())
                .or_default()
                .push(Sample::new(row.timestamp, row.channels));
        }
        grouped
            .into_iter()
            .map(|(id, samples)| (id, mean_per_channel(&samples)))
            .collect()
    }
}

/// Run every trial of `plan`, capturing with `capture` once `trigger` fires
pub fn run_protocol(
    plan: &ProtocolPlan,
    capture: &TrialCapture,
    trigger: &mut dyn TrialTrigger,
) -> ProtocolRecording {
    let mut recording = ProtocolRecording::default();
    info!(
        trials = plan.trial_count(),
        duration_ms = capture.duration().as_millis() as u64,
        "Starting recording protocol"
    );

    for trial in plan.trials() {
        if !trigger.wait_for_start(&trial) {
            warn!(group = trial.group, movement = %trial.movement, repetition = trial.repetition,
                  "Protocol aborted by operator");
            recording.aborted = true;
            break;
        }

        let samples = capture.capture();
        debug!(group = trial.group, movement = %trial.movement, repetition = trial.repetition,
               samples = samples.len(), "Trial captured");

        recording.rows.extend(samples.iter().map(|sample| RecordRow {
            group: trial.group,
            movement: trial.movement.clone(),
            repetition: trial.repetition,
            timestamp: sample.timestamp,
            channels: sample.channels,
        }));
        recording.completed_trials.push((trial, samples.len()));
    }

    info!(trials = recording.trial_count(), rows = recording.rows.len(), "Recording protocol finished");
    recording
}
