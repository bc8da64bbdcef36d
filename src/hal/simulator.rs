// src/hal/simulator.rs
//! Simulated 8-channel armband
//!
//! Stands in for the real device collaborator: after a (simulated) handshake
//! it delivers `Connected` on its own I/O thread, waits for the listener to
//! enable streaming, then emits samples at the configured rate until it is
//! stopped or reaches `disconnect_after` samples, finishing with
//! `Disconnected`.

use crate::config::constants::{signal, simulator};
use crate::hal::traits::{DeviceControl, DeviceError, DeviceListener};
use crate::hal::types::{DeviceEvent, Sample, CHANNEL_COUNT};
use crossbeam::channel::{self, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Samples per second
    pub sample_rate_hz: u32,
    /// Peak activation in raw EMG units
    pub signal_amplitude: f32,
    /// Additive noise as a fraction of `signal_amplitude`
    pub noise_level: f32,
    /// Envelope applied to every channel
    pub activation_pattern: ActivationPattern,
    /// Seed for carrier and noise
    pub seed: u64,
    /// Emit `Disconnected` after this many samples
    pub disconnect_after: Option<u64>,
    /// Fail the handshake, as an absent or unpaired armband would
    pub handshake_fails: bool,
}

/// Muscle activation envelope over time
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivationPattern {
    /// No activation, noise only
    Rest,
    /// Full amplitude throughout
    Constant,
    /// Slow contraction and release
    Sinusoidal {
        /// Envelope frequency
        frequency_hz: f32,
    },
    /// Alternating contractions and rests
    Burst {
        /// Contraction length
        burst_duration_ms: u32,
        /// Rest length
        rest_duration_ms: u32,
    },
    /// Envelope drawn afresh for every sample
    Random,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: signal::DEFAULT_SAMPLE_RATE_HZ,
            signal_amplitude: simulator::DEFAULT_SIGNAL_AMPLITUDE,
            noise_level: simulator::DEFAULT_NOISE_LEVEL,
            activation_pattern: ActivationPattern::Sinusoidal { frequency_hz: 0.5 },
            seed: simulator::DEFAULT_SEED,
            disconnect_after: None,
            handshake_fails: false,
        }
    }
}

impl SimulatorConfig {
    /// Reject settings the generator cannot produce
    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.sample_rate_hz == 0 || self.sample_rate_hz > signal::MAX_SAMPLE_RATE_HZ {
            return Err(DeviceError::Configuration(format!(
                "sample_rate_hz must be in [1, {}], got {}",
                signal::MAX_SAMPLE_RATE_HZ,
                self.sample_rate_hz
            )));
        }
        if !self.signal_amplitude.is_finite() || self.signal_amplitude < 0.0 {
            return Err(DeviceError::Configuration(format!(
                "signal_amplitude must be finite and non-negative, got {}",
                self.signal_amplitude
            )));
        }
        if !(0.0..=1.0).contains(&self.noise_level) {
            return Err(DeviceError::Configuration(format!(
                "noise_level must be in [0.0, 1.0], got {}",
                self.noise_level
            )));
        }
        match self.activation_pattern {
            ActivationPattern::Sinusoidal { frequency_hz } if !(frequency_hz > 0.0) => {
                Err(DeviceError::Configuration(format!(
                    "sinusoidal frequency must be positive, got {}",
                    frequency_hz
                )))
            }
            ActivationPattern::Burst { burst_duration_ms, rest_duration_ms }
                if u64::from(burst_duration_ms) + u64::from(rest_duration_ms) == 0 =>
            {
                Err(DeviceError::Configuration(
                    "burst pattern needs a non-zero period".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    fn sample_period_micros(&self) -> u64 {
        1_000_000 / u64::from(self.sample_rate_hz.max(1))
    }
}

/// Deterministic sample source shaped by an activation pattern
///
/// Raw EMG is bipolar and noise-like, so each channel is the activation
/// envelope times a random carrier in `[-1, 1]`, scaled by a per-channel
/// gain, plus noise, clamped to the armband's 8-bit range.
pub struct SignalGenerator {
    config: SimulatorConfig,
    rng: StdRng,
    sequence: u64,
}

impl SignalGenerator {
    /// Deterministic generator for `config`
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            sequence: 0,
        }
    }

    /// Produce the next sample; timestamps advance by one sample period
    pub fn next_sample(&mut self) -> Sample {
        let timestamp = self.sequence * self.config.sample_period_micros();
        let envelope = self.envelope(timestamp);
        let noise_span = self.config.noise_level * self.config.signal_amplitude;

        let mut channels = [0i16; CHANNEL_COUNT];
        for (channel, slot) in channels.iter_mut().enumerate() {
            let carrier: f32 = self.rng.gen_range(-1.0..=1.0);
            let noise: f32 = if noise_span > 0.0 {
                self.rng.gen_range(-noise_span..=noise_span)
            } else {
                0.0
            };
            let value = envelope * simulator::CHANNEL_GAINS[channel] * carrier + noise;
            *slot = value
                .round()
                .clamp(signal::RAW_MIN as f32, signal::RAW_MAX as f32) as i16;
        }

        self.sequence += 1;
        Sample::new(timestamp, channels)
    }

    /// Samples produced so far
    pub fn samples_generated(&self) -> u64 {
        self.sequence
    }

    fn envelope(&mut self, timestamp_us: u64) -> f32 {
        let amplitude = self.config.signal_amplitude;
        let seconds = timestamp_us as f32 / 1_000_000.0;
        match self.config.activation_pattern {
            ActivationPattern::Rest => 0.0,
            ActivationPattern::Constant => amplitude,
            ActivationPattern::Sinusoidal { frequency_hz } => {
                let phase = 2.0 * std::f32::consts::PI * frequency_hz * seconds;
                amplitude * 0.5 * (1.0 - phase.cos())
            }
            ActivationPattern::Burst { burst_duration_ms, rest_duration_ms } => {
                let period_ms = (u64::from(burst_duration_ms) + u64::from(rest_duration_ms)).max(1);
                let position_ms = (timestamp_us / 1000) % period_ms;
                if position_ms < u64::from(burst_duration_ms) {
                    amplitude
                } else {
                    0.0
                }
            }
            ActivationPattern::Random if amplitude > 0.0 => self.rng.gen_range(0.0..=amplitude),
            ActivationPattern::Random => 0.0,
        }
    }
}

/// Device-side control handed to the listener with every event
struct SimulatedControl {
    connected: AtomicBool,
    streaming: AtomicBool,
    samples_emitted: AtomicU64,
}

impl DeviceControl for SimulatedControl {
    fn stream_emg(&self, enabled: bool) -> Result<(), DeviceError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(DeviceError::NotConnected);
        }
        self.streaming.store(enabled, Ordering::Release);
        debug!(enabled, "EMG streaming toggled");
        Ok(())
    }
}

/// Entry point for running the simulated armband
pub struct SimulatedHub;

impl SimulatedHub {
    /// Perform the handshake and start delivering events on a background thread
    pub fn run_in_background(
        config: SimulatorConfig,
        listener: Arc<dyn DeviceListener>,
    ) -> Result<HubHandle, DeviceError> {
        config.validate()?;

        if config.handshake_fails {
            warn!("Simulated armband did not answer the handshake");
            return Err(DeviceError::HandshakeFailed(
                "no armband answered the pairing request".to_string(),
            ));
        }

        let control = Arc::new(SimulatedControl {
            connected: AtomicBool::new(true),
            streaming: AtomicBool::new(false),
            samples_emitted: AtomicU64::new(0),
        });
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);

        let thread_control = control.clone();
        let thread = thread::Builder::new()
            .name("emg-hub".to_string())
            .spawn(move || {
                let period = Duration::from_micros(config.sample_period_micros());
                let disconnect_after = config.disconnect_after;
                let mut generator = SignalGenerator::new(config);
                let ticker = channel::tick(period);

                info!(period_us = period.as_micros() as u64, "Simulated armband connected");
                listener.on_event(DeviceEvent::Connected, thread_control.as_ref());

                loop {
                    crossbeam::select! {
                        recv(shutdown_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if !thread_control.streaming.load(Ordering::Acquire) {
                                continue;
                            }
                            let sample = generator.next_sample();
                            listener.on_event(DeviceEvent::Emg(sample), thread_control.as_ref());
                            let emitted = thread_control.samples_emitted.fetch_add(1, Ordering::Relaxed) + 1;
                            if disconnect_after.map_or(false, |limit| emitted >= limit) {
                                info!(emitted, "Simulated armband dropped the link");
                                break;
                            }
                        }
                    }
                }

                thread_control.streaming.store(false, Ordering::Release);
                thread_control.connected.store(false, Ordering::Release);
                listener.on_event(DeviceEvent::Disconnected, thread_control.as_ref());
            })
            .map_err(|e| DeviceError::Thread(e.to_string()))?;

        Ok(HubHandle {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
            control,
        })
    }
}

/// Handle to a running simulated armband; stopping it delivers `Disconnected`
pub struct HubHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    control: Arc<SimulatedControl>,
}

impl HubHandle {
    /// Samples delivered to the listener
    pub fn samples_emitted(&self) -> u64 {
        self.control.samples_emitted.load(Ordering::Relaxed)
    }

    /// Between `Connected` and `Disconnected`
    pub fn is_connected(&self) -> bool {
        self.control.connected.load(Ordering::Acquire)
    }

    /// The listener has enabled EMG streaming
    pub fn is_streaming(&self) -> bool {
        self.control.streaming.load(Ordering::Acquire)
    }

    /// Stop the device thread and wait for it to deliver `Disconnected`
    pub fn stop(mut self) -> Result<(), DeviceError> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> Result<(), DeviceError> {
        if let Some(shutdown) = self.shutdown.take() {
            // The thread may already have exited on its own
            let _ = shutdown.try_send(());
        }
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| DeviceError::Thread("device thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for HubHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_and_join();
    }
}
