// src/processing/pipeline.rs
//! Pipeline driver: device events in, published angles or gestures out
//!
//! The device thread appends through [`DeviceListener`]; a ticker thread
//! periodically snapshots the buffer, runs exactly one mapper and
//! overwrites the published output. Readers (renderers, an HTTP endpoint)
//! only ever see the last complete value.

use crate::acquisition::SampleBuffer;
use crate::classifier::{DecisionTreeModel, GestureClassifier, GestureLabel};
use crate::config::{ConfigError, OutputKind, PipelineConfig};
use crate::error::{EmgError, EmgResult};
use crate::hal::traits::{DeviceControl, DeviceError, DeviceListener};
use crate::hal::types::{DeviceEvent, PipelineState};
use crate::processing::angles::{AngleMapper, AngleState};
use crate::processing::features::padded_window;
use crossbeam::channel::{self, Sender};
use ndarray::Array2;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Output computed on every tick, fixed at construction
#[derive(Debug, Clone)]
pub enum OutputMode {
    /// Map each window to joint angles
    Angles(AngleMapper),
    /// Classify each full window
    Gesture(GestureClassifier),
}

impl OutputMode {
    /// Configuration value selecting this mode
    pub fn kind(&self) -> OutputKind {
        match self {
            OutputMode::Angles(_) => OutputKind::Angles,
            OutputMode::Gesture(_) => OutputKind::Gesture,
        }
    }
}

/// Driver behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Empty the buffer on `Disconnected`
    pub clear_on_disconnect: bool,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not streaming; nothing computed or published
    Idle,
    /// New angles were published
    Angles(AngleState),
    /// Intensity below the floor; previous angles stay published
    NoMovement,
    /// A new label was published
    Gesture(GestureLabel),
    /// Window not yet full; the model was not consulted
    WindowIncomplete {
        /// Samples currently buffered
        len: usize,
        /// Samples the classifier needs
        capacity: usize,
    },
}

#[derive(Debug, Default)]
struct OutputSlot {
    angles: AngleState,
    gesture: Option<GestureLabel>,
}

/// Real-time EMG mapping pipeline
pub struct Pipeline {
    buffer: Arc<SampleBuffer>,
    mode: OutputMode,
    options: PipelineOptions,
    state: RwLock<PipelineState>,
    output: RwLock<OutputSlot>,
    device_error: Mutex<Option<DeviceError>>,
    ticks: AtomicU64,
}

impl Pipeline {
    /// Idle pipeline over a fresh buffer of `buffer_capacity` samples.
    ///
    /// The window `mode` reads must fit the buffer: a classifier window must
    /// equal the capacity, a smoothing window must not exceed it.
    pub fn new(buffer_capacity: usize, mode: OutputMode, options: PipelineOptions) -> EmgResult<Self> {
        let buffer = Arc::new(SampleBuffer::new(buffer_capacity)?);

        match &mode {
            OutputMode::Gesture(classifier) if classifier.window_capacity() != buffer_capacity => {
                return Err(EmgError::configuration(
                    "pipeline",
                    format!(
                        "classifier window {} does not match buffer capacity {}",
                        classifier.window_capacity(),
                        buffer_capacity
                    ),
                ));
            }
            OutputMode::Angles(mapper @ AngleMapper::DifferentialRms(_)) if mapper.window_len() > buffer_capacity => {
                return Err(EmgError::configuration(
                    "pipeline",
                    format!(
                        "smoothing window {} exceeds buffer capacity {}",
                        mapper.window_len(),
                        buffer_capacity
                    ),
                ));
            }
            _ => {}
        }

        Ok(Self {
            buffer,
            mode,
            options,
            state: RwLock::new(PipelineState::Idle),
            output: RwLock::new(OutputSlot::default()),
            device_error: Mutex::new(None),
            ticks: AtomicU64::new(0),
        })
    }

    /// Validate `config`, build the mapper or load the model, then assemble.
    /// Nothing streams until this has succeeded.
    pub fn from_config(config: &PipelineConfig) -> EmgResult<Self> {
        config
            .validate()
            .map_err(|errors| EmgError::Config(ConfigError::Validation(errors)))?;

        let capacity = config.buffer.capacity;
        let mode = match config.driver.mode {
            OutputKind::Angles => OutputMode::Angles(AngleMapper::from_config(&config.mapping)?),
            OutputKind::Gesture => {
                let path = config.classifier.model_path.as_ref().ok_or_else(|| {
                    EmgError::configuration("classifier", "gesture mode requires a model file")
                })?;
                let model = DecisionTreeModel::from_json_file(path)?;
                OutputMode::Gesture(GestureClassifier::new(Arc::new(model), capacity))
            }
        };

        let options = PipelineOptions {
            clear_on_disconnect: config.driver.clear_on_disconnect,
        };
        info!(mode = ?mode.kind(), capacity, "Pipeline assembled");
        Self::new(capacity, mode, options)
    }

    /// Compute and publish one output from the current buffer contents.
    ///
    /// The state guard is held until the output is published, so a
    /// disconnect waits for a running tick and nothing is published after it.
    pub fn tick(&self) -> TickOutcome {
        let state = self.state.read();
        if *state != PipelineState::Streaming {
            return TickOutcome::Idle;
        }
        self.ticks.fetch_add(1, Ordering::Relaxed);

        match &self.mode {
            OutputMode::Angles(mapper) => {
                let window = self.buffer.tail(mapper.window_len());
                match mapper.map_window(&window) {
                    Some(angles) => {
                        self.output.write().angles = angles;
                        trace!(mcp = angles.mcp, ip = angles.ip, "Angles published");
                        TickOutcome::Angles(angles)
                    }
                    None => TickOutcome::NoMovement,
                }
            }
            OutputMode::Gesture(classifier) => {
                let window = self.buffer.snapshot();
                match classifier.classify_window(&window) {
                    Some(label) => {
                        trace!(label = %label, "Gesture published");
                        self.output.write().gesture = Some(label.clone());
                        TickOutcome::Gesture(label)
                    }
                    None => TickOutcome::WindowIncomplete {
                        len: window.len(),
                        capacity: classifier.window_capacity(),
                    },
                }
            }
        }
    }

    /// Last published angles, `{0, 0}` before the first
    pub fn angles(&self) -> AngleState {
        self.output.read().angles
    }

    /// Published angles as `{"MCP": .., "IP": ..}`
    pub fn angles_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.angles())
    }

    /// Last published gesture, if a full window has been classified
    pub fn gesture(&self) -> Option<GestureLabel> {
        self.output.read().gesture.clone()
    }

    /// Raw window for display, left-padded with zeros to `width`
    pub fn waveform(&self, width: usize) -> Array2<f32> {
        padded_window(&self.buffer.tail(width), width)
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        *self.state.read()
    }

    /// Streaming ticks executed so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Shared buffer the device appends to
    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// Output computed on each tick
    pub fn mode(&self) -> &OutputMode {
        &self.mode
    }

    /// Failure reported by the device when streaming was requested
    pub fn device_error(&self) -> Option<DeviceError> {
        self.device_error.lock().clone()
    }

    fn set_state(&self, next: PipelineState) {
        let mut state = self.state.write();
        if *state != next {
            info!(from = ?*state, to = ?next, "Pipeline state changed");
            *state = next;
        }
    }
}

impl DeviceListener for Pipeline {
    fn on_event(&self, event: DeviceEvent, device: &dyn DeviceControl) {
        match event {
            DeviceEvent::Connected => match device.stream_emg(true) {
                Ok(()) => {
                    *self.device_error.lock() = None;
                    self.set_state(PipelineState::Streaming);
                }
                Err(err) => {
                    error!(error = %err, "Device refused to stream EMG");
                    *self.device_error.lock() = Some(err);
                }
            },
            DeviceEvent::Emg(sample) => self.buffer.append(sample),
            DeviceEvent::Disconnected => {
                self.set_state(PipelineState::Idle);
                if self.options.clear_on_disconnect {
                    self.buffer.clear();
                    debug!("Buffer cleared after disconnect");
                }
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("mode", &self.mode)
            .field("state", &self.state())
            .field("buffer", &self.buffer)
            .finish()
    }
}

/// Run `pipeline.tick()` every `interval` on a dedicated thread
pub fn spawn_ticker(pipeline: Arc<Pipeline>, interval: Duration) -> EmgResult<TickerHandle> {
    if interval.is_zero() {
        return Err(EmgError::configuration("ticker", "tick interval must be positive"));
    }

    let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
    let thread = thread::Builder::new()
        .name("emg-ticker".to_string())
        .spawn(move || {
            let ticker = channel::tick(interval);
            debug!(interval_ms = interval.as_millis() as u64, "Ticker started");
            loop {
                crossbeam::select! {
                    recv(shutdown_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        pipeline.tick();
                    }
                }
            }
            debug!(ticks = pipeline.ticks(), "Ticker stopped");
        })
        .map_err(|e| EmgError::configuration("ticker", e.to_string()))?;

    Ok(TickerHandle {
        shutdown: Some(shutdown_tx),
        thread: Some(thread),
    })
}

/// Running ticker; stopping (or dropping) waits for the current tick
pub struct TickerHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TickerHandle {
    /// Stop ticking and join the thread
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Ticker thread panicked");
            }
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
