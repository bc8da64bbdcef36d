//! `emg-live`: drive the mapping pipeline from the simulated armband.
//!
//! Angle or gesture output is logged at render cadence. With `--record` the
//! binary instead runs a recording protocol and prints per-trial channel
//! means as JSON lines for the offline trainer.

use clap::{Parser, ValueEnum};
use crossbeam::channel;
use emg_mapping::acquisition::{run_protocol, Immediate, ProtocolPlan, TrialCapture};
use emg_mapping::config::{ConfigLoader, MappingStrategy, OutputKind, PipelineConfig};
use emg_mapping::hal::{ActivationPattern, SimulatedHub};
use emg_mapping::processing::{spawn_ticker, Pipeline};
use emg_mapping::{EmgResult, PipelineState};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Real-time EMG to thumb angle / gesture mapping.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file. Default: emg-mapping.toml then config/local.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output to publish.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Angle heuristic (angles mode).
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Decision-tree model JSON (gesture mode).
    #[arg(long)]
    model: Option<PathBuf>,

    /// How long to stream before shutting down.
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Simulated muscle activation.
    #[arg(long, value_enum)]
    pattern: Option<PatternArg>,

    /// Run a recording protocol instead of live mapping.
    #[arg(long, value_enum)]
    record: Option<ProtocolArg>,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Angles,
    Gesture,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Absolute,
    Differential,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PatternArg {
    Rest,
    Constant,
    Sinusoidal,
    Burst,
    Random,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProtocolArg {
    Finger,
    Thumb,
}

impl From<PatternArg> for ActivationPattern {
    fn from(arg: PatternArg) -> Self {
        match arg {
            PatternArg::Rest => ActivationPattern::Rest,
            PatternArg::Constant => ActivationPattern::Constant,
            PatternArg::Sinusoidal => ActivationPattern::Sinusoidal { frequency_hz: 0.5 },
            PatternArg::Burst => ActivationPattern::Burst {
                burst_duration_ms: 400,
                rest_duration_ms: 600,
            },
            PatternArg::Random => ActivationPattern::Random,
        }
    }
}

impl Cli {
    fn apply_overrides(&self, config: &mut PipelineConfig) {
        if let Some(mode) = self.mode {
            config.driver.mode = match mode {
                ModeArg::Angles => OutputKind::Angles,
                ModeArg::Gesture => OutputKind::Gesture,
            };
        }
        if let Some(strategy) = self.strategy {
            config.mapping.strategy = match strategy {
                StrategyArg::Absolute => MappingStrategy::Absolute,
                StrategyArg::Differential => MappingStrategy::Differential,
            };
        }
        if let Some(model) = &self.model {
            config.classifier.model_path = Some(model.clone());
        }
        if let Some(pattern) = self.pattern {
            config.device.activation_pattern = pattern.into();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level_filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level_filter)
        .with_target(false)
        .init();

    let about = emg_mapping::version_info();
    info!(version = %about.version, "{}: {}", about.name, about.description);
    debug!(features = ?about.features, "Library capabilities");

    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_paths(vec![path.clone()]),
        None => ConfigLoader::new(),
    };
    let mut config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply_overrides(&mut config);

    let result = match cli.record {
        Some(protocol) => record(&config, protocol),
        None => stream(&config, Duration::from_secs(cli.seconds)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn stream(config: &PipelineConfig, duration: Duration) -> EmgResult<()> {
    let pipeline = Arc::new(Pipeline::from_config(config)?);
    let hub = SimulatedHub::run_in_background(config.device.clone(), pipeline.clone())?;
    let ticker = spawn_ticker(pipeline.clone(), config.driver.tick_interval())?;

    let render = channel::tick(config.driver.render_interval());
    let deadline = channel::after(duration);
    let width = config.buffer.capacity;

    loop {
        crossbeam::select! {
            recv(deadline) -> _ => break,
            recv(render) -> _ => {
                if pipeline.state() != PipelineState::Streaming {
                    continue;
                }
                let waveform = pipeline.waveform(width);
                let energy = waveform.mapv(|v| v * v).mean().unwrap_or(0.0);
                match config.driver.mode {
                    OutputKind::Angles => {
                        let angles = pipeline.angles();
                        info!(energy, mcp = angles.mcp, ip = angles.ip, "Render");
                    }
                    OutputKind::Gesture => match pipeline.gesture() {
                        Some(label) => info!(energy, gesture = %label, "Render"),
                        None => info!(energy, buffered = pipeline.buffer().len(), "Render (window filling)"),
                    },
                }
            }
        }
    }

    ticker.stop();
    let emitted = hub.samples_emitted();
    hub.stop()?;
    info!(
        samples = emitted,
        ticks = pipeline.ticks(),
        evicted = pipeline.buffer().metrics().evicted,
        "Session finished"
    );
    Ok(())
}

fn record(config: &PipelineConfig, protocol: ProtocolArg) -> EmgResult<()> {
    let plan = match protocol {
        ProtocolArg::Finger => ProtocolPlan::finger_protocol(),
        ProtocolArg::Thumb => ProtocolPlan::thumb_protocol(),
    };

    // Recording only needs the buffer; the mapping mode is irrelevant here
    let mut recording_config = config.clone();
    recording_config.driver.mode = OutputKind::Angles;
    let pipeline = Arc::new(Pipeline::from_config(&recording_config)?);
    let hub = SimulatedHub::run_in_background(config.device.clone(), pipeline.clone())?;

    let capture = TrialCapture::new(pipeline.buffer().clone(), plan.trial_duration);
    let recording = run_protocol(&plan, &capture, &mut Immediate);
    hub.stop()?;

    for (trial, means) in recording.trial_features() {
        let line = serde_json::json!({
            "group": trial.group,
            "movement": trial.movement,
            "repetition": trial.repetition,
            "means": means,
        });
        println!("{line}");
    }

    let empty = recording.completed_trials.iter().filter(|(_, n)| *n == 0).count();
    if empty > 0 {
        warn!(empty, "Some trials captured no samples");
    }
    Ok(())
}
