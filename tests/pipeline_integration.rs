// tests/pipeline_integration.rs
//! End-to-end tests: device events through the pipeline to published output

use emg_mapping::acquisition::{run_protocol, Immediate, ProtocolPlan, TrialCapture};
use emg_mapping::classifier::{GestureClassifier, GestureLabel, GestureModel};
use emg_mapping::config::{ConfigError, MappingStrategy, OutputKind, PipelineConfig};
use emg_mapping::hal::{
    ActivationPattern, ChannelVector, DeviceControl, DeviceError, DeviceEvent, DeviceListener, Sample,
    SimulatedHub, SimulatorConfig,
};
use emg_mapping::processing::{
    spawn_ticker, AbsoluteCalibration, AngleMapper, AngleState, DifferentialCalibration, OutputMode, Pipeline,
    PipelineOptions, TickOutcome,
};
use emg_mapping::{EmgError, PipelineState};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Always-willing device used to drive the listener by hand
struct Armband;

impl DeviceControl for Armband {
    fn stream_emg(&self, _enabled: bool) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Records every feature vector it is asked to classify
#[derive(Default)]
struct SpyModel {
    seen: Mutex<Vec<ChannelVector>>,
}

impl GestureModel for SpyModel {
    fn predict(&self, features: &ChannelVector) -> GestureLabel {
        self.seen.lock().push(*features);
        GestureLabel::new(1, "Flexion")
    }
}

fn ch1(timestamp: u64, value: i16) -> Sample {
    let mut channels = [0i16; 8];
    channels[0] = value;
    Sample::new(timestamp, channels)
}

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn test_gesture_window_slides_with_new_samples() {
    let spy = Arc::new(SpyModel::default());
    let classifier = GestureClassifier::new(spy.clone(), 4);
    let pipeline = Pipeline::new(4, OutputMode::Gesture(classifier), PipelineOptions::default()).unwrap();

    pipeline.on_event(DeviceEvent::Connected, &Armband);
    for (t, value) in [1, 2, 3, 4].into_iter().enumerate() {
        pipeline.on_event(DeviceEvent::Emg(ch1(t as u64, value)), &Armband);
    }
    assert!(matches!(pipeline.tick(), TickOutcome::Gesture(_)));

    pipeline.on_event(DeviceEvent::Emg(ch1(4, 10)), &Armband);
    pipeline.tick();

    let seen = spy.seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0][0], 2.5);
    assert_eq!(seen[1][0], 4.75);
}

#[test]
fn test_partial_window_never_reaches_model() {
    let spy = Arc::new(SpyModel::default());
    let classifier = GestureClassifier::new(spy.clone(), 50);
    let pipeline = Pipeline::new(50, OutputMode::Gesture(classifier), PipelineOptions::default()).unwrap();

    pipeline.on_event(DeviceEvent::Connected, &Armband);
    for t in 0..49 {
        pipeline.on_event(DeviceEvent::Emg(ch1(t, 20)), &Armband);
        assert!(matches!(pipeline.tick(), TickOutcome::WindowIncomplete { capacity: 50, .. }));
    }

    assert!(spy.seen.lock().is_empty());
    assert_eq!(pipeline.gesture(), None);
}

#[test]
fn test_simulated_session_publishes_angles() {
    let config = SimulatorConfig {
        sample_rate_hz: 1000,
        activation_pattern: ActivationPattern::Constant,
        ..Default::default()
    };
    let mapper = AngleMapper::differential(DifferentialCalibration::default()).unwrap();
    let pipeline = Arc::new(Pipeline::new(512, OutputMode::Angles(mapper), PipelineOptions::default()).unwrap());

    let hub = SimulatedHub::run_in_background(config, pipeline.clone()).unwrap();
    let ticker = spawn_ticker(pipeline.clone(), Duration::from_millis(5)).unwrap();

    assert!(wait_until(Duration::from_secs(2), || pipeline.buffer().len() >= 50));
    let settled = pipeline.ticks();
    assert!(wait_until(Duration::from_secs(2), || pipeline.ticks() >= settled + 3));

    // Channel 1 carries more gain than channel 6, so the pose is an extension
    let angles = pipeline.angles();
    assert!(angles.mcp < 0.0, "expected extension, got {angles:?}");
    assert!(angles.mcp >= -90.0 * 0.6 && angles.ip >= -80.0 * 0.6);

    ticker.stop();
    hub.stop().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[test]
fn test_rest_signal_never_moves_absolute_mapper() {
    let config = SimulatorConfig {
        sample_rate_hz: 1000,
        activation_pattern: ActivationPattern::Rest,
        noise_level: 0.0,
        ..Default::default()
    };
    let mapper = AngleMapper::absolute(AbsoluteCalibration::default()).unwrap();
    let pipeline = Arc::new(Pipeline::new(64, OutputMode::Angles(mapper), PipelineOptions::default()).unwrap());

    let hub = SimulatedHub::run_in_background(config, pipeline.clone()).unwrap();
    assert!(wait_until(Duration::from_secs(2), || pipeline.buffer().len() >= 10));

    assert_eq!(pipeline.tick(), TickOutcome::NoMovement);
    assert_eq!(pipeline.angles(), AngleState::default());
    hub.stop().unwrap();
}

#[test]
fn test_disconnect_after_limit_returns_to_idle() {
    let config = SimulatorConfig {
        sample_rate_hz: 2000,
        disconnect_after: Some(20),
        ..Default::default()
    };
    let mapper = AngleMapper::absolute(AbsoluteCalibration::default()).unwrap();
    let options = PipelineOptions { clear_on_disconnect: true };
    let pipeline = Arc::new(Pipeline::new(64, OutputMode::Angles(mapper), options).unwrap());

    let hub = SimulatedHub::run_in_background(config, pipeline.clone()).unwrap();
    assert!(wait_until(Duration::from_secs(2), || hub.samples_emitted() >= 20 && !hub.is_connected()));
    hub.stop().unwrap();

    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert!(pipeline.buffer().is_empty());
    assert_eq!(pipeline.tick(), TickOutcome::Idle);
}

#[test]
fn test_failed_handshake_surfaces_device_error() {
    let config = SimulatorConfig {
        handshake_fails: true,
        ..Default::default()
    };
    let mapper = AngleMapper::absolute(AbsoluteCalibration::default()).unwrap();
    let pipeline = Arc::new(Pipeline::new(16, OutputMode::Angles(mapper), PipelineOptions::default()).unwrap());

    let err = SimulatedHub::run_in_background(config, pipeline.clone())
        .err()
        .map(EmgError::from)
        .unwrap();
    assert!(err.is_device_failure());
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[test]
fn test_from_config_loads_model_file() {
    let mut model = tempfile::NamedTempFile::new().unwrap();
    write!(
        model,
        r#"{{"labels": [{{"group": 2, "movement": "Flexion"}}], "nodes": [{{"leaf": {{"label": 0}}}}]}}"#
    )
    .unwrap();

    let mut config = PipelineConfig::default();
    config.buffer.capacity = 3;
    config.driver.mode = OutputKind::Gesture;
    config.classifier.model_path = Some(model.path().to_path_buf());

    let pipeline = Pipeline::from_config(&config).unwrap();
    pipeline.on_event(DeviceEvent::Connected, &Armband);
    for t in 0..3 {
        pipeline.on_event(DeviceEvent::Emg(ch1(t, 1)), &Armband);
    }
    assert_eq!(pipeline.tick(), TickOutcome::Gesture(GestureLabel::new(2, "Flexion")));
}

#[test]
fn test_from_config_rejects_missing_model() {
    let mut config = PipelineConfig::default();
    config.driver.mode = OutputKind::Gesture;
    config.classifier.model_path = Some("/nonexistent/tree.json".into());

    assert!(matches!(Pipeline::from_config(&config), Err(EmgError::Model(_))));

    config.classifier.model_path = None;
    assert!(matches!(Pipeline::from_config(&config), Err(EmgError::Config(_))));
}

#[test]
fn test_from_config_rejects_smoothing_window_beyond_buffer() {
    let mut config = PipelineConfig::default();
    config.buffer.capacity = 10;
    config.mapping.strategy = MappingStrategy::Differential;

    match Pipeline::from_config(&config) {
        Err(EmgError::Config(ConfigError::Validation(errors))) => {
            assert_eq!(errors[0].field, "mapping.differential.smoothing_window");
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    config.mapping.differential.smoothing_window = 10;
    let pipeline = Pipeline::from_config(&config).unwrap();
    pipeline.on_event(DeviceEvent::Connected, &Armband);
    for t in 0..10 {
        let mut channels = [0i16; 8];
        channels[5] = 50;
        pipeline.on_event(DeviceEvent::Emg(Sample::new(t, channels)), &Armband);
    }
    assert_eq!(pipeline.tick(), TickOutcome::Angles(AngleState::new(90.0, 80.0)));
}

#[test]
fn test_readers_see_consistent_output_under_load() {
    let mapper = AngleMapper::absolute(AbsoluteCalibration::default()).unwrap();
    let pipeline = Arc::new(Pipeline::new(128, OutputMode::Angles(mapper), PipelineOptions::default()).unwrap());
    pipeline.on_event(DeviceEvent::Connected, &Armband);

    let producer = {
        let pipeline = pipeline.clone();
        thread::spawn(move || {
            for t in 0..5_000u64 {
                let value = if t % 2 == 0 { 60 } else { -60 };
                let mut channels = [0i16; 8];
                channels[0] = value;
                channels[1] = value;
                pipeline.on_event(DeviceEvent::Emg(Sample::new(t, channels)), &Armband);
            }
        })
    };
    let ticker = spawn_ticker(pipeline.clone(), Duration::from_millis(1)).unwrap();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let pipeline = pipeline.clone();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    let angles = pipeline.angles();
                    // Either the zero default, full-flexion pose or extension pose
                    let flexion = (angles.mcp - 16.2).abs() < 1e-3 && (angles.ip - 16.2).abs() < 1e-3;
                    let extension = (angles.mcp + 10.8).abs() < 1e-3 && angles.ip == 0.0;
                    assert!(angles == AngleState::default() || flexion || extension, "{angles:?}");
                }
            })
        })
        .collect();

    producer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    ticker.stop();
    assert_eq!(pipeline.buffer().metrics().appended, 5_000);
}

#[test]
fn test_trial_capture_against_simulated_hub() {
    let config = SimulatorConfig {
        sample_rate_hz: 1000,
        ..Default::default()
    };
    let mapper = AngleMapper::absolute(AbsoluteCalibration::default()).unwrap();
    let pipeline = Arc::new(Pipeline::new(512, OutputMode::Angles(mapper), PipelineOptions::default()).unwrap());
    let hub = SimulatedHub::run_in_background(config, pipeline.clone()).unwrap();
    assert!(wait_until(Duration::from_secs(2), || pipeline.state() == PipelineState::Streaming));

    let plan = ProtocolPlan {
        groups: vec![1],
        movements: vec!["Flexion".to_string(), "Extension".to_string()],
        repetitions: 2,
        trial_duration: Duration::from_millis(30),
    };
    let capture = TrialCapture::new(pipeline.buffer().clone(), plan.trial_duration);
    let recording = run_protocol(&plan, &capture, &mut Immediate);
    hub.stop().unwrap();

    assert_eq!(recording.trial_count(), 4);
    assert!(!recording.aborted);
    assert!(recording.completed_trials.iter().all(|(_, n)| *n > 0));
    assert_eq!(recording.trial_features().len(), 4);

    // Rows stay grouped by trial in execution order
    let first = &recording.rows[0];
    assert_eq!((first.group, first.movement.as_str(), first.repetition), (1, "Flexion", 1));
}

struct ForwardingListener(Arc<Pipeline>);

impl DeviceListener for ForwardingListener {
    fn on_event(&self, event: DeviceEvent, device: &dyn DeviceControl) {
        self.0.on_event(event, device);
    }
}

#[test]
fn test_pipeline_behind_custom_listener() {
    let mapper = AngleMapper::absolute(AbsoluteCalibration::default()).unwrap();
    let pipeline = Arc::new(Pipeline::new(16, OutputMode::Angles(mapper), PipelineOptions::default()).unwrap());
    let listener = ForwardingListener(pipeline.clone());

    listener.on_event(DeviceEvent::Connected, &Armband);
    listener.on_event(DeviceEvent::Emg(ch1(0, 200)), &Armband);
    listener.on_event(DeviceEvent::Emg(ch1(1, 120)), &Armband);

    // Only the newest sample counts: (120 + 0) / 2 = 60 → norm 0.6
    match pipeline.tick() {
        TickOutcome::Angles(angles) => assert!((angles.mcp - 16.2).abs() < 1e-4),
        other => panic!("expected angles, got {other:?}"),
    }
    assert_eq!(pipeline.angles_json().unwrap(), serde_json::to_string(&pipeline.angles()).unwrap());
}
