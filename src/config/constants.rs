// src/config/constants.rs
//! System-wide configuration constants

/// Signal acquisition constants
pub mod signal {
    /// Armband EMG rate
    pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 200;
    /// Upper bound accepted by the simulator
    pub const MAX_SAMPLE_RATE_HZ: u32 = 10_000;

    /// Smallest raw reading the armband reports
    pub const RAW_MIN: i16 = -128;
    /// Largest raw reading the armband reports
    pub const RAW_MAX: i16 = 127;
}

/// Sample buffer constants
pub mod buffer {
    /// Window used by the waveform display and the gesture classifier
    pub const DEFAULT_CAPACITY: usize = 512;
    /// Largest accepted buffer capacity
    pub const MAX_CAPACITY: usize = 1 << 20;
}

/// Driver cadence constants
pub mod driver {
    /// Angle polling cadence
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;
    /// Visualisation refresh cadence
    pub const DEFAULT_RENDER_INTERVAL_MS: u64 = 33;
}

/// Absolute-intensity thumb heuristic
pub mod absolute {
    /// Channels 1 and 2
    pub const DEFAULT_CHANNELS: [usize; 2] = [0, 1];
    /// MCP angle at full flexion intensity
    pub const MCP_FLEXION_DEG: f32 = 27.0;
    /// MCP angle at full extension intensity
    pub const MCP_EXTENSION_DEG: f32 = -18.0;
    /// IP angle at full flexion intensity
    pub const IP_FLEXION_DEG: f32 = 27.0;
    /// Below this mean magnitude nothing moves
    pub const INTENSITY_FLOOR: f32 = 10.0;
    /// Mean magnitude treated as full intensity
    pub const INTENSITY_CEILING: f32 = 100.0;
}

/// Differential-RMS antagonist heuristic
pub mod differential {
    /// Channel 1
    pub const DEFAULT_CHANNEL_A: usize = 0;
    /// Channel 6
    pub const DEFAULT_CHANNEL_B: usize = 5;
    /// Samples per RMS estimate
    pub const SMOOTHING_WINDOW: usize = 50;
    /// RMS mapped to a normalised level of 1
    pub const FULL_SCALE_RMS: f32 = 50.0;
    /// MCP angle at full flexion
    pub const MAX_MCP_DEG: f32 = 90.0;
    /// IP angle at full flexion
    pub const MAX_IP_DEG: f32 = 80.0;
    /// Scale applied to extension poses
    pub const EXTENSION_DAMPING: f32 = 0.6;
}

/// Recording protocol constants
pub mod protocol {
    /// Finger protocol: groups 1 through 5
    pub const FINGER_COUNT: u32 = 5;
    /// Repetitions per finger movement
    pub const FINGER_REPETITIONS: u32 = 30;
    /// Finger trial window
    pub const FINGER_TRIAL_MS: u64 = 1000;
    /// Finger movements, in execution order
    pub const FINGER_MOVEMENTS: &[&str] = &["Extension", "Flexion"];

    /// Thumb protocol records a single group
    pub const THUMB_GROUP: u32 = 1;
    /// Repetitions per thumb movement
    pub const THUMB_REPETITIONS: u32 = 10;
    /// Thumb trial window
    pub const THUMB_TRIAL_MS: u64 = 500;
    /// Thumb movements, in execution order
    pub const THUMB_MOVEMENTS: &[&str] = &[
        "Flexion",
        "Extension",
        "Rotation",
        "Pinch 1",
        "Pinch 2",
        "Pinch 3",
        "Pinch 4",
        "Random",
    ];
}

/// Simulator constants
pub mod simulator {
    use crate::hal::types::CHANNEL_COUNT;

    /// Peak simulated activation in raw units
    pub const DEFAULT_SIGNAL_AMPLITUDE: f32 = 80.0;
    /// Noise as a fraction of the amplitude
    pub const DEFAULT_NOISE_LEVEL: f32 = 0.05;
    /// Fixed seed so runs are reproducible
    pub const DEFAULT_SEED: u64 = 0x5EED_E46;

    /// Relative pickup of each electrode for a forearm flexion
    pub const CHANNEL_GAINS: [f32; CHANNEL_COUNT] = [1.0, 0.8, 0.5, 0.3, 0.3, 0.6, 0.4, 0.7];
}

/// Configuration file locations, in increasing precedence
pub mod paths {
    /// Project configuration
    pub const DEFAULT_CONFIG_FILE: &str = "emg-mapping.toml";
    /// Per-machine overrides
    pub const LOCAL_CONFIG_FILE: &str = "config/local.toml";
    /// Prefix of environment overrides
    pub const ENV_PREFIX: &str = "EMG_";
    /// Separates section and key in override names
    pub const ENV_PATH_SEPARATOR: &str = "__";
}
