// src/hal/mod.rs
//! Device boundary: sample types, listener traits and the simulated armband

pub mod simulator;
pub mod traits;
pub mod types;

pub use simulator::{ActivationPattern, HubHandle, SignalGenerator, SimulatedHub, SimulatorConfig};
pub use traits::*;
pub use types::*;
