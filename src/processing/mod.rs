// src/processing/mod.rs
//! Window features, angle mapping and the pipeline driver

pub mod angles;
pub mod features;
pub mod pipeline;

pub use angles::*;
pub use features::*;
pub use pipeline::*;
