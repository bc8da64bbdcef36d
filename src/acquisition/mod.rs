// src/acquisition/mod.rs
//! Signal acquisition, buffering and trial capture

pub mod sample_buffer;
pub mod trial;

pub use sample_buffer::*;
pub use trial::*;
