//! Audio-reactive particle field.
//!
//! Live input drives a field of particles pulled towards fixed attractors:
//! low-frequency energy of the newest audio block sets the pull strength each
//! tick, and a throttled tempo tracker feeds the on-screen BPM readout.

pub mod app;
pub mod audio;
pub mod config;
pub mod graphics;
pub mod prompt;
pub mod simulation;
pub mod ui;

pub use app::{LoopState, ShutdownSignal, Visualizer};
pub use config::VisualizerConfig;
