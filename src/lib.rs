//! Pitch Perfect - recorded voice effect player
//!
//! Takes a short recorded voice clip and plays it back through one of a few
//! fixed transformations: slow, fast, chipmunk, vader, echo and reverb.
//!
//! # Architecture
//!
//! Each playback request is turned into a linear render graph:
//!
//! ```text
//! source -> [rate/pitch] -> [echo | reverb] -> output
//! ```
//!
//! - [`controller`]: owns the clip, builds and runs one session at a time
//! - [`dsp`]: the processing stages and the chain they form
//! - [`engine`]: buffers, WAV I/O, render graph, outputs, timer and clocks
//! - [`request`]: playback requests and presets

pub mod cli;
pub mod config;
pub mod controller;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod request;

pub use config::{ControllerConfig, StageConfig};
pub use controller::{EffectGraphController, Ready, SessionReport};
pub use engine::{AudioBuffer, PlaybackState};
pub use error::{AudioFileError, EngineStartError, PitchPerfectError, Result};
pub use request::{EffectRequest, Preset};
