//! DSP Stages
//!
//! Signal processing units a playback chain is assembled from.
//! All stages implement the `Stage` trait for uniform processing.

mod chain;
mod echo;
mod reverb;
mod stage;
mod time_pitch;

pub use chain::StageChain;
pub use echo::{Echo, EchoParams};
pub use reverb::{Reverb, ReverbParams, ReverbPreset};
pub use stage::{ProcessingStage, Stage, StageKind};
pub use time_pitch::{
    clamp_pitch_cents, clamp_rate, resample_linear, time_stretch, TimePitch, DEFAULT_WINDOW_SIZE,
    MAX_PITCH_CENTS, MAX_RATE, MIN_PITCH_CENTS, MIN_RATE,
};
