//! CLI Module
//!
//! Command-line interface for playing recorded clips through the presets.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::WavEncoding;
use crate::request::Preset;

/// Pitch Perfect - play a recorded voice clip through fun effects
#[derive(Parser, Debug)]
#[command(name = "pitch-perfect")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Controller configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a clip through one preset
    #[command(name = "play")]
    Play {
        /// WAV clip to play
        clip: PathBuf,

        /// Preset to apply (slow, fast, chipmunk, vader, echo, reverb)
        #[arg(short, long)]
        preset: Preset,

        /// Write the rendered session to this WAV file
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Sample format of the written file
        #[arg(long, value_enum, default_value_t = EncodingArg::Int16)]
        encoding: EncodingArg,

        /// Wait in real time until the session completes
        #[arg(long)]
        realtime: bool,
    },

    /// List the available presets
    #[command(name = "presets")]
    Presets,

    /// Synthesize a test clip
    ///
    /// If the target is a directory the clip is saved there as the default
    /// recording file.
    #[command(name = "tone")]
    Tone {
        /// Output WAV file or directory
        out: PathBuf,

        /// Tone frequency in Hz
        #[arg(long, default_value_t = 440.0)]
        frequency: f32,

        /// Length in seconds
        #[arg(long, default_value_t = 2.0)]
        duration: f32,

        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,
    },

    /// Show format and level information for a clip
    #[command(name = "info")]
    Info {
        /// WAV clip to inspect
        clip: PathBuf,
    },
}

/// WAV sample formats selectable on the command line
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingArg {
    Int16,
    Float32,
}

impl From<EncodingArg> for WavEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Int16 => WavEncoding::Int16,
            EncodingArg::Float32 => WavEncoding::Float32,
        }
    }
}
