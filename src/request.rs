//! Playback requests and the fixed effect presets
//!
//! An [`EffectRequest`] describes one playback invocation. Requests are
//! resolved before a chain is built: out-of-range values are clamped and the
//! echo/reverb choice is made (echo wins when both flags are set).

use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::dsp::{clamp_pitch_cents, clamp_rate};
use crate::error::PitchPerfectError;

/// One playback invocation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectRequest {
    /// Playback rate multiplier (1.0 = original speed)
    pub rate: Option<f32>,
    /// Pitch shift in cents (100 cents = 1 semitone)
    pub pitch: Option<f32>,
    pub echo: bool,
    pub reverb: bool,
}

impl EffectRequest {
    /// Plain playback: no stages
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_pitch_cents(mut self, cents: f32) -> Self {
        self.pitch = Some(cents);
        self
    }

    pub fn with_pitch_semitones(self, semitones: f32) -> Self {
        self.with_pitch_cents(semitones * 100.0)
    }

    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn with_reverb(mut self) -> Self {
        self.reverb = true;
        self
    }

    pub fn has_time_pitch(&self) -> bool {
        self.rate.is_some() || self.pitch.is_some()
    }

    pub fn has_ambience(&self) -> bool {
        self.echo || self.reverb
    }

    /// Clamp values and settle the echo/reverb choice
    pub fn resolve(&self) -> ResolvedRequest {
        let rate = self.rate.map(|requested| {
            let rate = clamp_rate(requested);
            if rate != requested {
                warn!("Requested rate {} out of range, using {}", requested, rate);
            }
            rate
        });

        let pitch_cents = self.pitch.map(|requested| {
            let cents = clamp_pitch_cents(requested);
            if cents != requested {
                warn!("Requested pitch {} cents out of range, using {}", requested, cents);
            }
            cents
        });

        let ambience = match (self.echo, self.reverb) {
            (true, true) => {
                warn!("Echo and reverb both requested; echo takes precedence");
                Some(Ambience::Echo)
            }
            (true, false) => Some(Ambience::Echo),
            (false, true) => Some(Ambience::Reverb),
            (false, false) => None,
        };

        ResolvedRequest {
            rate,
            pitch_cents,
            ambience,
        }
    }
}

/// The single echo-or-reverb stage a chain may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ambience {
    Echo,
    Reverb,
}

/// A request after clamping and precedence resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedRequest {
    pub rate: Option<f32>,
    pub pitch_cents: Option<f32>,
    pub ambience: Option<Ambience>,
}

impl ResolvedRequest {
    pub fn has_time_pitch(&self) -> bool {
        self.rate.is_some() || self.pitch_cents.is_some()
    }

    /// Factor the completion delay is divided by
    ///
    /// Pitch alone does not alter duration.
    pub fn duration_divisor(&self) -> f64 {
        self.rate.map(|r| r as f64).unwrap_or(1.0)
    }
}

// ============================================================================
// Presets
// ============================================================================

/// The six fixed playback effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Slow,
    Fast,
    Chipmunk,
    Vader,
    Echo,
    Reverb,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::Slow,
        Preset::Fast,
        Preset::Chipmunk,
        Preset::Vader,
        Preset::Echo,
        Preset::Reverb,
    ];

    pub fn request(&self) -> EffectRequest {
        match self {
            Preset::Slow => EffectRequest::plain().with_rate(0.5),
            Preset::Fast => EffectRequest::plain().with_rate(1.5),
            Preset::Chipmunk => EffectRequest::plain().with_pitch_cents(1000.0),
            Preset::Vader => EffectRequest::plain().with_pitch_cents(-1000.0),
            Preset::Echo => EffectRequest::plain().with_echo(),
            Preset::Reverb => EffectRequest::plain().with_reverb(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Slow => "slow",
            Preset::Fast => "fast",
            Preset::Chipmunk => "chipmunk",
            Preset::Vader => "vader",
            Preset::Echo => "echo",
            Preset::Reverb => "reverb",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = PitchPerfectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Preset::ALL
            .iter()
            .copied()
            .find(|p| p.name() == lower)
            .ok_or(PitchPerfectError::UnknownPreset {
                name: s.to_string(),
            })
    }
}

impl From<Preset> for EffectRequest {
    fn from(preset: Preset) -> Self {
        preset.request()
    }
}
