//! Reverb stage
//!
//! Implements the Freeverb algorithm:
//! - 8 parallel comb filters for early reflections
//! - 4 series allpass filters for diffusion
//! - Stereo width control
//! - Pre-delay buffer
//!
//! The stage is built from a [`ReverbPreset`]; the default is `Cathedral`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::echo::check_range;
use super::stage::{Stage, StageKind};
use crate::engine::{AudioBuffer, StreamFormat};
use crate::error::Result;

// ============================================================================
// Freeverb Constants
// ============================================================================

/// Reference sample rate for Freeverb delays
const REFERENCE_SAMPLE_RATE: f64 = 44100.0;

/// Comb filter delays at 44100 Hz (8 filters)
const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass filter delays at 44100 Hz (4 filters)
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Stereo spread offset in samples (for right channel)
const STEREO_SPREAD: usize = 23;

const ALLPASS_GAIN: f32 = 0.5;
const ROOM_SCALE: f32 = 0.28;
const ROOM_OFFSET: f32 = 0.7;
const DAMP_SCALE: f32 = 0.4;

/// Fixed input attenuation so eight summed combs stay in range
const INPUT_GAIN: f32 = 0.015;

const MAX_PRE_DELAY_MS: f32 = 100.0;

// ============================================================================
// Parameters
// ============================================================================

/// Factory reverb presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverbPreset {
    SmallRoom,
    LargeHall,
    Plate,
    #[default]
    Cathedral,
}

impl ReverbPreset {
    pub fn params(&self) -> ReverbParams {
        match self {
            ReverbPreset::SmallRoom => ReverbParams {
                room_size: 0.3,
                damping: 0.6,
                wet_level: 0.25,
                dry_level: 1.0,
                width: 0.8,
                pre_delay_ms: 5.0,
            },
            ReverbPreset::LargeHall => ReverbParams {
                room_size: 0.8,
                damping: 0.4,
                wet_level: 0.4,
                dry_level: 0.9,
                width: 1.0,
                pre_delay_ms: 25.0,
            },
            ReverbPreset::Plate => ReverbParams {
                room_size: 0.6,
                damping: 0.1,
                wet_level: 0.35,
                dry_level: 0.9,
                width: 1.0,
                pre_delay_ms: 0.0,
            },
            ReverbPreset::Cathedral => ReverbParams {
                room_size: 0.95,
                damping: 0.3,
                wet_level: 0.5,
                dry_level: 0.8,
                width: 1.0,
                pre_delay_ms: 40.0,
            },
        }
    }
}

/// Freeverb parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverbParams {
    /// Room size: 0 (tiny) to 1 (huge hall)
    pub room_size: f32,
    /// Damping: 0 (bright) to 1 (dark)
    pub damping: f32,
    pub wet_level: f32,
    pub dry_level: f32,
    /// Stereo width: 0 (mono) to 1 (full stereo)
    pub width: f32,
    /// Pre-delay in milliseconds: 0 to 100
    pub pre_delay_ms: f32,
}

impl ReverbParams {
    pub fn validate(&self) -> Result<()> {
        check_range("room_size", self.room_size, 0.0, 1.0)?;
        check_range("damping", self.damping, 0.0, 1.0)?;
        check_range("wet_level", self.wet_level, 0.0, 1.0)?;
        check_range("dry_level", self.dry_level, 0.0, 1.0)?;
        check_range("width", self.width, 0.0, 1.0)?;
        check_range("pre_delay_ms", self.pre_delay_ms, 0.0, MAX_PRE_DELAY_MS)
    }
}

// ============================================================================
// Filter Components
// ============================================================================

/// Low-pass feedback comb filter
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
}

impl CombFilter {
    fn new(delay: usize) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp1: f32, damp2: f32) -> f32 {
        let output = self.buffer[self.pos];
        self.filter_state = output * damp1 + self.filter_state * damp2;
        self.buffer[self.pos] = input + self.filter_state * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.pos = 0;
    }
}

/// Schroeder allpass filter for diffusion
#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(delay: usize) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let output = delayed - ALLPASS_GAIN * input;
        self.buffer[self.pos] = input + ALLPASS_GAIN * output;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

/// Filters for one output channel
#[derive(Debug, Clone)]
struct ReverbTank {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
    pre_delay: Vec<f32>,
    pre_delay_pos: usize,
}

impl ReverbTank {
    fn new(scale: f64, spread: usize, pre_delay_samples: usize) -> Self {
        let scaled = |d: usize| (((d + spread) as f64 * scale) as usize).max(1);
        Self {
            combs: COMB_DELAYS.iter().map(|&d| CombFilter::new(scaled(d))).collect(),
            allpasses: ALLPASS_DELAYS
                .iter()
                .map(|&d| AllpassFilter::new(scaled(d)))
                .collect(),
            pre_delay: vec![0.0; pre_delay_samples],
            pre_delay_pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp1: f32, damp2: f32) -> f32 {
        let delayed = if self.pre_delay.is_empty() {
            input
        } else {
            let out = self.pre_delay[self.pre_delay_pos];
            self.pre_delay[self.pre_delay_pos] = input;
            self.pre_delay_pos = (self.pre_delay_pos + 1) % self.pre_delay.len();
            out
        };

        let mut out: f32 = self
            .combs
            .iter_mut()
            .map(|comb| comb.process(delayed, feedback, damp1, damp2))
            .sum();
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }

    fn clear(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::clear);
        self.allpasses.iter_mut().for_each(AllpassFilter::clear);
        self.pre_delay.fill(0.0);
        self.pre_delay_pos = 0;
    }
}

// ============================================================================
// Main Reverb Stage
// ============================================================================

/// Freeverb stage with a fixed preset
#[derive(Debug, Clone)]
pub struct Reverb {
    preset: ReverbPreset,
    params: ReverbParams,
    sample_rate: f64,
    tanks: Vec<ReverbTank>,
}

impl Reverb {
    pub fn new() -> Self {
        Self::with_preset(ReverbPreset::default())
    }

    pub fn with_preset(preset: ReverbPreset) -> Self {
        Self {
            preset,
            params: preset.params(),
            sample_rate: REFERENCE_SAMPLE_RATE,
            tanks: Vec::new(),
        }
    }

    pub fn preset(&self) -> ReverbPreset {
        self.preset
    }

    pub fn params(&self) -> &ReverbParams {
        &self.params
    }

    fn build_tanks(&mut self, channels: usize) {
        let scale = self.sample_rate / REFERENCE_SAMPLE_RATE;
        let pre_delay = ((self.params.pre_delay_ms / 1000.0) as f64 * self.sample_rate) as usize;
        // Both tanks exist for stereo output even when the input is mono-summed.
        self.tanks = (0..channels)
            .map(|ch| ReverbTank::new(scale, ch * STEREO_SPREAD, pre_delay))
            .collect();
    }

    fn coefficients(&self) -> (f32, f32, f32) {
        let feedback = self.params.room_size * ROOM_SCALE + ROOM_OFFSET;
        let damp2 = self.params.damping * DAMP_SCALE;
        let damp1 = 1.0 - damp2;
        (feedback, damp1, damp2)
    }

    fn process_mono(&mut self, buffer: &mut AudioBuffer) {
        let (feedback, damp1, damp2) = self.coefficients();
        let ReverbParams {
            wet_level,
            dry_level,
            ..
        } = self.params;
        let tank = &mut self.tanks[0];

        for sample in buffer.channel_mut(0).iter_mut() {
            let input = *sample;
            let wet = tank.process(input * INPUT_GAIN, feedback, damp1, damp2);
            *sample = input * dry_level + wet * wet_level;
        }
    }

    fn process_stereo(&mut self, buffer: &mut AudioBuffer) {
        let (feedback, damp1, damp2) = self.coefficients();
        let ReverbParams {
            wet_level,
            dry_level,
            width,
            ..
        } = self.params;

        // wet1 controls same-side contribution, wet2 controls cross-side contribution
        let wet1 = wet_level * (1.0 + width) / 2.0;
        let wet2 = wet_level * (1.0 - width) / 2.0;

        for i in 0..buffer.num_frames() {
            let input_left = buffer.channel(0)[i];
            let input_right = buffer.channel(1)[i];
            let input_mono = (input_left + input_right) * 0.5 * INPUT_GAIN;

            let out_left = self.tanks[0].process(input_mono, feedback, damp1, damp2);
            let out_right = self.tanks[1].process(input_mono, feedback, damp1, damp2);

            buffer.channel_mut(0)[i] = input_left * dry_level + out_left * wet1 + out_right * wet2;
            buffer.channel_mut(1)[i] = input_right * dry_level + out_right * wet1 + out_left * wet2;
        }
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Reverb {
    fn prepare(&mut self, format: StreamFormat) {
        self.sample_rate = format.sample_rate as f64;
        self.build_tanks(format.channels());
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if buffer.is_empty() {
            return;
        }
        if self.tanks.len() != buffer.num_channels() {
            self.sample_rate = buffer.sample_rate() as f64;
            self.build_tanks(buffer.num_channels());
        }

        match buffer.num_channels() {
            1 => self.process_mono(buffer),
            _ => self.process_stereo(buffer),
        }
    }

    fn reset(&mut self) {
        self.tanks.iter_mut().for_each(ReverbTank::clear);
    }

    fn kind(&self) -> StageKind {
        StageKind::Reverb
    }

    fn display_name(&self) -> &'static str {
        "Reverb"
    }

    fn get_params(&self) -> Value {
        json!({
            "preset": self.preset,
            "room_size": self.params.room_size,
            "damping": self.params.damping,
            "wet_level": self.params.wet_level,
            "dry_level": self.params.dry_level,
            "width": self.params.width,
            "pre_delay_ms": self.params.pre_delay_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{calculate_rms, ChannelLayout};

    #[test]
    fn test_all_presets_valid() {
        for preset in [
            ReverbPreset::SmallRoom,
            ReverbPreset::LargeHall,
            ReverbPreset::Plate,
            ReverbPreset::Cathedral,
        ] {
            assert!(preset.params().validate().is_ok(), "{:?}", preset);
        }
    }

    #[test]
    fn test_default_is_cathedral() {
        let reverb = Reverb::new();
        assert_eq!(reverb.preset(), ReverbPreset::Cathedral);
        assert_eq!(reverb.params().room_size, 0.95);
    }

    #[test]
    fn test_impulse_produces_tail() {
        let mut reverb = Reverb::new();
        reverb.prepare(StreamFormat::new(22050, ChannelLayout::Mono));

        let mut buffer = AudioBuffer::new(22050, ChannelLayout::Mono, 22050);
        buffer.channel_mut(0)[0] = 1.0;
        reverb.process(&mut buffer);

        let tail = &buffer.channel(0)[4000..];
        assert!(tail.iter().any(|s| s.abs() > 1e-5));
        assert!(buffer.is_finite());
    }

    #[test]
    fn test_stereo_output_decorrelated() {
        let mut reverb = Reverb::with_preset(ReverbPreset::LargeHall);
        reverb.prepare(StreamFormat::new(22050, ChannelLayout::Stereo));

        let mut buffer = AudioBuffer::new(11025, ChannelLayout::Stereo, 22050);
        buffer.channel_mut(0)[0] = 1.0;
        buffer.channel_mut(1)[0] = 1.0;
        reverb.process(&mut buffer);

        assert_ne!(buffer.channel(0)[2000..3000], buffer.channel(1)[2000..3000]);
    }

    #[test]
    fn test_loud_input_stays_finite() {
        let mut reverb = Reverb::new();
        reverb.prepare(StreamFormat::new(44100, ChannelLayout::Mono));

        let mut buffer = AudioBuffer::new(44100, ChannelLayout::Mono, 44100);
        buffer.channel_mut(0).fill(1.0);
        reverb.process(&mut buffer);

        assert!(buffer.is_finite());
        assert!(calculate_rms(&buffer) < 20.0);
    }

    #[test]
    fn test_reset_silences_tail() {
        let mut reverb = Reverb::new();
        reverb.prepare(StreamFormat::new(22050, ChannelLayout::Mono));
        let mut buffer = AudioBuffer::new(100, ChannelLayout::Mono, 22050);
        buffer.channel_mut(0)[0] = 1.0;
        reverb.process(&mut buffer);

        reverb.reset();
        let mut silence = AudioBuffer::new(5000, ChannelLayout::Mono, 22050);
        reverb.process(&mut silence);

        assert!(silence.channel(0).iter().all(|&s| s == 0.0));
    }
}
