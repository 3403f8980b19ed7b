//! Echo stage
//!
//! Feedback delay with a low-pass filter in the feedback path. The fixed
//! "multi echo" preset repeats the voice a handful of times, each repeat
//! darker and quieter than the last.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::stage::{Stage, StageKind};
use crate::engine::{AudioBuffer, StreamFormat};
use crate::error::{PitchPerfectError, Result};

/// Echo preset parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoParams {
    /// Delay time in milliseconds (1-2000)
    pub delay_time_ms: f32,
    /// Feedback amount (0-0.95, NOT 1.0 to prevent infinite feedback)
    pub feedback: f32,
    /// Wet signal level (0-1)
    pub wet_level: f32,
    /// Dry signal level (0-1)
    pub dry_level: f32,
    /// Low-pass filter frequency on feedback path (20-20000 Hz)
    pub filter_freq: f32,
}

impl EchoParams {
    /// Short, dense repeats
    pub fn multi_echo() -> Self {
        Self {
            delay_time_ms: 120.0,
            feedback: 0.55,
            wet_level: 0.6,
            dry_level: 1.0,
            filter_freq: 6000.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_range("delay_time_ms", self.delay_time_ms, 1.0, 2000.0)?;
        check_range("feedback", self.feedback, 0.0, 0.95)?;
        check_range("wet_level", self.wet_level, 0.0, 1.0)?;
        check_range("dry_level", self.dry_level, 0.0, 1.0)?;
        check_range("filter_freq", self.filter_freq, 20.0, 20000.0)
    }
}

impl Default for EchoParams {
    fn default() -> Self {
        Self::multi_echo()
    }
}

pub(crate) fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(PitchPerfectError::InvalidConfig {
            reason: format!("{} = {} is outside {} to {}", name, value, min, max),
        });
    }
    Ok(())
}

/// Delay line state for one channel
#[derive(Debug, Clone, Default)]
struct DelayLine {
    buffer: Vec<f32>,
    filter_state: f32,
}

/// Feedback echo stage
#[derive(Debug, Clone)]
pub struct Echo {
    params: EchoParams,
    lines: Vec<DelayLine>,
    write_pos: usize,
    sample_rate: f32,
}

impl Echo {
    pub fn new() -> Self {
        Self::with_params(EchoParams::default())
    }

    pub fn with_params(params: EchoParams) -> Self {
        Self {
            params,
            lines: Vec::new(),
            write_pos: 0,
            sample_rate: 44100.0,
        }
    }

    pub fn params(&self) -> &EchoParams {
        &self.params
    }

    /// Calculate delay in samples
    fn delay_samples(&self) -> usize {
        ((self.params.delay_time_ms * self.sample_rate / 1000.0) as usize).max(1)
    }

    /// Delay line length: the delay plus a 10ms margin
    fn required_buffer_size(&self) -> usize {
        let max_delay_ms = self.params.delay_time_ms + 10.0;
        ((max_delay_ms * self.sample_rate / 1000.0) as usize).max(2)
    }

    /// One-pole lowpass coefficient: 1 - exp(-2 * PI * fc / fs)
    fn filter_coeff(&self) -> f32 {
        1.0 - (-2.0 * PI * self.params.filter_freq / self.sample_rate).exp()
    }

    fn ensure_lines(&mut self, channels: usize) {
        let size = self.required_buffer_size();
        if self.lines.len() != channels {
            self.lines = vec![DelayLine::default(); channels];
        }
        for line in &mut self.lines {
            if line.buffer.len() != size {
                line.buffer = vec![0.0; size];
            }
        }
        if self.write_pos >= size {
            self.write_pos = 0;
        }
    }
}

impl Default for Echo {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Echo {
    fn prepare(&mut self, format: StreamFormat) {
        self.sample_rate = format.sample_rate as f32;
        self.ensure_lines(format.channels());
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if buffer.is_empty() {
            return;
        }
        self.ensure_lines(buffer.num_channels());

        let delay = self.delay_samples();
        let coeff = self.filter_coeff();
        let size = self.lines[0].buffer.len();
        let EchoParams {
            feedback,
            wet_level,
            dry_level,
            ..
        } = self.params;

        for (ch, line) in self.lines.iter_mut().enumerate() {
            let mut write_pos = self.write_pos;
            for sample in buffer.channel_mut(ch).iter_mut() {
                let input = *sample;
                let read_pos = (write_pos + size - delay % size) % size;
                let delayed = line.buffer[read_pos];

                line.filter_state += coeff * (delayed * feedback - line.filter_state);
                line.buffer[write_pos] = input + line.filter_state;

                *sample = input * dry_level + delayed * wet_level;
                write_pos = (write_pos + 1) % size;
            }
        }

        self.write_pos = (self.write_pos + buffer.num_frames()) % size;
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.buffer.fill(0.0);
            line.filter_state = 0.0;
        }
        self.write_pos = 0;
    }

    fn kind(&self) -> StageKind {
        StageKind::Echo
    }

    fn display_name(&self) -> &'static str {
        "Echo"
    }

    fn get_params(&self) -> Value {
        json!({
            "delay_time_ms": self.params.delay_time_ms,
            "feedback": self.params.feedback,
            "wet_level": self.params.wet_level,
            "dry_level": self.params.dry_level,
            "filter_freq": self.params.filter_freq,
        })
    }
}
