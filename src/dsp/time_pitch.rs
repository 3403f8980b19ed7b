//! Rate and pitch stage
//!
//! Changes playback rate without changing pitch, and pitch without changing
//! duration. Both are built from two primitives:
//! - WSOLA time stretching (overlap-add of Hann windows, each window aligned to
//!   the natural continuation of the previous one by cross-correlation)
//! - Linear-interpolation resampling
//!
//! A pitch ratio `p` and rate `r` are realised by stretching time by `p / r`
//! and then resampling by `1 / p`. The output therefore lasts `input / r`.

use serde_json::{json, Value};

use super::stage::{Stage, StageKind};
use crate::engine::{AudioBuffer, StreamFormat};

/// Slowest supported playback rate
pub const MIN_RATE: f32 = 1.0 / 32.0;
/// Fastest supported playback rate
pub const MAX_RATE: f32 = 32.0;
/// Lowest pitch shift in cents (two octaves down)
pub const MIN_PITCH_CENTS: f32 = -2400.0;
/// Highest pitch shift in cents (two octaves up)
pub const MAX_PITCH_CENTS: f32 = 2400.0;
/// Default analysis window in frames
pub const DEFAULT_WINDOW_SIZE: usize = 1024;

const UNITY_EPSILON: f64 = 1e-6;

/// Clamp a requested rate into the supported range
///
/// Non-finite or non-positive values fall back to unity.
pub fn clamp_rate(rate: f32) -> f32 {
    if !rate.is_finite() || rate <= 0.0 {
        return 1.0;
    }
    rate.clamp(MIN_RATE, MAX_RATE)
}

/// Clamp a requested pitch shift into the supported range
///
/// Non-finite values fall back to zero.
pub fn clamp_pitch_cents(cents: f32) -> f32 {
    if !cents.is_finite() {
        return 0.0;
    }
    cents.clamp(MIN_PITCH_CENTS, MAX_PITCH_CENTS)
}

/// Time-stretching pitch shifter
#[derive(Debug, Clone)]
pub struct TimePitch {
    rate: f32,
    pitch_cents: f32,
    window_size: usize,
}

impl TimePitch {
    /// Create a stage; absent values are unity
    pub fn new(rate: Option<f32>, pitch_cents: Option<f32>) -> Self {
        Self {
            rate: rate.map(clamp_rate).unwrap_or(1.0),
            pitch_cents: pitch_cents.map(clamp_pitch_cents).unwrap_or(0.0),
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Set the analysis window size (rounded up to an even size, minimum 64)
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        let window_size = window_size.max(64);
        self.window_size = window_size + window_size % 2;
        self
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn pitch_cents(&self) -> f32 {
        self.pitch_cents
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Frequency ratio for the pitch shift (2^(cents/1200))
    pub fn pitch_ratio(&self) -> f64 {
        2.0_f64.powf(self.pitch_cents as f64 / 1200.0)
    }

    pub fn is_unity(&self) -> bool {
        (self.rate as f64 - 1.0).abs() < UNITY_EPSILON && (self.pitch_cents as f64).abs() < UNITY_EPSILON
    }

    /// Time-stretch factor applied before resampling
    fn stretch_factor(&self) -> f64 {
        self.pitch_ratio() / self.rate as f64
    }

    fn process_channel(&self, input: &[f32]) -> Vec<f32> {
        let target_len = self.output_frames(input.len());
        if self.is_unity() {
            return input.to_vec();
        }

        let ratio = self.pitch_ratio();
        let stretch = self.stretch_factor();

        let stretched = time_stretch(input, stretch, self.window_size);
        let mut output = if (ratio - 1.0).abs() < UNITY_EPSILON {
            stretched
        } else {
            resample_linear(&stretched, 1.0 / ratio)
        };

        output.resize(target_len, 0.0);
        output
    }
}

impl Stage for TimePitch {
    fn prepare(&mut self, _format: StreamFormat) {}

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if buffer.is_empty() || self.is_unity() {
            return;
        }
        buffer.map_channels(|channel| self.process_channel(channel));
    }

    fn reset(&mut self) {}

    fn kind(&self) -> StageKind {
        StageKind::RateTimePitch
    }

    fn display_name(&self) -> &'static str {
        "Rate / Pitch"
    }

    fn output_frames(&self, input_frames: usize) -> usize {
        (input_frames as f64 / self.rate as f64).round() as usize
    }

    /// The stretched intermediate is `pitch_ratio / rate` times the input
    fn working_frames(&self, input_frames: usize) -> usize {
        let stretched = if self.is_unity() {
            input_frames
        } else {
            (input_frames as f64 * self.stretch_factor()).round() as usize
        };
        stretched.max(self.output_frames(input_frames))
    }

    fn get_params(&self) -> Value {
        json!({
            "rate": self.rate,
            "pitch_cents": self.pitch_cents,
            "window_size": self.window_size,
        })
    }
}

// ============================================================================
// Primitives
// ============================================================================

/// Periodic Hann window; overlapping copies at half-window hops sum to one
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / size as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

#[inline]
fn sample_at(input: &[f32], index: isize) -> f32 {
    if index < 0 {
        0.0
    } else {
        input.get(index as usize).copied().unwrap_or(0.0)
    }
}

/// Candidate spacing of the coarse alignment pass
const COARSE_STEP: usize = 4;

/// Cross-correlate the decimated overlap region at `natural` and `candidate`
fn overlap_score(input: &[f32], natural: isize, candidate: isize, overlap: usize) -> f32 {
    (0..overlap)
        .step_by(COARSE_STEP)
        .map(|i| sample_at(input, natural + i as isize) * sample_at(input, candidate + i as isize))
        .sum()
}

/// Pick the window start near `nominal` that best continues the waveform at
/// `natural`
///
/// Searches every `COARSE_STEP`th candidate first, then refines around the
/// coarse winner one frame at a time.
fn best_alignment(
    input: &[f32],
    natural: isize,
    nominal: isize,
    tolerance: isize,
    overlap: usize,
) -> isize {
    let low = (nominal - tolerance).max(0);
    let high = (nominal + tolerance).max(0);

    let best_in = |candidates: &mut dyn Iterator<Item = isize>, start: isize| {
        let mut best = start;
        let mut best_score = f32::NEG_INFINITY;
        for candidate in candidates {
            let score = overlap_score(input, natural, candidate, overlap);
            if score > best_score {
                best_score = score;
                best = candidate;
            }
        }
        best
    };

    let coarse = best_in(&mut (low..=high).step_by(COARSE_STEP), nominal.max(0));
    let step = COARSE_STEP as isize;
    let fine_low = (coarse - step + 1).max(low);
    let fine_high = (coarse + step - 1).min(high);
    best_in(&mut (fine_low..=fine_high), coarse)
}

/// Stretch `input` in time by `stretch` without changing its pitch
///
/// The result has `round(input.len() * stretch)` samples.
pub fn time_stretch(input: &[f32], stretch: f64, window_size: usize) -> Vec<f32> {
    if input.is_empty() {
        return Vec::new();
    }
    if (stretch - 1.0).abs() < UNITY_EPSILON {
        return input.to_vec();
    }

    let out_len = (input.len() as f64 * stretch).round() as usize;
    let hop_out = window_size / 2;
    let hop_in = hop_out as f64 / stretch;
    let tolerance = (window_size / 8) as isize;
    let window = hann_window(window_size);

    let mut output = vec![0.0_f32; out_len + window_size];
    let mut norm = vec![0.0_f32; out_len + window_size];
    let mut prev_pos: isize = 0;
    let mut frame = 0usize;

    loop {
        let out_pos = frame * hop_out;
        if out_pos >= out_len {
            break;
        }

        let nominal = (frame as f64 * hop_in).round() as isize;
        let pos = if frame == 0 {
            0
        } else {
            let natural = prev_pos + hop_out as isize;
            best_alignment(input, natural, nominal, tolerance, hop_out)
        };

        for (i, &w) in window.iter().enumerate() {
            output[out_pos + i] += sample_at(input, pos + i as isize) * w;
            norm[out_pos + i] += w;
        }

        prev_pos = pos;
        frame += 1;
    }

    output.truncate(out_len);
    for (sample, &weight) in output.iter_mut().zip(norm.iter()) {
        if weight > 0.1 {
            *sample /= weight;
        }
    }
    output
}

/// Linear interpolation resampling
///
/// `ratio` is output length over input length.
pub fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() || ratio <= 0.0 {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).round() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else {
            samples[source_len - 1]
        };

        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{calculate_rms, generate_test_tone, ChannelLayout};

    /// Count positive-going zero crossings per second
    fn estimate_frequency(samples: &[f32], sample_rate: u32) -> f32 {
        let crossings = samples
            .windows(2)
            .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
            .count();
        crossings as f32 * sample_rate as f32 / samples.len() as f32
    }

    #[test]
    fn test_clamping() {
        assert_eq!(clamp_rate(100.0), MAX_RATE);
        assert_eq!(clamp_rate(0.0), 1.0);
        assert_eq!(clamp_rate(f32::NAN), 1.0);
        assert_eq!(clamp_rate(0.001), MIN_RATE);
        assert_eq!(clamp_pitch_cents(5000.0), MAX_PITCH_CENTS);
        assert_eq!(clamp_pitch_cents(f32::INFINITY), 0.0);
    }

    #[test]
    fn test_absent_values_are_unity() {
        let stage = TimePitch::new(None, None);
        assert!(stage.is_unity());
        assert_eq!(stage.rate(), 1.0);
        assert_eq!(stage.pitch_cents(), 0.0);
    }

    #[test]
    fn test_pitch_ratio() {
        let stage = TimePitch::new(None, Some(1200.0));
        assert!((stage.pitch_ratio() - 2.0).abs() < 1e-9);
        let stage = TimePitch::new(None, Some(-1200.0));
        assert!((stage.pitch_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_slow_rate_doubles_length() {
        let mut stage = TimePitch::new(Some(0.5), None);
        stage.prepare(StreamFormat::new(16000, ChannelLayout::Mono));
        let mut buffer = generate_test_tone(440.0, 0.5, 16000);
        let input_frames = buffer.num_frames();

        stage.process(&mut buffer);

        assert_eq!(buffer.num_frames(), input_frames * 2);
        assert_eq!(stage.output_frames(input_frames), input_frames * 2);
    }

    #[test]
    fn test_rate_preserves_pitch() {
        let mut stage = TimePitch::new(Some(1.5), None);
        stage.prepare(StreamFormat::new(16000, ChannelLayout::Mono));
        let mut buffer = generate_test_tone(400.0, 1.0, 16000);

        stage.process(&mut buffer);

        let freq = estimate_frequency(buffer.channel(0), 16000);
        assert!((freq - 400.0).abs() < 40.0, "frequency drifted to {}", freq);
    }

    #[test]
    fn test_pitch_up_keeps_duration_and_raises_frequency() {
        let mut stage = TimePitch::new(None, Some(1000.0));
        stage.prepare(StreamFormat::new(16000, ChannelLayout::Mono));
        let mut buffer = generate_test_tone(300.0, 1.0, 16000);
        let input_frames = buffer.num_frames();

        stage.process(&mut buffer);

        assert_eq!(buffer.num_frames(), input_frames);
        let expected = 300.0 * 2.0_f32.powf(1000.0 / 1200.0);
        let freq = estimate_frequency(buffer.channel(0), 16000);
        assert!((freq - expected).abs() < expected * 0.1, "got {} expected {}", freq, expected);
    }

    #[test]
    fn test_stretch_keeps_level() {
        let input = generate_test_tone(250.0, 0.5, 16000);
        let stretched = time_stretch(input.channel(0), 2.0, 1024);
        let buffer = AudioBuffer::from_channels(vec![stretched], 16000).unwrap();

        assert!((calculate_rms(&buffer) - calculate_rms(&input)).abs() < 2.0);
    }

    #[test]
    fn test_resample_linear_lengths() {
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        assert_eq!(resample_linear(&input, 0.5).len(), 50);
        assert_eq!(resample_linear(&input, 2.0).len(), 200);
        assert!(resample_linear(&[], 2.0).is_empty());
    }

    #[test]
    fn test_working_frames_cover_stretch() {
        let stage = TimePitch::new(Some(0.25), Some(2400.0));
        assert_eq!(stage.output_frames(4000), 16000);
        assert_eq!(stage.working_frames(4000), 64000);

        // Pitch down shrinks the intermediate; output length still bounds it.
        let stage = TimePitch::new(Some(2.0), Some(-1200.0));
        assert_eq!(stage.working_frames(4000), 2000);

        assert_eq!(TimePitch::new(None, None).working_frames(4000), 4000);
    }

    #[test]
    fn test_params_describe_request() {
        let params = TimePitch::new(Some(0.5), Some(-300.0)).get_params();
        assert_eq!(params["rate"], 0.5);
        assert_eq!(params["pitch_cents"], -300.0);
        assert_eq!(params["window_size"], DEFAULT_WINDOW_SIZE);
        assert!(params.get("sample_rate").is_none());
    }

    #[test]
    fn test_alignment_locks_to_period() {
        // 400 Hz at 16 kHz repeats every 40 frames.
        let tone = generate_test_tone(400.0, 0.5, 16000);
        let input = tone.channel(0);

        for nominal in [1000, 1013, 1027, 1039] {
            let pos = best_alignment(input, 600, nominal, 128, 512);
            assert!((pos - nominal).abs() <= 128);
            let phase = (pos - 600).rem_euclid(40);
            assert!(phase <= 1 || phase >= 39, "nominal {} gave {}", nominal, pos);
        }
    }

    #[test]
    fn test_alignment_near_start_stays_in_range() {
        let tone = generate_test_tone(400.0, 0.1, 16000);
        let pos = best_alignment(tone.channel(0), 512, 10, 128, 512);
        assert!((0..=138).contains(&pos));
    }

    #[test]
    fn test_hann_window_sums_to_one() {
        let window = hann_window(8);
        for i in 0..4 {
            assert!((window[i] + window[i + 4] - 1.0).abs() < 1e-6);
        }
    }
}
