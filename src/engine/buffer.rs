//! Audio Buffer Management
//!
//! Provides the decoded clip type shared by the loader, the DSP stages and the
//! render graph, plus a few level-measurement helpers.

use crate::error::AudioFileError;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Calculate the RMS (Root Mean Square) level of an audio buffer in dB
///
/// Returns -f32::INFINITY for empty or silent buffers.
pub fn calculate_rms(buffer: &AudioBuffer) -> f32 {
    let total_samples = buffer.num_channels() * buffer.num_frames();
    if total_samples == 0 {
        return f32::NEG_INFINITY;
    }

    let sum_squares: f64 = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    let rms = (sum_squares / total_samples as f64).sqrt() as f32;
    linear_to_db(rms)
}

/// Calculate the peak level of an audio buffer in dB
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    let peak = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max);

    linear_to_db(peak)
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    #[default]
    Mono,
    /// Two channels (stereo: left, right)
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Stream Format
// ============================================================================

/// Sample format carried by every link of a render graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub layout: ChannelLayout,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, layout: ChannelLayout) -> Self {
        Self {
            sample_rate,
            layout,
        }
    }

    pub fn channels(&self) -> usize {
        self.layout.num_channels()
    }
}

impl std::fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz, {} ch", self.sample_rate, self.channels())
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded audio stored as non-interleaved 32-bit float samples
///
/// Each channel is a separate `Vec<f32>`; all channels have the same length.
///
/// # Example
/// ```
/// use pitch_perfect::engine::{AudioBuffer, ChannelLayout};
///
/// let buffer = AudioBuffer::new(44100, ChannelLayout::Stereo, 44100);
/// assert_eq!(buffer.num_channels(), 2);
/// assert_eq!(buffer.num_frames(), 44100);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer with the given frame count, layout and sample rate
    pub fn new(num_frames: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_frames]; layout.num_channels()],
            sample_rate,
        }
    }

    /// Create a buffer from planar channel data
    ///
    /// Fails if the channel count is not 1 or 2, the channels differ in
    /// length, or the sample rate is zero.
    pub fn from_channels(
        samples: Vec<Vec<f32>>,
        sample_rate: u32,
    ) -> std::result::Result<Self, AudioFileError> {
        if ChannelLayout::from_count(samples.len()).is_none() {
            return Err(AudioFileError::UnsupportedFormat {
                format: format!("{}-channel audio (only mono/stereo supported)", samples.len()),
            });
        }
        if sample_rate == 0 {
            return Err(AudioFileError::InvalidAudio {
                reason: "sample rate is zero".to_string(),
                source: None,
            });
        }
        let frames = samples[0].len();
        if samples.iter().any(|ch| ch.len() != frames) {
            return Err(AudioFileError::InvalidAudio {
                reason: "channels have different lengths".to_string(),
                source: None,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create an audio buffer from interleaved sample data
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> std::result::Result<Self, AudioFileError> {
        let num_channels = layout.num_channels();

        if interleaved.len() % num_channels != 0 {
            return Err(AudioFileError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let num_frames = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_frames); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self::from_channels(samples, sample_rate)
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ... for stereo)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_frames = self.num_frames();
        let mut interleaved = Vec::with_capacity(self.num_channels() * num_frames);

        for frame in 0..num_frames {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }

        interleaved
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Number of sample frames (samples per channel)
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_frames() == 0
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f64 / self.sample_rate as f64
    }

    pub fn layout(&self) -> ChannelLayout {
        // Constructors only admit one or two channels.
        ChannelLayout::from_count(self.num_channels()).unwrap_or_default()
    }

    pub fn format(&self) -> StreamFormat {
        StreamFormat::new(self.sample_rate, self.layout())
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Iterate over all channels
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.samples.iter().map(|ch| ch.as_slice())
    }

    /// Replace every channel with new data of a possibly different length
    ///
    /// Stages that change duration (time stretching) rebuild the buffer
    /// through this. Channel count and sample rate are preserved.
    pub(crate) fn map_channels<F>(&mut self, mut f: F)
    where
        F: FnMut(&[f32]) -> Vec<f32>,
    {
        for channel in &mut self.samples {
            *channel = f(channel);
        }
    }

    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Option<f32> {
        self.samples
            .get(channel)
            .and_then(|ch| ch.get(index).copied())
    }

    /// Check if buffer contains only finite samples
    pub fn is_finite(&self) -> bool {
        self.samples.iter().flatten().all(|s| s.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer() {
        let buf = AudioBuffer::new(1000, ChannelLayout::Stereo, 44100);
        assert_eq!(buf.num_channels(), 2);
        assert_eq!(buf.num_frames(), 1000);
        assert_eq!(buf.sample_rate(), 44100);
        assert_eq!(buf.layout(), ChannelLayout::Stereo);
    }

    #[test]
    fn test_interleave_roundtrip() {
        let interleaved = vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buf = AudioBuffer::from_interleaved(&interleaved, ChannelLayout::Stereo, 48000).unwrap();
        assert_eq!(buf.num_frames(), 3);
        assert_eq!(buf.channel(1), &[-0.1, -0.2, -0.3]);
        assert_eq!(buf.to_interleaved(), interleaved);
    }

    #[test]
    fn test_interleaved_length_mismatch() {
        let result = AudioBuffer::from_interleaved(&[0.0, 0.1, 0.2], ChannelLayout::Stereo, 48000);
        assert!(matches!(result, Err(AudioFileError::InvalidAudio { .. })));
    }

    #[test]
    fn test_from_channels_rejects_surround() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 4]; 6], 48000);
        assert!(matches!(result, Err(AudioFileError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_from_channels_rejects_ragged() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 3]], 48000);
        assert!(result.is_err());
    }

    #[test]
    fn test_duration() {
        let buf = AudioBuffer::new(44100 * 4, ChannelLayout::Mono, 44100);
        assert!((buf.duration_secs() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_rms_db() {
        let mut buf = AudioBuffer::new(48000, ChannelLayout::Mono, 48000);
        for (i, s) in buf.channel_mut(0).iter_mut().enumerate() {
            let t = i as f32 / 48000.0;
            *s = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
        }
        // RMS of a unit sine is 1/sqrt(2) = -3.01 dB
        assert!((calculate_rms(&buf) - (-3.01)).abs() < 0.1);
        assert!(calculate_peak(&buf).abs() < 0.01);
    }

    #[test]
    fn test_silence_levels() {
        let buf = AudioBuffer::new(100, ChannelLayout::Mono, 48000);
        assert_eq!(calculate_rms(&buf), f32::NEG_INFINITY);
        assert_eq!(calculate_peak(&buf), f32::NEG_INFINITY);
    }
}
