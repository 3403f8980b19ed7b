//! Audio file I/O for Pitch Perfect
//!
//! Handles decoding the recorded clip and writing rendered audio back out.
//! WAV is the only container; the clip keeps its native sample rate.

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{AudioFileError, PitchPerfectError, Result};

/// File name the recorder persists the clip under
pub const RECORDING_FILE_NAME: &str = "recordedVoice.wav";

/// Sample encoding used when writing WAV files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WavEncoding {
    /// 16-bit signed integer PCM
    #[default]
    Int16,
    /// 32-bit IEEE float
    Float32,
}

impl WavEncoding {
    fn spec(&self, channels: u16, sample_rate: u32) -> WavSpec {
        match self {
            WavEncoding::Int16 => WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
            WavEncoding::Float32 => WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
        }
    }
}

/// Decode a WAV file into an [`AudioBuffer`]
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a readable WAV file
/// * `UnsupportedFormat` - If the audio has more than 2 channels or an odd bit depth
/// * `EmptyAudio` - If the file holds no sample frames
pub fn decode_wav(path: &Path) -> std::result::Result<AudioBuffer, AudioFileError> {
    if !path.exists() {
        return Err(AudioFileError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            AudioFileError::FileNotFound {
                path: path.display().to_string(),
                source: Some(io),
            }
        }
        other => AudioFileError::InvalidAudio {
            reason: format!("Failed to open WAV file: {}", other),
            source: Some(Box::new(other)),
        },
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    let layout = ChannelLayout::from_count(channels).ok_or_else(|| {
        AudioFileError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        }
    })?;

    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if samples.len() < channels {
        return Err(AudioFileError::EmptyAudio);
    }

    // A truncated final frame is dropped rather than rejected.
    let whole_frames = samples.len() - samples.len() % channels;
    AudioBuffer::from_interleaved(&samples[..whole_frames], layout, spec.sample_rate)
}

/// Write an [`AudioBuffer`] to a WAV file
pub fn write_wav(buffer: &AudioBuffer, path: &Path, encoding: WavEncoding) -> Result<()> {
    let spec = encoding.spec(buffer.num_channels() as u16, buffer.sample_rate());
    let mut writer = WavWriter::create(path, spec).map_err(hound_to_io)?;

    for sample in buffer.to_interleaved() {
        match encoding {
            WavEncoding::Int16 => {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
            WavEncoding::Float32 => writer.write_sample(sample).map_err(hound_to_io)?,
        }
    }

    writer.finalize().map_err(hound_to_io)?;
    Ok(())
}

/// Persist a recorded clip under [`RECORDING_FILE_NAME`] in `dir`
///
/// Returns the path written. An existing recording is overwritten.
pub fn save_recording(buffer: &AudioBuffer, dir: &Path) -> Result<PathBuf> {
    if buffer.is_empty() {
        return Err(AudioFileError::EmptyAudio.into());
    }
    std::fs::create_dir_all(dir)?;
    let path = dir.join(RECORDING_FILE_NAME);
    write_wav(buffer, &path, WavEncoding::Int16)?;
    log::info!("Saved recording to {}", path.display());
    Ok(path)
}

/// Generate a mono sine test tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_frames = (duration_secs * sample_rate as f32) as usize;
    let mut buffer = AudioBuffer::new(num_frames, ChannelLayout::Mono, sample_rate);

    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    for (i, sample) in buffer.channel_mut(0).iter_mut().enumerate() {
        *sample = 0.5 * (angular_freq * i as f32).sin();
    }

    buffer
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn hound_to_io(e: hound::Error) -> PitchPerfectError {
    match e {
        hound::Error::IoError(io) => PitchPerfectError::Io(io),
        other => PitchPerfectError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

fn invalid_samples(bits: &str, e: hound::Error) -> AudioFileError {
    AudioFileError::InvalidAudio {
        reason: format!("Failed to read {} samples: {}", bits, e),
        source: Some(Box::new(e)),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> std::result::Result<Vec<f32>, AudioFileError> {
    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| invalid_samples("float", e)),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid_samples("8-bit", e)),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid_samples("16-bit", e)),
            // 24-bit stored as i32 in hound
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid_samples("24-bit", e)),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid_samples("32-bit int", e)),
            _ => Err(AudioFileError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}
