//! Audio output collaborators
//!
//! The render graph hands its audio to an [`AudioOutput`]. The controller
//! only starts, feeds, stops and resets it; what happens to the samples is
//! the output's business.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::engine::buffer::{AudioBuffer, StreamFormat};
use crate::engine::io::{write_wav, WavEncoding};
use crate::error::EngineStartError;

/// Destination of a rendered playback session
pub trait AudioOutput {
    /// Acquire whatever the output needs to play audio in `format`
    fn start(&mut self, format: StreamFormat) -> Result<(), EngineStartError>;

    /// Queue rendered audio for playback from its start
    fn schedule(&mut self, audio: AudioBuffer) -> Result<(), EngineStartError>;

    /// Frames of the scheduled source the player has already consumed
    fn sample_time(&self) -> u64;

    /// Halt playback; queued audio is dropped
    fn stop(&mut self);

    /// Release render resources so the next start begins clean
    fn reset(&mut self);

    fn is_running(&self) -> bool;
}

// ============================================================================
// Memory Output
// ============================================================================

/// Everything a [`MemoryOutput`] has seen
#[derive(Debug, Default)]
pub struct MemoryOutputState {
    pub format: Option<StreamFormat>,
    pub running: bool,
    pub scheduled: Vec<AudioBuffer>,
    pub start_count: usize,
    pub stop_count: usize,
    pub reset_count: usize,
    /// Set if `start` was called while already running
    pub overlapped: bool,
    pub sample_time: u64,
    pub refuse_start: bool,
}

/// Output that captures rendered audio in memory
///
/// Clones share the same state, so a handle can be kept for inspection while
/// the controller owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    state: Arc<Mutex<MemoryOutputState>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output whose `start` always fails, as if no render resources exist
    pub fn refusing() -> Self {
        let output = Self::new();
        output.state().refuse_start = true;
        output
    }

    /// Pretend the player already consumed `frames` at schedule time
    pub fn with_sample_time(self, frames: u64) -> Self {
        self.state().sample_time = frames;
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryOutputState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Most recently scheduled audio
    pub fn last_scheduled(&self) -> Option<AudioBuffer> {
        self.state().scheduled.last().cloned()
    }
}

impl AudioOutput for MemoryOutput {
    fn start(&mut self, format: StreamFormat) -> Result<(), EngineStartError> {
        let mut state = self.state();
        if state.refuse_start {
            return Err(EngineStartError::Output {
                reason: "output refused to start".to_string(),
                source: None,
            });
        }
        if state.running {
            state.overlapped = true;
        }
        state.format = Some(format);
        state.running = true;
        state.start_count += 1;
        Ok(())
    }

    fn schedule(&mut self, audio: AudioBuffer) -> Result<(), EngineStartError> {
        self.state().scheduled.push(audio);
        Ok(())
    }

    fn sample_time(&self) -> u64 {
        self.state().sample_time
    }

    fn stop(&mut self) {
        let mut state = self.state();
        state.running = false;
        state.stop_count += 1;
    }

    fn reset(&mut self) {
        let mut state = self.state();
        state.format = None;
        state.reset_count += 1;
    }

    fn is_running(&self) -> bool {
        self.state().running
    }
}

// ============================================================================
// WAV File Output
// ============================================================================

/// Output that writes each scheduled session to a WAV file
#[derive(Debug, Clone)]
pub struct WavFileOutput {
    path: PathBuf,
    encoding: WavEncoding,
    format: Option<StreamFormat>,
    running: bool,
    frames_written: usize,
}

impl WavFileOutput {
    pub fn new(path: impl Into<PathBuf>, encoding: WavEncoding) -> Self {
        Self {
            path: path.into(),
            encoding,
            format: None,
            running: false,
            frames_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }
}

impl AudioOutput for WavFileOutput {
    fn start(&mut self, format: StreamFormat) -> Result<(), EngineStartError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(EngineStartError::Output {
                    reason: format!("directory {} does not exist", parent.display()),
                    source: None,
                });
            }
        }
        self.format = Some(format);
        self.running = true;
        Ok(())
    }

    fn schedule(&mut self, audio: AudioBuffer) -> Result<(), EngineStartError> {
        write_wav(&audio, &self.path, self.encoding).map_err(|e| EngineStartError::Output {
            reason: format!("cannot write {}", self.path.display()),
            source: Some(Box::new(e)),
        })?;
        self.frames_written = audio.num_frames();
        debug!(
            "Wrote {} frames to {}",
            self.frames_written,
            self.path.display()
        );
        Ok(())
    }

    fn sample_time(&self) -> u64 {
        0
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn reset(&mut self) {
        self.format = None;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{decode_wav, generate_test_tone, ChannelLayout};
    use tempfile::tempdir;

    #[test]
    fn test_memory_output_records_lifecycle() {
        let output = MemoryOutput::new();
        let mut owned = output.clone();
        let format = StreamFormat::new(44100, ChannelLayout::Mono);

        owned.start(format).unwrap();
        owned.schedule(generate_test_tone(440.0, 0.1, 44100)).unwrap();
        owned.stop();
        owned.reset();

        let state = output.state();
        assert_eq!(state.start_count, 1);
        assert_eq!(state.stop_count, 1);
        assert_eq!(state.reset_count, 1);
        assert_eq!(state.scheduled.len(), 1);
        assert!(!state.running);
        assert!(!state.overlapped);
    }

    #[test]
    fn test_memory_output_detects_overlap() {
        let output = MemoryOutput::new();
        let mut owned = output.clone();
        let format = StreamFormat::new(44100, ChannelLayout::Mono);

        owned.start(format).unwrap();
        owned.start(format).unwrap();

        assert!(output.state().overlapped);
    }

    #[test]
    fn test_refusing_output() {
        let mut output = MemoryOutput::refusing();
        let result = output.start(StreamFormat::new(44100, ChannelLayout::Mono));
        assert!(matches!(result, Err(EngineStartError::Output { .. })));
        assert!(!output.is_running());
    }

    #[test]
    fn test_wav_output_writes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rendered.wav");
        let mut output = WavFileOutput::new(&path, WavEncoding::Float32);
        let tone = generate_test_tone(440.0, 0.2, 22050);

        output.start(tone.format()).unwrap();
        output.schedule(tone.clone()).unwrap();

        let decoded = decode_wav(&path).unwrap();
        assert_eq!(decoded.num_frames(), tone.num_frames());
        assert_eq!(output.frames_written(), tone.num_frames());
    }

    #[test]
    fn test_wav_output_missing_directory() {
        let mut output = WavFileOutput::new("/nonexistent/dir/out.wav", WavEncoding::Int16);
        let result = output.start(StreamFormat::new(44100, ChannelLayout::Mono));
        assert!(matches!(result, Err(EngineStartError::Output { .. })));
    }
}
