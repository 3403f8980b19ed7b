//! Processing stage definition
//!
//! A stage is one link in the linear playback chain. Every stage has a fixed
//! internal preset chosen at construction; there is no live parameter editing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Echo, Reverb, TimePitch};
use crate::engine::{AudioBuffer, StreamFormat};

/// Kind tag for a [`ProcessingStage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    RateTimePitch,
    Echo,
    Reverb,
    Passthrough,
}

impl StageKind {
    /// True for the stage kinds occupying the rate/pitch slot of a chain
    pub fn is_time_pitch(&self) -> bool {
        matches!(self, StageKind::RateTimePitch | StageKind::Passthrough)
    }

    /// True for the echo/reverb slot
    pub fn is_ambience(&self) -> bool {
        matches!(self, StageKind::Echo | StageKind::Reverb)
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageKind::RateTimePitch => "rate_time_pitch",
            StageKind::Echo => "echo",
            StageKind::Reverb => "reverb",
            StageKind::Passthrough => "passthrough",
        };
        f.write_str(name)
    }
}

/// Base trait for all processing stages
pub trait Stage {
    /// Prepare internal buffers for the link format
    fn prepare(&mut self, format: StreamFormat);

    /// Process audio buffer in-place
    ///
    /// Stages that change duration replace the channel data with a buffer of
    /// [`Stage::output_frames`] frames.
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Clear delay lines and filter history
    fn reset(&mut self);

    fn kind(&self) -> StageKind;

    fn display_name(&self) -> &'static str;

    /// Number of frames produced for `input_frames` frames of input
    fn output_frames(&self, input_frames: usize) -> usize {
        input_frames
    }

    /// Largest per-channel buffer, in frames, processing `input_frames` allocates
    fn working_frames(&self, input_frames: usize) -> usize {
        self.output_frames(input_frames)
    }

    /// Preset parameters as JSON (for logging and inspection)
    fn get_params(&self) -> Value;
}

/// One stage of a playback chain
#[derive(Debug, Clone)]
pub enum ProcessingStage {
    RateTimePitch(TimePitch),
    Echo(Echo),
    Reverb(Reverb),
    Passthrough,
}

impl ProcessingStage {
    /// Build the rate/pitch stage
    ///
    /// Unity rate and zero pitch degenerate into [`ProcessingStage::Passthrough`].
    pub fn time_pitch(stage: TimePitch) -> Self {
        if stage.is_unity() {
            ProcessingStage::Passthrough
        } else {
            ProcessingStage::RateTimePitch(stage)
        }
    }

    fn as_stage(&self) -> Option<&dyn Stage> {
        match self {
            ProcessingStage::RateTimePitch(s) => Some(s as &dyn Stage),
            ProcessingStage::Echo(s) => Some(s as &dyn Stage),
            ProcessingStage::Reverb(s) => Some(s as &dyn Stage),
            ProcessingStage::Passthrough => None,
        }
    }

    fn as_stage_mut(&mut self) -> Option<&mut dyn Stage> {
        match self {
            ProcessingStage::RateTimePitch(s) => Some(s as &mut dyn Stage),
            ProcessingStage::Echo(s) => Some(s as &mut dyn Stage),
            ProcessingStage::Reverb(s) => Some(s as &mut dyn Stage),
            ProcessingStage::Passthrough => None,
        }
    }
}

impl Stage for ProcessingStage {
    fn prepare(&mut self, format: StreamFormat) {
        if let Some(stage) = self.as_stage_mut() {
            stage.prepare(format);
        }
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if let Some(stage) = self.as_stage_mut() {
            stage.process(buffer);
        }
    }

    fn reset(&mut self) {
        if let Some(stage) = self.as_stage_mut() {
            stage.reset();
        }
    }

    fn kind(&self) -> StageKind {
        self.as_stage()
            .map(|s| s.kind())
            .unwrap_or(StageKind::Passthrough)
    }

    fn display_name(&self) -> &'static str {
        self.as_stage()
            .map(|s| s.display_name())
            .unwrap_or("Passthrough")
    }

    fn output_frames(&self, input_frames: usize) -> usize {
        self.as_stage()
            .map(|s| s.output_frames(input_frames))
            .unwrap_or(input_frames)
    }

    fn working_frames(&self, input_frames: usize) -> usize {
        self.as_stage()
            .map(|s| s.working_frames(input_frames))
            .unwrap_or(input_frames)
    }

    fn get_params(&self) -> Value {
        self.as_stage()
            .map(|s| s.get_params())
            .unwrap_or_else(|| serde_json::json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{generate_test_tone, ChannelLayout};

    #[test]
    fn test_unity_time_pitch_is_passthrough() {
        let stage = ProcessingStage::time_pitch(TimePitch::new(Some(1.0), Some(0.0)));
        assert_eq!(stage.kind(), StageKind::Passthrough);
    }

    #[test]
    fn test_passthrough_leaves_audio_untouched() {
        let tone = generate_test_tone(440.0, 0.1, 44100);
        let mut buffer = tone.clone();
        let mut stage = ProcessingStage::Passthrough;
        stage.prepare(StreamFormat::new(44100, ChannelLayout::Mono));
        stage.process(&mut buffer);
        assert_eq!(buffer, tone);
        assert_eq!(stage.output_frames(1234), 1234);
    }

    #[test]
    fn test_kind_slots() {
        assert!(StageKind::RateTimePitch.is_time_pitch());
        assert!(StageKind::Passthrough.is_time_pitch());
        assert!(StageKind::Echo.is_ambience());
        assert!(!StageKind::Reverb.is_time_pitch());
        assert_eq!(StageKind::Reverb.to_string(), "reverb");
    }
}
