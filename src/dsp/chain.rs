//! Stage chain management
//!
//! Stages run in chain order (index 0 first). A playback chain has at most two
//! slots, filled in this order:
//! 1. Rate / pitch
//! 2. Echo or reverb

use serde_json::Value;

use super::stage::{ProcessingStage, Stage, StageKind};
use super::{Echo, Reverb, TimePitch};
use crate::config::StageConfig;
use crate::engine::{AudioBuffer, StreamFormat};
use crate::request::{Ambience, ResolvedRequest};

/// Linear chain of processing stages
#[derive(Debug, Clone, Default)]
pub struct StageChain {
    stages: Vec<ProcessingStage>,
    format: Option<StreamFormat>,
}

impl StageChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the minimal chain implied by a request
    pub fn for_request(request: &ResolvedRequest, config: &StageConfig) -> Self {
        let mut chain = Self::new();

        if request.has_time_pitch() {
            let stage = TimePitch::new(request.rate, request.pitch_cents)
                .with_window_size(config.time_pitch_window);
            chain.push(ProcessingStage::time_pitch(stage));
        }

        match request.ambience {
            Some(Ambience::Echo) => {
                chain.push(ProcessingStage::Echo(Echo::with_params(config.echo.clone())))
            }
            Some(Ambience::Reverb) => {
                chain.push(ProcessingStage::Reverb(Reverb::with_preset(config.reverb)))
            }
            None => {}
        }

        chain
    }

    /// Append a stage at the end of the chain
    pub fn push(&mut self, mut stage: ProcessingStage) {
        if let Some(format) = self.format {
            stage.prepare(format);
        }
        self.stages.push(stage);
    }

    /// Prepare all stages for the link format
    pub fn prepare(&mut self, format: StreamFormat) {
        self.format = Some(format);
        for stage in &mut self.stages {
            stage.prepare(format);
        }
    }

    /// Run the buffer through every stage in order
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        for stage in &mut self.stages {
            stage.process(buffer);
        }
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Frames produced by the whole chain for `input_frames` frames of input
    pub fn output_frames(&self, input_frames: usize) -> usize {
        self.stages
            .iter()
            .fold(input_frames, |frames, stage| stage.output_frames(frames))
    }

    /// Largest buffer, in frames, any stage allocates for `input_frames` of input
    pub fn peak_frames(&self, input_frames: usize) -> usize {
        let mut frames = input_frames;
        let mut peak = input_frames;
        for stage in &self.stages {
            peak = peak.max(stage.working_frames(frames));
            frames = stage.output_frames(frames);
            peak = peak.max(frames);
        }
        peak
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessingStage> {
        self.stages.iter()
    }

    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    pub fn contains(&self, kind: StageKind) -> bool {
        self.stages.iter().any(|s| s.kind() == kind)
    }

    /// Serialize chain state to JSON
    pub fn to_json(&self) -> Value {
        let stages: Vec<Value> = self
            .stages
            .iter()
            .map(|s| {
                serde_json::json!({
                    "kind": s.kind(),
                    "params": s.get_params(),
                })
            })
            .collect();

        serde_json::json!({ "stages": stages })
    }
}
