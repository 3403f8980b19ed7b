//! Render graph
//!
//! Wires the loaded clip through a [`StageChain`] into an [`AudioOutput`]:
//! `source -> stage 0 -> ... -> stage n -> output`. Every link carries the
//! source buffer's stream format.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::dsp::{StageChain, StageKind};
use crate::engine::buffer::{AudioBuffer, StreamFormat};
use crate::engine::output::AudioOutput;
use crate::error::EngineStartError;

/// A node in the render graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeId {
    Source,
    Stage(usize),
    Output,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Source => write!(f, "source"),
            NodeId::Stage(i) => write!(f, "stage[{}]", i),
            NodeId::Output => write!(f, "output"),
        }
    }
}

/// A connection between two adjacent nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub from: NodeId,
    pub to: NodeId,
    pub format: StreamFormat,
}

/// Source, stages and output of one playback session
#[derive(Debug)]
pub struct RenderGraph {
    source: Arc<AudioBuffer>,
    chain: StageChain,
    links: Vec<Link>,
    running: bool,
}

impl RenderGraph {
    /// Connect the source through `chain` to the output
    pub fn connect(source: Arc<AudioBuffer>, mut chain: StageChain) -> Self {
        let format = source.format();
        chain.prepare(format);

        let nodes: Vec<NodeId> = std::iter::once(NodeId::Source)
            .chain((0..chain.len()).map(NodeId::Stage))
            .chain(std::iter::once(NodeId::Output))
            .collect();

        let links: Vec<Link> = nodes
            .windows(2)
            .map(|pair| Link {
                from: pair[0],
                to: pair[1],
                format,
            })
            .collect();

        for link in &links {
            debug!("Connected {} -> {} ({})", link.from, link.to, link.format);
        }

        Self {
            source,
            chain,
            links,
            running: false,
        }
    }

    pub fn format(&self) -> StreamFormat {
        self.source.format()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn chain(&self) -> &StageChain {
        &self.chain
    }

    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.chain.kinds()
    }

    pub fn source_frames(&self) -> usize {
        self.source.num_frames()
    }

    /// Frames the rendered session will occupy
    pub fn rendered_frames(&self) -> usize {
        self.chain.output_frames(self.source.num_frames())
    }

    /// Largest per-channel buffer rendering allocates, intermediates included
    pub fn required_frames(&self) -> usize {
        self.chain.peak_frames(self.source.num_frames())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Allocate render resources and start the output
    ///
    /// Fails without side effects if any buffer rendering needs, stretch
    /// intermediates included, would exceed `budget_frames`.
    pub fn start<O: AudioOutput + ?Sized>(
        &mut self,
        output: &mut O,
        budget_frames: usize,
    ) -> Result<(), EngineStartError> {
        let required_frames = self.required_frames();
        if required_frames > budget_frames {
            return Err(EngineStartError::ResourceExhausted {
                required_frames,
                budget_frames,
            });
        }

        output.start(self.format())?;
        self.running = true;
        Ok(())
    }

    /// Render the whole source through the chain
    pub fn render(&mut self) -> AudioBuffer {
        let mut buffer = AudioBuffer::clone(&self.source);
        self.chain.process(&mut buffer);
        buffer
    }

    /// Render and queue the full source on the output
    pub fn schedule<O: AudioOutput + ?Sized>(
        &mut self,
        output: &mut O,
    ) -> Result<(), EngineStartError> {
        let rendered = self.render();
        let format = self.format();
        if rendered.format() != format {
            return Err(EngineStartError::FormatMismatch {
                from: rendered.format().to_string(),
                to: format.to_string(),
            });
        }
        debug!(
            "Scheduling {} frames through {} stage(s)",
            rendered.num_frames(),
            self.chain.len()
        );
        output.schedule(rendered)
    }

    /// Halt the output and clear stage state
    pub fn stop<O: AudioOutput + ?Sized>(&mut self, output: &mut O) {
        output.stop();
        output.reset();
        self.chain.reset();
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use crate::engine::{generate_test_tone, MemoryOutput};
    use crate::request::EffectRequest;

    fn graph_for(request: EffectRequest) -> RenderGraph {
        let source = Arc::new(generate_test_tone(440.0, 0.5, 16000));
        let chain = StageChain::for_request(&request.resolve(), &StageConfig::default());
        RenderGraph::connect(source, chain)
    }

    #[test]
    fn test_plain_graph_links_source_to_output() {
        let graph = graph_for(EffectRequest::plain());
        assert_eq!(graph.links().len(), 1);
        assert_eq!(graph.links()[0].from, NodeId::Source);
        assert_eq!(graph.links()[0].to, NodeId::Output);
    }

    #[test]
    fn test_links_share_source_format() {
        let graph = graph_for(EffectRequest::plain().with_rate(1.5).with_echo());
        let format = graph.format();
        assert_eq!(graph.links().len(), 3);
        assert!(graph.links().iter().all(|l| l.format == format));
        assert_eq!(graph.links()[1].from, NodeId::Stage(0));
        assert_eq!(graph.links()[1].to, NodeId::Stage(1));
    }

    #[test]
    fn test_budget_exceeded_does_not_start_output() {
        let mut graph = graph_for(EffectRequest::plain().with_rate(0.5));
        let output = MemoryOutput::new();
        let mut owned = output.clone();

        let result = graph.start(&mut owned, 10_000);

        assert!(matches!(
            result,
            Err(EngineStartError::ResourceExhausted {
                required_frames: 16000,
                budget_frames: 10_000
            })
        ));
        assert_eq!(output.state().start_count, 0);
        assert!(!graph.is_running());
    }

    #[test]
    fn test_budget_counts_stretch_intermediate() {
        // 4000 frames; output is 16000 but the stretch runs at 64000.
        let source = Arc::new(generate_test_tone(440.0, 0.25, 16000));
        let request = EffectRequest::plain().with_rate(0.25).with_pitch_cents(2400.0);
        let chain = StageChain::for_request(&request.resolve(), &StageConfig::default());
        let mut graph = RenderGraph::connect(source, chain);
        assert_eq!(graph.rendered_frames(), 16000);

        let output = MemoryOutput::new();
        let mut owned = output.clone();
        let result = graph.start(&mut owned, 16000);

        assert!(matches!(
            result,
            Err(EngineStartError::ResourceExhausted {
                required_frames: 64000,
                budget_frames: 16000
            })
        ));
        assert_eq!(output.state().start_count, 0);
        assert!(graph.start(&mut owned, 64000).is_ok());
    }

    #[test]
    fn test_schedule_renders_chain() {
        let mut graph = graph_for(EffectRequest::plain().with_rate(2.0));
        let output = MemoryOutput::new();
        let mut owned = output.clone();

        graph.start(&mut owned, usize::MAX).unwrap();
        graph.schedule(&mut owned).unwrap();

        assert_eq!(output.last_scheduled().unwrap().num_frames(), 4000);
    }
}
