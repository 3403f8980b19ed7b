//! Effect graph controller
//!
//! Owns one decoded clip and at most one playback session. Each `play` builds
//! a fresh stage chain, renders it into the output and arms a one-shot
//! completion timer; `poll` fires the completion on the control thread and
//! `stop` cancels it.
//!
//! All methods are expected to be called from a single control thread.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde::Serialize;
use uuid::Uuid;

use crate::config::ControllerConfig;
use crate::dsp::{StageChain, StageKind};
use crate::engine::{
    completion_delay, decode_wav, AudioBuffer, AudioOutput, AudioSession, CancellationToken,
    Clock, CompletionTimer, Link, PlaybackState, RenderGraph, SessionEnd, SystemClock, Transport,
};
use crate::error::{AudioFileError, EngineStartError};
use crate::request::{EffectRequest, Preset};

/// Summary of a successfully loaded clip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ready {
    pub frames: usize,
    pub sample_rate: u32,
    pub channels: usize,
    pub duration: Duration,
}

impl Ready {
    fn describe(buffer: &AudioBuffer) -> Self {
        Self {
            frames: buffer.num_frames(),
            sample_rate: buffer.sample_rate(),
            channels: buffer.num_channels(),
            duration: Duration::from_secs_f64(buffer.duration_secs()),
        }
    }
}

/// What the completion handler is told about a finished session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub id: Uuid,
    pub request: EffectRequest,
    pub stages: Vec<StageKind>,
    pub delay: Duration,
    pub end: SessionEnd,
}

type CompletionHandler = Box<dyn FnMut(&SessionReport)>;

/// The running state of one `play` call
struct PlaybackSession {
    id: Uuid,
    request: EffectRequest,
    graph: RenderGraph,
    timer: CompletionTimer,
}

impl PlaybackSession {
    fn report(&self, end: SessionEnd) -> SessionReport {
        SessionReport {
            id: self.id,
            request: self.request,
            stages: self.graph.stage_kinds(),
            delay: self.timer.delay(),
            end,
        }
    }
}

/// Loads a clip and plays it through per-request effect graphs
pub struct EffectGraphController<O: AudioOutput, C: Clock = SystemClock> {
    config: ControllerConfig,
    output: O,
    clock: C,
    audio_session: Arc<dyn AudioSession>,
    source: Option<Arc<AudioBuffer>>,
    session: Option<PlaybackSession>,
    transport: Transport,
    on_complete: Option<CompletionHandler>,
}

impl<O: AudioOutput> EffectGraphController<O, SystemClock> {
    /// Controller on the wall clock with default configuration
    pub fn new(output: O, audio_session: Arc<dyn AudioSession>) -> Self {
        Self::with_clock(output, SystemClock, audio_session, ControllerConfig::default())
    }
}

impl<O: AudioOutput, C: Clock> EffectGraphController<O, C> {
    pub fn with_clock(
        output: O,
        clock: C,
        audio_session: Arc<dyn AudioSession>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            config,
            output,
            clock,
            audio_session,
            source: None,
            session: None,
            transport: Transport::new(),
            on_complete: None,
        }
    }

    /// Called after a session finishes naturally, once it is torn down
    pub fn set_completion_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&SessionReport) + 'static,
    {
        self.on_complete = Some(Box::new(handler));
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Decode a WAV file and make it the playback source
    ///
    /// On failure the controller is unchanged: the previous clip stays loaded
    /// and any session keeps playing.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<Ready, AudioFileError> {
        let buffer = decode_wav(path.as_ref())?;
        self.load_buffer(buffer)
    }

    /// Make an already-decoded buffer the playback source
    pub fn load_buffer(&mut self, buffer: AudioBuffer) -> Result<Ready, AudioFileError> {
        if buffer.is_empty() {
            return Err(AudioFileError::EmptyAudio);
        }

        // Loading only happens while idle.
        self.stop();

        let ready = Ready::describe(&buffer);
        info!(
            "Loaded clip: {} frames, {} Hz, {} ch ({:.3}s)",
            ready.frames,
            ready.sample_rate,
            ready.channels,
            ready.duration.as_secs_f64()
        );
        self.source = Some(Arc::new(buffer));
        Ok(ready)
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Play the loaded clip through the chain `request` implies
    ///
    /// Any active session is stopped first. On error nothing plays and the
    /// controller is idle.
    pub fn play(&mut self, request: EffectRequest) -> Result<(), EngineStartError> {
        self.stop();

        let source = self.source.clone().ok_or(EngineStartError::NoSourceLoaded)?;
        if !self.audio_session.allows_playback() {
            return Err(EngineStartError::SessionInactive);
        }

        let resolved = request.resolve();
        let chain = StageChain::for_request(&resolved, &self.config.stages);
        let mut graph = RenderGraph::connect(source, chain);

        graph.start(&mut self.output, self.config.max_render_frames)?;
        if let Err(e) = graph.schedule(&mut self.output) {
            graph.stop(&mut self.output);
            return Err(e);
        }

        let delay = completion_delay(
            graph.source_frames() as u64,
            self.output.sample_time(),
            graph.format().sample_rate,
            resolved.duration_divisor(),
        );
        let timer = CompletionTimer::arm(self.clock.now(), delay);
        debug!("Completion timer armed for {:.3}s", delay.as_secs_f64());

        let id = self.transport.begin();
        info!(
            "Session {} playing {:?}, completes in {:.3}s",
            id,
            graph.stage_kinds(),
            delay.as_secs_f64()
        );

        self.session = Some(PlaybackSession {
            id,
            request,
            graph,
            timer,
        });
        Ok(())
    }

    /// Play one of the fixed presets
    pub fn play_preset(&mut self, preset: Preset) -> Result<(), EngineStartError> {
        self.play(preset.request())
    }

    /// Stop the active session, if any
    ///
    /// The completion timer is cancelled before the graph is torn down.
    pub fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        session.timer.cancel();
        session.graph.stop(&mut self.output);
        self.transport.finish(SessionEnd::Stopped);
        info!("Session {} stopped", session.id);
    }

    /// Fire the completion timer if it is due
    ///
    /// Returns true if a session completed during this call.
    pub fn poll(&mut self) -> bool {
        let now = self.clock.now();
        let due = self
            .session
            .as_ref()
            .map(|s| s.timer.is_due(now))
            .unwrap_or(false);
        if !due {
            return false;
        }

        let Some(mut session) = self.session.take() else {
            return false;
        };
        session.graph.stop(&mut self.output);
        self.transport.finish(SessionEnd::Completed);
        info!("Session {} completed", session.id);

        let report = session.report(SessionEnd::Completed);
        if let Some(handler) = self.on_complete.as_mut() {
            handler(&report);
        }
        true
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn state(&self) -> PlaybackState {
        self.transport.state()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn source(&self) -> Option<&AudioBuffer> {
        self.source.as_deref()
    }

    /// Stage kinds of the active session, in chain order
    pub fn active_stages(&self) -> Vec<StageKind> {
        self.session
            .as_ref()
            .map(|s| s.graph.stage_kinds())
            .unwrap_or_default()
    }

    pub fn active_links(&self) -> Vec<Link> {
        self.session
            .as_ref()
            .map(|s| s.graph.links().to_vec())
            .unwrap_or_default()
    }

    pub fn active_session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Delay the active session's timer was armed with
    pub fn completion_delay(&self) -> Option<Duration> {
        self.session.as_ref().map(|s| s.timer.delay())
    }

    /// Time left until the active session completes
    pub fn time_remaining(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.session.as_ref().map(|s| s.timer.remaining(now))
    }

    /// Cancellation token of the active session's completion
    pub fn completion_token(&self) -> Option<CancellationToken> {
        self.session.as_ref().map(|s| s.timer.token())
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{generate_test_tone, ManualClock, MemoryOutput, SharedAudioSession};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn controller() -> (
        EffectGraphController<MemoryOutput, ManualClock>,
        MemoryOutput,
        ManualClock,
    ) {
        let output = MemoryOutput::new();
        let clock = ManualClock::new();
        let controller = EffectGraphController::with_clock(
            output.clone(),
            clock.clone(),
            Arc::new(SharedAudioSession::active_playback()),
            ControllerConfig::default(),
        );
        (controller, output, clock)
    }

    #[test]
    fn test_play_without_source() {
        let (mut controller, _, _) = controller();
        assert!(matches!(
            controller.play(EffectRequest::plain()),
            Err(EngineStartError::NoSourceLoaded)
        ));
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_load_empty_buffer_rejected() {
        let (mut controller, _, _) = controller();
        let empty = AudioBuffer::new(0, crate::engine::ChannelLayout::Mono, 44100);
        assert!(matches!(
            controller.load_buffer(empty),
            Err(AudioFileError::EmptyAudio)
        ));
        assert!(controller.source().is_none());
    }

    #[test]
    fn test_plain_play_then_complete() {
        let (mut controller, output, clock) = controller();
        controller
            .load_buffer(generate_test_tone(440.0, 1.0, 8000))
            .unwrap();

        controller.play(EffectRequest::plain()).unwrap();
        assert!(controller.is_playing());
        assert!(controller.active_stages().is_empty());
        assert_eq!(controller.active_links().len(), 1);

        clock.advance(Duration::from_millis(999));
        assert!(!controller.poll());

        clock.advance(Duration::from_millis(1));
        assert!(controller.poll());
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(!output.state().running);
    }

    #[test]
    fn test_completion_handler_sees_report() {
        let (mut controller, _, clock) = controller();
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = reports.clone();
        controller.set_completion_handler(move |report| sink.borrow_mut().push(report.clone()));
        controller
            .load_buffer(generate_test_tone(440.0, 0.5, 8000))
            .unwrap();

        controller.play_preset(Preset::Echo).unwrap();
        let id = controller.active_session_id().unwrap();
        clock.advance(Duration::from_secs(1));
        controller.poll();

        let reports = reports.borrow();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, id);
        assert_eq!(reports[0].stages, vec![StageKind::Echo]);
        assert_eq!(reports[0].end, SessionEnd::Completed);
    }

    #[test]
    fn test_stop_cancels_token_before_teardown() {
        let (mut controller, _, clock) = controller();
        controller
            .load_buffer(generate_test_tone(440.0, 0.5, 8000))
            .unwrap();
        controller.play(EffectRequest::plain()).unwrap();
        let token = controller.completion_token().unwrap();

        controller.stop();
        clock.advance(Duration::from_secs(5));

        assert!(token.is_cancelled());
        assert!(!controller.poll());
        assert_eq!(controller.transport().sessions_completed(), 0);
        assert_eq!(controller.transport().sessions_stopped(), 1);
    }

    #[test]
    fn test_inactive_session_blocks_playback() {
        let output = MemoryOutput::new();
        let session = SharedAudioSession::active_playback();
        let mut controller = EffectGraphController::with_clock(
            output.clone(),
            ManualClock::new(),
            Arc::new(session.clone()),
            ControllerConfig::default(),
        );
        controller
            .load_buffer(generate_test_tone(440.0, 0.5, 8000))
            .unwrap();

        session.deactivate();

        assert!(matches!(
            controller.play(EffectRequest::plain()),
            Err(EngineStartError::SessionInactive)
        ));
        assert_eq!(output.state().start_count, 0);
    }

    #[test]
    fn test_sample_time_shortens_delay() {
        let output = MemoryOutput::new().with_sample_time(4000);
        let mut controller = EffectGraphController::with_clock(
            output,
            ManualClock::new(),
            Arc::new(SharedAudioSession::active_playback()),
            ControllerConfig::default(),
        );
        controller
            .load_buffer(generate_test_tone(440.0, 1.0, 8000))
            .unwrap();

        controller.play(EffectRequest::plain()).unwrap();

        assert_eq!(controller.completion_delay(), Some(Duration::from_millis(500)));
    }
}
