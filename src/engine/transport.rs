//! Playback State Machine
//!
//! Tracks whether a session is playing and which one. Only two states exist:
//!
//! ```text
//! Idle --begin--> Playing --finish(Completed | Stopped)--> Idle
//! Idle --stop--> Idle
//! ```

use std::fmt;

use log::debug;
use uuid::Uuid;

/// Playback states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Playing => write!(f, "Playing"),
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The completion timer fired
    Completed,
    /// `stop()` was called, directly or by a newer `play()`
    Stopped,
}

/// Session bookkeeping for the controller
#[derive(Debug, Clone, Default)]
pub struct Transport {
    state: PlaybackState,
    session_id: Option<Uuid>,
    sessions_started: u64,
    sessions_completed: u64,
    sessions_stopped: u64,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `Playing` with a fresh session id
    ///
    /// Callers must end any running session first.
    pub fn begin(&mut self) -> Uuid {
        debug_assert_eq!(self.state, PlaybackState::Idle);
        let id = Uuid::new_v4();
        self.state = PlaybackState::Playing;
        self.session_id = Some(id);
        self.sessions_started += 1;
        debug!("[TRANSPORT] Session {} playing", id);
        id
    }

    /// Return to `Idle`, returning the session that ended (if any)
    pub fn finish(&mut self, end: SessionEnd) -> Option<Uuid> {
        let id = self.session_id.take()?;
        self.state = PlaybackState::Idle;
        match end {
            SessionEnd::Completed => self.sessions_completed += 1,
            SessionEnd::Stopped => self.sessions_stopped += 1,
        }
        debug!("[TRANSPORT] Session {} ended ({:?})", id, end);
        Some(id)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn sessions_started(&self) -> u64 {
        self.sessions_started
    }

    pub fn sessions_completed(&self) -> u64 {
        self.sessions_completed
    }

    pub fn sessions_stopped(&self) -> u64 {
        self.sessions_stopped
    }
}
