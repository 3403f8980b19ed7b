//! Process-wide audio session capability
//!
//! The audio session (category and activation) belongs to the application,
//! not to any one controller. Controllers receive it as a shared handle and
//! only ask whether playback is currently allowed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::info;
use serde::{Deserialize, Serialize};

/// What the session is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCategory {
    #[default]
    Playback,
    PlayAndRecord,
    Record,
}

impl SessionCategory {
    pub fn allows_output(&self) -> bool {
        !matches!(self, SessionCategory::Record)
    }
}

/// Audio session capability consulted before a graph starts
pub trait AudioSession: Send + Sync {
    fn category(&self) -> SessionCategory;

    fn is_active(&self) -> bool;

    fn allows_playback(&self) -> bool {
        self.is_active() && self.category().allows_output()
    }
}

/// Shared, mutable audio session
///
/// Clones refer to the same session.
#[derive(Debug, Clone, Default)]
pub struct SharedAudioSession {
    active: Arc<AtomicBool>,
    category: Arc<Mutex<SessionCategory>>,
}

impl SharedAudioSession {
    /// Inactive session with the given category
    pub fn new(category: SessionCategory) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            category: Arc::new(Mutex::new(category)),
        }
    }

    /// Active playback session
    pub fn active_playback() -> Self {
        let session = Self::new(SessionCategory::Playback);
        session.activate();
        session
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
        info!("Audio session activated ({:?})", self.category());
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        info!("Audio session deactivated");
    }

    pub fn set_category(&self, category: SessionCategory) {
        let mut guard = self.category.lock().unwrap_or_else(|e| e.into_inner());
        *guard = category;
    }
}

impl AudioSession for SharedAudioSession {
    fn category(&self) -> SessionCategory {
        *self.category.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_inactive() {
        let session = SharedAudioSession::new(SessionCategory::PlayAndRecord);
        assert!(!session.is_active());
        assert!(!session.allows_playback());
    }

    #[test]
    fn test_clones_share_state() {
        let session = SharedAudioSession::active_playback();
        let handle = session.clone();

        handle.deactivate();
        assert!(!session.allows_playback());

        handle.activate();
        handle.set_category(SessionCategory::Record);
        assert!(session.is_active());
        assert!(!session.allows_playback());
    }
}
