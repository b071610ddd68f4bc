//! Session state for the playback orchestrator.
//!
//! A single enumerated state per orchestrator instance, guarded by a lock that
//! is only ever held for the read/write itself (never across an await point).
//! Transitions are performed exclusively by the orchestrator.

use std::fmt;
use std::sync::{Mutex, RwLock};
use tracing::info;

/// State of one podcast session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session active.
    Idle,
    /// Script (or answer) audio is being synthesized and played.
    Playing,
    /// Listener speech detected; playback is being torn down.
    Interrupted,
    /// Recording and answering the listener's question.
    Thinking,
    /// Reserved for mid-script revision. Not currently entered.
    Updating,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "IDLE",
            SessionState::Playing => "PLAYING",
            SessionState::Interrupted => "INTERRUPTED",
            SessionState::Thinking => "THINKING",
            SessionState::Updating => "UPDATING",
        };
        f.write_str(s)
    }
}

/// Lock-protected session state cell. `get` is safe to call from any task.
///
/// Keeps the ordered list of states entered since construction, which makes
/// transition sequences checkable after the fact.
#[derive(Debug)]
pub struct StateCell {
    inner: RwLock<SessionState>,
    history: Mutex<Vec<SessionState>>,
}

impl StateCell {
    /// Create a new cell starting at `Idle`.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SessionState::Idle),
            history: Mutex::new(vec![SessionState::Idle]),
        }
    }

    /// Snapshot of the current state.
    pub fn get(&self) -> SessionState {
        *self.inner.read().expect("state lock poisoned")
    }

    /// Transition to `next`, logging the edge.
    pub fn set(&self, next: SessionState) {
        let mut guard = self.inner.write().expect("state lock poisoned");
        info!("[Orchestrator] State transition: {} -> {}", *guard, next);
        *guard = next;
        self.history.lock().expect("history lock poisoned").push(next);
    }

    /// Every state entered so far, in order, starting with `Idle`.
    pub fn history(&self) -> Vec<SessionState> {
        self.history.lock().expect("history lock poisoned").clone()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
