//! Observable session state machine

use sr_core::SessionState;
use tokio::sync::watch;

/// Tracks the [`SessionState`] of the current attempt and lets others watch it
///
/// Transitions that skip a step or leave `Closed` are refused.
#[derive(Debug)]
pub struct StateTracker {
    tx: watch::Sender<SessionState>,
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Disconnected);
        Self { tx }
    }

    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Move to `next` if it is a legal successor. Returns whether it moved.
    pub fn advance(&self, next: SessionState) -> bool {
        let mut moved = false;
        self.tx.send_if_modified(|state| {
            if state.can_advance_to(next) {
                tracing::debug!("Session state {} -> {}", state, next);
                *state = next;
                moved = true;
            } else {
                tracing::warn!("Ignoring illegal session transition {} -> {}", state, next);
            }
            moved
        });
        moved
    }

    /// Close the current attempt from whatever state it is in
    pub fn close(&self) {
        if self.current() != SessionState::Closed {
            self.advance(SessionState::Closed);
        }
    }

    /// Start a fresh attempt
    pub(crate) fn reset(&self) {
        self.tx.send_replace(SessionState::Disconnected);
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
