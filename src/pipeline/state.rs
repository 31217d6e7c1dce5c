//! Session state machine states and shared status.
//!
//! [`SessionState`] is the lifecycle of one capture session.  Observers
//! (the CLI, a UI) read a [`SessionStatus`] through [`SharedStatus`], which
//! the runner refreshes after every chunk and command.
//!
//! [`SharedStatus`] is a type alias for `Arc<Mutex<SessionStatus>>`, cheap to
//! clone and safe to share across threads.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// States of a capture session.
///
/// ```text
/// Idle ──start──▶ Streaming ──stop / overflow──▶ Stopped ──encode──▶ Encoded
///  ▲                  │                             │                   │
///  └─────cancel───────┘                             └──────reset────────┘
///                                                          ▼
///                                                         Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No capture in progress; nothing buffered.
    #[default]
    Idle,

    /// Chunks are being decoded into the buffer.
    Streaming,

    /// The capture is frozen and ready for analysis and encoding.
    Stopped,

    /// WAV bytes have been produced for the frozen capture.
    Encoded,
}

impl SessionState {
    /// Returns `true` while chunks are being accepted.
    ///
    /// ```
    /// use tap_recorder::pipeline::SessionState;
    ///
    /// assert!(!SessionState::Idle.is_active());
    /// assert!(SessionState::Streaming.is_active());
    /// assert!(!SessionState::Stopped.is_active());
    /// assert!(!SessionState::Encoded.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Streaming)
    }

    /// Returns `true` when a frozen capture is available.
    pub fn has_capture(&self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Encoded)
    }

    /// A short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Streaming => "Streaming",
            SessionState::Stopped => "Stopped",
            SessionState::Encoded => "Encoded",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Progress of the current session, as seen from outside the runner.
#[derive(Debug, Clone, Default)]
pub struct SessionStatus {
    pub state: SessionState,

    /// Samples buffered so far (or in the frozen capture).
    pub samples: usize,

    /// Chunks appended so far.
    pub chunks: usize,

    /// Chunks skipped because they could not be decoded.
    pub dropped_chunks: u64,

    /// Buffered audio duration in seconds.
    pub recording_secs: f32,

    /// Most recent error message, cleared on the next start.
    pub last_error: Option<String>,

    /// Where the last recording was persisted.
    pub last_saved: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// SharedStatus
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`SessionStatus`].
///
/// Lock for a short critical section; do **not** hold the lock across
/// `.await` points.
pub type SharedStatus = Arc<Mutex<SessionStatus>>;

/// Construct a new [`SharedStatus`] in the `Idle` state.
pub fn new_shared_status() -> SharedStatus {
    Arc::new(Mutex::new(SessionStatus::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- SessionState ---

    #[test]
    fn only_streaming_is_active() {
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::Streaming.is_active());
        assert!(!SessionState::Stopped.is_active());
        assert!(!SessionState::Encoded.is_active());
    }

    #[test]
    fn stopped_and_encoded_have_capture() {
        assert!(!SessionState::Idle.has_capture());
        assert!(!SessionState::Streaming.has_capture());
        assert!(SessionState::Stopped.has_capture());
        assert!(SessionState::Encoded.has_capture());
    }

    #[test]
    fn labels_and_display() {
        assert_eq!(SessionState::Idle.label(), "Idle");
        assert_eq!(SessionState::Streaming.to_string(), "Streaming");
        assert_eq!(SessionState::Stopped.to_string(), "Stopped");
        assert_eq!(SessionState::Encoded.label(), "Encoded");
    }

    #[test]
    fn default_state_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    // ---- SharedStatus ---

    #[test]
    fn default_status_is_empty() {
        let status = SessionStatus::default();
        assert_eq!(status.state, SessionState::Idle);
        assert_eq!(status.samples, 0);
        assert!(status.last_error.is_none());
        assert!(status.last_saved.is_none());
    }

    #[test]
    fn shared_status_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedStatus>();
    }

    #[test]
    fn shared_status_can_be_cloned_and_mutated() {
        let status = new_shared_status();
        let status2 = Arc::clone(&status);

        status.lock().unwrap().state = SessionState::Streaming;
        assert_eq!(status2.lock().unwrap().state, SessionState::Streaming);
    }
}
