//! Capture session lifecycle.
//!
//! # Architecture
//!
//! ```text
//! SessionCommand (mpsc)          CaptureSource ──AudioChunk (mpsc)──┐
//!        │                                                          │
//!        ▼                                                          ▼
//! SessionRunner::run()  ← async tokio task, single owner of the Session
//!        │
//!        ├─ Start   → Session::start                         Idle → Streaming
//!        ├─ chunk   → Session::ingest (decode + append)
//!        ├─ Stop    → drain → Session::stop                  Streaming → Stopped
//!        │             └─ spawn_blocking(Session::finalize)  Stopped → Encoded
//!        │                  └─ RecordingSink::persist
//!        └─ Reset   → Session::reset                         → Idle
//!
//! SessionEvent (mpsc) ──▶ caller
//! SharedStatus (Arc<Mutex<SessionStatus>>) ◀── read by observers
//! ```
//!
//! [`Session`] can also be used directly, without the runner, when chunks
//! are already in hand.

pub mod runner;
pub mod session;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{SessionCommand, SessionEvent, SessionRunner};
pub use session::{Analysis, Recording, Session, SessionConfig, SessionError};
pub use state::{new_shared_status, SessionState, SessionStatus, SharedStatus};
