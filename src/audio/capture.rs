//! Capture-source seam.
//!
//! A [`CaptureSource`] produces [`AudioChunk`]s carrying base64-encoded PCM
//! and pushes them, in order, into the unbounded channel handed to
//! [`CaptureSource::start`].  The session runner owns the receiving end.

use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// One arrival unit of encoded audio.
///
/// Created by the source on arrival, decoded once by the session, then
/// discarded.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Base64-encoded mono 16-bit little-endian PCM.
    pub payload: String,
    /// Arrival sequence number, starting at 0 for each capture.
    pub sequence: u64,
    /// Monotonic arrival time.
    pub received_at: Instant,
}

impl AudioChunk {
    /// Wrap `payload` as having arrived now.
    pub fn new(payload: impl Into<String>, sequence: u64) -> Self {
        Self {
            payload: payload.into(),
            sequence,
            received_at: Instant::now(),
        }
    }
}

/// Sending half of the chunk channel given to a capture source.
pub type ChunkSender = mpsc::UnboundedSender<AudioChunk>;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up a capture source.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture source is already running")]
    AlreadyRunning,

    #[error("failed to read chunk file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),
}

// ---------------------------------------------------------------------------
// CaptureSource
// ---------------------------------------------------------------------------

/// Upstream producer of audio chunks.
///
/// # Contract
///
/// - Chunks are sent in arrival order.
/// - After [`stop`](Self::stop) returns, no further chunk is sent for this
///   capture; anything sent before is already queued in the channel.
/// - A source may end on its own by dropping the sender.
pub trait CaptureSource: Send {
    /// Begin producing chunks into `tx`.
    fn start(&mut self, tx: ChunkSender) -> Result<(), CaptureError>;

    /// Stop producing chunks.  Must be idempotent.
    fn stop(&mut self);
}

// Compile-time assertion: Box<dyn CaptureSource> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn CaptureSource>) {}
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// `AudioChunk` must be `Send` so it can cross thread boundaries.
    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }

    #[test]
    fn audio_chunk_fields() {
        let before = Instant::now();
        let chunk = AudioChunk::new("AQA=", 7);
        assert_eq!(chunk.payload, "AQA=");
        assert_eq!(chunk.sequence, 7);
        assert!(chunk.received_at >= before);
    }

    #[test]
    fn capture_error_display_names_path() {
        let err = CaptureError::Io {
            path: "/tmp/chunks.txt".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/tmp/chunks.txt"));
    }
}
