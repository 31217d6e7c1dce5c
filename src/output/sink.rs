//! `RecordingSink` trait and the error type shared by its implementations.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::Recording;

// ---------------------------------------------------------------------------
// SinkError
// ---------------------------------------------------------------------------

/// Errors that can occur while persisting a recording.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize recording: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// RecordingSink trait
// ---------------------------------------------------------------------------

/// Destination for finished recordings (disk, a share sheet, an upload).
///
/// Implementations must be `Send + Sync` so the runner can hold them behind
/// an `Arc<dyn RecordingSink>`.
#[async_trait]
pub trait RecordingSink: Send + Sync {
    /// Store `recording` and return where the WAV file ended up.
    async fn persist(&self, recording: &Recording) -> Result<PathBuf, SinkError>;
}

// Compile-time assertion: Box<dyn RecordingSink> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn RecordingSink>) {}
};

// ---------------------------------------------------------------------------
// recording_name
// ---------------------------------------------------------------------------

/// `<stem>_<unix milliseconds>`, the default file name for a recording.
///
/// Sinks must still cope with a name that is already taken.
///
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use tap_recorder::output::recording_name;
///
/// let at = UNIX_EPOCH + Duration::from_millis(1_718_000_000_250);
/// assert_eq!(recording_name("audioData", at), "audioData_1718000000250");
/// ```
pub fn recording_name(stem: &str, at: SystemTime) -> String {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{stem}_{millis}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn name_uses_unix_millis() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_999);
        assert_eq!(recording_name("tap", at), "tap_1700000000999");
    }

    #[test]
    fn time_before_epoch_clamps_to_zero() {
        let at = UNIX_EPOCH - Duration::from_secs(5);
        assert_eq!(recording_name("tap", at), "tap_0");
    }

    #[test]
    fn io_error_message_names_the_path() {
        let err = SinkError::Io {
            path: PathBuf::from("/tmp/out.wav"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/out.wav"), "{msg}");
        assert!(msg.contains("denied"), "{msg}");
    }
}
