//! Persistence of finished recordings.
//!
//! [`RecordingSink`] is the seam; [`FileSink`] is the default implementation
//! that writes the WAV file plus optional JSON companions.

pub mod file;
pub mod sink;

pub use file::{FileSink, RecordingReport};
pub use sink::{recording_name, RecordingSink, SinkError};
