//! Audio pipeline: encoded chunks → PCM samples → bounded buffer → WAV.
//!
//! # Pipeline
//!
//! ```text
//! CaptureSource → AudioChunk (mpsc) → decode → StreamAccumulator::append
//!              → freeze → FrozenCapture → wav::encode
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use tap_recorder::audio::{decode, wav, StreamAccumulator};
//!
//! let mut acc = StreamAccumulator::new(44_100, 44_100);
//! let chunk = decode("AQD//w==").unwrap();
//! acc.append(&chunk.samples, chunk.loudness_sum).unwrap();
//!
//! let capture = acc.freeze();
//! let bytes = wav::encode(&capture.samples, capture.sample_rate).unwrap();
//! assert_eq!(bytes.len(), 44 + 4);
//! ```

pub mod accumulator;
pub mod buffer;
pub mod capture;
pub mod decoder;
pub mod replay;
pub mod wav;

pub use accumulator::{CaptureSnapshot, ChunkMetric, FrozenCapture, OverflowError, StreamAccumulator};
pub use buffer::{CapacityExceeded, SampleBuffer};
pub use capture::{AudioChunk, CaptureError, CaptureSource, ChunkSender};
pub use decoder::{decode, DecodeError, DecodedChunk};
pub use replay::ReplaySource;
pub use wav::{WavError, WavHeader};
