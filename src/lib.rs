//! Tap-detecting audio capture.
//!
//! Streams base64-encoded 16-bit mono PCM chunks into a bounded per-session
//! buffer, finds the first two loud taps in the per-chunk loudness log,
//! measures the time between them, and writes the capture out as a
//! canonical WAV file.
//!
//! | Module       | Role                                                   |
//! |--------------|--------------------------------------------------------|
//! | [`audio`]    | chunk decoding, bounded accumulation, WAV encoding     |
//! | [`analysis`] | rough-median threshold, peak pair, chart data          |
//! | [`timing`]   | monotonic event timestamps and cross-pipeline offsets  |
//! | [`pipeline`] | session state machine and its async runner             |
//! | [`output`]   | recording sinks                                        |
//! | [`config`]   | TOML settings and platform paths                       |

pub mod analysis;
pub mod audio;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod timing;
