//! Cross-pipeline timing correlation.
//!
//! [`TimingCorrelator`] keeps a map from [`TimingEvent`] to the monotonic
//! instant it happened.  The audio session records its own boundaries
//! (start, first chunk, stop, encode); a companion pipeline such as a video
//! capture reports its events as [`TimingEvent::Companion`], and
//! [`TimingCorrelator::report`] lines them up against the stop.

pub mod correlator;

pub use correlator::{ChunkGapStats, TimingCorrelator, TimingError, TimingEvent, TimingReport};
