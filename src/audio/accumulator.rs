//! Per-session sample and metric accumulation.
//!
//! [`StreamAccumulator`] is the single writer for one capture session.  Each
//! successful [`append`](StreamAccumulator::append) writes a run of samples
//! into the session's [`SampleBuffer`] and records one [`ChunkMetric`].
//! When the session stops, [`freeze`](StreamAccumulator::freeze) turns it into
//! an immutable [`FrozenCapture`] for analysis and encoding.

use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use super::buffer::SampleBuffer;

// ---------------------------------------------------------------------------
// ChunkMetric
// ---------------------------------------------------------------------------

/// Loudness and arrival offset of one appended chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkMetric {
    /// Sum of absolute sample values in the chunk.
    pub loudness_sum: u64,
    /// Milliseconds since the first appended chunk.
    pub time_offset_ms: u64,
}

impl ChunkMetric {
    pub fn new(loudness_sum: u64, time_offset_ms: u64) -> Self {
        Self {
            loudness_sum,
            time_offset_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// OverflowError
// ---------------------------------------------------------------------------

/// The sample buffer ran out of capacity.
///
/// Session-fatal.  Carries enough context to reproduce the condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub struct OverflowError {
    /// Index the rejected chunk would have had in the metric log.
    pub chunk_index: usize,
    pub attempted_samples: usize,
    pub buffered_samples: usize,
    pub capacity_samples: usize,
}

impl std::fmt::Display for OverflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sample buffer overflow at chunk {}: {} samples ({} bytes) do not fit, \
             {}/{} samples ({}/{} bytes) already buffered",
            self.chunk_index,
            self.attempted_samples,
            self.attempted_samples * 2,
            self.buffered_samples,
            self.capacity_samples,
            self.buffered_samples * 2,
            self.capacity_samples * 2,
        )
    }
}

// ---------------------------------------------------------------------------
// StreamAccumulator
// ---------------------------------------------------------------------------

/// Owns the capture buffer, the metric log and the dropped-chunk counter.
#[derive(Debug)]
pub struct StreamAccumulator {
    samples: SampleBuffer<i16>,
    metrics: Vec<ChunkMetric>,
    sample_rate: u32,
    /// Arrival time of the first appended chunk.
    t0: Option<Instant>,
    dropped_chunks: u64,
    overflowed: bool,
}

impl StreamAccumulator {
    /// Create an empty accumulator holding at most `capacity_samples`.
    pub fn new(capacity_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: SampleBuffer::new(capacity_samples),
            metrics: Vec::new(),
            sample_rate,
            t0: None,
            dropped_chunks: 0,
            overflowed: false,
        }
    }

    /// Append a decoded run of samples, timestamped now.
    pub fn append(&mut self, samples: &[i16], loudness_sum: u64) -> Result<(), OverflowError> {
        self.append_at(samples, loudness_sum, Instant::now())
    }

    /// Append a decoded run of samples that arrived at `now`.
    ///
    /// The first call establishes the time origin for every metric offset.
    ///
    /// # Errors
    ///
    /// [`OverflowError`] if the run does not fit, or if an earlier append
    /// already overflowed.  Nothing is written and no metric is recorded.
    pub fn append_at(
        &mut self,
        samples: &[i16],
        loudness_sum: u64,
        now: Instant,
    ) -> Result<(), OverflowError> {
        if self.overflowed || self.samples.try_extend(samples).is_err() {
            self.overflowed = true;
            return Err(OverflowError {
                chunk_index: self.metrics.len(),
                attempted_samples: samples.len(),
                buffered_samples: self.samples.len(),
                capacity_samples: self.samples.capacity(),
            });
        }

        let t0 = *self.t0.get_or_insert(now);
        let offset_ms = now.saturating_duration_since(t0).as_millis() as u64;
        self.metrics.push(ChunkMetric::new(loudness_sum, offset_ms));
        Ok(())
    }

    /// Count a chunk that was skipped because it could not be decoded.
    pub fn record_dropped(&mut self) {
        self.dropped_chunks += 1;
    }

    /// Read-only view of everything written so far.
    pub fn snapshot(&self) -> CaptureSnapshot<'_> {
        CaptureSnapshot {
            samples: self.samples.as_slice(),
            metrics: &self.metrics,
            sample_rate: self.sample_rate,
            dropped_chunks: self.dropped_chunks,
            overflowed: self.overflowed,
        }
    }

    /// Stop accumulating and hand over the captured data.
    pub fn freeze(self) -> FrozenCapture {
        FrozenCapture {
            samples: self.samples.into_vec(),
            metrics: self.metrics,
            sample_rate: self.sample_rate,
            dropped_chunks: self.dropped_chunks,
            overflowed: self.overflowed,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.metrics.len()
    }

    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks
    }

    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }
}

// ---------------------------------------------------------------------------
// CaptureSnapshot / FrozenCapture
// ---------------------------------------------------------------------------

/// Borrowed view of an accumulator between appends.
#[derive(Debug, Clone, Copy)]
pub struct CaptureSnapshot<'a> {
    pub samples: &'a [i16],
    pub metrics: &'a [ChunkMetric],
    pub sample_rate: u32,
    pub dropped_chunks: u64,
    pub overflowed: bool,
}

/// Immutable result of freezing a session's accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenCapture {
    pub samples: Vec<i16>,
    pub metrics: Vec<ChunkMetric>,
    pub sample_rate: u32,
    pub dropped_chunks: u64,
    /// Capture ended because the buffer filled up.
    pub overflowed: bool,
}

impl FrozenCapture {
    /// Captured duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
