//! Event timestamps for one capture session and its companion pipeline.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// TimingEvent
// ---------------------------------------------------------------------------

/// A named point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimingEvent {
    /// Capture was requested.
    StreamStart,
    /// The first chunk reached the session.
    FirstChunkReceived,
    /// The most recent chunk reached the session.
    LastChunkReceived,
    /// Stop was asked for; queued chunks may still arrive after this.
    StopRequested,
    /// The capture was frozen.
    StreamStop,
    /// The WAV bytes were produced.
    EncodeComplete,
    /// Reported by a parallel pipeline, e.g. `"video_uri_ready"`.
    Companion(String),
}

impl fmt::Display for TimingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingEvent::StreamStart => f.write_str("stream_start"),
            TimingEvent::FirstChunkReceived => f.write_str("first_chunk_received"),
            TimingEvent::LastChunkReceived => f.write_str("last_chunk_received"),
            TimingEvent::StopRequested => f.write_str("stop_requested"),
            TimingEvent::StreamStop => f.write_str("stream_stop"),
            TimingEvent::EncodeComplete => f.write_str("encode_complete"),
            TimingEvent::Companion(name) => write!(f, "companion:{name}"),
        }
    }
}

// ---------------------------------------------------------------------------
// TimingError
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimingError {
    #[error("timing event {0} was never recorded")]
    Missing(TimingEvent),
}

// ---------------------------------------------------------------------------
// ChunkGapStats
// ---------------------------------------------------------------------------

/// Spacing between consecutive chunk arrivals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkGapStats {
    /// Number of gaps measured (chunks − 1).
    pub count: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
}

// ---------------------------------------------------------------------------
// TimingReport
// ---------------------------------------------------------------------------

/// Summary of a session's timing, serialized next to the recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingReport {
    /// Delay between requesting capture and the first chunk arriving.
    pub start_to_first_chunk_ms: Option<i64>,
    /// Time from freezing the capture to having WAV bytes.
    pub stop_to_encode_ms: Option<i64>,
    /// How long after the stop request the last chunk was handled.
    /// Negative when nothing arrived after the request.
    pub last_chunk_after_stop_ms: Option<i64>,
    pub chunk_gaps: ChunkGapStats,
    /// Each companion event's offset from the stop request, sorted by name.
    /// Captures that ended without a request (overflow) use `StreamStop`.
    pub companion_after_stop_ms: Vec<(String, i64)>,
}

// ---------------------------------------------------------------------------
// TimingCorrelator
// ---------------------------------------------------------------------------

/// Records monotonic timestamps for [`TimingEvent`]s and compares them.
///
/// Observational only: nothing in the pipeline branches on what it holds.
///
/// ```
/// use std::time::{Duration, Instant};
/// use tap_recorder::timing::{TimingCorrelator, TimingEvent};
///
/// let mut timing = TimingCorrelator::new();
/// let t = Instant::now();
/// timing.record_at(TimingEvent::StreamStop, t);
/// timing.record_at(TimingEvent::Companion("video".into()), t + Duration::from_millis(420));
///
/// let lag = timing
///     .elapsed(&TimingEvent::StreamStop, &TimingEvent::Companion("video".into()))
///     .unwrap();
/// assert_eq!(lag, 420);
/// ```
#[derive(Debug, Default, Clone)]
pub struct TimingCorrelator {
    events: HashMap<TimingEvent, Instant>,
    last_chunk: Option<Instant>,
    gaps: ChunkGapStats,
    gap_total_ms: u64,
}

impl TimingCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event` as happening now.
    pub fn record(&mut self, event: TimingEvent) {
        self.record_at(event, Instant::now());
    }

    /// Record `event` at `at`.  A repeated event keeps the latest time.
    pub fn record_at(&mut self, event: TimingEvent, at: Instant) {
        log::trace!("timing: {event}");
        self.events.insert(event, at);
    }

    /// When `event` was recorded, if it was.
    pub fn get(&self, event: &TimingEvent) -> Option<Instant> {
        self.events.get(event).copied()
    }

    /// Signed milliseconds from `from` to `to`.
    ///
    /// Negative when `to` happened first.
    pub fn elapsed(&self, from: &TimingEvent, to: &TimingEvent) -> Result<i64, TimingError> {
        let a = self.get(from).ok_or_else(|| TimingError::Missing(from.clone()))?;
        let b = self.get(to).ok_or_else(|| TimingError::Missing(to.clone()))?;
        Ok(signed_millis(a, b))
    }

    /// Note a chunk arrival for inter-chunk gap statistics.
    pub fn record_chunk_arrival(&mut self, at: Instant) {
        if let Some(prev) = self.last_chunk {
            let gap = at.saturating_duration_since(prev).as_millis() as u64;
            let stats = &mut self.gaps;
            if stats.count == 0 {
                stats.min_ms = gap;
                stats.max_ms = gap;
            } else {
                stats.min_ms = stats.min_ms.min(gap);
                stats.max_ms = stats.max_ms.max(gap);
            }
            stats.count += 1;
            self.gap_total_ms += gap;
            stats.mean_ms = self.gap_total_ms as f64 / stats.count as f64;
        }
        self.last_chunk = Some(at);
    }

    pub fn chunk_gaps(&self) -> ChunkGapStats {
        self.gaps
    }

    /// Summarise everything recorded so far.
    pub fn report(&self) -> TimingReport {
        let stop_anchor = if self.get(&TimingEvent::StopRequested).is_some() {
            TimingEvent::StopRequested
        } else {
            TimingEvent::StreamStop
        };
        let mut companion_after_stop_ms: Vec<(String, i64)> = self
            .events
            .keys()
            .filter_map(|event| match event {
                TimingEvent::Companion(name) => self
                    .elapsed(&stop_anchor, event)
                    .ok()
                    .map(|ms| (name.clone(), ms)),
                _ => None,
            })
            .collect();
        companion_after_stop_ms.sort();

        TimingReport {
            start_to_first_chunk_ms: self
                .elapsed(&TimingEvent::StreamStart, &TimingEvent::FirstChunkReceived)
                .ok(),
            stop_to_encode_ms: self
                .elapsed(&TimingEvent::StreamStop, &TimingEvent::EncodeComplete)
                .ok(),
            last_chunk_after_stop_ms: self
                .elapsed(&TimingEvent::StopRequested, &TimingEvent::LastChunkReceived)
                .ok(),
            chunk_gaps: self.gaps,
            companion_after_stop_ms,
        }
    }
}

fn signed_millis(from: Instant, to: Instant) -> i64 {
    if to >= from {
        to.duration_since(from).as_millis() as i64
    } else {
        -(from.duration_since(to).as_millis() as i64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
