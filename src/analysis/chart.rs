//! Visualization payload for the loudness scatter chart.
//!
//! [`ChartData`] is what the chart renderer receives after a capture: one
//! point per chunk (index on x, loudness sum on y), the threshold line, and
//! the two tap markers when they were found.  It serializes to JSON with
//! camelCase keys so a web-view renderer can consume it as-is.
//!
//! # Example
//!
//! ```rust
//! use tap_recorder::analysis::{ChartData, PeakDetector};
//! use tap_recorder::audio::ChunkMetric;
//!
//! let log: Vec<ChunkMetric> = [100, 100, 5_000, 100, 100, 6_000, 100]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, &s)| ChunkMetric::new(s, i as u64 * 23))
//!     .collect();
//!
//! let chart = ChartData::build(&log, &PeakDetector::default());
//! assert_eq!(chart.points.len(), 7);
//! assert_eq!(chart.first_peak, Some(2));
//! assert_eq!(chart.second_peak, Some(5));
//! ```

use serde::Serialize;

use super::peaks::{PeakDetector, PeakPair};
use crate::audio::ChunkMetric;

// ---------------------------------------------------------------------------
// ChartPoint
// ---------------------------------------------------------------------------

/// One scatter point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    /// Chunk index in arrival order.
    pub x: usize,
    /// Loudness sum of that chunk.
    pub y: u64,
    /// Arrival offset, for tooltips.
    pub time_ms: u64,
}

// ---------------------------------------------------------------------------
// ChartData
// ---------------------------------------------------------------------------

/// Everything the loudness chart needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub points: Vec<ChartPoint>,
    /// Peak threshold, `None` for an empty capture.
    pub threshold: Option<f64>,
    pub first_peak: Option<usize>,
    pub second_peak: Option<usize>,
    /// Milliseconds between the two peaks.
    pub gap_ms: Option<u64>,
}

impl ChartData {
    /// Run `detector` over `metrics` and package the result.
    pub fn build(metrics: &[ChunkMetric], detector: &PeakDetector) -> Self {
        Self::from_analysis(metrics, detector.threshold(metrics), detector.analyze(metrics))
    }

    /// Package an analysis that has already been run.
    pub fn from_analysis(
        metrics: &[ChunkMetric],
        threshold: Option<f64>,
        peaks: Option<PeakPair>,
    ) -> Self {
        let points = metrics
            .iter()
            .enumerate()
            .map(|(x, m)| ChartPoint {
                x,
                y: m.loudness_sum,
                time_ms: m.time_offset_ms,
            })
            .collect();

        Self {
            points,
            threshold,
            first_peak: peaks.map(|p| p.first),
            second_peak: peaks.map(|p| p.second),
            gap_ms: peaks.map(|p| p.gap_ms),
        }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` when there are no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Loudest chunk, useful for scaling the y axis.
    pub fn max_loudness(&self) -> u64 {
        self.points.iter().map(|p| p.y).max().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
