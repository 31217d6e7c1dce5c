//! Two-tap peak detection over the per-chunk loudness log.
//!
//! ## Algorithm
//!
//! 1. Sort a copy of the loudness sums and take the element at `n / 2` as a
//!    rough median.  It is not interpolated for even `n`.
//! 2. `threshold = median * threshold_multiplier`.
//! 3. Walk the log in arrival order and keep the indices whose loudness is
//!    strictly above the threshold.
//! 4. The first two such indices are the taps; anything after them is
//!    ignored.  Fewer than two means the signal was not clear enough, which
//!    is reported as `None` rather than as an error.

use serde::Serialize;

use crate::audio::ChunkMetric;

/// Multiplier applied to the rough median when none is configured.
pub const DEFAULT_THRESHOLD_MULTIPLIER: f64 = 5.0;

// ---------------------------------------------------------------------------
// PeakPair
// ---------------------------------------------------------------------------

/// The two tap events delimiting the measured interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakPair {
    /// Metric-log index of the first tap.
    pub first: usize,
    /// Metric-log index of the second tap.
    pub second: usize,
    /// `time_offset_ms[second] - time_offset_ms[first]`.
    pub gap_ms: u64,
}

// ---------------------------------------------------------------------------
// rough_median
// ---------------------------------------------------------------------------

/// Middle element of the sorted values (`sorted[n / 2]`), or `None` if empty.
///
/// ```
/// use tap_recorder::analysis::rough_median;
///
/// assert_eq!(rough_median(&[50, 60, 55]), Some(55));
/// assert_eq!(rough_median(&[1, 2, 3, 4]), Some(3)); // upper middle, no averaging
/// assert_eq!(rough_median(&[]), None);
/// ```
pub fn rough_median(values: &[u64]) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(sorted[sorted.len() / 2])
}

// ---------------------------------------------------------------------------
// PeakDetector
// ---------------------------------------------------------------------------

/// Finds the first two loud chunks in a capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakDetector {
    threshold_multiplier: f64,
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_MULTIPLIER)
    }
}

impl PeakDetector {
    pub fn new(threshold_multiplier: f64) -> Self {
        Self {
            threshold_multiplier,
        }
    }

    pub fn threshold_multiplier(&self) -> f64 {
        self.threshold_multiplier
    }

    /// Loudness a chunk must exceed to count as a peak, or `None` for an
    /// empty log.
    pub fn threshold(&self, metrics: &[ChunkMetric]) -> Option<f64> {
        let sums: Vec<u64> = metrics.iter().map(|m| m.loudness_sum).collect();
        rough_median(&sums).map(|median| median as f64 * self.threshold_multiplier)
    }

    /// Indices of every chunk above the threshold, in arrival order.
    pub fn peak_indices(&self, metrics: &[ChunkMetric]) -> Vec<usize> {
        let Some(threshold) = self.threshold(metrics) else {
            return Vec::new();
        };
        metrics
            .iter()
            .enumerate()
            .filter(|(_, m)| m.loudness_sum as f64 > threshold)
            .map(|(i, _)| i)
            .collect()
    }

    /// Locate the two taps.
    ///
    /// Returns `None` when fewer than two chunks exceed the threshold.
    pub fn analyze(&self, metrics: &[ChunkMetric]) -> Option<PeakPair> {
        let peaks = self.peak_indices(metrics);
        let (&first, &second) = (peaks.first()?, peaks.get(1)?);

        let gap_ms = metrics[second]
            .time_offset_ms
            .saturating_sub(metrics[first].time_offset_ms);

        log::debug!(
            "peaks: {} above threshold, using {first} and {second} (gap {gap_ms} ms)",
            peaks.len()
        );
        Some(PeakPair {
            first,
            second,
            gap_ms,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
