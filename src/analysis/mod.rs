//! Post-capture analysis: tap detection and chart data.
//!
//! Both run once, synchronously, over a frozen capture's metric log.

pub mod chart;
pub mod peaks;

pub use chart::{ChartData, ChartPoint};
pub use peaks::{rough_median, PeakDetector, PeakPair, DEFAULT_THRESHOLD_MULTIPLIER};
