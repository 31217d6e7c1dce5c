//! Fixed-capacity, append-only sample buffer.
//!
//! The capacity is reserved once, up front.  Writing past it is an error:
//! the buffer never overwrites, wraps or reallocates, so everything captured
//! before the failed write stays intact.
//!
//! # Example
//!
//! ```rust
//! use tap_recorder::audio::SampleBuffer;
//!
//! let mut buf = SampleBuffer::<i16>::new(4);
//! buf.try_extend(&[1, 2, 3]).unwrap();
//! assert!(buf.try_extend(&[4, 5]).is_err()); // would exceed capacity
//! assert_eq!(buf.as_slice(), &[1, 2, 3]);    // nothing partially written
//! ```

use thiserror::Error;

// ---------------------------------------------------------------------------
// CapacityExceeded
// ---------------------------------------------------------------------------

/// A write was refused because it would not fit.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot append {attempted} samples: {len} of {capacity} already used")]
pub struct CapacityExceeded {
    pub attempted: usize,
    pub len: usize,
    pub capacity: usize,
}

// ---------------------------------------------------------------------------
// SampleBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity buffer of `Copy` samples.
///
/// ## Overflow behaviour
///
/// [`try_extend`](Self::try_extend) either writes the whole slice or nothing.
/// `len() <= capacity()` always holds.
#[derive(Debug)]
pub struct SampleBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
}

impl<T: Copy> SampleBuffer<T> {
    /// Create an empty buffer able to hold `capacity` samples.
    ///
    /// The backing storage is reserved immediately.  A zero capacity is
    /// allowed; every non-empty write to it fails.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append all of `data` at the write cursor.
    ///
    /// # Errors
    ///
    /// [`CapacityExceeded`] if `len() + data.len() > capacity()`; the buffer
    /// is left unchanged.
    pub fn try_extend(&mut self, data: &[T]) -> Result<(), CapacityExceeded> {
        if data.len() > self.remaining() {
            return Err(CapacityExceeded {
                attempted: data.len(),
                len: self.buf.len(),
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Samples written so far, in order.
    pub fn as_slice(&self) -> &[T] {
        &self.buf
    }

    /// Consume the buffer, returning the written samples.
    pub fn into_vec(self) -> Vec<T> {
        self.buf
    }

    /// Number of samples written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Maximum number of samples the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples that can still be written.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Returns `true` when no more samples fit.
    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    /// Duration of the written audio in seconds, assuming `sample_rate` Hz mono.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.buf.len() as f32 / sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Appending within capacity -----------------------------------------

    #[test]
    fn extend_within_capacity() {
        let mut buf = SampleBuffer::new(8);
        buf.try_extend(&[1_i16, 2, 3]).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.remaining(), 5);
        assert!(!buf.is_full());
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn extend_exactly_to_capacity() {
        let mut buf = SampleBuffer::new(4);
        buf.try_extend(&[1_i16, 2]).unwrap();
        buf.try_extend(&[3, 4]).unwrap();
        assert!(buf.is_full());
        assert_eq!(buf.into_vec(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn empty_extend_always_succeeds() {
        let mut buf: SampleBuffer<i16> = SampleBuffer::new(0);
        buf.try_extend(&[]).unwrap();
        assert!(buf.is_empty());
        assert!(buf.is_full());
    }

    // ---- Overflow (no partial write) ---------------------------------------

    #[test]
    fn overflow_by_one_is_rejected_whole() {
        let mut buf = SampleBuffer::new(4);
        buf.try_extend(&[1_i16, 2, 3]).unwrap();

        let err = buf.try_extend(&[4, 5]).unwrap_err();
        assert_eq!(
            err,
            CapacityExceeded {
                attempted: 2,
                len: 3,
                capacity: 4
            }
        );
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn full_buffer_rejects_any_write() {
        let mut buf = SampleBuffer::new(2);
        buf.try_extend(&[1_i16, 2]).unwrap();
        assert!(buf.try_extend(&[3]).is_err());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn oversized_first_write_leaves_buffer_empty() {
        let mut buf = SampleBuffer::new(3);
        assert!(buf.try_extend(&[0_i16; 10]).is_err());
        assert!(buf.is_empty());
    }

    // ---- Capacity / duration helpers ---------------------------------------

    #[test]
    fn capacity_reported_correctly() {
        let buf: SampleBuffer<i16> = SampleBuffer::new(44_100 * 600);
        assert_eq!(buf.capacity(), 26_460_000);
    }

    #[test]
    fn duration_secs_calculation() {
        let mut buf = SampleBuffer::new(44_100);
        buf.try_extend(&vec![0_i16; 22_050]).unwrap();
        assert!((buf.duration_secs(44_100) - 0.5).abs() < 1e-6);
        assert_eq!(buf.duration_secs(0), 0.0);
    }

    #[test]
    fn error_display_names_counts() {
        let err = CapacityExceeded {
            attempted: 512,
            len: 1000,
            capacity: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("512") && msg.contains("1000") && msg.contains("1024"), "{msg}");
    }
}
