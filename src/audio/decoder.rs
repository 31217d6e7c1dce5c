//! Chunk decoding: base64 payload → 16-bit PCM samples + loudness sum.
//!
//! The capture source delivers mono 16-bit little-endian PCM wrapped in
//! standard base64.  [`decode`] unwraps one payload into signed samples and
//! sums their absolute values; that sum is the per-chunk loudness metric
//! used by [`crate::analysis::PeakDetector`].
//!
//! # Example
//!
//! ```rust
//! use tap_recorder::audio::decode;
//!
//! // bytes: 01 00 | ff ff  →  samples [1, -1]
//! let chunk = decode("AQD//w==").unwrap();
//! assert_eq!(chunk.samples, vec![1, -1]);
//! assert_eq!(chunk.loudness_sum, 2);
//! assert!(!chunk.truncated);
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// A chunk payload could not be turned into PCM bytes.
///
/// Never fatal to a session: the chunk is skipped and counted as dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("chunk payload is not valid base64: {source}")]
    InvalidPayload {
        #[source]
        source: base64::DecodeError,
    },
}

// ---------------------------------------------------------------------------
// DecodedChunk
// ---------------------------------------------------------------------------

/// PCM content of one decoded chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedChunk {
    /// Signed 16-bit samples in arrival order.
    pub samples: Vec<i16>,
    /// Sum of `|sample|` over the chunk.
    pub loudness_sum: u64,
    /// `true` when the decoded byte count was odd and the last byte was
    /// discarded.
    pub truncated: bool,
}

// ---------------------------------------------------------------------------
// decode
// ---------------------------------------------------------------------------

/// Decode a base64 payload into PCM samples.
///
/// ASCII whitespace inside the payload (line wrapping) is ignored.  Bytes are
/// paired as `(low, high)` little-endian; an odd trailing byte is dropped and
/// reported through [`DecodedChunk::truncated`] rather than as an error.
///
/// # Errors
///
/// [`DecodeError::InvalidPayload`] when the payload is not valid base64.
pub fn decode(payload: &str) -> Result<DecodedChunk, DecodeError> {
    let decoded = if payload.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD.decode(compact)
    } else {
        STANDARD.decode(payload)
    };
    let bytes = decoded.map_err(|source| DecodeError::InvalidPayload { source })?;

    Ok(decode_pcm_bytes(&bytes))
}

/// Pair raw little-endian bytes into samples and compute the loudness sum.
pub fn decode_pcm_bytes(bytes: &[u8]) -> DecodedChunk {
    let pairs = bytes.chunks_exact(2);
    let truncated = !pairs.remainder().is_empty();

    let mut loudness_sum: u64 = 0;
    let samples: Vec<i16> = pairs
        .map(|pair| {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            loudness_sum += u64::from(sample.unsigned_abs());
            sample
        })
        .collect();

    DecodedChunk {
        samples,
        loudness_sum,
        truncated,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
