//! Canonical PCM-WAV encoding (mono, 16-bit, little-endian).
//!
//! Layout written by [`encode`]:
//!
//! | Offset | Field          | Value                 |
//! |--------|----------------|-----------------------|
//! | 0      | ChunkID        | `"RIFF"`              |
//! | 4      | ChunkSize      | `36 + data_bytes`     |
//! | 8      | Format         | `"WAVE"`              |
//! | 12     | Subchunk1ID    | `"fmt "`              |
//! | 16     | Subchunk1Size  | `16`                  |
//! | 20     | AudioFormat    | `1` (PCM)             |
//! | 22     | NumChannels    | `1`                   |
//! | 24     | SampleRate     | given                 |
//! | 28     | ByteRate       | `sample_rate * 2`     |
//! | 32     | BlockAlign     | `2`                   |
//! | 34     | BitsPerSample  | `16`                  |
//! | 36     | Subchunk2ID    | `"data"`              |
//! | 40     | Subchunk2Size  | `samples * 2`         |
//! | 44..   | payload        | `i16` little-endian   |

use thiserror::Error;

/// Size of the canonical header in bytes.
pub const HEADER_LEN: usize = 44;

const PCM_FORMAT: u16 = 1;
const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;
const FMT_CHUNK_LEN: u32 = 16;
/// Bytes of the RIFF chunk that precede the payload, excluding the
/// `"RIFF"` id and the size field itself.
const RIFF_OVERHEAD: u32 = 36;

// ---------------------------------------------------------------------------
// WavError
// ---------------------------------------------------------------------------

/// Reasons a capture cannot be written as canonical WAV.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WavError {
    /// Payload too large for the 32-bit size fields.
    #[error(
        "cannot encode {sample_count} samples: {data_bytes} data bytes exceed the 32-bit WAV size fields"
    )]
    EncodingOverflow { sample_count: usize, data_bytes: u64 },

    /// `sample_rate * 2` does not fit the ByteRate field.
    #[error("sample rate {sample_rate} Hz overflows the WAV byte-rate field")]
    ByteRateOverflow { sample_rate: u32 },

    /// Input to [`WavHeader::parse`] is not a canonical mono 16-bit header.
    #[error("not a canonical PCM WAV header: {0}")]
    Malformed(&'static str),
}

// ---------------------------------------------------------------------------
// WavHeader
// ---------------------------------------------------------------------------

/// Field values of a canonical 44-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub chunk_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_bytes: u32,
}

impl WavHeader {
    /// Compute the header for `sample_count` mono samples at `sample_rate`.
    ///
    /// # Errors
    ///
    /// [`WavError::EncodingOverflow`] when either size field would exceed
    /// `u32::MAX`, [`WavError::ByteRateOverflow`] when the byte rate would.
    pub fn for_samples(sample_count: usize, sample_rate: u32) -> Result<Self, WavError> {
        let data_bytes_wide = (sample_count as u64).saturating_mul(u64::from(BLOCK_ALIGN));
        let overflow = WavError::EncodingOverflow {
            sample_count,
            data_bytes: data_bytes_wide,
        };

        let data_bytes = u32::try_from(data_bytes_wide).map_err(|_| overflow.clone())?;
        let chunk_size = data_bytes.checked_add(RIFF_OVERHEAD).ok_or(overflow)?;
        let byte_rate = sample_rate
            .checked_mul(u32::from(BLOCK_ALIGN))
            .ok_or(WavError::ByteRateOverflow { sample_rate })?;

        Ok(Self {
            chunk_size,
            audio_format: PCM_FORMAT,
            channels: CHANNELS,
            sample_rate,
            byte_rate,
            block_align: BLOCK_ALIGN,
            bits_per_sample: BITS_PER_SAMPLE,
            data_bytes,
        })
    }

    /// Append the 44 header bytes to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&self.chunk_size.to_le_bytes());
        out.extend_from_slice(b"WAVE");

        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        out.extend_from_slice(&self.audio_format.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.byte_rate.to_le_bytes());
        out.extend_from_slice(&self.block_align.to_le_bytes());
        out.extend_from_slice(&self.bits_per_sample.to_le_bytes());

        out.extend_from_slice(b"data");
        out.extend_from_slice(&self.data_bytes.to_le_bytes());
    }

    /// Read back a header produced by [`write_to`](Self::write_to).
    pub fn parse(bytes: &[u8]) -> Result<Self, WavError> {
        if bytes.len() < HEADER_LEN {
            return Err(WavError::Malformed("shorter than 44 bytes"));
        }
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(WavError::Malformed("missing RIFF/WAVE tags"));
        }
        if &bytes[12..16] != b"fmt " || u32_at(16) != FMT_CHUNK_LEN {
            return Err(WavError::Malformed("unexpected fmt chunk"));
        }
        if &bytes[36..40] != b"data" {
            return Err(WavError::Malformed("data chunk does not follow fmt"));
        }

        Ok(Self {
            chunk_size: u32_at(4),
            audio_format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_bytes: u32_at(40),
        })
    }
}

// ---------------------------------------------------------------------------
// encode
// ---------------------------------------------------------------------------

/// Encode mono 16-bit samples as a canonical WAV byte sequence.
///
/// Pure and deterministic: the same input always yields the same bytes.
///
/// ```rust
/// use tap_recorder::audio::wav::{encode, HEADER_LEN};
///
/// let bytes = encode(&[1, -1], 8_000).unwrap();
/// assert_eq!(bytes.len(), HEADER_LEN + 4);
/// assert_eq!(&bytes[0..4], b"RIFF");
/// assert_eq!(&bytes[44..], &[0x01, 0x00, 0xff, 0xff]);
/// ```
pub fn encode(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, WavError> {
    let header = WavHeader::for_samples(samples.len(), sample_rate)?;

    let mut out = Vec::with_capacity(HEADER_LEN + header.data_bytes as usize);
    header.write_to(&mut out);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
