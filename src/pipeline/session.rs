//! One capture session: the state machine around the audio pipeline.
//!
//! [`Session`] owns everything a capture produces (accumulator, frozen
//! capture, timing) and enforces the lifecycle in [`SessionState`].  It is
//! synchronous; [`SessionRunner`](super::SessionRunner) drives it from the
//! async side and moves it onto the blocking pool for
//! [`finalize`](Session::finalize).
//!
//! # Example
//!
//! ```rust
//! use tap_recorder::audio::AudioChunk;
//! use tap_recorder::pipeline::{Session, SessionConfig, SessionState};
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.start().unwrap();
//! session.ingest(&AudioChunk::new("AQD//w==", 0)).unwrap();
//! session.stop().unwrap();
//!
//! let recording = session.finalize().unwrap();
//! assert_eq!(session.state(), SessionState::Encoded);
//! assert_eq!(recording.sample_count, 2);
//! assert!(recording.peaks.is_none());
//! ```

use std::time::{Instant, SystemTime};

use thiserror::Error;

use super::state::SessionState;
use crate::analysis::{ChartData, PeakDetector, PeakPair};
use crate::audio::{
    decode, wav, AudioChunk, CaptureSnapshot, DecodeError, FrozenCapture, OverflowError,
    StreamAccumulator, WavError,
};
use crate::config::AppConfig;
use crate::output::recording_name;
use crate::timing::{TimingCorrelator, TimingEvent, TimingReport};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors surfaced by [`Session`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation is not valid in the current state.
    #[error("cannot {action} while session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    /// A chunk arrived while the session was not streaming.
    #[error("chunk {sequence} rejected: session is {state}, not streaming")]
    NotAccepting { sequence: u64, state: SessionState },

    /// The chunk payload could not be decoded.  The chunk was skipped and
    /// counted; the session keeps streaming.
    #[error("chunk {sequence} dropped: {source}")]
    Decode {
        sequence: u64,
        #[source]
        source: DecodeError,
    },

    /// The buffer is full.  The session has frozen itself into `Stopped`.
    #[error(transparent)]
    Overflow(#[from] OverflowError),

    /// The frozen capture cannot be expressed as a WAV file.
    #[error(transparent)]
    Encoding(#[from] WavError),
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Per-session parameters, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub sample_rate: u32,
    /// Buffer capacity in samples.
    pub capacity_samples: usize,
    pub threshold_multiplier: f64,
    /// Prefix for [`Recording::suggested_name`].
    pub file_stem: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SessionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            sample_rate: config.audio.sample_rate,
            capacity_samples: config.audio.capacity_samples(),
            threshold_multiplier: config.analysis.threshold_multiplier,
            file_stem: config.output.file_stem.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis / Recording
// ---------------------------------------------------------------------------

/// Result of running peak detection over a frozen capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub chart: ChartData,
    /// `None` when fewer than two chunks cleared the threshold.
    pub peaks: Option<PeakPair>,
}

/// Everything a finished session hands to a [`RecordingSink`](crate::output::RecordingSink).
#[derive(Debug, Clone)]
pub struct Recording {
    /// Complete WAV file: 44-byte header followed by the PCM payload.
    pub wav: Vec<u8>,
    pub peaks: Option<PeakPair>,
    pub chart: ChartData,
    pub timing: TimingReport,
    pub sample_count: usize,
    pub sample_rate: u32,
    pub dropped_chunks: u64,
    /// The capture ended because the buffer filled up.
    pub overflowed: bool,
    /// File name without extension, e.g. `audioData_1718000000250`.
    pub suggested_name: String,
}

impl Recording {
    /// The PCM samples, read back from the WAV payload.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.wav
            .get(wav::HEADER_LEN..)
            .unwrap_or_default()
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Recorded duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count as f32 / self.sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single capture session.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    detector: PeakDetector,
    state: SessionState,
    accumulator: Option<StreamAccumulator>,
    capture: Option<FrozenCapture>,
    timing: TimingCorrelator,
}

impl Session {
    /// `config.threshold_multiplier` must be positive; [`AppConfig::validate`]
    /// rejects anything else before a session is built from it.
    pub fn new(config: SessionConfig) -> Self {
        debug_assert!(
            config.threshold_multiplier > 0.0,
            "threshold multiplier must be positive, got {}",
            config.threshold_multiplier
        );
        Self {
            detector: PeakDetector::new(config.threshold_multiplier),
            config,
            state: SessionState::Idle,
            accumulator: None,
            capture: None,
            timing: TimingCorrelator::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn timing(&self) -> &TimingCorrelator {
        &self.timing
    }

    /// Live view of the buffer while streaming.
    pub fn snapshot(&self) -> Option<CaptureSnapshot<'_>> {
        self.accumulator.as_ref().map(StreamAccumulator::snapshot)
    }

    /// The frozen capture once stopped.
    pub fn capture(&self) -> Option<&FrozenCapture> {
        self.capture.as_ref()
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// `Idle → Streaming`.  Allocates a fresh buffer and timing record.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.expect_state("start", &[SessionState::Idle])?;

        self.accumulator = Some(StreamAccumulator::new(
            self.config.capacity_samples,
            self.config.sample_rate,
        ));
        self.capture = None;
        self.timing = TimingCorrelator::new();
        self.timing.record(TimingEvent::StreamStart);
        self.state = SessionState::Streaming;

        log::info!(
            "session: streaming (capacity {} samples @ {} Hz)",
            self.config.capacity_samples,
            self.config.sample_rate
        );
        Ok(())
    }

    /// Decode `chunk` and append it to the buffer.
    ///
    /// Returns the number of samples appended.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotAccepting`] unless streaming.
    /// - [`SessionError::Decode`] for an undecodable payload.  Non-fatal.
    /// - [`SessionError::Overflow`] when the buffer is full.  The session is
    ///   `Stopped` afterwards and the data captured so far is kept.
    pub fn ingest(&mut self, chunk: &AudioChunk) -> Result<usize, SessionError> {
        let accumulator = match self.accumulator.as_mut() {
            Some(acc) if self.state == SessionState::Streaming => acc,
            _ => {
                log::warn!(
                    "session: rejecting chunk {} while {}",
                    chunk.sequence,
                    self.state
                );
                return Err(SessionError::NotAccepting {
                    sequence: chunk.sequence,
                    state: self.state,
                });
            }
        };

        if self.timing.get(&TimingEvent::FirstChunkReceived).is_none() {
            self.timing
                .record_at(TimingEvent::FirstChunkReceived, chunk.received_at);
        }
        self.timing.record_chunk_arrival(chunk.received_at);
        self.timing
            .record_at(TimingEvent::LastChunkReceived, Instant::now());

        let decoded = match decode(&chunk.payload) {
            Ok(decoded) => decoded,
            Err(source) => {
                accumulator.record_dropped();
                log::warn!("session: dropping chunk {}: {source}", chunk.sequence);
                return Err(SessionError::Decode {
                    sequence: chunk.sequence,
                    source,
                });
            }
        };

        if decoded.truncated {
            log::debug!(
                "session: chunk {} had an odd byte count, last byte dropped",
                chunk.sequence
            );
        }

        match accumulator.append_at(&decoded.samples, decoded.loudness_sum, chunk.received_at) {
            Ok(()) => {
                log::trace!(
                    "session: chunk {} → {} samples, loudness {}",
                    chunk.sequence,
                    decoded.samples.len(),
                    decoded.loudness_sum
                );
                Ok(decoded.samples.len())
            }
            Err(err) => {
                log::error!("session: {err}; freezing capture");
                self.freeze();
                Err(SessionError::Overflow(err))
            }
        }
    }

    /// Note that stop was asked for.  Chunks already queued may still be
    /// ingested before [`Session::stop`].  Ignored unless streaming.
    pub fn request_stop(&mut self) {
        if self.state == SessionState::Streaming {
            self.timing.record(TimingEvent::StopRequested);
        }
    }

    /// `Streaming → Stopped`.  Freezes the buffer.
    pub fn stop(&mut self) -> Result<&FrozenCapture, SessionError> {
        self.expect_state("stop", &[SessionState::Streaming])?;
        Ok(self.freeze())
    }

    /// Run peak detection over the frozen capture.
    pub fn analyze(&self) -> Result<Analysis, SessionError> {
        let capture = self.frozen("analyze")?;
        let metrics = &capture.metrics;

        let threshold = self.detector.threshold(metrics);
        let peaks = self.detector.analyze(metrics);
        if peaks.is_none() {
            log::warn!(
                "session: no clear peaks detected in {} chunks",
                metrics.len()
            );
        }

        Ok(Analysis {
            chart: ChartData::from_analysis(metrics, threshold, peaks),
            peaks,
        })
    }

    /// `Stopped → Encoded`.  Produces the WAV bytes.
    ///
    /// On an encoding error the session stays `Stopped`.
    pub fn encode(&mut self) -> Result<Vec<u8>, SessionError> {
        self.expect_state("encode", &[SessionState::Stopped])?;
        let capture = self.frozen("encode")?;

        let bytes = wav::encode(&capture.samples, capture.sample_rate)?;

        self.timing.record(TimingEvent::EncodeComplete);
        self.state = SessionState::Encoded;
        log::debug!("session: encoded {} bytes", bytes.len());
        Ok(bytes)
    }

    /// Analyse and encode in one step.  `Stopped → Encoded`.
    pub fn finalize(&mut self) -> Result<Recording, SessionError> {
        self.expect_state("finalize", &[SessionState::Stopped])?;

        let analysis = self.analyze()?;
        let wav = self.encode()?;
        let capture = self.frozen("finalize")?;

        Ok(Recording {
            wav,
            peaks: analysis.peaks,
            chart: analysis.chart,
            timing: self.timing.report(),
            sample_count: capture.samples.len(),
            sample_rate: capture.sample_rate,
            dropped_chunks: capture.dropped_chunks,
            overflowed: capture.overflowed,
            suggested_name: recording_name(&self.config.file_stem, SystemTime::now()),
        })
    }

    /// Back to `Idle`, discarding the capture.  Not allowed while streaming.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.expect_state(
            "reset",
            &[
                SessionState::Idle,
                SessionState::Stopped,
                SessionState::Encoded,
            ],
        )?;
        self.clear();
        log::debug!("session: reset");
        Ok(())
    }

    /// Abandon a capture in progress.  `Streaming → Idle`.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.expect_state("cancel", &[SessionState::Streaming])?;
        self.clear();
        log::info!("session: capture cancelled");
        Ok(())
    }

    /// Timestamp an event reported by a companion pipeline.
    pub fn record_companion(&mut self, name: impl Into<String>) {
        self.timing.record(TimingEvent::Companion(name.into()));
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn expect_state(
        &self,
        action: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }

    fn frozen(&self, action: &'static str) -> Result<&FrozenCapture, SessionError> {
        self.capture
            .as_ref()
            .filter(|_| self.state.has_capture())
            .ok_or(SessionError::InvalidTransition {
                action,
                state: self.state,
            })
    }

    fn freeze(&mut self) -> &FrozenCapture {
        let capture = match self.accumulator.take() {
            Some(acc) => acc.freeze(),
            None => StreamAccumulator::new(0, self.config.sample_rate).freeze(),
        };
        self.timing.record(TimingEvent::StreamStop);
        self.state = SessionState::Stopped;

        log::info!(
            "session: stopped with {} samples ({:.2}s) in {} chunks, {} dropped",
            capture.samples.len(),
            capture.duration_secs(),
            capture.metrics.len(),
            capture.dropped_chunks
        );
        self.capture.insert(capture)
    }

    fn clear(&mut self) {
        self.accumulator = None;
        self.capture = None;
        self.timing = TimingCorrelator::new();
        self.state = SessionState::Idle;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn config(capacity_samples: usize) -> SessionConfig {
        SessionConfig {
            sample_rate: 8_000,
            capacity_samples,
            threshold_multiplier: 5.0,
            file_stem: "audioData".into(),
        }
    }

    fn payload(samples: &[i16]) -> String {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        STANDARD.encode(bytes)
    }

    fn chunk_at(samples: &[i16], sequence: u64, at: Instant) -> AudioChunk {
        AudioChunk {
            payload: payload(samples),
            sequence,
            received_at: at,
        }
    }

    fn streaming(capacity_samples: usize) -> Session {
        let mut session = Session::new(config(capacity_samples));
        session.start().expect("start");
        session
    }

    /// Quiet chunks with two loud taps at indices 2 and 6, 23 ms apart each.
    fn ingest_two_taps(session: &mut Session) {
        let t0 = Instant::now();
        for i in 0..9u64 {
            let level = if i == 2 || i == 6 { 5_000 } else { 10 };
            let chunk = chunk_at(&[level, -level], i, t0 + Duration::from_millis(i * 23));
            session.ingest(&chunk).expect("ingest");
        }
    }

    // ---- start / ingest ----------------------------------------------------

    #[test]
    fn start_enters_streaming_and_records_start() {
        let session = streaming(16);
        assert_eq!(session.state(), SessionState::Streaming);
        assert!(session.timing().get(&TimingEvent::StreamStart).is_some());
        assert_eq!(session.snapshot().map(|s| s.samples.len()), Some(0));
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut session = streaming(16);
        let err = session.start().unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                action: "start",
                state: SessionState::Streaming
            }
        ));
    }

    #[test]
    fn ingest_while_idle_is_not_accepted() {
        let mut session = Session::new(config(16));
        let err = session.ingest(&AudioChunk::new("AQA=", 3)).unwrap_err();
        assert!(matches!(
            err,
            SessionError::NotAccepting {
                sequence: 3,
                state: SessionState::Idle
            }
        ));
    }

    #[test]
    fn ingest_appends_samples_and_first_chunk_time() {
        let mut session = streaming(16);
        let t0 = Instant::now();

        assert_eq!(session.ingest(&chunk_at(&[1, -2, 3], 0, t0)).unwrap(), 3);
        assert_eq!(
            session
                .ingest(&chunk_at(&[4], 1, t0 + Duration::from_millis(40)))
                .unwrap(),
            1
        );

        let snap = session.snapshot().expect("streaming");
        assert_eq!(snap.samples, &[1, -2, 3, 4]);
        assert_eq!(snap.metrics.len(), 2);
        assert_eq!(snap.metrics[0].loudness_sum, 6);
        assert_eq!(snap.metrics[1].time_offset_ms, 40);
        assert_eq!(
            session.timing().get(&TimingEvent::FirstChunkReceived),
            Some(t0)
        );
    }

    #[test]
    fn undecodable_chunk_is_dropped_and_streaming_continues() {
        let mut session = streaming(16);

        let err = session.ingest(&AudioChunk::new("not base64!", 0)).unwrap_err();
        assert!(matches!(err, SessionError::Decode { sequence: 0, .. }));
        assert_eq!(session.state(), SessionState::Streaming);

        session.ingest(&AudioChunk::new(payload(&[7]), 1)).unwrap();
        let snap = session.snapshot().unwrap();
        assert_eq!(snap.dropped_chunks, 1);
        assert_eq!(snap.samples, &[7]);
    }

    // ---- stop --------------------------------------------------------------

    #[test]
    fn stop_freezes_and_late_chunks_are_rejected() {
        let mut session = streaming(16);
        session.ingest(&AudioChunk::new(payload(&[1, 2]), 0)).unwrap();

        let capture = session.stop().expect("stop");
        assert_eq!(capture.samples, vec![1, 2]);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.snapshot().is_none());

        let err = session
            .ingest(&AudioChunk::new(payload(&[3]), 1))
            .unwrap_err();
        assert!(matches!(err, SessionError::NotAccepting { sequence: 1, .. }));
        assert_eq!(session.capture().unwrap().samples, vec![1, 2]);
    }

    #[test]
    fn stop_when_not_streaming_is_rejected() {
        let mut session = Session::new(config(16));
        assert!(matches!(
            session.stop(),
            Err(SessionError::InvalidTransition { action: "stop", .. })
        ));
    }

    /// A chunk still queued at the stop request is kept and its lag shows
    /// up in the timing report.
    #[test]
    fn chunk_after_stop_request_is_kept_and_timed() {
        let mut session = streaming(16);
        session.ingest(&AudioChunk::new(payload(&[1]), 0)).unwrap();
        session.request_stop();
        let requested = session.timing().get(&TimingEvent::StopRequested).unwrap();
        session.ingest(&AudioChunk::new(payload(&[2]), 1)).unwrap();

        let last = session.timing().get(&TimingEvent::LastChunkReceived).unwrap();
        assert!(last >= requested);

        assert_eq!(session.stop().unwrap().samples, vec![1, 2]);
        let recording = session.finalize().unwrap();
        assert!(recording.timing.last_chunk_after_stop_ms.is_some_and(|ms| ms >= 0));
    }

    #[test]
    fn stop_request_is_ignored_unless_streaming() {
        let mut session = Session::new(config(16));
        session.request_stop();
        assert!(session.timing().get(&TimingEvent::StopRequested).is_none());
    }

    // ---- Overflow ----------------------------------------------------------

    #[test]
    fn overflow_freezes_session_and_keeps_data() {
        let mut session = streaming(4);
        session.ingest(&AudioChunk::new(payload(&[1, 2, 3]), 0)).unwrap();

        let err = session
            .ingest(&AudioChunk::new(payload(&[4, 5]), 1))
            .unwrap_err();
        match err {
            SessionError::Overflow(overflow) => {
                assert_eq!(overflow.chunk_index, 1);
                assert_eq!(overflow.attempted_samples, 2);
                assert_eq!(overflow.buffered_samples, 3);
                assert_eq!(overflow.capacity_samples, 4);
            }
            other => panic!("expected overflow, got {other:?}"),
        }

        assert_eq!(session.state(), SessionState::Stopped);
        let capture = session.capture().expect("frozen");
        assert_eq!(capture.samples, vec![1, 2, 3]);
        assert!(capture.overflowed);

        let recording = session.finalize().expect("finalize after overflow");
        assert!(recording.overflowed);
        assert_eq!(recording.sample_count, 3);
    }

    // ---- analyze / encode / finalize ---------------------------------------

    #[test]
    fn analyze_requires_frozen_capture() {
        let session = streaming(16);
        assert!(matches!(
            session.analyze(),
            Err(SessionError::InvalidTransition {
                action: "analyze",
                state: SessionState::Streaming
            })
        ));
    }

    #[test]
    fn analyze_finds_two_taps() {
        let mut session = streaming(64);
        ingest_two_taps(&mut session);
        session.stop().unwrap();

        let analysis = session.analyze().expect("analyze");
        assert_eq!(
            analysis.peaks,
            Some(PeakPair {
                first: 2,
                second: 6,
                gap_ms: 92
            })
        );
        assert_eq!(analysis.chart.points.len(), 9);
        assert_eq!(analysis.chart.threshold, Some(100.0));
    }

    #[test]
    fn encode_moves_to_encoded_and_only_once() {
        let mut session = streaming(16);
        session.ingest(&AudioChunk::new(payload(&[1, -1]), 0)).unwrap();
        session.stop().unwrap();

        let bytes = session.encode().expect("encode");
        assert_eq!(bytes.len(), wav::HEADER_LEN + 4);
        assert_eq!(session.state(), SessionState::Encoded);
        assert!(session.timing().get(&TimingEvent::EncodeComplete).is_some());

        assert!(matches!(
            session.encode(),
            Err(SessionError::InvalidTransition { action: "encode", .. })
        ));
        // Analysis stays available after encoding.
        assert!(session.analyze().is_ok());
    }

    #[test]
    fn encoding_error_leaves_session_stopped() {
        let mut session = Session::new(SessionConfig {
            sample_rate: u32::MAX,
            ..config(16)
        });
        session.start().unwrap();
        session.ingest(&AudioChunk::new(payload(&[1]), 0)).unwrap();
        session.stop().unwrap();

        let err = session.finalize().unwrap_err();
        assert!(matches!(err, SessionError::Encoding(_)));
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.timing().get(&TimingEvent::EncodeComplete).is_none());
    }

    #[test]
    fn finalize_produces_complete_recording() {
        let mut session = streaming(64);
        ingest_two_taps(&mut session);
        session.stop().unwrap();
        session.record_companion("video_ready");

        let recording = session.finalize().expect("finalize");
        assert_eq!(session.state(), SessionState::Encoded);
        assert_eq!(recording.sample_count, 18);
        assert_eq!(recording.sample_rate, 8_000);
        assert_eq!(recording.peaks.map(|p| p.gap_ms), Some(92));
        assert!(recording.suggested_name.starts_with("audioData_"));
        assert!(recording.timing.stop_to_encode_ms.is_some());
        assert_eq!(recording.timing.chunk_gaps.count, 8);
        assert_eq!(recording.timing.companion_after_stop_ms.len(), 1);

        let mut reader = hound::WavReader::new(Cursor::new(recording.wav.clone())).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, recording.samples().collect::<Vec<_>>());
        assert_eq!(decoded[4], 5_000);
        assert_eq!(decoded[5], -5_000);
    }

    #[test]
    fn finalize_without_taps_has_no_peaks() {
        let mut session = streaming(16);
        session.ingest(&AudioChunk::new(payload(&[3, 3]), 0)).unwrap();
        session.stop().unwrap();

        let recording = session.finalize().unwrap();
        assert!(recording.peaks.is_none());
        assert!(recording.chart.first_peak.is_none());
    }

    #[test]
    fn empty_capture_still_encodes() {
        let mut session = streaming(16);
        session.stop().unwrap();

        let recording = session.finalize().unwrap();
        assert_eq!(recording.wav.len(), wav::HEADER_LEN);
        assert_eq!(recording.samples().count(), 0);
    }

    // ---- reset / cancel ----------------------------------------------------

    #[test]
    fn reset_is_rejected_while_streaming() {
        let mut session = streaming(16);
        assert!(matches!(
            session.reset(),
            Err(SessionError::InvalidTransition {
                action: "reset",
                state: SessionState::Streaming
            })
        ));
    }

    #[test]
    fn reset_from_stopped_and_encoded_discards_capture() {
        let mut session = streaming(16);
        session.stop().unwrap();
        session.reset().expect("reset from stopped");
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.capture().is_none());

        session.start().unwrap();
        session.stop().unwrap();
        session.encode().unwrap();
        session.reset().expect("reset from encoded");
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.timing().get(&TimingEvent::StreamStart).is_none());

        session.reset().expect("reset from idle");
    }

    #[test]
    fn cancel_only_while_streaming() {
        let mut session = Session::new(config(16));
        assert!(matches!(
            session.cancel(),
            Err(SessionError::InvalidTransition { action: "cancel", .. })
        ));

        session.start().unwrap();
        session.ingest(&AudioChunk::new(payload(&[1]), 0)).unwrap();
        session.cancel().expect("cancel");
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.capture().is_none());
        assert!(session.snapshot().is_none());

        session.start().unwrap();
        session.stop().unwrap();
        assert!(session.cancel().is_err());
    }

    #[test]
    fn invalid_operations_from_idle() {
        let mut session = Session::new(config(16));
        assert!(session.stop().is_err());
        assert!(session.analyze().is_err());
        assert!(session.encode().is_err());
        assert!(session.finalize().is_err());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn config_from_app_config() {
        let cfg = SessionConfig::from(&AppConfig::default());
        assert_eq!(cfg.sample_rate, 44_100);
        assert_eq!(cfg.capacity_samples, 44_100 * 600);
        assert_eq!(cfg.threshold_multiplier, 5.0);
        assert_eq!(cfg.file_stem, "audioData");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "threshold multiplier must be positive")]
    fn non_positive_multiplier_is_rejected() {
        Session::new(SessionConfig {
            threshold_multiplier: 0.0,
            ..config(16)
        });
    }
}
