//! Replay capture source: feeds recorded base64 chunks from a text file.
//!
//! The file holds one base64 payload per line, in arrival order; blank lines
//! are skipped.  [`ReplaySource`] sends them from a dedicated OS thread,
//! optionally pacing them at a fixed interval to imitate a live microphone.
//!
//! Dropping the source, or calling [`CaptureSource::stop`], sets a stop flag
//! and joins the thread, so no chunk is sent after `stop` returns.

use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use super::capture::{AudioChunk, CaptureError, CaptureSource, ChunkSender};

// ---------------------------------------------------------------------------
// ReplaySource
// ---------------------------------------------------------------------------

/// Sends a fixed list of payloads as a chunk stream.
pub struct ReplaySource {
    payloads: Arc<Vec<String>>,
    interval: Option<Duration>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReplaySource {
    /// Replay `payloads` in order, sleeping `interval` between chunks.
    pub fn from_payloads(payloads: Vec<String>, interval: Option<Duration>) -> Self {
        Self {
            payloads: Arc::new(payloads),
            interval,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Load payloads from `path`, one per non-empty line.
    pub fn from_file(path: impl AsRef<Path>, interval: Option<Duration>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CaptureError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let payloads: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();

        log::info!("replay: loaded {} chunks from {}", payloads.len(), path.display());
        Ok(Self::from_payloads(payloads, interval))
    }

    /// Number of chunks this source will send.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// Returns `true` when there is nothing to replay.
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

impl CaptureSource for ReplaySource {
    fn start(&mut self, tx: ChunkSender) -> Result<(), CaptureError> {
        if self.thread.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        self.stop.store(false, Ordering::SeqCst);

        let payloads = Arc::clone(&self.payloads);
        let interval = self.interval;
        let stop = Arc::clone(&self.stop);

        let thread = std::thread::Builder::new()
            .name("chunk-replay".into())
            .spawn(move || {
                for (sequence, payload) in payloads.iter().enumerate() {
                    if stop.load(Ordering::SeqCst) {
                        log::debug!("replay: stopped before chunk {sequence}");
                        return;
                    }
                    if tx.send(AudioChunk::new(payload.clone(), sequence as u64)).is_err() {
                        log::debug!("replay: receiver dropped at chunk {sequence}");
                        return;
                    }
                    if let Some(interval) = interval {
                        std::thread::sleep(interval);
                    }
                }
                log::info!("replay: all {} chunks sent", payloads.len());
                // `tx` drops here, closing the channel.
            })
            .map_err(CaptureError::Spawn)?;

        self.thread = Some(thread);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("replay: capture thread panicked");
            }
        }
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<AudioChunk>) -> Vec<AudioChunk> {
        let mut out = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            out.push(chunk);
        }
        out
    }

    #[test]
    fn replays_all_payloads_in_order() {
        let mut source =
            ReplaySource::from_payloads(vec!["AQA=".into(), "AgA=".into(), "AwA=".into()], None);
        let (tx, mut rx) = mpsc::unbounded_channel();

        source.start(tx).unwrap();
        source.stop(); // joins; unpaced replay has finished or been cut short

        let chunks = drain(&mut rx);
        let sequences: Vec<u64> = chunks.iter().map(|c| c.sequence).collect();
        let expected: Vec<u64> = (0..chunks.len() as u64).collect();
        assert_eq!(sequences, expected);
    }

    #[test]
    fn channel_closes_when_replay_finishes() {
        let mut source = ReplaySource::from_payloads(vec!["AQA=".into()], None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        source.start(tx).unwrap();

        let first = rx.blocking_recv().expect("one chunk");
        assert_eq!(first.payload, "AQA=");
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn nothing_is_sent_after_stop_returns() {
        let payloads = vec!["AQA=".to_string(); 1_000];
        let mut source = ReplaySource::from_payloads(payloads, Some(Duration::from_millis(1)));
        let (tx, mut rx) = mpsc::unbounded_channel();

        source.start(tx).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        source.stop();

        let received = drain(&mut rx).len();
        assert!(received < 1_000);
        // The sender was dropped with the joined thread.
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn double_start_is_rejected() {
        let mut source = ReplaySource::from_payloads(vec![], None);
        let (tx, _rx) = mpsc::unbounded_channel();
        source.start(tx.clone()).unwrap();
        assert!(matches!(source.start(tx), Err(CaptureError::AlreadyRunning)));
    }

    #[test]
    fn from_file_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "AQA=\n\n  AgA=  \n").unwrap();

        let source = ReplaySource::from_file(file.path(), None).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.payloads.as_slice(), &["AQA=".to_string(), "AgA=".to_string()]);
    }

    #[test]
    fn from_missing_file_is_io_error() {
        let err = ReplaySource::from_file("/nonexistent/chunks.txt", None).err().unwrap();
        assert!(matches!(err, CaptureError::Io { .. }));
    }
}
