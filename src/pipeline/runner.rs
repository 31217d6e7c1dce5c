//! Session runner: drives one [`Session`] from commands and captured chunks.
//!
//! [`SessionRunner`] owns the session, the capture source and the sink, and
//! reacts to [`SessionCommand`]s received over a `tokio::sync::mpsc` channel.
//! Progress is reported as [`SessionEvent`]s and mirrored into a
//! [`SharedStatus`].
//!
//! # Flow
//!
//! ```text
//! SessionCommand::Start
//!   └─▶ session.start, open chunk channel, source.start(tx)      [Streaming]
//!
//! AudioChunk (chunk channel)
//!   └─▶ session.ingest
//!         ├─ decode error → ChunkDropped, keep streaming
//!         └─ overflow     → Overflow, finish capture (below)
//!
//! SessionCommand::Stop  /  time limit reached
//!   └─▶ session.request_stop → source.stop → drain queued chunks
//!         └─▶ session.stop                                      [Stopped]
//!               └─▶ spawn_blocking(session.finalize)            [Encoded]
//!                     └─▶ sink.persist → Saved
//! ```
//!
//! Chunks and commands are handled by the same loop, so no command can
//! observe the buffer halfway through an append.

use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use crate::analysis::{ChartData, PeakPair};
use crate::audio::{AudioChunk, CaptureSource, OverflowError};
use crate::config::RecordingConfig;
use crate::output::RecordingSink;

use super::session::{Recording, Session, SessionError};
use super::state::SharedStatus;

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

/// Requests accepted by [`SessionRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Begin a new capture.
    Start,
    /// Stop the capture, then analyse, encode and persist it.
    Stop,
    /// Abandon the capture in progress.
    Cancel,
    /// Discard a finished capture and return to idle.
    Reset,
    /// A companion pipeline reached the named milestone.
    Companion(String),
}

/// Progress notifications emitted by the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    /// A chunk could not be decoded and was skipped.
    ChunkDropped { sequence: u64 },
    /// The time limit is approaching.
    TimeWarning { remaining_secs: u64 },
    /// The capture source closed its channel on its own.
    CaptureEnded,
    /// The buffer filled up; the capture is being finished early.
    Overflow { error: OverflowError },
    Stopped {
        samples: usize,
        chunks: usize,
        dropped: u64,
    },
    Analyzed {
        chart: ChartData,
        peaks: Option<PeakPair>,
    },
    Saved { path: PathBuf },
    Error { message: String },
    /// The session is back to idle.
    Reset,
}

// ---------------------------------------------------------------------------
// SessionRunner
// ---------------------------------------------------------------------------

/// Async driver for a single [`Session`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use tap_recorder::audio::ReplaySource;
/// use tap_recorder::config::AppConfig;
/// use tap_recorder::output::FileSink;
/// use tap_recorder::pipeline::{
///     new_shared_status, Session, SessionCommand, SessionConfig, SessionRunner,
/// };
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let source = ReplaySource::from_file("chunks.txt", None).unwrap();
/// let (event_tx, mut event_rx) = mpsc::unbounded_channel();
///
/// let runner = SessionRunner::new(
///     Session::new(SessionConfig::from(&config)),
///     Box::new(source),
///     Arc::new(FileSink::from_config(&config.output)),
///     config.recording.clone(),
///     new_shared_status(),
///     event_tx,
/// );
///
/// let (cmd_tx, cmd_rx) = mpsc::channel(16);
/// tokio::spawn(runner.run(cmd_rx));
/// cmd_tx.send(SessionCommand::Start).await.unwrap();
/// while let Some(event) = event_rx.recv().await {
///     println!("{event:?}");
/// }
/// # }
/// ```
pub struct SessionRunner {
    session: Session,
    source: Box<dyn CaptureSource>,
    sink: Arc<dyn RecordingSink>,
    limits: RecordingConfig,
    status: SharedStatus,
    events: mpsc::UnboundedSender<SessionEvent>,
    chunks: Option<mpsc::UnboundedReceiver<AudioChunk>>,
    warning_at: Option<Instant>,
    deadline: Option<Instant>,
}

impl SessionRunner {
    pub fn new(
        session: Session,
        source: Box<dyn CaptureSource>,
        sink: Arc<dyn RecordingSink>,
        limits: RecordingConfig,
        status: SharedStatus,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            session,
            source,
            sink,
            limits,
            status,
            events,
            chunks: None,
            warning_at: None,
            deadline: None,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `commands` is closed.
    ///
    /// A capture still streaming at that point is cancelled.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                chunk = next_chunk(&mut self.chunks) => match chunk {
                    Some(chunk) => {
                        if self.accept_chunk(chunk).is_break() {
                            self.finish_capture().await;
                        }
                    }
                    None => self.handle_capture_ended(),
                },
                _ = sleep_until(self.warning_at) => self.handle_time_warning(),
                _ = sleep_until(self.deadline) => {
                    log::info!(
                        "runner: recording limit of {}s reached, stopping",
                        self.limits.max_recording_secs
                    );
                    self.handle_stop().await;
                }
            }
        }

        if self.session.state().is_active() {
            self.source.stop();
            self.chunks = None;
            let _ = self.session.cancel();
            self.publish_status();
        }
        log::info!("runner: command channel closed, shutting down");
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    async fn handle_command(&mut self, command: SessionCommand) {
        log::debug!("runner: {command:?} while {}", self.session.state());
        match command {
            SessionCommand::Start => self.handle_start(),
            SessionCommand::Stop => self.handle_stop().await,
            SessionCommand::Cancel => self.handle_cancel(),
            SessionCommand::Reset => match self.session.reset() {
                Ok(()) => {
                    self.publish_status();
                    self.emit(SessionEvent::Reset);
                }
                Err(e) => self.report_error(e.to_string()),
            },
            SessionCommand::Companion(name) => self.session.record_companion(name),
        }
    }

    fn handle_start(&mut self) {
        if let Err(e) = self.session.start() {
            self.report_error(e.to_string());
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = self.source.start(tx) {
            let _ = self.session.cancel();
            self.report_error(format!("capture source failed to start: {e}"));
            return;
        }
        self.chunks = Some(rx);
        self.arm_time_limit();

        if let Ok(mut st) = self.status.lock() {
            st.last_error = None;
            st.last_saved = None;
        }
        self.publish_status();
        self.emit(SessionEvent::Started);
    }

    /// Stop protocol: silence the source, drain what it already queued,
    /// then freeze.
    async fn handle_stop(&mut self) {
        if !self.session.state().is_active() {
            let err = SessionError::InvalidTransition {
                action: "stop",
                state: self.session.state(),
            };
            self.report_error(err.to_string());
            return;
        }

        self.session.request_stop();
        self.source.stop();
        let mut drained = 0usize;
        while let Some(chunk) = self.chunks.as_mut().and_then(|rx| rx.try_recv().ok()) {
            drained += 1;
            if self.accept_chunk(chunk).is_break() {
                break;
            }
        }
        if drained > 0 {
            log::debug!("runner: drained {drained} queued chunks at stop");
        }

        self.finish_capture().await;
    }

    fn handle_cancel(&mut self) {
        if !self.session.state().is_active() {
            let err = SessionError::InvalidTransition {
                action: "cancel",
                state: self.session.state(),
            };
            self.report_error(err.to_string());
            return;
        }

        self.source.stop();
        self.chunks = None;
        self.disarm_time_limit();
        match self.session.cancel() {
            Ok(()) => {
                self.publish_status();
                self.emit(SessionEvent::Reset);
            }
            Err(e) => self.report_error(e.to_string()),
        }
    }

    // -----------------------------------------------------------------------
    // Chunk handling
    // -----------------------------------------------------------------------

    /// Feed one chunk to the session.  `Break` means the capture is over.
    fn accept_chunk(&mut self, chunk: AudioChunk) -> ControlFlow<()> {
        let flow = match self.session.ingest(&chunk) {
            Ok(_) => ControlFlow::Continue(()),
            Err(SessionError::Decode { sequence, .. }) => {
                self.emit(SessionEvent::ChunkDropped { sequence });
                ControlFlow::Continue(())
            }
            Err(SessionError::Overflow(error)) => {
                self.emit(SessionEvent::Overflow { error });
                ControlFlow::Break(())
            }
            Err(e) => {
                log::warn!("runner: {e}");
                ControlFlow::Continue(())
            }
        };
        self.publish_status();
        flow
    }

    fn handle_capture_ended(&mut self) {
        log::info!("runner: capture source ended");
        self.chunks = None;
        self.emit(SessionEvent::CaptureEnded);
    }

    fn handle_time_warning(&mut self) {
        self.warning_at = None;
        let remaining_secs = self
            .deadline
            .map(|d| {
                let left = d.saturating_duration_since(Instant::now());
                left.as_secs_f64().ceil() as u64
            })
            .unwrap_or(0);
        log::warn!("runner: {remaining_secs}s of recording time left");
        self.emit(SessionEvent::TimeWarning { remaining_secs });
    }

    // -----------------------------------------------------------------------
    // Finishing
    // -----------------------------------------------------------------------

    /// Close the capture, freeze the session if it is still streaming, then
    /// finalize and persist.
    async fn finish_capture(&mut self) {
        self.source.stop();
        if let Some(mut rx) = self.chunks.take() {
            let mut discarded = 0usize;
            while rx.try_recv().is_ok() {
                discarded += 1;
            }
            if discarded > 0 {
                log::warn!("runner: discarded {discarded} chunks after capture ended");
            }
        }
        self.disarm_time_limit();

        if self.session.state().is_active() {
            if let Err(e) = self.session.stop() {
                self.report_error(e.to_string());
                return;
            }
        }

        let Some(capture) = self.session.capture() else {
            self.report_error("no frozen capture to finalize".into());
            return;
        };
        let stopped = SessionEvent::Stopped {
            samples: capture.samples.len(),
            chunks: capture.metrics.len(),
            dropped: capture.dropped_chunks,
        };
        self.publish_status();
        self.emit(stopped);

        self.finalize().await;
    }

    async fn finalize(&mut self) {
        // The session moves onto the blocking pool and comes back with the
        // result; a placeholder holds its slot meanwhile.
        let placeholder = Session::new(self.session.config().clone());
        let session = std::mem::replace(&mut self.session, placeholder);

        let recording = match finalize_off_thread(session, Session::finalize).await {
            Ok((session, outcome)) => {
                self.session = session;
                self.publish_status();
                match outcome {
                    Ok(Ok(recording)) => recording,
                    Ok(Err(e)) => {
                        self.report_error(e.to_string());
                        return;
                    }
                    Err(payload) => {
                        self.report_error(format!(
                            "finalize panicked, capture kept: {}",
                            panic_message(&*payload)
                        ));
                        return;
                    }
                }
            }
            Err(e) => {
                self.publish_status();
                self.report_error(format!("finalize task failed: {e}"));
                return;
            }
        };

        if recording.peaks.is_none() {
            log::warn!("runner: no clear peaks detected");
        }
        self.emit(SessionEvent::Analyzed {
            chart: recording.chart.clone(),
            peaks: recording.peaks,
        });

        match self.sink.persist(&recording).await {
            Ok(path) => {
                if let Ok(mut st) = self.status.lock() {
                    st.last_saved = Some(path.clone());
                }
                self.emit(SessionEvent::Saved { path });
            }
            Err(e) => self.report_error(format!("failed to save recording: {e}")),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn arm_time_limit(&mut self) {
        self.disarm_time_limit();
        let max = self.limits.max_recording_secs;
        if max == 0 {
            return;
        }
        let deadline = Instant::now() + Duration::from_secs(max);
        self.deadline = Some(deadline);

        let warn = self.limits.warning_secs;
        if warn > 0 && warn < max {
            self.warning_at = Some(deadline - Duration::from_secs(warn));
        }
    }

    fn disarm_time_limit(&mut self) {
        self.warning_at = None;
        self.deadline = None;
    }

    fn publish_status(&self) {
        let Ok(mut st) = self.status.lock() else {
            return;
        };
        st.state = self.session.state();
        let (samples, chunks, dropped, rate) = if let Some(snap) = self.session.snapshot() {
            (
                snap.samples.len(),
                snap.metrics.len(),
                snap.dropped_chunks,
                snap.sample_rate,
            )
        } else if let Some(capture) = self.session.capture() {
            (
                capture.samples.len(),
                capture.metrics.len(),
                capture.dropped_chunks,
                capture.sample_rate,
            )
        } else {
            (0, 0, 0, 0)
        };
        st.samples = samples;
        st.chunks = chunks;
        st.dropped_chunks = dropped;
        st.recording_secs = if rate == 0 {
            0.0
        } else {
            samples as f32 / rate as f32
        };
    }

    fn report_error(&self, message: String) {
        log::error!("runner error: {message}");
        if let Ok(mut st) = self.status.lock() {
            st.last_error = Some(message.clone());
        }
        self.emit(SessionEvent::Error { message });
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is not an error for the runner.
        let _ = self.events.send(event);
    }
}

type FinalizeOutcome = std::thread::Result<Result<Recording, SessionError>>;

/// Run `work` on the blocking pool and hand the session back, even when
/// `work` panics.
async fn finalize_off_thread(
    mut session: Session,
    work: fn(&mut Session) -> Result<Recording, SessionError>,
) -> Result<(Session, FinalizeOutcome), tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&mut session)));
        (session, outcome)
    })
    .await
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

async fn next_chunk(chunks: &mut Option<mpsc::UnboundedReceiver<AudioChunk>>) -> Option<AudioChunk> {
    match chunks {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
