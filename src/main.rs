//! Application entry point for tap-recorder.
//!
//! # Startup sequence
//!
//! 1. Parse the command line.
//! 2. Initialise logging.
//! 3. Load [`AppConfig`] (default on first run) and apply CLI overrides.
//! 4. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 5. Load the chunk file into a [`ReplaySource`].
//! 6. Spawn the [`SessionRunner`] and send `Start`.
//! 7. Fire companion events on their schedule; send `Stop` once the replay
//!    has ended.
//! 8. Print the analysis and the saved path.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use tap_recorder::{
    audio::ReplaySource,
    config::AppConfig,
    output::FileSink,
    pipeline::{
        new_shared_status, Session, SessionCommand, SessionConfig, SessionEvent, SessionRunner,
    },
};

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    // 2. Config
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AppConfig::load().context("failed to load config")?,
    };
    if let Some(out) = &cli.out {
        config.output.recordings_dir = Some(out.clone());
    }
    config.validate()?;
    log::info!(
        "config: {} Hz, buffer {}s, threshold ×{}",
        config.audio.sample_rate,
        config.audio.buffer_capacity_secs,
        config.analysis.threshold_multiplier
    );

    // 3. Tokio runtime (2 workers: runner + blocking finalize each get one)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(replay(cli, config))
}

/// Run one capture session over the chunk file.
async fn replay(cli: Cli, config: AppConfig) -> Result<()> {
    let interval = (cli.interval_ms > 0).then(|| Duration::from_millis(cli.interval_ms));
    let source = ReplaySource::from_file(&cli.chunks, interval)?;
    if source.is_empty() {
        bail!("{} contains no chunks", cli.chunks.display());
    }

    let sink = FileSink::from_config(&config.output);
    log::info!("output: {}", sink.dir().display());

    let status = new_shared_status();
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let runner = SessionRunner::new(
        Session::new(SessionConfig::from(&config)),
        Box::new(source),
        Arc::new(sink),
        config.recording.clone(),
        status.clone(),
        event_tx,
    );

    let (commands, command_rx) = mpsc::channel(16);
    let runner_task = tokio::spawn(runner.run(command_rx));
    commands.send(SessionCommand::Start).await?;

    let mut companions: Vec<JoinHandle<()>> = Vec::new();
    let mut failure: Option<String> = None;

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Started => {
                println!("recording from {}", cli.chunks.display());
                for (name, offset_ms) in &cli.companion {
                    companions.push(schedule_companion(
                        commands.clone(),
                        name.clone(),
                        *offset_ms,
                    ));
                }
            }
            SessionEvent::ChunkDropped { sequence } => {
                log::warn!("chunk {sequence} could not be decoded and was skipped");
            }
            SessionEvent::TimeWarning { remaining_secs } => {
                println!("{remaining_secs}s of recording time left");
            }
            SessionEvent::CaptureEnded => {
                for handle in companions.drain(..) {
                    let _ = handle.await;
                }
                commands.send(SessionCommand::Stop).await?;
            }
            SessionEvent::Overflow { error } => {
                println!("buffer full, stopping early: {error}");
            }
            SessionEvent::Stopped {
                samples,
                chunks,
                dropped,
            } => {
                println!(
                    "captured {samples} samples ({:.2}s) in {chunks} chunks, {dropped} dropped",
                    samples as f32 / config.audio.sample_rate as f32
                );
            }
            SessionEvent::Analyzed { chart, peaks } => match peaks {
                Some(pair) => println!(
                    "taps at chunks {} and {}: {} ms apart (threshold {:.0})",
                    pair.first,
                    pair.second,
                    pair.gap_ms,
                    chart.threshold.unwrap_or_default()
                ),
                None => println!("No clear peaks detected"),
            },
            SessionEvent::Saved { path } => {
                println!("saved {}", path.display());
                break;
            }
            SessionEvent::Error { message } => {
                failure = Some(message);
                break;
            }
            SessionEvent::Reset => {}
        }
    }

    for handle in companions {
        handle.abort();
    }
    drop(commands);
    runner_task.await.context("session runner panicked")?;

    if let Some(message) = failure {
        bail!(message);
    }
    Ok(())
}

/// Send `Companion(name)` `offset_ms` after now.
fn schedule_companion(
    commands: mpsc::Sender<SessionCommand>,
    name: String,
    offset_ms: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(offset_ms)).await;
        log::debug!("companion: {name}");
        let _ = commands.send(SessionCommand::Companion(name)).await;
    })
}
