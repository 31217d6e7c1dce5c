//! Command-line interface for tap-recorder.
//!
//! Provides argument parsing using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Replay a recorded chunk stream, find the two taps and save the capture.
#[derive(Parser, Debug)]
#[command(
    name = "tap-recorder",
    version,
    about = "Replay base64 PCM chunks, measure the gap between two taps, save a WAV"
)]
pub struct Cli {
    /// Settings file (default: platform config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory to save recordings into (overrides output.recordings_dir)
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Delay between replayed chunks; 0 replays as fast as possible
    #[arg(long, value_name = "N", default_value = "0")]
    pub interval_ms: u64,

    /// Companion event fired OFFSET_MS after capture start, e.g. video_ready=2500
    #[arg(long, value_name = "NAME=OFFSET_MS", value_parser = parse_companion)]
    pub companion: Vec<(String, u64)>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// File with one base64 chunk per line
    #[arg(value_name = "CHUNKS_FILE")]
    pub chunks: PathBuf,
}

impl Cli {
    /// Default log filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Parse `NAME=OFFSET_MS`.
fn parse_companion(s: &str) -> Result<(String, u64), String> {
    let (name, offset) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=OFFSET_MS, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("companion name must not be empty".into());
    }
    let offset = offset
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid offset '{offset}': {e}"))?;
    Ok((name.to_string(), offset))
}
