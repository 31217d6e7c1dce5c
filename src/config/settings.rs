//! Recorder settings and their TOML persistence.
//!
//! Each section derives `Serialize`, `Deserialize`, `Default` and `Clone`.
//! Missing keys fall back to their defaults, so a partial `settings.toml` is
//! valid.

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::analysis::DEFAULT_THRESHOLD_MULTIPLIER;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Format of the incoming PCM stream and the size of the capture buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the capture source in Hz.
    pub sample_rate: u32,
    /// Channel count.  Only mono (`1`) is supported.
    pub channels: u16,
    /// Bit depth.  Only `16` is supported.
    pub bits_per_sample: u16,
    /// Buffer capacity in seconds of audio, fixed at session start.
    pub buffer_capacity_secs: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            bits_per_sample: 16,
            buffer_capacity_secs: 600,
        }
    }
}

impl AudioConfig {
    /// Buffer capacity in samples (`sample_rate × buffer_capacity_secs`).
    pub fn capacity_samples(&self) -> usize {
        self.sample_rate as usize * self.buffer_capacity_secs as usize
    }
}

// ---------------------------------------------------------------------------
// AnalysisConfig
// ---------------------------------------------------------------------------

/// Peak-detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// A chunk is a peak when its loudness exceeds `median × multiplier`.
    pub threshold_multiplier: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold_multiplier: DEFAULT_THRESHOLD_MULTIPLIER,
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingConfig
// ---------------------------------------------------------------------------

/// Recording time limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Capture stops automatically after this many seconds.  `0` disables
    /// the limit.
    pub max_recording_secs: u64,
    /// A warning is emitted this many seconds before the limit.
    pub warning_secs: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_recording_secs: 300,
            warning_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// OutputConfig
// ---------------------------------------------------------------------------

/// Where and what the file sink writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Target directory.  `None` means [`AppPaths::recordings_dir`].
    pub recordings_dir: Option<PathBuf>,
    /// File name prefix; a timestamp is appended.
    pub file_stem: String,
    /// Also write `<name>.json` with the raw samples.
    pub write_sample_dump: bool,
    /// Also write `<name>.report.json` with chart and timing data.
    pub write_report: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            recordings_dir: None,
            file_stem: "audioData".into(),
            write_sample_dump: true,
            write_report: true,
        }
    }
}

impl OutputConfig {
    /// The configured directory, or the platform default.
    pub fn resolved_dir(&self) -> PathBuf {
        self.recordings_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().recordings_dir)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Everything read from `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use tap_recorder::config::AppConfig;
///
/// // Missing file yields the defaults
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub analysis: AnalysisConfig,
    pub recording: RecordingConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    /// Read `settings.toml` from the platform config dir.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Read settings from `path`.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Write `settings.toml` into the platform config dir,
    /// creating it if needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Write settings to `path`.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.audio.channels != 1 {
            bail!("audio.channels must be 1 (mono), got {}", self.audio.channels);
        }
        if self.audio.bits_per_sample != 16 {
            bail!(
                "audio.bits_per_sample must be 16, got {}",
                self.audio.bits_per_sample
            );
        }
        if self.audio.sample_rate == 0 {
            bail!("audio.sample_rate must be positive");
        }
        if !(self.analysis.threshold_multiplier > 0.0) {
            bail!(
                "analysis.threshold_multiplier must be positive, got {}",
                self.analysis.threshold_multiplier
            );
        }
        if self.output.file_stem.trim().is_empty() {
            bail!("output.file_stem must not be empty");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
