//! Filesystem-backed [`RecordingSink`].
//!
//! For a recording named `audioData_1718000000250`, [`FileSink`] writes:
//!
//! ```text
//! <dir>/audioData_1718000000250.wav          canonical 16-bit mono WAV
//! <dir>/audioData_1718000000250.json         {"data": [...], "sampleRate": n}
//! <dir>/audioData_1718000000250.report.json  chart, peaks and timing
//! ```
//!
//! The two JSON files are optional.  When the WAV name is already taken the
//! recording is saved as `audioData_1718000000250_1`, `_2` and so on, so an
//! earlier recording is never overwritten.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::sink::{RecordingSink, SinkError};
use crate::analysis::{ChartData, PeakPair};
use crate::config::OutputConfig;
use crate::pipeline::Recording;
use crate::timing::TimingReport;

// ---------------------------------------------------------------------------
// JSON payloads
// ---------------------------------------------------------------------------

/// Raw sample dump in the `{data, sampleRate}` layout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SampleDump {
    data: Vec<i16>,
    sample_rate: u32,
}

/// Analysis summary written next to the WAV file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingReport<'a> {
    pub name: &'a str,
    pub sample_rate: u32,
    pub sample_count: usize,
    pub duration_secs: f32,
    pub dropped_chunks: u64,
    pub overflowed: bool,
    pub peaks: Option<PeakPair>,
    pub chart: &'a ChartData,
    pub timing: &'a TimingReport,
}

impl<'a> From<&'a Recording> for RecordingReport<'a> {
    fn from(recording: &'a Recording) -> Self {
        Self {
            name: &recording.suggested_name,
            sample_rate: recording.sample_rate,
            sample_count: recording.sample_count,
            duration_secs: recording.duration_secs(),
            dropped_chunks: recording.dropped_chunks,
            overflowed: recording.overflowed,
            peaks: recording.peaks,
            chart: &recording.chart,
            timing: &recording.timing,
        }
    }
}

// ---------------------------------------------------------------------------
// FileSink
// ---------------------------------------------------------------------------

/// Suffixes tried before giving up on a taken name.
const MAX_NAME_ATTEMPTS: u32 = 1_000;

/// Writes recordings into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
    write_sample_dump: bool,
    write_report: bool,
}

impl FileSink {
    /// A sink writing all three files into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_sample_dump: true,
            write_report: true,
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.resolved_dir())
            .with_sample_dump(config.write_sample_dump)
            .with_report(config.write_report)
    }

    pub fn with_sample_dump(mut self, enabled: bool) -> Self {
        self.write_sample_dump = enabled;
        self
    }

    pub fn with_report(mut self, enabled: bool) -> Self {
        self.write_report = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{name}.{extension}"))
    }

    /// Write `wav` under the first free variant of `base` and return the
    /// name that was used.
    async fn claim_name(&self, base: &str, wav: &[u8]) -> Result<(String, PathBuf), SinkError> {
        let mut path = self.path_for(base, "wav");
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = match attempt {
                0 => base.to_string(),
                n => format!("{base}_{n}"),
            };
            path = self.path_for(&name, "wav");

            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match opened {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    log::debug!("sink: {} exists, trying next name", path.display());
                    continue;
                }
                Err(source) => return Err(SinkError::Io { path, source }),
            };

            let io_error = |source| SinkError::Io {
                path: path.clone(),
                source,
            };
            file.write_all(wav).await.map_err(io_error)?;
            file.flush().await.map_err(io_error)?;
            return Ok((name, path));
        }

        Err(SinkError::Io {
            path,
            source: std::io::Error::new(
                ErrorKind::AlreadyExists,
                format!("no free name after {MAX_NAME_ATTEMPTS} attempts"),
            ),
        })
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), SinkError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[async_trait]
impl RecordingSink for FileSink {
    async fn persist(&self, recording: &Recording) -> Result<PathBuf, SinkError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SinkError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let (name, wav_path) = self
            .claim_name(&recording.suggested_name, &recording.wav)
            .await?;

        if self.write_sample_dump {
            let dump = SampleDump {
                data: recording.samples().collect(),
                sample_rate: recording.sample_rate,
            };
            write_file(&self.path_for(&name, "json"), &serde_json::to_vec(&dump)?).await?;
        }

        if self.write_report {
            let mut report = RecordingReport::from(recording);
            report.name = &name;
            let json = serde_json::to_vec_pretty(&report)?;
            write_file(&self.path_for(&name, "report.json"), &json).await?;
        }

        log::info!(
            "sink: saved {} ({} samples, {:.2}s)",
            wav_path.display(),
            recording.sample_count,
            recording.duration_secs()
        );
        Ok(wav_path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioChunk;
    use crate::pipeline::{Session, SessionConfig};
    use base64::{engine::general_purpose::STANDARD, Engine};
    use tempfile::tempdir;

    fn recording(samples: &[i16]) -> Recording {
        let mut session = Session::new(SessionConfig {
            sample_rate: 8_000,
            capacity_samples: 1_024,
            threshold_multiplier: 5.0,
            file_stem: "audioData".into(),
        });
        session.start().unwrap();
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        session
            .ingest(&AudioChunk::new(STANDARD.encode(bytes), 0))
            .unwrap();
        session.stop().unwrap();
        session.finalize().unwrap()
    }

    #[tokio::test]
    async fn writes_wav_dump_and_report() {
        let dir = tempdir().expect("temp dir");
        let sink = FileSink::new(dir.path().join("nested/recordings"));
        let rec = recording(&[1, -1, 300, -32768]);

        let path = sink.persist(&rec).await.expect("persist");
        assert_eq!(path, sink.path_for(&rec.suggested_name, "wav"));
        assert!(path.exists());

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8_000);
        assert_eq!(reader.len(), 4);

        let dump: serde_json::Value = serde_json::from_slice(
            &std::fs::read(sink.path_for(&rec.suggested_name, "json")).unwrap(),
        )
        .unwrap();
        assert_eq!(dump["sampleRate"], 8_000);
        assert_eq!(dump["data"], serde_json::json!([1, -1, 300, -32768]));

        let report: serde_json::Value = serde_json::from_slice(
            &std::fs::read(sink.path_for(&rec.suggested_name, "report.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(report["sampleCount"], 4);
        assert!(report["peaks"].is_null());
        assert_eq!(report["chart"]["points"].as_array().map(Vec::len), Some(1));
        assert_eq!(report["name"], rec.suggested_name.as_str());
        assert!(report["timing"]["chunkGaps"].is_object());
        assert!(report["timing"]["chunkGaps"]["minMs"].is_number());
        assert!(report["timing"].get("chunk_gaps").is_none());
    }

    /// A second recording with the same name gets a suffix instead of
    /// replacing the first one.
    #[tokio::test]
    async fn taken_name_gets_a_suffix() {
        let dir = tempdir().expect("temp dir");
        let sink = FileSink::new(dir.path());
        let first = recording(&[1, 2]);
        let mut second = recording(&[7, 8, 9]);
        second.suggested_name = first.suggested_name.clone();

        let first_path = sink.persist(&first).await.expect("first");
        let second_path = sink.persist(&second).await.expect("second");

        let suffixed = format!("{}_1", first.suggested_name);
        assert_ne!(first_path, second_path);
        assert_eq!(second_path, sink.path_for(&suffixed, "wav"));
        assert_eq!(hound::WavReader::open(&first_path).unwrap().len(), 2);
        assert_eq!(hound::WavReader::open(&second_path).unwrap().len(), 3);

        let dump: serde_json::Value = serde_json::from_slice(
            &std::fs::read(sink.path_for(&first.suggested_name, "json")).unwrap(),
        )
        .unwrap();
        assert_eq!(dump["data"], serde_json::json!([1, 2]));
        let report: serde_json::Value = serde_json::from_slice(
            &std::fs::read(sink.path_for(&suffixed, "report.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(report["name"], suffixed.as_str());
        assert_eq!(report["sampleCount"], 3);

        let wavs = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".wav")
            })
            .count();
        assert_eq!(wavs, 2);
    }

    #[tokio::test]
    async fn optional_files_can_be_disabled() {
        let dir = tempdir().expect("temp dir");
        let sink = FileSink::new(dir.path())
            .with_sample_dump(false)
            .with_report(false);
        let rec = recording(&[5, 6]);

        sink.persist(&rec).await.expect("persist");

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().ends_with(".wav"));
    }

    #[tokio::test]
    async fn unwritable_directory_is_io_error() {
        let dir = tempdir().expect("temp dir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let sink = FileSink::new(&blocker);
        let err = sink.persist(&recording(&[1])).await.unwrap_err();
        assert!(matches!(err, SinkError::Io { ref path, .. } if path == &blocker));
    }

    #[test]
    fn from_config_copies_flags() {
        let dir = tempdir().expect("temp dir");
        let config = OutputConfig {
            recordings_dir: Some(dir.path().to_path_buf()),
            write_sample_dump: false,
            ..OutputConfig::default()
        };
        let sink = FileSink::from_config(&config);
        assert_eq!(sink.dir(), dir.path());
        assert!(!sink.write_sample_dump);
        assert!(sink.write_report);
    }
}
