//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], a temp directory holding an input file and fake
//! `ffprobe`/`ffmpeg` shell scripts, plus a [`RecordingObserver`] that keeps
//! every event a job reports. Each fake tool touches a marker file when it
//! runs so tests can assert a tool was never launched.

#![allow(dead_code)]

use parking_lot::Mutex;
use shrinkray::config::{Config, ToolsConfig};
use shrinkray::job::{JobObserver, JobResult, JobState};
use shrinkray_av::ProgressSample;
use shrinkray_common::JobId;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Progress at a quarter, half and all of a 100 second source.
pub const ENCODE_OK: &str = r#"printf 'frame=  1 fps=0.0 q=28.0 size=       0KiB time=00:00:25.00 bitrate=N/A speed=1x\r' >&2
printf 'frame=  2 fps=0.0 q=28.0 size=     128KiB time=00:00:50.00 bitrate=20.9kbits/s speed=1x\r' >&2
echo '[libx264 @ 0x5581] frame I:1 Avg QP:20.00 size: 1024' >&2
printf 'frame=  3 fps=0.0 q=28.0 size=     256KiB time=00:01:40.00 bitrate=20.9kbits/s speed=1x\n' >&2
printf data > "$last""#;

/// Writes a partial output, then fails the way ffmpeg does on a bad option.
pub const ENCODE_FAIL: &str = r#"printf partial > "$last"
printf 'frame=  1 fps=0.0 q=28.0 size=       0KiB time=00:00:10.00 bitrate=N/A speed=1x\r' >&2
echo 'Error while opening encoder for output stream #0:0' >&2
echo 'Conversion failed!' >&2
exit 1"#;

/// Fails before opening the output, as ffmpeg does for an unknown encoder.
pub const ENCODE_REJECT: &str = r#"echo 'Unknown encoder libfoo' >&2
exit 1"#;

/// Reports a little progress, then never exits on its own.
pub const ENCODE_HANG: &str = r#"printf partial > "$last"
printf 'frame=  1 fps=0.0 q=28.0 size=       0KiB time=00:00:05.00 bitrate=N/A speed=1x\r' >&2
exec sleep 30"#;

pub struct TestHarness {
    pub dir: TempDir,
    pub input: PathBuf,
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
}

impl TestHarness {
    /// `probe_output` is what the fake ffprobe prints on stdout;
    /// `encode_body` runs with `$last` set to the output path.
    pub fn new(probe_output: &str, encode_body: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let input = dir.path().join("holiday.mov");
        std::fs::write(&input, b"not really a movie").unwrap();

        let probe_marker = dir.path().join("ffprobe.ran");
        let ffprobe = write_script(
            dir.path(),
            "ffprobe",
            &format!(
                "touch '{}'\nprintf '%s' '{}'",
                probe_marker.display(),
                probe_output
            ),
        );

        let encode_marker = dir.path().join("ffmpeg.ran");
        let args_file = dir.path().join("ffmpeg.args");
        let ffmpeg = write_script(
            dir.path(),
            "ffmpeg",
            &format!(
                "touch '{}'\necho \"$@\" > '{}'\nfor last; do :; done\n{}",
                encode_marker.display(),
                args_file.display(),
                encode_body
            ),
        );

        Self {
            dir,
            input,
            ffprobe,
            ffmpeg,
        }
    }

    /// A 100 second source that encodes successfully.
    pub fn succeeding() -> Self {
        Self::new("100.000000", ENCODE_OK)
    }

    pub fn config(&self) -> Config {
        Config {
            tools: ToolsConfig {
                ffmpeg_path: Some(self.ffmpeg.clone()),
                ffprobe_path: Some(self.ffprobe.clone()),
            },
            ..Config::default()
        }
    }

    /// Write the harness config as TOML and return its path.
    pub fn config_file(&self) -> PathBuf {
        let path = self.dir.path().join("shrinkray.toml");
        let toml = format!(
            "[tools]\nffmpeg_path = '{}'\nffprobe_path = '{}'\n",
            self.ffmpeg.display(),
            self.ffprobe.display()
        );
        std::fs::write(&path, toml).unwrap();
        path
    }

    pub fn expected_output(&self) -> PathBuf {
        self.dir.path().join("holiday_compressed.mp4")
    }

    pub fn probe_ran(&self) -> bool {
        self.dir.path().join("ffprobe.ran").exists()
    }

    pub fn encoder_ran(&self) -> bool {
        self.dir.path().join("ffmpeg.ran").exists()
    }

    /// Arguments the fake encoder was called with, space-joined.
    pub fn encoder_args(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("ffmpeg.args"))
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Everything an observer saw, in order.
#[derive(Default)]
pub struct RecordingObserver {
    pub states: Mutex<Vec<JobState>>,
    pub samples: Mutex<Vec<ProgressSample>>,
    pub results: Mutex<Vec<JobResult>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<JobState> {
        self.states.lock().clone()
    }

    pub fn samples(&self) -> Vec<ProgressSample> {
        self.samples.lock().clone()
    }

    pub fn results(&self) -> Vec<JobResult> {
        self.results.lock().clone()
    }
}

impl JobObserver for RecordingObserver {
    fn on_state(&self, _job: JobId, state: JobState) {
        self.states.lock().push(state);
    }

    fn on_progress(&self, _job: JobId, sample: &ProgressSample) {
        self.samples.lock().push(*sample);
    }

    fn on_done(&self, _job: JobId, result: &JobResult) {
        self.results.lock().push(result.clone());
    }
}
