//! Bitrate-targeted encoding using ffmpeg.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use shrinkray_common::Codec;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::progress::TIME_MARKER;
use crate::{Error, Result};

/// Default encoder effort preset.
pub const DEFAULT_PRESET: &str = "medium";

/// Diagnostic lines kept for the failure message.
const ERROR_TAIL_LINES: usize = 10;

/// Parameters for one encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    /// Video encoder.
    pub codec: Codec,
    /// Target video bitrate in bits per second.
    pub bitrate: u64,
    /// Encoder effort preset (e.g. `medium`).
    pub preset: String,
    /// Kill the encoder after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl EncodeSettings {
    /// Settings with the default preset and no timeout.
    pub fn new(codec: Codec, bitrate: u64) -> Self {
        Self {
            codec,
            bitrate,
            preset: DEFAULT_PRESET.to_string(),
            timeout: None,
        }
    }
}

/// Build the ffmpeg argument list, in the order ffmpeg expects them:
/// input, codec, bitrate, preset, overwrite, output.
pub fn encode_args(input: &Path, output: &Path, settings: &EncodeSettings) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), input.into()];
    args.extend(
        [
            "-c:v",
            settings.codec.encoder_name(),
            "-b:v",
            &settings.bitrate.to_string(),
            "-preset",
            &settings.preset,
            "-y",
        ]
        .map(OsString::from),
    );
    args.push(output.into());
    args
}

/// Owns the ffmpeg child process for one encode.
///
/// Status lines are handed to the caller as they arrive; the supervisor
/// itself only keeps the last few non-progress lines to explain a failure.
#[derive(Debug, Clone)]
pub struct EncodeSupervisor {
    ffmpeg: PathBuf,
    settings: EncodeSettings,
}

impl EncodeSupervisor {
    /// Create a supervisor for the ffmpeg binary at `ffmpeg`.
    pub fn new(ffmpeg: PathBuf, settings: EncodeSettings) -> Self {
        Self { ffmpeg, settings }
    }

    /// The settings this supervisor encodes with.
    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    /// Encode `input` into `output`, streaming status lines to `on_line`.
    ///
    /// Returns once the process has exited and been reaped, so the output
    /// file is closed and may be moved immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::EncodeFailed`] for a non-zero or signal exit, a spawn
    ///   failure, or a timeout.
    /// - [`Error::Cancelled`] if `cancel` fires; the encoder is killed.
    pub async fn run<F>(
        &self,
        input: &Path,
        output: &Path,
        mut on_line: F,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        F: FnMut(&str),
    {
        tracing::info!(
            "Encode: {:?} -> {:?} (encoder={}, bitrate={}, preset={})",
            input,
            output,
            self.settings.codec.encoder_name(),
            self.settings.bitrate,
            self.settings.preset,
        );

        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.args(encode_args(input, output, &self.settings));
        cmd.timeout(self.settings.timeout);
        tracing::debug!("FFmpeg args: {:?}", cmd.get_args());

        let mut tail: VecDeque<String> = VecDeque::with_capacity(ERROR_TAIL_LINES);
        let result = cmd
            .stream_stderr(
                |line| {
                    if !line.contains(TIME_MARKER) {
                        if tail.len() == ERROR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line.to_string());
                    }
                    on_line(line);
                },
                cancel,
            )
            .await;

        let status = match result {
            Ok(status) => status,
            Err(e @ Error::Cancelled { .. }) => {
                tracing::info!("Encode of {:?} cancelled", input);
                return Err(e);
            }
            Err(e @ (Error::TimedOut { .. } | Error::ToolNotFound { .. } | Error::ToolFailed { .. })) => {
                return Err(Error::encode_failed(None, e.to_string()));
            }
            Err(e) => return Err(e),
        };

        if status.success() {
            tracing::info!("Encode finished: {:?}", output);
            return Ok(());
        }

        let message = if tail.is_empty() {
            format!("ffmpeg exited with status {status}")
        } else {
            Vec::from(tail).join("\n")
        };
        tracing::warn!("Encode failed with {}: {}", status, message);
        Err(Error::encode_failed(status.code(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_as_strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn encode_args_order() {
        let settings = EncodeSettings::new(Codec::H265, 754_974);
        let args = encode_args(Path::new("/in/a.mov"), Path::new("/in/a_compressed.mp4"), &settings);
        assert_eq!(
            args_as_strings(&args),
            vec![
                "-i",
                "/in/a.mov",
                "-c:v",
                "libx265",
                "-b:v",
                "754974",
                "-preset",
                "medium",
                "-y",
                "/in/a_compressed.mp4"
            ]
        );
    }

    #[test]
    fn encode_args_custom_preset() {
        let mut settings = EncodeSettings::new(Codec::Vp9, 1);
        settings.preset = "veryslow".to_string();
        let args = args_as_strings(&encode_args(Path::new("i"), Path::new("o"), &settings));
        assert_eq!(args[3], "libvpx-vp9");
        assert_eq!(args[7], "veryslow");
    }

    #[tokio::test]
    async fn missing_encoder_is_encode_failure() {
        let supervisor = EncodeSupervisor::new(
            PathBuf::from("/nonexistent/ffmpeg_xyz"),
            EncodeSettings::new(Codec::H264, 1000),
        );
        let err = supervisor
            .run(Path::new("in.mp4"), Path::new("out.mp4"), |_| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EncodeFailed { code: None, .. }), "{err}");
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_message_uses_diagnostic_tail() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(
            dir.path(),
            "printf 'frame=1 time=00:00:01.00\\r' >&2\necho 'Unknown encoder libfoo' >&2\nexit 1",
        );
        let supervisor = EncodeSupervisor::new(ffmpeg, EncodeSettings::new(Codec::H264, 1000));

        let mut lines = Vec::new();
        let err = supervisor
            .run(
                Path::new("in.mp4"),
                Path::new("out.mp4"),
                |l| lines.push(l.to_string()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(lines, vec!["frame=1 time=00:00:01.00", "Unknown encoder libfoo"]);
        match err {
            Error::EncodeFailed { code, message } => {
                assert_eq!(code, Some(1));
                assert_eq!(message, "Unknown encoder libfoo");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_waits_for_exit() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let ffmpeg = fake_ffmpeg(dir.path(), "for last; do :; done\nprintf data > \"$last\"");
        let supervisor = EncodeSupervisor::new(ffmpeg, EncodeSettings::new(Codec::H264, 1000));

        supervisor
            .run(Path::new("in.mp4"), &out, |_| {}, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "data");
    }
}
