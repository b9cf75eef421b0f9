//! Builder for executing external tool commands with timeout support.
//!
//! Two execution modes are provided: [`ToolCommand::execute`] captures all
//! output once the process exits, and [`ToolCommand::stream_stderr`] hands
//! each diagnostic line to a callback while the process is still running.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::BytesMut;
use futures::StreamExt;
use tokio::process::{Child, Command};
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest status line kept before it is flushed without a terminator.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use shrinkray_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> shrinkray_av::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("error")
///     .arg("-show_entries").arg("format=duration")
///     .arg("/path/to/video.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(s.as_ref().to_os_string());
        self
    }

    /// Append multiple arguments.
    pub fn args<I, S>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(iter.into_iter().map(|s| s.as_ref().to_os_string()));
        self
    }

    /// Set the maximum execution time. `None` lets the process run forever.
    pub fn timeout(&mut self, d: Option<Duration>) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Arguments collected so far.
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn spawn_error(&self, e: io::Error) -> Error {
        if e.kind() == io::ErrorKind::NotFound {
            Error::tool_not_found(self.program_name())
        } else {
            Error::tool_failed(self.program_name(), format!("failed to spawn: {e}"))
        }
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolNotFound`] if the program does not exist.
    /// - [`Error::TimedOut`] if the process outlives the timeout.
    /// - [`Error::ToolFailed`] if the process exits with a non-zero status
    ///   (message includes stderr) or cannot be spawned.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| Error::TimedOut {
                    tool: program_name.clone(),
                    after: limit,
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| {
            Error::tool_failed(&program_name, format!("I/O error waiting for process: {e}"))
        })?;

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(Error::tool_failed(
                program_name,
                format!(
                    "exited with status {}: {}",
                    output.status,
                    tool_output.stderr.trim()
                ),
            ));
        }

        Ok(tool_output)
    }

    /// Run the command, passing every stderr line to `on_line` as soon as it
    /// is produced.
    ///
    /// Returns the exit status once the process has exited and been reaped;
    /// a non-zero status is not an error here. Stdout is discarded and stdin
    /// is closed.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolNotFound`] / [`Error::ToolFailed`] if spawning fails.
    /// - [`Error::Cancelled`] if `cancel` fires; the child is killed first.
    /// - [`Error::TimedOut`] if the timeout elapses; the child is killed first.
    pub async fn stream_stderr<F>(&self, mut on_line: F, cancel: &CancellationToken) -> Result<ExitStatus>
    where
        F: FnMut(&str),
    {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        tracing::debug!("Spawned {} (pid {:?})", program_name, child.id());

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::tool_failed(&program_name, "stderr was not captured"))?;
        let mut lines = FramedRead::new(stderr, StatusLineCodec);

        let limit = self.timeout;
        let deadline = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    terminate(&mut child, &program_name).await;
                    return Err(Error::Cancelled { tool: program_name });
                }
                _ = &mut deadline => {
                    terminate(&mut child, &program_name).await;
                    return Err(Error::TimedOut { tool: program_name, after: limit.unwrap_or_default() });
                }
                next = lines.next() => match next {
                    Some(Ok(line)) => on_line(&line),
                    Some(Err(e)) => {
                        tracing::warn!("Failed reading {} stderr: {}", program_name, e);
                        break;
                    }
                    None => break,
                }
            }
        }

        // Stderr is closed; the process may still be shutting down.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                terminate(&mut child, &program_name).await;
                Err(Error::Cancelled { tool: program_name })
            }
            _ = &mut deadline => {
                terminate(&mut child, &program_name).await;
                Err(Error::TimedOut { tool: program_name, after: limit.unwrap_or_default() })
            }
            status = child.wait() => Ok(status?),
        }
    }
}

/// Kill the child and wait for it so no zombie or open handle remains.
async fn terminate(child: &mut Child, program_name: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill {}: {}", program_name, e);
    }
}

/// Splits a diagnostic stream into lines on either `\n` or `\r`.
///
/// ffmpeg rewrites its status line in place with carriage returns, so a
/// newline-only splitter would hold every progress update until the encode
/// finishes. Lines are trimmed and blank lines are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusLineCodec;

impl Decoder for StatusLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<String>> {
        loop {
            let Some(pos) = buf.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                if buf.len() >= MAX_LINE_LEN {
                    let end = utf8_boundary(buf);
                    let chunk = buf.split_to(end);
                    return Ok(Some(String::from_utf8_lossy(&chunk).trim().to_string()));
                }
                return Ok(None);
            };

            let chunk = buf.split_to(pos + 1);
            let line = String::from_utf8_lossy(&chunk[..pos]).trim().to_string();
            if !line.is_empty() {
                return Ok(Some(line));
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<String>> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        let rest = buf.split_to(buf.len());
        let line = String::from_utf8_lossy(&rest).trim().to_string();
        Ok((!line.is_empty()).then_some(line))
    }
}

/// Length of `bytes` without a trailing, incomplete UTF-8 sequence.
fn utf8_boundary(bytes: &[u8]) -> usize {
    let tail = bytes.len().saturating_sub(3);
    for start in (tail..bytes.len()).rev() {
        // Skip continuation bytes back to the sequence's lead byte.
        if bytes[start] & 0xC0 == 0x80 {
            continue;
        }
        return match std::str::from_utf8(&bytes[start..]) {
            Err(e) if e.error_len().is_none() && start > 0 => start,
            _ => bytes.len(),
        };
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Vec<String> {
        let mut codec = StatusLineCodec;
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(line) = codec.decode_eof(&mut buf).unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn codec_splits_on_carriage_returns() {
        let lines = decode_all(b"Input #0\nframe=1 time=00:00:01.00\rframe=2 time=00:00:02.00\r\ndone");
        assert_eq!(
            lines,
            vec![
                "Input #0",
                "frame=1 time=00:00:01.00",
                "frame=2 time=00:00:02.00",
                "done"
            ]
        );
    }

    #[test]
    fn codec_waits_for_terminator() {
        let mut codec = StatusLineCodec;
        let mut buf = BytesMut::from(&b"partial"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b" line\r");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("partial line"));
    }

    #[test]
    fn codec_flush_keeps_multibyte_chars_whole() {
        let mut codec = StatusLineCodec;
        let mut buf = BytesMut::from(vec![b'a'; MAX_LINE_LEN - 1].as_slice());
        // First byte of "é".
        buf.extend_from_slice(&[0xC3]);

        let flushed = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(flushed.len(), MAX_LINE_LEN - 1);
        assert!(!flushed.contains('\u{FFFD}'));

        buf.extend_from_slice(&[0xA9, b'\n']);
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("é"));
    }

    #[test]
    fn utf8_boundary_only_trims_incomplete_tails() {
        assert_eq!(utf8_boundary(b"abc"), 3);
        assert_eq!(utf8_boundary("abé".as_bytes()), 4);
        assert_eq!(utf8_boundary(&[b'a', 0xE2, 0x82]), 1);
        // Invalid bytes are not held back.
        assert_eq!(utf8_boundary(&[b'a', 0xFF]), 2);
    }

    #[test]
    fn codec_drops_blank_lines() {
        assert_eq!(decode_all(b"\r\n\r\n  \nx\n"), vec!["x"]);
    }

    #[tokio::test]
    async fn execute_echo() {
        // `echo` should be universally available.
        let output = ToolCommand::new(PathBuf::from("echo"))
            .arg("hello")
            .execute()
            .await;

        match output {
            Ok(out) => {
                assert!(out.status.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {
                // On some minimal environments echo may not exist; skip.
            }
        }
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        assert!(matches!(result, Err(Error::ToolNotFound { .. })));
    }

    #[tokio::test]
    async fn timeout_fires() {
        // `sleep 10` should be killed well before 10 seconds.
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Some(Duration::from_millis(100)))
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stream_stderr_delivers_lines() {
        let mut seen = Vec::new();
        let status = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "printf 'one\\rtwo\\nthree' >&2; echo ignored"])
            .stream_stderr(|line| seen.push(line.to_string()), &CancellationToken::new())
            .await
            .unwrap();

        assert!(status.success());
        assert_eq!(seen, vec!["one", "two", "three"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stream_stderr_reports_exit_code() {
        let status = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo boom >&2; exit 3"])
            .stream_stderr(|_| {}, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stream_stderr_cancellation_kills_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(None)
            .stream_stderr(|_| {}, &cancel)
            .await;

        assert!(matches!(result, Err(Error::Cancelled { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stream_stderr_timeout_kills_child() {
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Some(Duration::from_millis(100)))
            .stream_stderr(|_| {}, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::TimedOut { .. })));
    }
}
