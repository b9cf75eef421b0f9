//! FFprobe-based duration probing.
//!
//! Only the container duration is read. Every failure mode (tool missing,
//! non-zero exit, empty or non-numeric output) collapses into
//! [`Error::DurationUnavailable`]; no default duration is ever substituted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::ToolCommand;
use crate::{Error, Result};

/// How long ffprobe may take to read a container header.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the ffprobe invocation that prints only the format duration.
pub fn duration_command(ffprobe: &Path, input: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffprobe.to_path_buf());
    cmd.args([
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ])
    .arg(input)
    .timeout(Some(PROBE_TIMEOUT));
    cmd
}

/// Probe the duration of `input` in seconds.
///
/// The returned value is whatever ffprobe reported; callers decide whether a
/// zero or negative duration is usable.
pub async fn probe_duration(ffprobe: &Path, input: &Path) -> Result<f64> {
    let unavailable = |reason: String| Error::duration_unavailable(PathBuf::from(input), reason);

    let output = duration_command(ffprobe, input)
        .execute()
        .await
        .map_err(|e| unavailable(e.to_string()))?;

    let duration = parse_duration_output(&output.stdout).ok_or_else(|| {
        let shown = output.stdout.trim();
        if shown.is_empty() {
            unavailable("ffprobe printed no duration".to_string())
        } else {
            unavailable(format!("unparseable duration {shown:?}"))
        }
    })?;

    tracing::debug!("Probed {}: {:.3}s", input.display(), duration);
    Ok(duration)
}

/// Parse the plain-text duration ffprobe prints, e.g. `"63.482000\n"`.
///
/// Returns `None` for empty output, `N/A`, or any non-finite value.
pub fn parse_duration_output(output: &str) -> Option<f64> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite())
}
