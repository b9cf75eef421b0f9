//! Error types for shrinkray-av.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving external media tools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// An external tool failed to execute.
    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    /// The probe produced no usable duration for the file.
    #[error("duration unavailable for {}: {reason}", path.display())]
    DurationUnavailable { path: PathBuf, reason: String },

    /// The encoder exited unsuccessfully or could not be run.
    #[error("encode failed ({}): {message}", describe_exit(code))]
    EncodeFailed { code: Option<i32>, message: String },

    /// The process was killed because its cancellation token fired.
    #[error("{tool} cancelled")]
    Cancelled { tool: String },

    /// The process was killed after running longer than its timeout.
    #[error("{tool} timed out after {after:?}")]
    TimedOut { tool: String, after: Duration },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "no exit code".to_string(),
    }
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a duration unavailable error.
    pub fn duration_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DurationUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an encode failed error.
    pub fn encode_failed(code: Option<i32>, message: impl Into<String>) -> Self {
        Self::EncodeFailed {
            code,
            message: message.into(),
        }
    }

    /// Whether this error is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
