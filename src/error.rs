//! Job failure taxonomy.
//!
//! Every variant is terminal for the job that produced it and carries enough
//! detail to show to a user as-is.

use serde::Serialize;
use std::path::PathBuf;

/// Why a transcode job did not produce its output.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    /// No input file was given.
    #[error("No file selected")]
    NoFileSelected,

    /// The input path does not point at a readable file.
    #[error("Input file does not exist: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// The target size was missing, non-numeric, or not positive.
    #[error("Invalid target size {raw:?}: expected a positive whole number of MB")]
    InvalidTargetSize { raw: String },

    /// The source duration could not be determined.
    #[error("Could not read media duration: {reason}")]
    DurationUnavailable { reason: String },

    /// The source duration is zero, negative, or not a number.
    #[error("Invalid media duration: {duration}s")]
    InvalidDuration { duration: f64 },

    /// The target is too small for the duration to leave any video bitrate.
    #[error("Target of {target_bytes} bytes is too small for {duration}s of media")]
    BitrateTooLow { target_bytes: u64, duration: f64 },

    /// The planning margin is outside (0, 1].
    #[error("Invalid size margin {margin}: expected a value in (0, 1]")]
    InvalidMargin { margin: f64 },

    /// The encoder failed or could not be run.
    #[error("Encoding failed ({}): {message}", describe_exit(code))]
    EncodeFailed { code: Option<i32>, message: String },

    /// Another job is already running on this controller.
    #[error("A job is already running")]
    Busy,

    /// The job task itself failed (panicked or was aborted).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "no exit code".to_string(),
    }
}

impl JobError {
    /// Convenience constructor for [`JobError::InvalidTargetSize`].
    pub fn invalid_target_size(raw: impl Into<String>) -> Self {
        Self::InvalidTargetSize { raw: raw.into() }
    }

    /// Convenience constructor for [`JobError::DurationUnavailable`].
    pub fn duration_unavailable(reason: impl Into<String>) -> Self {
        Self::DurationUnavailable {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`JobError::EncodeFailed`].
    pub fn encode_failed(code: Option<i32>, message: impl Into<String>) -> Self {
        Self::EncodeFailed {
            code,
            message: message.into(),
        }
    }
}

impl From<shrinkray_common::Error> for JobError {
    fn from(err: shrinkray_common::Error) -> Self {
        match err {
            shrinkray_common::Error::InvalidTargetSize(raw) => Self::InvalidTargetSize { raw },
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// Tool errors that escape the probe or encode steps. The step that failed
/// decides the variant where the tool error is ambiguous.
impl From<shrinkray_av::Error> for JobError {
    fn from(err: shrinkray_av::Error) -> Self {
        use shrinkray_av::Error as AvError;
        match err {
            AvError::DurationUnavailable { reason, .. } => Self::DurationUnavailable { reason },
            AvError::EncodeFailed { code, message } => Self::EncodeFailed { code, message },
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}
