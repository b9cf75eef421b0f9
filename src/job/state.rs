use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::JobError;

/// Where a job is in its lifecycle.
///
/// ```text
/// Idle -> Probing -> Planning -> Encoding -> Finalizing -> Succeeded
///            \           \           \
///             +-----------+-----------+--> Failed | Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Probing,
    Planning,
    Encoding,
    Finalizing,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    /// True for states a job never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Idle, Probing) | (Probing, Planning) | (Planning, Encoding) | (Encoding, Finalizing) => true,
            (Finalizing, Succeeded) => true,
            // Validation failures end the job before it leaves Idle.
            (Idle | Probing | Planning | Encoding, Failed) => true,
            (Probing | Planning | Encoding, Cancelled) => true,
            // A controller is reusable once its previous job finished.
            (Succeeded | Failed | Cancelled, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Planning => "planning",
            Self::Encoding => "encoding",
            Self::Finalizing => "finalizing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// How a job ended. Produced exactly once per job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobResult {
    Succeeded { output: PathBuf },
    Failed { error: JobError },
    Cancelled,
}

impl JobResult {
    /// The terminal state matching this result.
    pub fn state(&self) -> JobState {
        match self {
            Self::Succeeded { .. } => JobState::Succeeded,
            Self::Failed { .. } => JobState::Failed,
            Self::Cancelled => JobState::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn output(&self) -> Option<&PathBuf> {
        match self {
            Self::Succeeded { output } => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        let path = [
            JobState::Idle,
            JobState::Probing,
            JobState::Planning,
            JobState::Encoding,
            JobState::Finalizing,
            JobState::Succeeded,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn finalizing_cannot_fail() {
        assert!(!JobState::Finalizing.can_transition_to(JobState::Failed));
        assert!(!JobState::Finalizing.can_transition_to(JobState::Cancelled));
        assert!(!JobState::Succeeded.can_transition_to(JobState::Failed));
        assert!(!JobState::Idle.can_transition_to(JobState::Encoding));
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Encoding.is_terminal());
    }

    #[test]
    fn result_serializes_with_outcome_tag() {
        let json = serde_json::to_value(JobResult::Failed {
            error: JobError::NoFileSelected,
        })
        .unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["error"]["kind"], "no_file_selected");

        let ok = JobResult::Succeeded {
            output: PathBuf::from("/v/a_compressed.mp4"),
        };
        assert_eq!(ok.state(), JobState::Succeeded);
        assert_eq!(ok.output(), Some(&PathBuf::from("/v/a_compressed.mp4")));
        assert_eq!(serde_json::to_value(&ok).unwrap()["outcome"], "succeeded");
    }
}
