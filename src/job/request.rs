use serde::Serialize;
use shrinkray_common::{Codec, Container, TargetSize};
use std::path::PathBuf;

use crate::error::JobError;

/// What the caller wants transcoded.
///
/// `input` is optional because "no file selected" is a reportable failure
/// rather than something the type system should forbid at the edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscodeRequest {
    pub input: Option<PathBuf>,
    /// Target output size in bytes.
    pub target_bytes: u64,
    pub codec: Codec,
    pub container: Container,
}

impl TranscodeRequest {
    pub fn new(input: impl Into<PathBuf>, target: TargetSize, codec: Codec, container: Container) -> Self {
        Self {
            input: Some(input.into()),
            target_bytes: target.bytes(),
            codec,
            container,
        }
    }

    /// Build a request from raw user input, with the size in whole MB.
    ///
    /// Fails with [`JobError::NoFileSelected`] before looking at the size, so
    /// the first problem reported is the one a user would fix first.
    pub fn from_user_input(
        input: Option<PathBuf>,
        size_mb: &str,
        codec: Codec,
        container: Container,
    ) -> Result<Self, JobError> {
        let input = input.ok_or(JobError::NoFileSelected)?;
        let target: TargetSize = size_mb.parse()?;
        Ok(Self::new(input, target, codec, container))
    }
}
