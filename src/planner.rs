//! Bitrate planning for a target output size.
//!
//! The whole byte budget is not given to the video stream: container
//! overhead, audio, and encoder variance would push a literal target over
//! size, so only `margin` of it (0.9 by default) is planned for.

use serde::Serialize;
use shrinkray_common::{paths::compressed_output_path, Container};
use std::path::{Path, PathBuf};

use crate::error::JobError;

/// Share of the target size planned for the video stream.
pub const DEFAULT_MARGIN: f64 = 0.9;

/// Compute the video bitrate, in bits per second, that spends
/// `target_bytes * margin` over `duration_secs` of media.
///
/// `floor(target_bytes * margin * 8 / duration_secs)`
///
/// # Errors
///
/// - [`JobError::InvalidDuration`] if the duration is not a positive number.
/// - [`JobError::InvalidMargin`] if the margin is outside (0, 1].
/// - [`JobError::BitrateTooLow`] if the result rounds down to zero.
pub fn plan_bitrate(target_bytes: u64, duration_secs: f64, margin: f64) -> Result<u64, JobError> {
    if !(duration_secs.is_finite() && duration_secs > 0.0) {
        return Err(JobError::InvalidDuration {
            duration: duration_secs,
        });
    }
    if !(margin > 0.0 && margin <= 1.0) {
        return Err(JobError::InvalidMargin { margin });
    }

    let bitrate = (target_bytes as f64 * margin * 8.0 / duration_secs).floor() as u64;
    if bitrate == 0 {
        return Err(JobError::BitrateTooLow {
            target_bytes,
            duration: duration_secs,
        });
    }

    Ok(bitrate)
}

/// Everything derived before the encoder starts. Fixed for the rest of the
/// job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscodePlan {
    /// Source duration in seconds.
    pub duration_secs: f64,
    /// Video bitrate in bits per second.
    pub bitrate: u64,
    /// Where the encoder writes its output.
    pub output: PathBuf,
}

impl TranscodePlan {
    /// Plan a transcode of `input` into `container`.
    pub fn build(
        input: &Path,
        target_bytes: u64,
        container: Container,
        duration_secs: f64,
        margin: f64,
        output_suffix: &str,
    ) -> Result<Self, JobError> {
        let bitrate = plan_bitrate(target_bytes, duration_secs, margin)?;
        Ok(Self {
            duration_secs,
            bitrate,
            output: compressed_output_path(input, container, output_suffix),
        })
    }

    /// Expected output size at the planned bitrate, in bytes.
    pub fn estimated_video_bytes(&self) -> u64 {
        (self.bitrate as f64 / 8.0 * self.duration_secs) as u64
    }
}
