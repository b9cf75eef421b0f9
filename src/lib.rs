//! Shrinkray - transcode a media file to approximately a target size.
//!
//! This library crate exposes the job controller for the CLI and for
//! integration testing.

pub mod config;
pub mod error;
pub mod job;
pub mod planner;

pub use error::JobError;
pub use job::{JobController, JobHandle, JobObserver, JobResult, JobState, TranscodeRequest};
pub use planner::{plan_bitrate, TranscodePlan};
