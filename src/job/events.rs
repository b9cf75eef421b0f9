//! Observer interface and the event stream built on it.
//!
//! The controller never touches caller state directly: everything it has to
//! say goes through a [`JobObserver`]. [`ChannelObserver`] adapts that into a
//! stream of timestamped [`JobEvent`]s for callers that would rather poll a
//! channel (the CLI does).

use chrono::{DateTime, Utc};
use serde::Serialize;
use shrinkray_av::ProgressSample;
use shrinkray_common::JobId;
use tokio::sync::mpsc;

use super::state::{JobResult, JobState};

/// Receives everything a job reports.
///
/// Calls arrive from the job's task, in order, one at a time. `on_done` is
/// called exactly once and is always the last call for a job.
pub trait JobObserver: Send + Sync {
    fn on_state(&self, job: JobId, state: JobState) {
        let _ = (job, state);
    }

    fn on_progress(&self, job: JobId, sample: &ProgressSample);

    fn on_done(&self, job: JobId, result: &JobResult);
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl JobObserver for NullObserver {
    fn on_progress(&self, _job: JobId, _sample: &ProgressSample) {}
    fn on_done(&self, _job: JobId, _result: &JobResult) {}
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEventPayload {
    StateChanged { state: JobState },
    Progress { sample: ProgressSample },
    Done { result: JobResult },
}

/// A timestamped event for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: JobEventPayload,
}

impl JobEvent {
    pub fn new(job_id: JobId, payload: JobEventPayload) -> Self {
        Self {
            job_id,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// True for the final event of a job.
    pub fn is_done(&self) -> bool {
        matches!(self.payload, JobEventPayload::Done { .. })
    }
}

/// Forwards observer calls into an unbounded channel.
///
/// Unbounded so the job task never blocks on a slow consumer; one encode
/// produces a few events per second at most.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, job: JobId, payload: JobEventPayload) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(JobEvent::new(job, payload));
    }
}

impl JobObserver for ChannelObserver {
    fn on_state(&self, job: JobId, state: JobState) {
        self.send(job, JobEventPayload::StateChanged { state });
    }

    fn on_progress(&self, job: JobId, sample: &ProgressSample) {
        self.send(job, JobEventPayload::Progress { sample: *sample });
    }

    fn on_done(&self, job: JobId, result: &JobResult) {
        self.send(job, JobEventPayload::Done { result: result.clone() });
    }
}
