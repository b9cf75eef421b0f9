//! Transcode jobs: requests, lifecycle, observers and the controller that
//! drives them.

mod controller;
mod events;
mod request;
mod state;

pub use controller::{JobController, JobHandle};
pub use events::{ChannelObserver, JobEvent, JobEventPayload, JobObserver, NullObserver};
pub use request::TranscodeRequest;
pub use state::{JobResult, JobState};
