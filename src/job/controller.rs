//! Runs one transcode job at a time: probe, plan, encode, finalize.

use parking_lot::RwLock;
use shrinkray_av::{
    probe_duration, resolve_tool,
    tools::{FFMPEG, FFPROBE},
    EncodeSettings, EncodeSupervisor, ProgressParser,
};
use shrinkray_common::{paths::is_media_file, JobId};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::events::JobObserver;
use super::request::TranscodeRequest;
use super::state::{JobResult, JobState};
use crate::config::Config;
use crate::error::JobError;
use crate::planner::TranscodePlan;

/// Why the pipeline stopped early.
enum Halt {
    Failed(JobError),
    Cancelled,
}

impl From<JobError> for Halt {
    fn from(err: JobError) -> Self {
        Self::Failed(err)
    }
}

/// Clears the busy flag when the job ends, however it ends.
#[derive(Debug)]
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives transcode jobs through their state machine.
///
/// Cloning is cheap and clones share state: at most one job is in flight
/// across all of them. A second job started while one is running is refused
/// with [`JobError::Busy`] rather than queued.
#[derive(Clone)]
pub struct JobController {
    config: Arc<Config>,
    state: Arc<RwLock<JobState>>,
    busy: Arc<AtomicBool>,
}

impl JobController {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(RwLock::new(JobState::Idle)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// State of the current (or most recent) job.
    pub fn state(&self) -> JobState {
        *self.state.read()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run a job to completion on the current task.
    ///
    /// The only `Err` is [`JobError::Busy`]; every other failure is a
    /// [`JobResult::Failed`], also reported to `observer`.
    pub async fn run(
        &self,
        request: TranscodeRequest,
        observer: &dyn JobObserver,
        cancel: &CancellationToken,
    ) -> Result<JobResult, JobError> {
        let _guard = self.acquire()?;
        Ok(self.execute(JobId::new(), request, observer, cancel).await)
    }

    /// Run a job on its own tokio task.
    ///
    /// Returns as soon as the task is spawned; progress and the result
    /// arrive through `observer`, and the result is also available from
    /// [`JobHandle::join`].
    pub fn start(
        &self,
        request: TranscodeRequest,
        observer: Arc<dyn JobObserver>,
    ) -> Result<JobHandle, JobError> {
        let guard = self.acquire()?;
        let id = JobId::new();
        let cancel = CancellationToken::new();

        let controller = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            controller.execute(id, request, observer.as_ref(), &token).await
        });

        Ok(JobHandle { id, cancel, task })
    }

    fn acquire(&self) -> Result<BusyGuard, JobError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| JobError::Busy)?;
        Ok(BusyGuard(self.busy.clone()))
    }

    async fn execute(
        &self,
        job: JobId,
        request: TranscodeRequest,
        observer: &dyn JobObserver,
        cancel: &CancellationToken,
    ) -> JobResult {
        // A finished job leaves its terminal state visible until the next
        // one starts.
        *self.state.write() = JobState::Idle;
        tracing::info!(%job, "Starting transcode job for {:?}", request.input);

        let result = match self.pipeline(job, &request, observer, cancel).await {
            Ok(output) => JobResult::Succeeded { output },
            Err(Halt::Failed(error)) => {
                tracing::error!(%job, "Job failed: {}", error);
                JobResult::Failed { error }
            }
            Err(Halt::Cancelled) => {
                tracing::info!(%job, "Job cancelled");
                JobResult::Cancelled
            }
        };

        self.transition(job, result.state(), observer);
        observer.on_done(job, &result);
        result
    }

    async fn pipeline(
        &self,
        job: JobId,
        request: &TranscodeRequest,
        observer: &dyn JobObserver,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Halt> {
        let input = validate(request)?;
        let tools = &self.config.tools;
        let encode = &self.config.encode;

        self.transition(job, JobState::Probing, observer);
        let ffprobe = resolve_tool(FFPROBE, tools.ffprobe_path.as_deref())
            .map_err(|e| JobError::duration_unavailable(e.to_string()))?;
        let duration = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Halt::Cancelled),
            probed = probe_duration(&ffprobe, input) => probed.map_err(JobError::from)?,
        };

        self.transition(job, JobState::Planning, observer);
        let plan = TranscodePlan::build(
            input,
            request.target_bytes,
            request.container,
            duration,
            encode.margin,
            &encode.output_suffix,
        )?;
        tracing::info!(
            %job,
            "Planned {:.2}s at {} bit/s -> {:?}",
            plan.duration_secs,
            plan.bitrate,
            plan.output
        );

        if cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }

        self.transition(job, JobState::Encoding, observer);
        let ffmpeg = resolve_tool(FFMPEG, tools.ffmpeg_path.as_deref())
            .map_err(|e| JobError::encode_failed(None, e.to_string()))?;

        let mut settings = EncodeSettings::new(request.codec, plan.bitrate);
        settings.preset = encode.preset.clone();
        settings.timeout = encode.timeout();
        let supervisor = EncodeSupervisor::new(ffmpeg, settings);

        let existing = OutputSnapshot::take(&plan.output).await;
        let mut parser = ProgressParser::new(plan.duration_secs, plan.bitrate);
        let encoded = supervisor
            .run(
                input,
                &plan.output,
                |line| {
                    if let Some(sample) = parser.feed(line) {
                        observer.on_progress(job, &sample);
                    }
                },
                cancel,
            )
            .await;

        if let Err(e) = encoded {
            remove_partial_output(&plan.output, existing).await;
            if e.is_cancelled() {
                return Err(Halt::Cancelled);
            }
            return Err(Halt::Failed(e.into()));
        }

        // The encoder has exited and been reaped, so the output is complete.
        self.transition(job, JobState::Finalizing, observer);
        let done = parser.finish();
        observer.on_progress(job, &done);
        tracing::info!(%job, "Wrote {:?} in {:.1}s", plan.output, done.wall_secs);

        Ok(plan.output)
    }

    fn transition(&self, job: JobId, next: JobState, observer: &dyn JobObserver) {
        {
            let mut state = self.state.write();
            debug_assert!(
                state.can_transition_to(next),
                "illegal transition {} -> {}",
                *state,
                next
            );
            *state = next;
        }
        tracing::debug!(%job, "State -> {}", next);
        observer.on_state(job, next);
    }
}

/// Check the request before anything is launched.
fn validate(request: &TranscodeRequest) -> Result<&Path, JobError> {
    let input = request.input.as_deref().ok_or(JobError::NoFileSelected)?;
    if request.target_bytes == 0 {
        return Err(JobError::invalid_target_size("0"));
    }
    if !input.is_file() {
        return Err(JobError::InputNotFound {
            path: input.to_path_buf(),
        });
    }
    if !is_media_file(input) {
        // ffprobe has the final say.
        tracing::warn!("{:?} does not have a known media extension", input);
    }
    Ok(input)
}

/// Length and mtime of whatever sat at the output path before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputSnapshot {
    len: u64,
    modified: Option<SystemTime>,
}

impl OutputSnapshot {
    async fn take(path: &Path) -> Option<Self> {
        let meta = tokio::fs::metadata(path).await.ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Remove what the encoder left at `path`, unless it is the untouched file
/// that was there before the job.
async fn remove_partial_output(path: &Path, before: Option<OutputSnapshot>) {
    let after = OutputSnapshot::take(path).await;
    if after.is_none() {
        return;
    }
    if before.is_some() && before == after {
        tracing::debug!("Encoder never wrote {:?}, leaving it in place", path);
        return;
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial output {:?}: {}", path, e),
    }
}

/// A job running on its own task.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    cancel: CancellationToken,
    task: JoinHandle<JobResult>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Ask the job to stop. The encoder, if running, is killed; the job then
    /// ends as [`JobResult::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this job when fired.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the job to finish.
    pub async fn join(self) -> JobResult {
        match self.task.await {
            Ok(result) => result,
            Err(e) => JobResult::Failed {
                error: JobError::Internal {
                    message: format!("job task failed: {e}"),
                },
            },
        }
    }
}
