//! The [`JobStore`] trait: the single mutation surface for job state.
//!
//! All status writes go through these methods, which serialize concurrent
//! writers per job and enforce the transition table. Terminal transitions
//! follow first-terminal-wins: a second terminal write is an idempotent
//! no-op (`Ok(None)`), never an error, so a cancellation racing an encoder
//! success resolves cleanly on either side.

use async_trait::async_trait;
use estudio_core::{CoreError, JobCounts, JobError, JobId, NewRenderJob, RenderJob};

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was still queued and transitioned directly to `Cancelled`.
    Cancelled,
    /// The job is processing; the flag was set and the claiming worker
    /// will observe it on its next poll.
    Requested,
    /// The job already reached a terminal state; nothing changed.
    AlreadyTerminal,
}

impl CancelOutcome {
    /// Whether the cancellation was accepted (it is best-effort either way).
    pub fn accepted(self) -> bool {
        !matches!(self, CancelOutcome::AlreadyTerminal)
    }
}

/// Durable record of job identity, status, progress, and result location.
///
/// The pending set doubles as the job queue: [`claim_next`] dequeues in
/// FIFO order with an atomic `Queued -> Processing` compare-and-swap, so at
/// most one worker ever holds a claim on a job.
///
/// [`claim_next`]: JobStore::claim_next
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a job in `Queued` state. Options must already be validated.
    async fn create(&self, new: NewRenderJob) -> Result<RenderJob, CoreError>;

    /// Fetch a job snapshot. `Ok(None)` when the id is unknown.
    async fn get(&self, id: JobId) -> Result<Option<RenderJob>, CoreError>;

    /// Atomically claim the oldest queued job for `worker`.
    ///
    /// On success the job is `Processing` with `started_at` set and
    /// `progress` reset to 0. Returns `Ok(None)` when the queue is empty.
    async fn claim_next(&self, worker: &str) -> Result<Option<RenderJob>, CoreError>;

    /// Record encoder progress for a processing job.
    ///
    /// The stored value only moves forward: the effective percentage is
    /// `max(current, percent)` capped at 100. Updating a job that is not
    /// `Processing` is a caller contract violation and yields `Conflict`
    /// with no side effect.
    async fn update_progress(&self, id: JobId, percent: u8) -> Result<RenderJob, CoreError>;

    /// Transition `Processing -> Completed`, recording the output location.
    ///
    /// `Ok(None)` when the job was already terminal (first-terminal-wins).
    async fn complete(
        &self,
        id: JobId,
        output_location: &str,
    ) -> Result<Option<RenderJob>, CoreError>;

    /// Transition `Processing -> Failed`, recording the failure reason.
    ///
    /// `Ok(None)` when the job was already terminal.
    async fn fail(&self, id: JobId, error: JobError) -> Result<Option<RenderJob>, CoreError>;

    /// Transition to `Cancelled` (worker observed the cancel flag, or the
    /// job was still queued). `Ok(None)` when the job was already terminal.
    async fn mark_cancelled(&self, id: JobId) -> Result<Option<RenderJob>, CoreError>;

    /// Request cooperative cancellation.
    ///
    /// Queued jobs are cancelled immediately; processing jobs only get the
    /// flag set — the claiming worker performs the terminal transition.
    async fn request_cancel(&self, id: JobId) -> Result<CancelOutcome, CoreError>;

    /// Whether cancellation has been requested. Polled by workers.
    async fn cancel_requested(&self, id: JobId) -> Result<bool, CoreError>;

    /// Fail every job still marked `Processing`.
    ///
    /// Called once at process start: any claim recorded before a restart
    /// is orphaned, and the job would otherwise hang in `Processing`
    /// forever. Returns the number of jobs failed.
    async fn fail_orphaned(&self, reason: &str) -> Result<u64, CoreError>;

    /// Number of jobs currently queued. Sampled by the autoscaler.
    async fn queue_depth(&self) -> Result<u64, CoreError>;

    /// Per-status job counts.
    async fn counts(&self) -> Result<JobCounts, CoreError>;

    /// Verify the backing storage is reachable.
    async fn health_check(&self) -> Result<(), CoreError>;
}
