//! In-memory [`JobStore`] backend.
//!
//! A mutex-guarded map plus a FIFO queue of pending ids. Used in
//! single-process mode (no `DATABASE_URL`) and by the test suites; the
//! per-store mutex gives the same linearizable per-job semantics the
//! Postgres backend gets from row locking.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use estudio_core::{
    CoreError, JobCounts, JobError, JobId, JobStatus, NewRenderJob, RenderJob,
};
use estudio_events::ProgressBus;

use crate::store::{CancelOutcome, JobStore};

struct Inner {
    jobs: HashMap<JobId, RenderJob>,
    /// Pending ids in submission order. Ids whose job has left `Queued`
    /// (e.g. cancelled before a claim) are skipped at claim time.
    pending: VecDeque<JobId>,
}

/// Process-local job store.
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
    bus: Arc<ProgressBus>,
}

impl MemoryJobStore {
    pub fn new(bus: Arc<ProgressBus>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                pending: VecDeque::new(),
            }),
            bus,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mutex means a panic mid-mutation; job state is plain
        // data so continuing with it is safe.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, new: NewRenderJob) -> Result<RenderJob, CoreError> {
        let job = RenderJob {
            id: uuid::Uuid::now_v7(),
            project_id: new.project_id,
            user_id: new.user_id,
            options: new.options,
            status: JobStatus::Queued,
            progress: 0,
            output_location: None,
            error: None,
            cancel_requested: false,
            claimed_by: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };

        let mut inner = self.lock();
        inner.pending.push_back(job.id);
        inner.jobs.insert(job.id, job.clone());
        drop(inner);

        self.bus.publish(job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<RenderJob>, CoreError> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn claim_next(&self, worker: &str) -> Result<Option<RenderJob>, CoreError> {
        let claimed = {
            let mut inner = self.lock();
            loop {
                let Some(id) = inner.pending.pop_front() else {
                    break None;
                };
                let Some(job) = inner.jobs.get_mut(&id) else {
                    continue;
                };
                // Skip ids that left `Queued` while waiting (cancelled).
                if job.status != JobStatus::Queued {
                    continue;
                }
                job.status = JobStatus::Processing;
                job.progress = 0;
                job.started_at = Some(Utc::now());
                job.claimed_by = Some(worker.to_string());
                break Some(job.clone());
            }
        };

        if let Some(ref job) = claimed {
            self.bus.publish(job.clone());
        }
        Ok(claimed)
    }

    async fn update_progress(&self, id: JobId, percent: u8) -> Result<RenderJob, CoreError> {
        let snapshot = {
            let mut inner = self.lock();
            let job = inner.jobs.get_mut(&id).ok_or(CoreError::NotFound {
                entity: "RenderJob",
                id,
            })?;
            if job.status != JobStatus::Processing {
                return Err(CoreError::Conflict(format!(
                    "progress update on a job in {:?} state",
                    job.status
                )));
            }
            job.progress = job.progress.max(percent.min(100));
            job.clone()
        };

        self.bus.publish(snapshot.clone());
        Ok(snapshot)
    }

    async fn complete(
        &self,
        id: JobId,
        output_location: &str,
    ) -> Result<Option<RenderJob>, CoreError> {
        self.transition(id, JobStatus::Completed, |job| {
            job.output_location = Some(output_location.to_string());
            job.progress = 100;
        })
    }

    async fn fail(&self, id: JobId, error: JobError) -> Result<Option<RenderJob>, CoreError> {
        self.transition(id, JobStatus::Failed, |job| {
            job.error = Some(error);
        })
    }

    async fn mark_cancelled(&self, id: JobId) -> Result<Option<RenderJob>, CoreError> {
        self.transition(id, JobStatus::Cancelled, |_| {})
    }

    async fn request_cancel(&self, id: JobId) -> Result<CancelOutcome, CoreError> {
        let (outcome, snapshot) = {
            let mut inner = self.lock();
            let job = inner.jobs.get_mut(&id).ok_or(CoreError::NotFound {
                entity: "RenderJob",
                id,
            })?;
            match job.status {
                s if s.is_terminal() => (CancelOutcome::AlreadyTerminal, None),
                JobStatus::Queued => {
                    job.status = JobStatus::Cancelled;
                    job.cancel_requested = true;
                    job.completed_at = Some(Utc::now());
                    (CancelOutcome::Cancelled, Some(job.clone()))
                }
                _ => {
                    job.cancel_requested = true;
                    (CancelOutcome::Requested, Some(job.clone()))
                }
            }
        };

        if let Some(job) = snapshot {
            self.bus.publish(job);
        }
        Ok(outcome)
    }

    async fn cancel_requested(&self, id: JobId) -> Result<bool, CoreError> {
        self.lock()
            .jobs
            .get(&id)
            .map(|job| job.cancel_requested)
            .ok_or(CoreError::NotFound {
                entity: "RenderJob",
                id,
            })
    }

    async fn fail_orphaned(&self, reason: &str) -> Result<u64, CoreError> {
        let orphaned: Vec<RenderJob> = {
            let mut inner = self.lock();
            let now = Utc::now();
            inner
                .jobs
                .values_mut()
                .filter(|job| job.status == JobStatus::Processing)
                .map(|job| {
                    job.status = JobStatus::Failed;
                    job.error = Some(JobError::retryable(reason));
                    job.completed_at = Some(now);
                    job.clone()
                })
                .collect()
        };

        for job in &orphaned {
            self.bus.publish(job.clone());
        }
        Ok(orphaned.len() as u64)
    }

    async fn queue_depth(&self) -> Result<u64, CoreError> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Queued)
            .count() as u64)
    }

    async fn counts(&self) -> Result<JobCounts, CoreError> {
        let inner = self.lock();
        let mut counts = JobCounts::default();
        for job in inner.jobs.values() {
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
            }
        }
        Ok(counts)
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

impl MemoryJobStore {
    /// Shared terminal-transition path enforcing first-terminal-wins and
    /// the state machine table.
    fn transition(
        &self,
        id: JobId,
        to: JobStatus,
        apply: impl FnOnce(&mut RenderJob),
    ) -> Result<Option<RenderJob>, CoreError> {
        debug_assert!(to.is_terminal());

        let snapshot = {
            let mut inner = self.lock();
            let job = inner.jobs.get_mut(&id).ok_or(CoreError::NotFound {
                entity: "RenderJob",
                id,
            })?;
            if job.status.is_terminal() {
                return Ok(None);
            }
            if !job.status.can_transition_to(to) {
                return Err(CoreError::Conflict(format!(
                    "illegal transition {:?} -> {to:?}",
                    job.status
                )));
            }
            job.status = to;
            job.completed_at = Some(Utc::now());
            apply(job);
            job.clone()
        };

        self.bus.publish(snapshot.clone());
        Ok(Some(snapshot))
    }
}
