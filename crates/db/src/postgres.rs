//! PostgreSQL [`JobStore`] backend.
//!
//! The `render_jobs` table is both the durable record and the queue:
//! claims use `FOR UPDATE SKIP LOCKED` so concurrent workers (or multiple
//! server instances sharing one database) never double-dispatch a job, and
//! terminal updates are guarded by a status predicate so the first terminal
//! write wins at the row level.

use std::sync::Arc;

use async_trait::async_trait;
use estudio_core::{
    CoreError, JobCounts, JobError, JobId, JobStatus, NewRenderJob, RenderJob,
};
use estudio_events::ProgressBus;
use sqlx::{FromRow, PgPool};

use crate::store::{CancelOutcome, JobStore};
use crate::store_error;

/// Column list for `render_jobs` queries.
const COLUMNS: &str = "\
    id, project_id, user_id, options, status_id, progress, \
    output_location, error_message, error_retryable, cancel_requested, \
    claimed_by, created_at, started_at, completed_at";

/// Raw row shape; converted into the domain entity by [`JobRow::into_job`].
#[derive(FromRow)]
struct JobRow {
    id: JobId,
    project_id: String,
    user_id: String,
    options: serde_json::Value,
    status_id: i16,
    progress: i16,
    output_location: Option<String>,
    error_message: Option<String>,
    error_retryable: Option<bool>,
    cancel_requested: bool,
    claimed_by: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl JobRow {
    fn into_job(self) -> Result<RenderJob, CoreError> {
        let status = JobStatus::from_id(self.status_id).ok_or_else(|| {
            CoreError::Internal(format!("unknown status id {}", self.status_id))
        })?;
        let options = serde_json::from_value(self.options)
            .map_err(|e| CoreError::Internal(format!("corrupt options payload: {e}")))?;
        let error = self.error_message.map(|message| JobError {
            message,
            retryable: self.error_retryable.unwrap_or(false),
        });
        Ok(RenderJob {
            id: self.id,
            project_id: self.project_id,
            user_id: self.user_id,
            options,
            status,
            progress: self.progress.clamp(0, 100) as u8,
            output_location: self.output_location,
            error,
            cancel_requested: self.cancel_requested,
            claimed_by: self.claimed_by,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

/// Postgres-backed job store.
pub struct PgJobStore {
    pool: PgPool,
    bus: Arc<ProgressBus>,
}

impl PgJobStore {
    pub fn new(pool: PgPool, bus: Arc<ProgressBus>) -> Self {
        Self { pool, bus }
    }

    async fn fetch(&self, id: JobId) -> Result<Option<RenderJob>, CoreError> {
        let query = format!("SELECT {COLUMNS} FROM render_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(JobRow::into_job).transpose()
    }

    /// Run a guarded terminal update and resolve the no-row case.
    ///
    /// `None` from the UPDATE means the predicate did not match: either
    /// the job does not exist (NotFound), was already terminal (first
    /// terminal won — `Ok(None)`), or is in a state the transition table
    /// forbids (Conflict).
    async fn resolve_missed_transition(
        &self,
        id: JobId,
        to: JobStatus,
    ) -> Result<Option<RenderJob>, CoreError> {
        match self.fetch(id).await? {
            None => Err(CoreError::NotFound {
                entity: "RenderJob",
                id,
            }),
            Some(job) if job.status.is_terminal() => Ok(None),
            Some(job) => Err(CoreError::Conflict(format!(
                "illegal transition {:?} -> {to:?}",
                job.status
            ))),
        }
    }

    fn publish(&self, job: &RenderJob) {
        self.bus.publish(job.clone());
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, new: NewRenderJob) -> Result<RenderJob, CoreError> {
        let options = serde_json::to_value(&new.options)
            .map_err(|e| CoreError::Internal(format!("options serialization: {e}")))?;
        let query = format!(
            "INSERT INTO render_jobs (id, project_id, user_id, options, status_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(uuid::Uuid::now_v7())
            .bind(&new.project_id)
            .bind(&new.user_id)
            .bind(options)
            .bind(JobStatus::Queued.id())
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

        let job = row.into_job()?;
        self.publish(&job);
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<RenderJob>, CoreError> {
        self.fetch(id).await
    }

    async fn claim_next(&self, worker: &str) -> Result<Option<RenderJob>, CoreError> {
        let query = format!(
            "UPDATE render_jobs \
             SET status_id = $1, progress = 0, started_at = NOW(), claimed_by = $2 \
             WHERE id = ( \
                 SELECT id FROM render_jobs \
                 WHERE status_id = $3 \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Processing.id())
            .bind(worker)
            .bind(JobStatus::Queued.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        let claimed = row.map(JobRow::into_job).transpose()?;
        if let Some(ref job) = claimed {
            self.publish(job);
        }
        Ok(claimed)
    }

    async fn update_progress(&self, id: JobId, percent: u8) -> Result<RenderJob, CoreError> {
        let query = format!(
            "UPDATE render_jobs \
             SET progress = GREATEST(progress, LEAST($2::SMALLINT, 100)) \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(percent as i16)
            .bind(JobStatus::Processing.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        match row {
            Some(row) => {
                let job = row.into_job()?;
                self.publish(&job);
                Ok(job)
            }
            None => match self.fetch(id).await? {
                None => Err(CoreError::NotFound {
                    entity: "RenderJob",
                    id,
                }),
                Some(job) => Err(CoreError::Conflict(format!(
                    "progress update on a job in {:?} state",
                    job.status
                ))),
            },
        }
    }

    async fn complete(
        &self,
        id: JobId,
        output_location: &str,
    ) -> Result<Option<RenderJob>, CoreError> {
        let query = format!(
            "UPDATE render_jobs \
             SET status_id = $2, output_location = $3, progress = 100, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(JobStatus::Completed.id())
            .bind(output_location)
            .bind(JobStatus::Processing.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        match row {
            Some(row) => {
                let job = row.into_job()?;
                self.publish(&job);
                Ok(Some(job))
            }
            None => self.resolve_missed_transition(id, JobStatus::Completed).await,
        }
    }

    async fn fail(&self, id: JobId, error: JobError) -> Result<Option<RenderJob>, CoreError> {
        let query = format!(
            "UPDATE render_jobs \
             SET status_id = $2, error_message = $3, error_retryable = $4, completed_at = NOW() \
             WHERE id = $1 AND status_id = $5 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(JobStatus::Failed.id())
            .bind(&error.message)
            .bind(error.retryable)
            .bind(JobStatus::Processing.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        match row {
            Some(row) => {
                let job = row.into_job()?;
                self.publish(&job);
                Ok(Some(job))
            }
            None => self.resolve_missed_transition(id, JobStatus::Failed).await,
        }
    }

    async fn mark_cancelled(&self, id: JobId) -> Result<Option<RenderJob>, CoreError> {
        // Legal from both Queued and Processing.
        let query = format!(
            "UPDATE render_jobs \
             SET status_id = $2, completed_at = NOW() \
             WHERE id = $1 AND status_id IN ($3, $4) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(JobStatus::Cancelled.id())
            .bind(JobStatus::Queued.id())
            .bind(JobStatus::Processing.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        match row {
            Some(row) => {
                let job = row.into_job()?;
                self.publish(&job);
                Ok(Some(job))
            }
            None => self.resolve_missed_transition(id, JobStatus::Cancelled).await,
        }
    }

    async fn request_cancel(&self, id: JobId) -> Result<CancelOutcome, CoreError> {
        // Queued jobs cancel immediately.
        let query = format!(
            "UPDATE render_jobs \
             SET status_id = $2, cancel_requested = TRUE, completed_at = NOW() \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(JobStatus::Cancelled.id())
            .bind(JobStatus::Queued.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        if let Some(row) = row {
            self.publish(&row.into_job()?);
            return Ok(CancelOutcome::Cancelled);
        }

        // Processing jobs only get the flag; the worker finishes the job.
        let query = format!(
            "UPDATE render_jobs \
             SET cancel_requested = TRUE \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(JobStatus::Processing.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        if let Some(row) = row {
            self.publish(&row.into_job()?);
            return Ok(CancelOutcome::Requested);
        }

        match self.fetch(id).await? {
            None => Err(CoreError::NotFound {
                entity: "RenderJob",
                id,
            }),
            Some(_) => Ok(CancelOutcome::AlreadyTerminal),
        }
    }

    async fn cancel_requested(&self, id: JobId) -> Result<bool, CoreError> {
        let requested: Option<bool> =
            sqlx::query_scalar("SELECT cancel_requested FROM render_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
        requested.ok_or(CoreError::NotFound {
            entity: "RenderJob",
            id,
        })
    }

    async fn fail_orphaned(&self, reason: &str) -> Result<u64, CoreError> {
        let query = format!(
            "UPDATE render_jobs \
             SET status_id = $1, error_message = $2, error_retryable = TRUE, \
                 completed_at = NOW() \
             WHERE status_id = $3 \
             RETURNING {COLUMNS}"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Failed.id())
            .bind(reason)
            .bind(JobStatus::Processing.id())
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        let count = rows.len() as u64;
        for row in rows {
            self.publish(&row.into_job()?);
        }
        Ok(count)
    }

    async fn queue_depth(&self) -> Result<u64, CoreError> {
        let depth: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM render_jobs WHERE status_id = $1")
                .bind(JobStatus::Queued.id())
                .fetch_one(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(depth as u64)
    }

    async fn counts(&self) -> Result<JobCounts, CoreError> {
        let rows: Vec<(i16, i64)> = sqlx::query_as(
            "SELECT status_id, COUNT(*) FROM render_jobs GROUP BY status_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut counts = JobCounts::default();
        for (status_id, count) in rows {
            let count = count as u64;
            match JobStatus::from_id(status_id) {
                Some(JobStatus::Queued) => counts.queued = count,
                Some(JobStatus::Processing) => counts.processing = count,
                Some(JobStatus::Completed) => counts.completed = count,
                Some(JobStatus::Failed) => counts.failed = count,
                Some(JobStatus::Cancelled) => counts.cancelled = count,
                None => {
                    tracing::warn!(status_id, "unknown status id in render_jobs");
                }
            }
        }
        Ok(counts)
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(store_error)
    }
}
