//! The [`RenderJob`] entity and its status state machine.
//!
//! Status transitions are monotone: `Queued -> Processing` -> one of the
//! terminal states, or `Queued -> Cancelled` directly when cancellation
//! arrives before any worker claims the job. Terminal states accept no
//! further transitions — the first terminal write wins and later
//! conflicting writes are no-ops, never errors.

use serde::{Deserialize, Serialize};

use crate::options::RenderOptions;
use crate::types::{JobId, Timestamp};

/// Lifecycle status of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether the status is terminal (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// The transition table. `Queued` may move to `Processing` (worker
    /// claim) or straight to `Cancelled`; `Processing` may move to any
    /// terminal state; terminal states go nowhere.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match self {
            JobStatus::Queued => {
                matches!(next, JobStatus::Processing | JobStatus::Cancelled)
            }
            JobStatus::Processing => next.is_terminal(),
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => false,
        }
    }

    /// Database status id (SMALLINT column, matches migration seed order).
    pub fn id(self) -> i16 {
        match self {
            JobStatus::Queued => 1,
            JobStatus::Processing => 2,
            JobStatus::Completed => 3,
            JobStatus::Failed => 4,
            JobStatus::Cancelled => 5,
        }
    }

    /// Inverse of [`JobStatus::id`]; `None` for unknown ids.
    pub fn from_id(id: i16) -> Option<JobStatus> {
        match id {
            1 => Some(JobStatus::Queued),
            2 => Some(JobStatus::Processing),
            3 => Some(JobStatus::Completed),
            4 => Some(JobStatus::Failed),
            5 => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

/// Structured failure reason recorded when a job fails.
///
/// `retryable` distinguishes transient encoder conditions (resource
/// exhaustion, collaborator restarts) from permanent ones (malformed
/// timeline, unsupported options). Retrying is always a caller-driven
/// resubmission producing a new job id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub message: String,
    pub retryable: bool,
}

impl JobError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// One request to render a project into an output video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: JobId,
    pub project_id: String,
    pub user_id: String,
    pub options: RenderOptions,
    pub status: JobStatus,
    /// Percentage in `[0, 100]`. Meaningful only while `Processing`;
    /// resets to 0 when a worker claims the job.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Cooperative cancellation flag. Set by the cancel path, observed by
    /// the executing worker. Never forces a terminal state by itself.
    pub cancel_requested: bool,
    /// Name of the worker holding the claim, for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

/// Input for creating a job (already-validated options).
#[derive(Debug, Clone, Deserialize)]
pub struct NewRenderJob {
    pub project_id: String,
    pub user_id: String,
    pub options: RenderOptions,
}

/// Per-status job counts, used by the stats endpoint and the autoscaler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub queued: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl JobCounts {
    pub fn total(&self) -> u64 {
        self.queued + self.processing + self.completed + self.failed + self.cancelled
    }
}
