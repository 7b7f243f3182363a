//! Encoding backend boundary.
//!
//! The pipeline treats encoding as an external collaborator behind the
//! [`Encoder`] trait: it hands over a claimed job and its timeline, receives
//! progress percentages on a channel, and can request a cooperative stop
//! through a cancellation token. [`SimulatedEncoder`] is the in-tree backend;
//! [`command`] holds the ffmpeg argument builder a process-spawning backend
//! would feed.

pub mod command;
pub mod simulated;

use async_trait::async_trait;
use estudio_core::RenderJob;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use simulated::SimulatedEncoder;

/// Opaque description of the composed project to render.
///
/// Produced by the (external) document parsing pipeline; the encoder only
/// needs its duration and element count to size the work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    /// Total duration in milliseconds.
    pub duration_ms: u64,
    /// Slides, narration segments, avatar overlays.
    pub element_count: u32,
}

/// Successful encode result.
#[derive(Debug, Clone)]
pub struct EncodeOutput {
    /// Where the finished file was written.
    pub location: String,
}

/// Encoding failure, with a hint on whether resubmitting could succeed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct EncodeError {
    pub message: String,
    /// True for transient conditions (disk pressure, backend busy).
    pub retryable: bool,
}

impl EncodeError {
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

    /// Stop requested through the abort token and acknowledged.
    pub fn aborted() -> Self {
        Self {
            message: "encode aborted".to_string(),
            retryable: false,
        }
    }

    pub fn is_abort(&self) -> bool {
        self.message == "encode aborted"
    }
}

/// A video encoding backend.
///
/// Implementations report coarse progress (0..=100) through `progress_tx`
/// and must return promptly once `abort` is cancelled; the caller tears the
/// task down after a grace period either way.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(
        &self,
        job: &RenderJob,
        timeline: &Timeline,
        progress_tx: mpsc::Sender<u8>,
        abort: CancellationToken,
    ) -> Result<EncodeOutput, EncodeError>;
}
