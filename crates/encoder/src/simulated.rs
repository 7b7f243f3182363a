//! Simulated encoding backend.
//!
//! Walks the real pipeline's stages without touching ffmpeg: prepare assets
//! (20%), render video (60%), compose audio (80%), finalize (100%). Pacing
//! is configurable so integration tests can run jobs in milliseconds, and
//! the abort token is checked between every progress step.

use std::time::Duration;

use async_trait::async_trait;
use estudio_core::RenderJob;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{EncodeError, EncodeOutput, Encoder, Timeline};

/// Stage name and the progress percentage reached when it finishes.
const STAGES: [(&str, u8); 4] = [
    ("prepare-assets", 20),
    ("render-video", 60),
    ("compose-audio", 80),
    ("finalize", 100),
];

/// In-process encoder standing in for the external render farm.
pub struct SimulatedEncoder {
    /// Pause between progress steps.
    step_delay: Duration,
    /// Directory prefix for output locations.
    output_dir: String,
    /// When set, every encode fails with this error after the first stage.
    fail_with: Option<EncodeError>,
}

impl SimulatedEncoder {
    pub fn new(step_delay: Duration) -> Self {
        Self {
            step_delay,
            output_dir: "/renders".to_string(),
            fail_with: None,
        }
    }

    /// Fast pacing for tests: a full job finishes in a few milliseconds.
    pub fn instant() -> Self {
        Self::new(Duration::from_millis(1))
    }

    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Make every encode fail. Test hook for the failure path.
    pub fn failing_with(mut self, error: EncodeError) -> Self {
        self.fail_with = Some(error);
        self
    }

    fn output_location(&self, job: &RenderJob) -> String {
        format!(
            "{}/{}.{}",
            self.output_dir,
            job.id,
            job.options.format.extension()
        )
    }
}

impl Default for SimulatedEncoder {
    fn default() -> Self {
        Self::new(Duration::from_millis(150))
    }
}

#[async_trait]
impl Encoder for SimulatedEncoder {
    async fn encode(
        &self,
        job: &RenderJob,
        timeline: &Timeline,
        progress_tx: mpsc::Sender<u8>,
        abort: CancellationToken,
    ) -> Result<EncodeOutput, EncodeError> {
        debug!(
            job_id = %job.id,
            duration_ms = timeline.duration_ms,
            elements = timeline.element_count,
            "simulated encode starting"
        );

        let mut reported = 0u8;
        for (stage, target) in STAGES {
            // Several steps per stage so progress moves smoothly.
            while reported < target {
                if abort.is_cancelled() {
                    debug!(job_id = %job.id, stage, "encode aborted");
                    return Err(EncodeError::aborted());
                }
                tokio::select! {
                    _ = abort.cancelled() => {
                        debug!(job_id = %job.id, stage, "encode aborted");
                        return Err(EncodeError::aborted());
                    }
                    _ = tokio::time::sleep(self.step_delay) => {}
                }
                reported = (reported + 5).min(target);
                // Receiver gone means the worker stopped relaying; the abort
                // token will fire shortly, keep checking it.
                let _ = progress_tx.send(reported).await;
            }
            debug!(job_id = %job.id, stage, progress = reported, "stage complete");

            if let Some(ref error) = self.fail_with {
                return Err(error.clone());
            }
        }

        Ok(EncodeOutput {
            location: self.output_location(job),
        })
    }
}
