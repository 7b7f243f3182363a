//! Worker executor loop.
//!
//! Each worker polls for a claimable job, runs the encoder with a progress
//! channel and a per-job abort token, and records the outcome. A worker
//! never crashes on a failed job and never retries one; resubmission is the
//! caller's decision.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use estudio_core::{JobError, RenderJob};
use estudio_db::JobStore;
use estudio_encoder::{EncodeError, Encoder, Timeline};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;

/// Back-off after a failed claim poll so a store outage does not spin the
/// loop at full speed.
const CLAIM_ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub(crate) struct Worker {
    index: usize,
    name: String,
    store: Arc<dyn JobStore>,
    encoder: Arc<dyn Encoder>,
    /// Autoscaler-owned concurrency bound; this worker participates only
    /// while `index < limit`.
    limit: Arc<AtomicUsize>,
    /// Pool-wide count of workers with a claimed job.
    busy: Arc<AtomicUsize>,
    claim_poll_interval: Duration,
    cancel_poll_interval: Duration,
    cancel_grace_period: Duration,
}

impl Worker {
    pub(crate) fn new(
        index: usize,
        store: Arc<dyn JobStore>,
        encoder: Arc<dyn Encoder>,
        limit: Arc<AtomicUsize>,
        busy: Arc<AtomicUsize>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            index,
            name: format!("worker-{index}"),
            store,
            encoder,
            limit,
            busy,
            claim_poll_interval: config.claim_poll_interval,
            cancel_poll_interval: config.cancel_poll_interval,
            cancel_grace_period: config.cancel_grace_period,
        }
    }

    /// Run the claim loop until the cancellation token is triggered.
    pub(crate) async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.claim_poll_interval);
        debug!(worker = %self.name, "worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(worker = %self.name, "worker shutting down");
                    break;
                }
                _ = ticker.tick() => {}
            }

            // Scaled-down workers keep ticking but do not claim.
            if self.index >= self.limit.load(Ordering::Relaxed) {
                continue;
            }

            match self.store.claim_next(&self.name).await {
                Ok(Some(job)) => {
                    self.busy.fetch_add(1, Ordering::Relaxed);
                    self.process(job, &shutdown).await;
                    self.busy.fetch_sub(1, Ordering::Relaxed);
                }
                Ok(None) => {}
                Err(e) => {
                    // Store outage: log, back off, keep polling. In-flight
                    // jobs on other workers are unaffected.
                    warn!(worker = %self.name, error = %e, "claim poll failed");
                    tokio::time::sleep(CLAIM_ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Drive one claimed job to a terminal state.
    async fn process(&self, job: RenderJob, shutdown: &CancellationToken) {
        info!(worker = %self.name, job_id = %job.id, "job claimed");

        // Child of the shutdown token: process shutdown aborts the encode
        // the same way a cancel request does.
        let abort = shutdown.child_token();
        let (progress_tx, mut progress_rx) = mpsc::channel::<u8>(32);

        let mut encode = {
            let encoder = Arc::clone(&self.encoder);
            let job = job.clone();
            let abort = abort.clone();
            // Timeline retrieval belongs to the parsing pipeline; the
            // encoder boundary only needs the handle.
            tokio::spawn(
                async move { encoder.encode(&job, &Timeline::default(), progress_tx, abort).await },
            )
        };

        let mut cancel_ticker = tokio::time::interval(self.cancel_poll_interval);
        cancel_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                res = &mut encode => break res,
                Some(percent) = progress_rx.recv() => {
                    if let Err(e) = self.store.update_progress(job.id, percent).await {
                        debug!(job_id = %job.id, error = %e, "progress update rejected");
                    }
                }
                _ = cancel_ticker.tick() => {
                    let requested = match self.store.cancel_requested(job.id).await {
                        Ok(flag) => flag,
                        Err(e) => {
                            warn!(job_id = %job.id, error = %e, "cancel poll failed");
                            false
                        }
                    };
                    if requested {
                        self.cancel_job(&job, abort.clone(), encode).await;
                        return;
                    }
                }
            }
        };

        match result {
            Ok(Ok(output)) => {
                match self.store.complete(job.id, &output.location).await {
                    Ok(Some(_)) => {
                        info!(worker = %self.name, job_id = %job.id, location = %output.location, "job completed");
                    }
                    // A racing cancel reached terminal first.
                    Ok(None) => {
                        debug!(job_id = %job.id, "completion lost the terminal race");
                    }
                    Err(e) => error!(job_id = %job.id, error = %e, "failed to record completion"),
                }
            }
            Ok(Err(err)) if err.is_abort() => {
                // Abort without a cancel request means the process is
                // shutting down; the job is re-derived as retryable.
                self.record_failure(
                    &job,
                    JobError::retryable("render interrupted by shutdown"),
                )
                .await;
            }
            Ok(Err(err)) => {
                warn!(worker = %self.name, job_id = %job.id, error = %err, retryable = err.retryable, "encode failed");
                let error = JobError {
                    message: err.message,
                    retryable: err.retryable,
                };
                self.record_failure(&job, error).await;
            }
            Err(join_err) => {
                error!(job_id = %job.id, error = %join_err, "encoder task panicked");
                self.record_failure(&job, JobError::retryable("encoder task panicked")).await;
            }
        }
    }

    /// Cooperative teardown after a cancel request: trigger the abort token,
    /// give the encoder the grace period to stop cleanly, then abort the
    /// task outright. The job is marked cancelled either way.
    async fn cancel_job(
        &self,
        job: &RenderJob,
        abort: CancellationToken,
        mut encode: tokio::task::JoinHandle<Result<estudio_encoder::EncodeOutput, EncodeError>>,
    ) {
        info!(worker = %self.name, job_id = %job.id, "cancel requested, aborting encode");
        abort.cancel();

        match tokio::time::timeout(self.cancel_grace_period, &mut encode).await {
            Ok(_) => debug!(job_id = %job.id, "encoder acknowledged abort"),
            Err(_) => {
                warn!(job_id = %job.id, "encoder ignored abort within grace period, tearing down");
                encode.abort();
            }
        }

        match self.store.mark_cancelled(job.id).await {
            Ok(Some(_)) => info!(job_id = %job.id, "job cancelled"),
            Ok(None) => debug!(job_id = %job.id, "cancellation lost the terminal race"),
            Err(e) => error!(job_id = %job.id, error = %e, "failed to record cancellation"),
        }
    }

    async fn record_failure(&self, job: &RenderJob, error: JobError) {
        match self.store.fail(job.id, error).await {
            Ok(Some(_)) => {}
            Ok(None) => debug!(job_id = %job.id, "failure lost the terminal race"),
            Err(e) => error!(job_id = %job.id, error = %e, "failed to record failure"),
        }
    }
}
