//! The pipeline facade handed to the HTTP surface.
//!
//! Constructed once at startup and shared by `Arc`; owns the worker pool
//! and autoscaler tasks plus the concurrency bound they coordinate through.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use estudio_core::{CoreError, JobCounts, JobId, NewRenderJob, RenderJob, RenderOptions};
use estudio_db::JobStore;
use estudio_encoder::Encoder;
use estudio_events::ProgressBus;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::autoscaler::Autoscaler;
use crate::config::PipelineConfig;
use crate::pool::WorkerPool;
use crate::queue::QueueView;

/// A render submission, already scoped to a project and owner.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRender {
    pub project_id: String,
    pub user_id: String,
    pub options: RenderOptions,
}

/// Pool snapshot for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub running: bool,
    /// Current concurrency bound.
    pub concurrency: usize,
    /// Workers with a claimed job right now.
    pub busy: usize,
    pub min: usize,
    pub max: usize,
    pub queue_depth: u64,
}

pub struct RenderPipeline {
    store: Arc<dyn JobStore>,
    bus: Arc<ProgressBus>,
    encoder: Arc<dyn Encoder>,
    config: PipelineConfig,
    queue: QueueView,
    limit: Arc<AtomicUsize>,
    busy: Arc<AtomicUsize>,
    running: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RenderPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        bus: Arc<ProgressBus>,
        encoder: Arc<dyn Encoder>,
        config: PipelineConfig,
    ) -> Self {
        let queue = QueueView::new(Arc::clone(&store));
        Self {
            store,
            bus,
            encoder,
            limit: Arc::new(AtomicUsize::new(config.min_workers)),
            busy: Arc::new(AtomicUsize::new(0)),
            running: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            queue,
            config,
        }
    }

    /// Spawn the worker pool and the autoscaler.
    pub fn start(&self, shutdown: &CancellationToken) {
        let pool = WorkerPool::new(
            Arc::clone(&self.store),
            Arc::clone(&self.encoder),
            Arc::clone(&self.limit),
            Arc::clone(&self.busy),
            self.config.clone(),
        );
        let autoscaler = Autoscaler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.limit),
            Arc::clone(&self.busy),
            self.config.clone(),
        );

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.extend(pool.spawn(shutdown));
        tasks.push(tokio::spawn(autoscaler.run(shutdown.clone())));
        self.running.store(true, Ordering::Relaxed);
        info!(
            min = self.config.min_workers,
            max = self.config.max_workers,
            "render pipeline started"
        );
    }

    /// Join all background tasks. The caller cancels the shutdown token
    /// first; this only drains.
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
        let tasks: Vec<_> = {
            let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "background task did not shut down cleanly");
            }
        }
        info!("render pipeline stopped");
    }

    /// Fail every job whose claim did not survive the last restart.
    ///
    /// Called once at boot, before workers start claiming.
    pub async fn recover(&self) -> Result<u64, CoreError> {
        let recovered = self
            .store
            .fail_orphaned("render interrupted by a service restart")
            .await?;
        if recovered > 0 {
            warn!(jobs = recovered, "orphaned render jobs failed at startup");
        }
        Ok(recovered)
    }

    /// Validate options and enqueue a job.
    pub async fn submit(&self, request: SubmitRender) -> Result<RenderJob, CoreError> {
        if let Err(errors) = request.options.validate() {
            return Err(CoreError::InvalidOptions { errors });
        }
        let job = self
            .store
            .create(NewRenderJob {
                project_id: request.project_id,
                user_id: request.user_id,
                options: request.options,
            })
            .await?;
        info!(job_id = %job.id, project_id = %job.project_id, "render job submitted");
        Ok(job)
    }

    /// Fetch a job snapshot.
    pub async fn status(&self, id: JobId) -> Result<RenderJob, CoreError> {
        self.store
            .get(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "RenderJob",
                id,
            })
    }

    /// Request cancellation. Returns whether the request was accepted;
    /// `false` means the job had already reached a terminal state.
    pub async fn cancel(&self, id: JobId) -> Result<bool, CoreError> {
        let outcome = self.store.request_cancel(id).await?;
        info!(job_id = %id, ?outcome, "cancellation requested");
        Ok(outcome.accepted())
    }

    /// Per-status job counts for the stats endpoint.
    pub async fn counts(&self) -> Result<JobCounts, CoreError> {
        self.queue.counts().await
    }

    /// Stream of full job snapshots: the current state first, then every
    /// subsequent mutation, ending after the first terminal snapshot.
    pub async fn subscribe(
        &self,
        id: JobId,
    ) -> Result<impl Stream<Item = RenderJob> + Send + 'static, CoreError> {
        // Subscribe before reading the snapshot so no update can fall into
        // the gap between the two.
        let rx = self.bus.subscribe();
        let snapshot = self.status(id).await?;

        let updates = BroadcastStream::new(rx).filter_map(move |item| {
            // Lagged subscribers lose the oldest snapshots; later ones carry
            // the monotone progress forward.
            futures::future::ready(match item {
                Ok(job) if job.id == id => Some(job),
                _ => None,
            })
        });

        let stream = futures::stream::once(futures::future::ready(snapshot))
            .chain(updates)
            .scan((false, 0u8), |(closed, last), job| {
                if *closed {
                    return futures::future::ready(None);
                }
                // Updates buffered while the snapshot was being fetched can
                // be older than the snapshot itself; drop anything that
                // would move progress backwards.
                if !job.status.is_terminal() && job.progress < *last {
                    return futures::future::ready(Some(None));
                }
                *last = job.progress;
                if job.status.is_terminal() {
                    *closed = true;
                }
                futures::future::ready(Some(Some(job)))
            })
            .filter_map(futures::future::ready);
        Ok(stream)
    }

    /// Pool snapshot for the admin surface.
    pub async fn worker_status(&self) -> Result<WorkerStatus, CoreError> {
        Ok(WorkerStatus {
            running: self.running.load(Ordering::Relaxed),
            concurrency: self.limit.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::Relaxed),
            min: self.config.min_workers,
            max: self.config.max_workers,
            queue_depth: self.queue.depth().await?,
        })
    }

    /// Manually set the concurrency bound, clamped to the configured range.
    /// Returns the effective bound.
    pub fn scale(&self, count: usize) -> usize {
        let effective = count.clamp(self.config.min_workers, self.config.max_workers);
        let previous = self.limit.swap(effective, Ordering::Relaxed);
        info!(requested = count, effective, previous, "concurrency bound set");
        effective
    }

    /// Verify the backing store is reachable.
    pub async fn health_check(&self) -> Result<(), CoreError> {
        self.store.health_check().await
    }
}
