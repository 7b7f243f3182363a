//! Bounded worker pool.
//!
//! `max_workers` executor loops are spawned once at startup; the effective
//! concurrency is the autoscaler-owned atomic bound, which workers above
//! the bound observe by idling. Scaling never spawns or kills tasks and
//! never preempts an in-flight job.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use estudio_db::JobStore;
use estudio_encoder::Encoder;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::PipelineConfig;
use crate::worker::Worker;

pub struct WorkerPool {
    store: Arc<dyn JobStore>,
    encoder: Arc<dyn Encoder>,
    limit: Arc<AtomicUsize>,
    busy: Arc<AtomicUsize>,
    config: PipelineConfig,
}

impl WorkerPool {
    pub fn new(
        store: Arc<dyn JobStore>,
        encoder: Arc<dyn Encoder>,
        limit: Arc<AtomicUsize>,
        busy: Arc<AtomicUsize>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            encoder,
            limit,
            busy,
            config,
        }
    }

    /// Spawn all worker loops. Handles are joined at shutdown.
    pub fn spawn(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        info!(
            workers = self.config.max_workers,
            "worker pool starting"
        );
        (0..self.config.max_workers)
            .map(|index| {
                let worker = Worker::new(
                    index,
                    Arc::clone(&self.store),
                    Arc::clone(&self.encoder),
                    Arc::clone(&self.limit),
                    Arc::clone(&self.busy),
                    &self.config,
                );
                tokio::spawn(worker.run(shutdown.clone()))
            })
            .collect()
    }
}
