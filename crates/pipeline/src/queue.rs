//! Read-only view of the admission queue.
//!
//! The store's pending set is the queue; this wrapper exposes its depth to
//! the autoscaler and the stats endpoint without introducing a second
//! source of truth.

use std::sync::Arc;

use estudio_core::{CoreError, JobCounts};
use estudio_db::JobStore;

#[derive(Clone)]
pub struct QueueView {
    store: Arc<dyn JobStore>,
}

impl QueueView {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Number of jobs waiting for a claim.
    pub async fn depth(&self) -> Result<u64, CoreError> {
        self.store.queue_depth().await
    }

    /// Per-status job counts.
    pub async fn counts(&self) -> Result<JobCounts, CoreError> {
        self.store.counts().await
    }
}
