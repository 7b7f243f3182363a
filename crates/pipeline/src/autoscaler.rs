//! Queue-depth autoscaler.
//!
//! A fixed-interval control loop samples queue depth and pool utilization
//! and adjusts the concurrency bound one step at a time. Decisions live in
//! [`ScalePlanner`], which is pure and unit-testable; the loop only samples
//! and applies. Hysteresis: a watermark must hold for `sustained_samples`
//! consecutive samples before the bound moves, so a transient burst does
//! not thrash the pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use estudio_db::JobStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::PipelineConfig;

/// Utilization below which a scale-down is allowed.
const LOW_UTILIZATION: f64 = 0.5;

/// Pure scaling decision state.
pub struct ScalePlanner {
    min: usize,
    max: usize,
    high_watermark: u64,
    low_watermark: u64,
    sustained_samples: u32,
    above: u32,
    below: u32,
}

impl ScalePlanner {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            min: config.min_workers,
            max: config.max_workers,
            high_watermark: config.queue_high_watermark,
            low_watermark: config.queue_low_watermark,
            sustained_samples: config.sustained_samples,
            above: 0,
            below: 0,
        }
    }

    /// Feed one sample; returns the new bound when it should move.
    ///
    /// Scale-up: depth above the high watermark for the sustained window.
    /// Scale-down: depth at or below the low watermark *and* utilization
    /// under [`LOW_UTILIZATION`] for the sustained window. Anything in
    /// between resets both streaks.
    pub fn plan(&mut self, depth: u64, busy: usize, limit: usize) -> Option<usize> {
        if depth > self.high_watermark {
            self.below = 0;
            self.above += 1;
            if self.above >= self.sustained_samples {
                self.above = 0;
                if limit < self.max {
                    return Some(limit + 1);
                }
            }
        } else if depth <= self.low_watermark && utilization(busy, limit) < LOW_UTILIZATION {
            self.above = 0;
            self.below += 1;
            if self.below >= self.sustained_samples {
                self.below = 0;
                if limit > self.min {
                    return Some(limit - 1);
                }
            }
        } else {
            self.above = 0;
            self.below = 0;
        }
        None
    }
}

fn utilization(busy: usize, limit: usize) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    busy as f64 / limit as f64
}

/// The sampling loop around [`ScalePlanner`].
pub struct Autoscaler {
    store: Arc<dyn JobStore>,
    limit: Arc<AtomicUsize>,
    busy: Arc<AtomicUsize>,
    config: PipelineConfig,
}

impl Autoscaler {
    pub fn new(
        store: Arc<dyn JobStore>,
        limit: Arc<AtomicUsize>,
        busy: Arc<AtomicUsize>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            limit,
            busy,
            config,
        }
    }

    /// Run the sampling loop until the cancellation token is triggered.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut planner = ScalePlanner::new(&self.config);
        let mut ticker = tokio::time::interval(self.config.autoscale_interval);
        info!(
            interval_ms = self.config.autoscale_interval.as_millis() as u64,
            min = self.config.min_workers,
            max = self.config.max_workers,
            "autoscaler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("autoscaler shutting down");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let depth = match self.store.queue_depth().await {
                Ok(depth) => depth,
                Err(e) => {
                    // Missing a sample is harmless; the streak just pauses.
                    warn!(error = %e, "queue depth sample failed");
                    continue;
                }
            };
            let busy = self.busy.load(Ordering::Relaxed);
            let limit = self.limit.load(Ordering::Relaxed);

            if let Some(new_limit) = planner.plan(depth, busy, limit) {
                self.limit.store(new_limit, Ordering::Relaxed);
                info!(
                    from = limit,
                    to = new_limit,
                    queue_depth = depth,
                    busy,
                    "concurrency bound adjusted"
                );
            }
        }
    }
}
