//! In-process progress bus backed by a `tokio::sync::broadcast` channel.
//!
//! Every successful job store mutation publishes the full updated
//! [`RenderJob`] snapshot here. Each subscriber gets an independent
//! buffered receiver; when a slow consumer falls behind the channel drops
//! its oldest pending snapshots (`RecvError::Lagged`) rather than blocking
//! the worker that produced the event.

use estudio_core::RenderJob;
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out hub for job snapshot events.
///
/// Snapshots for a single job are published in mutation order (the store
/// serializes writers per job), so every subscriber observes a given job's
/// progress in non-decreasing order. No ordering holds across jobs.
pub struct ProgressBus {
    sender: broadcast::Sender<RenderJob>,
}

impl ProgressBus {
    /// Create a bus with a specific per-subscriber buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a job snapshot to all current subscribers.
    ///
    /// With zero subscribers the snapshot is silently dropped — the store
    /// remains the source of truth and late subscribers fetch the current
    /// snapshot before streaming.
    pub fn publish(&self, snapshot: RenderJob) {
        // SendError only means there are no receivers right now.
        let _ = self.sender.send(snapshot);
    }

    /// Subscribe to all snapshots published on this bus.
    ///
    /// Callers filter by job id; per-job streams are assembled by the
    /// pipeline facade, which prepends the current snapshot.
    pub fn subscribe(&self) -> broadcast::Receiver<RenderJob> {
        self.sender.subscribe()
    }

    /// Number of live subscribers, for diagnostics.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
