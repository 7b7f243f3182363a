//! Render pipeline: worker pool, autoscaler, and the facade the HTTP
//! surface talks to.
//!
//! All shared mutable state lives in two places: the job store (status,
//! progress, results) and one `AtomicUsize` concurrency bound owned by the
//! autoscaler. Workers, the autoscaler, and API handlers coordinate only
//! through those, so there is no lock ordering to get wrong.

pub mod autoscaler;
pub mod config;
pub mod facade;
pub mod pool;
pub mod queue;
mod worker;

pub use autoscaler::{Autoscaler, ScalePlanner};
pub use config::PipelineConfig;
pub use facade::{RenderPipeline, SubmitRender, WorkerStatus};
pub use pool::WorkerPool;
pub use queue::QueueView;
