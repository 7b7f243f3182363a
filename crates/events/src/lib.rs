//! Progress event fan-out for the render pipeline.
//!
//! [`ProgressBus`] is the in-process publish/subscribe hub that turns job
//! store mutations into a push stream. It is shared via `Arc<ProgressBus>`
//! across the stores, the pipeline facade, and the API.

pub mod bus;

pub use bus::ProgressBus;
