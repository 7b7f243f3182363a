//! Domain model for the render pipeline.
//!
//! Pure types and functions shared by every other crate: the [`RenderJob`]
//! entity and its status state machine, render option validation, and the
//! [`CoreError`] taxonomy. This crate has no async runtime or I/O
//! dependencies so the state machine stays trivially testable.

pub mod error;
pub mod job;
pub mod options;
pub mod types;

pub use error::CoreError;
pub use job::{JobCounts, JobError, JobStatus, NewRenderJob, RenderJob};
pub use options::{AudioCodec, AudioOptions, Codec, Format, Quality, RenderOptions, Resolution};
pub use types::{JobId, Timestamp};
