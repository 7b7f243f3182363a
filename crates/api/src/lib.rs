//! HTTP surface over the render pipeline.
//!
//! Exposed as a library so integration tests can build the full router
//! (middleware included) and drive it with `tower::ServiceExt::oneshot`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;
