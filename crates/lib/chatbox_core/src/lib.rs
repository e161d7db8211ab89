//! # chatbox_core
//!
//! Core domain logic for Chatbox: validation, model invocation, media upload,
//! persistence, rate limiting and the pipeline that chains them.

pub mod ai;
pub mod media;
pub mod migrate;
pub mod models;
pub mod monitoring;
pub mod pipeline;
pub mod ratelimit;
pub mod store;
pub mod uuid;
pub mod validation;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
