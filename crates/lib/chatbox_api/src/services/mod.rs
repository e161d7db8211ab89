//! Service wiring between configuration and the core pipeline.

pub mod pipeline;
