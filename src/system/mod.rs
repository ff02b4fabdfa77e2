//! Pipeline orchestration and lifecycle.
//!
//! This module contains the top-level `ArPipeline` that assembles the
//! capture, tracking and rendering sides, the coordinator enforcing the
//! single-in-flight tracking cycle, and the domain events hosts consume.

pub mod coordinator;
pub mod events;
mod pipeline;

pub use coordinator::{Coordinator, PipelineState, PipelineStats};
pub use events::PipelineEvent;
pub use pipeline::ArPipeline;
