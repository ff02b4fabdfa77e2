//! Camera frame acquisition and letterbox processing.

pub mod processor;
pub mod source;

pub use processor::{FrameBuffer, FrameProcessor};
pub use source::{FrameSource, RawFrame};
