//! Geometry utilities: letterbox layout and flat transform matrices.

pub mod letterbox;
pub mod matrix;

pub use letterbox::{DisplayProfile, FrameGeometry, DEFAULT_TARGET_LONG_EDGE};
pub use matrix::{correct_projection, TransformMatrix};
