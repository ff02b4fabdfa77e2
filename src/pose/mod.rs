//! Pose smoothing for jitter-free rendering.

pub mod interpolator;

pub use interpolator::{PoseInterpolator, DEFAULT_INTERPOLATION_FACTOR};
