//! Pipeline configuration.
//!
//! Hosts usually ship this as a JSON file next to their marker assets; every
//! field has a default so a minimal config only names the tracker assets.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::{DisplayProfile, DEFAULT_TARGET_LONG_EDGE};
use crate::pose::DEFAULT_INTERPOLATION_FACTOR;

/// References to the assets the tracker loads at startup.
///
/// These are opaque to the pipeline; they are forwarded verbatim in the
/// `load` message and resolved by the tracker runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerAssets {
    /// Camera intrinsic parameters file.
    pub camera_params: String,
    /// Marker descriptor (basename of the trained feature set).
    pub marker: String,
    /// Location of the tracker runtime, for transports that fetch it.
    pub runtime: Option<String>,
    /// Prefix prepended to relative asset references.
    pub asset_root: Option<String>,
}

/// Everything the pipeline needs at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Long edge of the tracker working size, in pixels.
    pub target_long_edge: u32,
    /// Pose smoothing divisor; larger is slower and smoother.
    pub interpolation_factor: f64,
    /// Tick rate for the paced headless loop.
    pub target_fps: f64,
    /// Display sizing class of the host device.
    pub display: DisplayProfile,
    /// Tracker asset references.
    pub assets: TrackerAssets,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_long_edge: DEFAULT_TARGET_LONG_EDGE,
            interpolation_factor: DEFAULT_INTERPOLATION_FACTOR,
            target_fps: 60.0,
            display: DisplayProfile::desktop(),
            assets: TrackerAssets::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("invalid pipeline config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Rejects values the pipeline cannot be built from.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.target_long_edge > 0, "target long edge must be positive");
        ensure!(
            self.interpolation_factor >= 1.0,
            "interpolation factor must be at least 1"
        );
        ensure!(
            self.target_fps > 0.0 && self.target_fps.is_finite(),
            "target fps must be positive"
        );
        ensure!(
            !self.assets.camera_params.is_empty(),
            "camera parameters reference is required"
        );
        ensure!(!self.assets.marker.is_empty(), "marker reference is required");
        Ok(())
    }
}
