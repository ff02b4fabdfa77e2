//! Domain events re-published to the host.
//!
//! External UI layers react to these without ever touching the tracker
//! protocol: loading screens, marker metadata displays, error banners.

use crate::tracker::MarkerInfo;

/// Events delivered on the pipeline's unbounded event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Marker metadata became available (re-published `nftData`).
    MarkerInfo(MarkerInfo),
    /// Tracker setup and asset loading completed; drives the host's
    /// one-time loading-screen transition.
    LoadingDone,
    /// The tracker session closed. Rendering continues on the last pose;
    /// recovery is the host's decision.
    TrackerDisconnected,
    /// Frame acquisition failed. No further frames are sent; rendering
    /// continues on the last pose.
    CameraFailed(String),
}
