//! Camera frame acquisition contract.
//!
//! Device handling (permissions, constraint negotiation, decoding) is the
//! host's concern. The pipeline only needs the native size and a borrow of
//! the current RGBA frame at capture time.

use anyhow::Result;

/// One camera frame, borrowed from the source.
///
/// `data` is tightly packed RGBA8, row-major, `width * height * 4` bytes.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

/// Live video source feeding the pipeline.
///
/// Polled from the render thread, at most once per tracker round-trip.
pub trait FrameSource {
    /// Native frame dimensions as currently reported by the device.
    fn dimensions(&self) -> (u32, u32);

    /// Borrows the most recent frame.
    ///
    /// Failure here stalls the pipeline (no further frames are sent) but
    /// not the host process; it surfaces as a `CameraFailed` event and
    /// rendering continues on the last pose.
    fn capture(&mut self) -> Result<RawFrame<'_>>;
}
