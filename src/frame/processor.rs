//! Frame Processor: normalizes camera frames into the tracker's buffer.
//!
//! Each capture fills a fresh processed buffer with the letterbox color,
//! scales the camera frame down to the working size, and blits it at the
//! letterbox offsets. The result is handed off by value because the
//! transport moves the backing memory instead of copying it.

use anyhow::{ensure, Context, Result};
use fast_image_resize as fr;
use serde::{Deserialize, Serialize};

use crate::frame::source::FrameSource;
use crate::geometry::FrameGeometry;

/// Letterbox fill: opaque black.
const FILL_RGBA: [u8; 4] = [0, 0, 0, 255];

/// An owned processed pixel buffer bound for the tracker.
///
/// RGBA8, `width * height * 4` bytes. Sending it moves the backing memory
/// into the channel; nothing on the render side keeps a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Allocates a buffer filled with the letterbox color.
    fn filled(width: u32, height: u32) -> Self {
        let mut data = vec![0u8; width as usize * height as usize * 4];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&FILL_RGBA);
        }
        Self {
            width,
            height,
            data,
        }
    }
}

/// Draws camera frames into fixed-size letterboxed buffers.
///
/// One `FrameBuffer` is allocated per capture and ownership transfers to
/// the caller; the scratch space for the scaled image is reused across
/// captures. Only the coordinator calls `capture`, and only while the
/// pipeline is idle, which is what bounds this to one allocation per
/// tracker round-trip.
pub struct FrameProcessor {
    geometry: FrameGeometry,
    resizer: fr::Resizer,
    scaled_buf: Vec<u8>,
}

impl FrameProcessor {
    pub fn new(geometry: FrameGeometry) -> Self {
        Self {
            geometry,
            resizer: fr::Resizer::new(),
            scaled_buf: Vec::new(),
        }
    }

    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// Replaces the layout after a camera dimension change.
    pub fn set_geometry(&mut self, geometry: FrameGeometry) {
        self.geometry = geometry;
    }

    /// Frees the reusable scratch space. Part of pipeline teardown; the
    /// processor remains usable, the next capture just reallocates.
    pub fn release_buffers(&mut self) {
        self.scaled_buf = Vec::new();
    }

    /// Captures one processed buffer: fill, scale, blit.
    pub fn capture(&mut self, source: &mut dyn FrameSource) -> Result<FrameBuffer> {
        let frame = source.capture()?;
        let geometry = self.geometry;
        ensure!(
            frame.width == geometry.raw_width && frame.height == geometry.raw_height,
            "camera delivered {}x{} but geometry expects {}x{}",
            frame.width,
            frame.height,
            geometry.raw_width,
            geometry.raw_height
        );
        let expected_len = frame.width as usize * frame.height as usize * 4;
        ensure!(
            frame.data.len() == expected_len,
            "camera frame is {} bytes, expected {}",
            frame.data.len(),
            expected_len
        );

        // Snap the continuous working size to the pixel grid for resizing.
        let scaled_w = (geometry.scaled_width.round() as u32).max(1);
        let scaled_h = (geometry.scaled_height.round() as u32).max(1);

        let src = fr::images::ImageRef::new(frame.width, frame.height, frame.data, fr::PixelType::U8x4)
            .context("failed to wrap camera frame for resizing")?;

        let scaled_len = (scaled_w * scaled_h * 4) as usize;
        if self.scaled_buf.len() != scaled_len {
            self.scaled_buf.resize(scaled_len, 0);
        }
        let mut dst = fr::images::Image::from_vec_u8(
            scaled_w,
            scaled_h,
            std::mem::take(&mut self.scaled_buf),
            fr::PixelType::U8x4,
        )
        .context("failed to create scale destination")?;

        // Camera frames are opaque, so skip the alpha multiply passes.
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear))
            .use_alpha(false);
        self.resizer
            .resize(&src, &mut dst, Some(&options))
            .context("frame scale failed")?;
        self.scaled_buf = dst.into_vec();

        let mut out = FrameBuffer::filled(geometry.processed_width, geometry.processed_height);
        let offset_x = ((geometry.processed_width - scaled_w) / 2) as usize;
        let offset_y = ((geometry.processed_height - scaled_h) / 2) as usize;
        let canvas_stride = geometry.processed_width as usize * 4;
        let scaled_stride = scaled_w as usize * 4;
        for row in 0..scaled_h as usize {
            let dst_start = (offset_y + row) * canvas_stride + offset_x * 4;
            out.data[dst_start..dst_start + scaled_stride]
                .copy_from_slice(&self.scaled_buf[row * scaled_stride..(row + 1) * scaled_stride]);
        }
        Ok(out)
    }
}
