//! Letterbox geometry for the tracker's processed buffer.
//!
//! The tracker expects a consistent 4:3-or-wider buffer regardless of the
//! camera's native aspect ratio. The camera frame is scaled down to a
//! working size and centered inside that buffer; the remainder is padding.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Default long edge of the tracker working size, in pixels.
pub const DEFAULT_TARGET_LONG_EDGE: u32 = 320;

/// Display sizing class of the host device.
///
/// Mobile-class hosts stretch the on-screen view to the device width;
/// desktop-class hosts show the camera frame at its native size. Platform
/// identification is the host's concern, so the class is injected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayProfile {
    /// Whether the host is a mobile-class device.
    pub mobile: bool,
    /// On-screen width to stretch to when `mobile` is set.
    pub width_hint: u32,
}

impl DisplayProfile {
    /// Desktop-class profile: display size equals the camera size.
    pub fn desktop() -> Self {
        Self::default()
    }

    /// Mobile-class profile stretching to `width_hint` pixels.
    pub fn mobile(width_hint: u32) -> Self {
        Self {
            mobile: true,
            width_hint,
        }
    }
}

/// Letterbox layout computed once at pipeline start.
///
/// Continuous quantities stay `f64`; the buffer dimensions are the ceiling
/// of the continuous processed size, so the no-crop invariants hold
/// exactly even for odd camera sizes:
///
/// ```text
/// processed_width  >= raw_width  * scale
/// processed_height >= raw_height * scale
/// ```
///
/// Offsets are measured against the integral buffer actually allocated,
/// centering the scaled image in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    /// Native camera frame size.
    pub raw_width: u32,
    pub raw_height: u32,
    /// Processing scale factor applied to the raw frame.
    pub scale: f64,
    /// Scaled image size inside the processed buffer.
    pub scaled_width: f64,
    pub scaled_height: f64,
    /// Processed buffer size handed to the tracker.
    pub processed_width: u32,
    pub processed_height: u32,
    /// Offsets of the scaled image within the processed buffer.
    pub offset_x: f64,
    pub offset_y: f64,
    /// On-screen display size for the renderer viewport.
    pub display_width: u32,
    pub display_height: u32,
}

impl FrameGeometry {
    /// Computes the letterbox layout for a `raw_width x raw_height` camera.
    ///
    /// `target_long_edge` fixes the working size the tracker operates at:
    ///
    /// ```text
    /// scale  = target / max(raw_w, raw_h * 4/3)
    /// w, h   = raw_w * scale, raw_h * scale
    /// pw, ph = max(w, h * 4/3), max(h, w * 3/4)
    /// ```
    ///
    /// Fails if either raw dimension or the target is zero. These are
    /// configuration errors; no pipeline is built from them.
    pub fn compute(
        raw_width: u32,
        raw_height: u32,
        target_long_edge: u32,
        display: DisplayProfile,
    ) -> Result<Self> {
        ensure!(
            raw_width > 0 && raw_height > 0,
            "invalid camera dimensions {}x{}",
            raw_width,
            raw_height
        );
        ensure!(target_long_edge > 0, "target long edge must be positive");
        if display.mobile {
            ensure!(
                display.width_hint > 0,
                "mobile display profile needs a width hint"
            );
        }

        let vw = raw_width as f64;
        let vh = raw_height as f64;

        let scale = target_long_edge as f64 / vw.max(vh * 4.0 / 3.0);
        let w = vw * scale;
        let h = vh * scale;

        // Force a 4:3-or-wider buffer without ever cropping the image.
        let pw = w.max(h * 4.0 / 3.0);
        let ph = h.max(w * 3.0 / 4.0);
        let processed_width = pw.ceil() as u32;
        let processed_height = ph.ceil() as u32;

        let offset_x = (processed_width as f64 - w) / 2.0;
        let offset_y = (processed_height as f64 - h) / 2.0;

        let display_scale = if display.mobile {
            display.width_hint as f64 / vw
        } else {
            1.0
        };
        let display_width = (vw * display_scale).round() as u32;
        let display_height = (vh * display_scale).round() as u32;

        Ok(Self {
            raw_width,
            raw_height,
            scale,
            scaled_width: w,
            scaled_height: h,
            processed_width,
            processed_height,
            offset_x,
            offset_y,
            display_width,
            display_height,
        })
    }

    /// Width correction ratio for the projection matrix.
    pub fn ratio_w(&self) -> f64 {
        self.processed_width as f64 / self.scaled_width
    }

    /// Height correction ratio for the projection matrix.
    pub fn ratio_h(&self) -> f64 {
        self.processed_height as f64 / self.scaled_height
    }

    /// Size of the processed RGBA buffer in bytes.
    pub fn processed_len(&self) -> usize {
        self.processed_width as usize * self.processed_height as usize * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vga_camera_maps_exactly() {
        let g = FrameGeometry::compute(640, 480, 320, DisplayProfile::desktop()).unwrap();

        assert_relative_eq!(g.scale, 0.5);
        assert_relative_eq!(g.scaled_width, 320.0);
        assert_relative_eq!(g.scaled_height, 240.0);
        assert_eq!((g.processed_width, g.processed_height), (320, 240));
        assert_relative_eq!(g.offset_x, 0.0);
        assert_relative_eq!(g.offset_y, 0.0);
    }

    #[test]
    fn test_wide_camera_pads_vertically() {
        let g = FrameGeometry::compute(1280, 720, 320, DisplayProfile::desktop()).unwrap();

        assert_relative_eq!(g.scale, 0.25);
        assert_relative_eq!(g.scaled_width, 320.0);
        assert_relative_eq!(g.scaled_height, 180.0);
        assert_eq!((g.processed_width, g.processed_height), (320, 240));
        assert_relative_eq!(g.offset_x, 0.0);
        assert_relative_eq!(g.offset_y, 30.0);
    }

    #[test]
    fn test_portrait_camera_pads_horizontally() {
        let g = FrameGeometry::compute(480, 640, 320, DisplayProfile::desktop()).unwrap();

        // scale = 320 / max(480, 640*4/3) = 320 / 853.33
        assert_relative_eq!(g.scale, 0.375, epsilon = 1e-12);
        assert_relative_eq!(g.scaled_width, 180.0);
        assert_relative_eq!(g.scaled_height, 240.0);
        assert_eq!((g.processed_width, g.processed_height), (320, 240));
        assert_relative_eq!(g.offset_x, 70.0);
        assert_relative_eq!(g.offset_y, 0.0);
    }

    #[test]
    fn test_letterbox_never_crops_and_centers() {
        let sizes = [
            (640u32, 480u32),
            (1280, 720),
            (1920, 1080),
            (480, 640),
            (333, 250),
            (641, 479),
            (1, 1),
            (3841, 2161),
        ];
        for (raw_w, raw_h) in sizes {
            let g = FrameGeometry::compute(raw_w, raw_h, 320, DisplayProfile::desktop()).unwrap();

            assert!(
                g.processed_width as f64 >= raw_w as f64 * g.scale - 1e-9,
                "{raw_w}x{raw_h}: width cropped"
            );
            assert!(
                g.processed_height as f64 >= raw_h as f64 * g.scale - 1e-9,
                "{raw_w}x{raw_h}: height cropped"
            );
            assert!(g.offset_x >= 0.0 && g.offset_y >= 0.0);
            assert_relative_eq!(
                2.0 * g.offset_x + g.scaled_width,
                g.processed_width as f64,
                epsilon = 1e-9
            );
            assert_relative_eq!(
                2.0 * g.offset_y + g.scaled_height,
                g.processed_height as f64,
                epsilon = 1e-9
            );
            // 4:3 or wider.
            assert!(
                g.processed_width as f64 + 1.0 >= g.processed_height as f64 * 4.0 / 3.0,
                "{raw_w}x{raw_h}: buffer narrower than 4:3"
            );
        }
    }

    #[test]
    fn test_zero_dimensions_are_configuration_errors() {
        assert!(FrameGeometry::compute(0, 480, 320, DisplayProfile::desktop()).is_err());
        assert!(FrameGeometry::compute(640, 0, 320, DisplayProfile::desktop()).is_err());
        assert!(FrameGeometry::compute(640, 480, 0, DisplayProfile::desktop()).is_err());
        assert!(FrameGeometry::compute(640, 480, 320, DisplayProfile::mobile(0)).is_err());
    }

    #[test]
    fn test_desktop_display_matches_camera() {
        let g = FrameGeometry::compute(640, 480, 320, DisplayProfile::desktop()).unwrap();
        assert_eq!((g.display_width, g.display_height), (640, 480));
    }

    #[test]
    fn test_mobile_display_stretches_to_width_hint() {
        let g = FrameGeometry::compute(640, 480, 320, DisplayProfile::mobile(1280)).unwrap();
        assert_eq!((g.display_width, g.display_height), (1280, 960));
    }

    #[test]
    fn test_projection_ratios() {
        let g = FrameGeometry::compute(1280, 720, 320, DisplayProfile::desktop()).unwrap();
        assert_relative_eq!(g.ratio_w(), 1.0);
        assert_relative_eq!(g.ratio_h(), 240.0 / 180.0);
    }
}
