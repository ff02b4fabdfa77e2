//! Render scheduling: per-tick pose application and scene rendering.
//!
//! The rendering backend is an external collaborator behind the
//! [`SceneRenderer`] trait. The loop itself only sequences a tick: advance
//! the clock, publish the projection once, smooth the pose, and render.
//! It never blocks on the tracker; a tick always renders the last-known
//! smoothed state.

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, warn};

use crate::geometry::TransformMatrix;
use crate::pose::PoseInterpolator;

/// Rendering backend contract.
///
/// The backend owns the scene graph, the virtual camera, and the tracked
/// root node; the loop drives it through these four calls.
pub trait SceneRenderer {
    /// Applies the corrected projection to the virtual camera. Called once.
    fn set_projection(&mut self, projection: &TransformMatrix);

    /// Applies the smoothed marker transform to the tracked root node.
    fn set_root_transform(&mut self, transform: &TransformMatrix);

    /// Shows or hides the tracked root node.
    fn set_visible(&mut self, visible: bool);

    /// Renders one frame of the scene.
    fn render(&mut self) -> Result<()>;
}

/// The continuously ticking render side of the pipeline.
///
/// Windowed hosts call [`RenderLoop::tick`] from their vsync callback;
/// headless hosts let the pipeline pace it. Either way the loop runs until
/// pipeline teardown and is independent of the tracker round-trip cadence.
pub struct RenderLoop {
    interpolator: PoseInterpolator,
    last_tick: Option<Instant>,
    elapsed: Duration,
    projection_applied: bool,
    ticks: u64,
}

impl RenderLoop {
    pub fn new(interpolation_factor: f64) -> Self {
        Self {
            interpolator: PoseInterpolator::new(interpolation_factor),
            last_tick: None,
            elapsed: Duration::ZERO,
            projection_applied: false,
            ticks: 0,
        }
    }

    /// Runs one tick against the latest shared pose state.
    ///
    /// `pose` is the last tracking response (`None` while the marker is
    /// lost), `projection` the corrected projection once the tracker has
    /// loaded. A renderer failure logs and skips the tick; the loop itself
    /// never propagates errors.
    pub fn tick(
        &mut self,
        pose: Option<&TransformMatrix>,
        projection: Option<&TransformMatrix>,
        renderer: &mut dyn SceneRenderer,
    ) {
        let now = Instant::now();
        if let Some(last) = self.last_tick {
            self.elapsed += now - last;
        }
        self.last_tick = Some(now);
        self.ticks += 1;

        if !self.projection_applied {
            if let Some(projection) = projection {
                renderer.set_projection(projection);
                self.projection_applied = true;
                debug!("projection matrix applied to render camera");
            }
        }

        self.interpolator.update(pose);
        renderer.set_visible(self.interpolator.visible());
        if self.interpolator.visible() {
            renderer.set_root_transform(self.interpolator.current());
        }

        if let Err(err) = renderer.render() {
            warn!("render tick skipped: {err:#}");
        }
    }

    /// Wall-clock time accumulated across ticks.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whether the tracked object is currently rendered.
    pub fn marker_visible(&self) -> bool {
        self.interpolator.visible()
    }

    /// The current smoothed transform.
    pub fn smoothed_pose(&self) -> &TransformMatrix {
        self.interpolator.current()
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
