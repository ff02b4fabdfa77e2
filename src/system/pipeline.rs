//! AR pipeline - top-level assembly and lifecycle.
//!
//! `ArPipeline` is the struct hosts interact with. It computes the frame
//! geometry, spawns the tracker worker, sends the one-time `load`, and then
//! ties the two cadences together: every `tick` pumps tracker events through
//! the coordinator and runs one render tick on the last-known pose state.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use tracing::info;

use super::coordinator::{Coordinator, PipelineState, PipelineStats};
use super::events::PipelineEvent;
use crate::config::PipelineConfig;
use crate::frame::{FrameProcessor, FrameSource};
use crate::geometry::{FrameGeometry, TransformMatrix};
use crate::render::{RenderLoop, SceneRenderer};
use crate::tracker::{LoadRequest, Tracker, TrackerChannel};

/// The assembled real-time pipeline.
pub struct ArPipeline {
    coordinator: Coordinator,
    render_loop: RenderLoop,
    renderer: Box<dyn SceneRenderer>,
    events: Receiver<PipelineEvent>,
    target_fps: f64,
    shut_down: bool,
}

impl ArPipeline {
    /// Builds the pipeline around a tracker running on a worker thread.
    ///
    /// Fails on configuration errors (invalid config values, zero camera
    /// dimensions) without creating a partial pipeline.
    pub fn new<T: Tracker + 'static>(
        config: PipelineConfig,
        source: Box<dyn FrameSource>,
        tracker: T,
        renderer: Box<dyn SceneRenderer>,
    ) -> Result<Self> {
        Self::with_channel(config, source, TrackerChannel::spawn(tracker), renderer)
    }

    /// Builds the pipeline around an already-connected tracker channel.
    ///
    /// This is the entry point for genuinely out-of-process transports,
    /// where the host pumps the far end itself.
    pub fn with_channel(
        config: PipelineConfig,
        source: Box<dyn FrameSource>,
        channel: TrackerChannel,
        renderer: Box<dyn SceneRenderer>,
    ) -> Result<Self> {
        config.validate().context("pipeline configuration")?;

        let (raw_width, raw_height) = source.dimensions();
        let geometry = FrameGeometry::compute(
            raw_width,
            raw_height,
            config.target_long_edge,
            config.display,
        )
        .context("pipeline geometry")?;
        info!(
            "pipeline geometry computed: {raw_width}x{raw_height} -> {}x{}",
            geometry.processed_width, geometry.processed_height
        );

        let (event_tx, event_rx) = unbounded();
        let mut coordinator = Coordinator::new(
            channel,
            FrameProcessor::new(geometry),
            source,
            event_tx,
            config.target_long_edge,
            config.display,
        );
        coordinator.start(LoadRequest::new(&geometry, &config.assets))?;

        Ok(Self {
            coordinator,
            render_loop: RenderLoop::new(config.interpolation_factor),
            renderer,
            events: event_rx,
            target_fps: config.target_fps,
            shut_down: false,
        })
    }

    /// Runs one pipeline step: pump tracker events, then render.
    ///
    /// Windowed hosts call this from their vsync callback; it never blocks
    /// and never fails, per-tick errors are logged inside.
    pub fn tick(&mut self) {
        self.coordinator.pump();
        self.render_loop.tick(
            self.coordinator.pose(),
            self.coordinator.projection(),
            self.renderer.as_mut(),
        );
    }

    /// Runs `ticks` steps paced at the configured frame rate. For headless
    /// hosts and demos; blocks the calling thread between ticks.
    pub fn run_for(&mut self, ticks: u64) {
        let interval = Duration::from_secs_f64(1.0 / self.target_fps);
        let mut next = Instant::now();
        for _ in 0..ticks {
            self.tick();
            next += interval;
            if let Some(wait) = next.checked_duration_since(Instant::now()) {
                std::thread::sleep(wait);
            }
        }
    }

    /// Domain events for the host UI layer.
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    pub fn geometry(&self) -> &FrameGeometry {
        self.coordinator.geometry()
    }

    pub fn state(&self) -> PipelineState {
        self.coordinator.state()
    }

    pub fn stats(&self) -> PipelineStats {
        let mut stats = self.coordinator.stats();
        stats.render_ticks = self.render_loop.ticks();
        stats
    }

    /// Wall-clock time accumulated by the render loop.
    pub fn elapsed(&self) -> Duration {
        self.render_loop.elapsed()
    }

    /// Whether the tracked object is currently rendered.
    pub fn marker_visible(&self) -> bool {
        self.render_loop.marker_visible()
    }

    /// The current smoothed marker transform.
    pub fn smoothed_pose(&self) -> &TransformMatrix {
        self.render_loop.smoothed_pose()
    }

    /// Stops the pipeline: closes the tracker session (joining the worker
    /// when one was spawned) and releases capture buffers. Idempotent and
    /// safe from any state, including a stalled `AwaitingTrackerResponse`.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.coordinator.close();
        info!("pipeline shut down");
    }
}

impl Drop for ArPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
