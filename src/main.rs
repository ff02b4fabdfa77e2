use std::f64::consts::TAU;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use rust_arnft::config::{PipelineConfig, TrackerAssets};
use rust_arnft::frame::{FrameBuffer, FrameSource, RawFrame};
use rust_arnft::geometry::TransformMatrix;
use rust_arnft::render::SceneRenderer;
use rust_arnft::system::{ArPipeline, PipelineEvent};
use rust_arnft::tracker::{LoadRequest, MarkerInfo, Tracker, TrackerEvent};

/// Synthetic 640x480 camera: a gradient that drifts a little every frame,
/// standing in for a live video element.
struct SyntheticCamera {
    frame: Vec<u8>,
    ticks: u32,
}

impl SyntheticCamera {
    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 480;

    fn new() -> Self {
        Self {
            frame: vec![0; (Self::WIDTH * Self::HEIGHT * 4) as usize],
            ticks: 0,
        }
    }
}

impl FrameSource for SyntheticCamera {
    fn dimensions(&self) -> (u32, u32) {
        (Self::WIDTH, Self::HEIGHT)
    }

    fn capture(&mut self) -> Result<RawFrame<'_>> {
        self.ticks = self.ticks.wrapping_add(1);
        let shift = self.ticks;
        for y in 0..Self::HEIGHT {
            for x in 0..Self::WIDTH {
                let i = ((y * Self::WIDTH + x) * 4) as usize;
                self.frame[i] = ((x + shift) % 256) as u8;
                self.frame[i + 1] = (y % 256) as u8;
                self.frame[i + 2] = 64;
                self.frame[i + 3] = 255;
            }
        }
        Ok(RawFrame {
            data: &self.frame,
            width: Self::WIDTH,
            height: Self::HEIGHT,
        })
    }
}

/// Scripted tracker: loads instantly, then reports a pose orbiting the
/// camera with a detection dropout every eighth cycle.
struct OrbitingTracker {
    cycle: u64,
}

impl Tracker for OrbitingTracker {
    fn load(&mut self, request: LoadRequest) -> Result<Vec<TrackerEvent>> {
        let mut projection = TransformMatrix::IDENTITY;
        // Crude perspective projection, enough for a demo camera.
        projection[0] = 2.0;
        projection[5] = 2.0 * request.processed_width as f64 / request.processed_height as f64;
        projection[11] = -1.0;
        Ok(vec![
            TrackerEvent::Loaded { projection },
            TrackerEvent::NftData {
                marker: MarkerInfo {
                    dpi: 72.0,
                    width: 637.0,
                    height: 463.0,
                },
            },
            TrackerEvent::EndLoading { end: true },
        ])
    }

    fn process(&mut self, _frame: FrameBuffer) -> Result<TrackerEvent> {
        self.cycle += 1;
        if self.cycle % 8 == 0 {
            return Ok(TrackerEvent::NotFound);
        }
        let angle = self.cycle as f64 * TAU / 120.0;
        let mut pose = TransformMatrix::IDENTITY;
        pose[12] = 100.0 * angle.cos();
        pose[13] = 100.0 * angle.sin();
        pose[14] = -400.0;
        Ok(TrackerEvent::Found { pose })
    }
}

/// Renderer that prints the smoothed marker position instead of drawing.
#[derive(Default)]
struct ConsoleRenderer {
    transform: TransformMatrix,
    visible: bool,
    frames: u64,
}

impl SceneRenderer for ConsoleRenderer {
    fn set_projection(&mut self, projection: &TransformMatrix) {
        println!(
            "projection applied: fx={:.2} fy={:.2}",
            projection[0], projection[5]
        );
    }

    fn set_root_transform(&mut self, transform: &TransformMatrix) {
        self.transform = *transform;
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn render(&mut self) -> Result<()> {
        self.frames += 1;
        if self.frames % 60 == 0 {
            if self.visible {
                let t = self.transform.translation();
                println!(
                    "frame {}: marker at [{:.1}, {:.1}, {:.1}]",
                    self.frames, t.x, t.y, t.z
                );
            } else {
                println!("frame {}: marker lost", self.frames);
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let ticks: u64 = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()?
        .unwrap_or(600);

    let config = PipelineConfig {
        assets: TrackerAssets {
            camera_params: "data/camera_para.dat".into(),
            marker: "data/pinball".into(),
            runtime: None,
            asset_root: None,
        },
        ..Default::default()
    };

    let mut pipeline = ArPipeline::new(
        config,
        Box::new(SyntheticCamera::new()),
        OrbitingTracker { cycle: 0 },
        Box::new(ConsoleRenderer::default()),
    )?;
    println!(
        "pipeline up: camera 640x480 -> processed {}x{}",
        pipeline.geometry().processed_width,
        pipeline.geometry().processed_height
    );

    pipeline.run_for(ticks);

    while let Ok(event) = pipeline.events().try_recv() {
        match event {
            PipelineEvent::MarkerInfo(marker) => println!(
                "marker metadata: {}dpi {}x{}",
                marker.dpi, marker.width, marker.height
            ),
            PipelineEvent::LoadingDone => println!("tracker assets loaded"),
            PipelineEvent::TrackerDisconnected => println!("tracker disconnected"),
            PipelineEvent::CameraFailed(message) => println!("camera failed: {message}"),
        }
    }

    let stats = pipeline.stats();
    println!(
        "done: {} render ticks, {} frames tracked ({} found / {} lost)",
        stats.render_ticks, stats.frames_sent, stats.found, stats.not_found
    );

    pipeline.shutdown();
    Ok(())
}
