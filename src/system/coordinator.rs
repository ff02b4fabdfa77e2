//! Pipeline Coordinator: single-in-flight tracking cycle driver.
//!
//! Owns the capture side of the pipeline (camera source, frame processor,
//! tracker channel) and the shared pose state the render loop reads. The
//! coordinator is the only writer of that state, and the only caller of
//! `FrameProcessor::capture`, which it invokes strictly while `Idle`.

use anyhow::Result;
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use super::events::PipelineEvent;
use crate::frame::{FrameProcessor, FrameSource};
use crate::geometry::{correct_projection, DisplayProfile, FrameGeometry, TransformMatrix};
use crate::tracker::{LoadRequest, TrackerChannel, TrackerEvent, TrackerRequest};

/// Tracking-cycle state. `Idle` means no request is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    /// A `process` message is in flight; no frame may be captured.
    AwaitingTrackerResponse,
}

/// Scalar counters describing pipeline activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// `process` messages sent to the tracker.
    pub frames_sent: u64,
    /// Responses reporting the marker detected.
    pub found: u64,
    /// Responses reporting the marker missed.
    pub not_found: u64,
    /// Out-of-protocol messages (responses while idle, repeated `loaded`).
    pub protocol_violations: u64,
    /// Render ticks run. Filled in by the pipeline, not the coordinator.
    pub render_ticks: u64,
}

/// Drives the tracking cycle `Idle -> AwaitingTrackerResponse -> Idle`.
pub struct Coordinator {
    state: PipelineState,
    channel: TrackerChannel,
    processor: FrameProcessor,
    source: Box<dyn FrameSource>,
    events: Sender<PipelineEvent>,

    /// Inputs needed to recompute the layout if the camera size changes.
    target_long_edge: u32,
    display: DisplayProfile,

    /// Last tracking response; retained across channel stalls.
    pose: Option<TransformMatrix>,
    /// Corrected projection, set once on `loaded`.
    projection: Option<TransformMatrix>,
    loaded: bool,
    camera_ok: bool,
    disconnect_reported: bool,
    stats: PipelineStats,
}

impl Coordinator {
    pub fn new(
        channel: TrackerChannel,
        processor: FrameProcessor,
        source: Box<dyn FrameSource>,
        events: Sender<PipelineEvent>,
        target_long_edge: u32,
        display: DisplayProfile,
    ) -> Self {
        Self {
            state: PipelineState::Idle,
            channel,
            processor,
            source,
            events,
            target_long_edge,
            display,
            pose: None,
            projection: None,
            loaded: false,
            camera_ok: true,
            disconnect_reported: false,
            stats: PipelineStats::default(),
        }
    }

    /// Sends the one-time `load` message. Tracking starts once the tracker
    /// answers `loaded`.
    pub fn start(&mut self, request: LoadRequest) -> Result<()> {
        info!(
            width = request.processed_width,
            height = request.processed_height,
            marker = %request.marker,
            "loading tracker"
        );
        self.channel.send(TrackerRequest::Load(request))
    }

    /// Drains pending tracker events and advances the cycle.
    ///
    /// Never blocks. Each handled event is followed by a capture attempt,
    /// gated on the idle state, so N responses produce exactly N `process`
    /// messages and at most one is ever outstanding.
    pub fn pump(&mut self) {
        while let Some(event) = self.channel.try_recv() {
            if self.handle_event(event) {
                self.try_advance();
            }
        }

        if !self.channel.is_connected() && !self.disconnect_reported {
            self.disconnect_reported = true;
            warn!("tracker channel closed; retaining last pose");
            let _ = self.events.send(PipelineEvent::TrackerDisconnected);
        }
    }

    /// Reacts to one tracker event. Returns false for protocol violations,
    /// which must not trigger a capture.
    fn handle_event(&mut self, event: TrackerEvent) -> bool {
        match event {
            TrackerEvent::Loaded { projection } => {
                if self.loaded {
                    warn!("repeated 'loaded' message ignored");
                    self.stats.protocol_violations += 1;
                    return false;
                }
                let mut projection = projection;
                let geometry = self.processor.geometry();
                correct_projection(&mut projection, geometry.ratio_w(), geometry.ratio_h());
                self.projection = Some(projection);
                self.loaded = true;
                info!("tracker loaded, projection corrected for letterbox");
                true
            }
            TrackerEvent::EndLoading { end } => {
                if end {
                    let _ = self.events.send(PipelineEvent::LoadingDone);
                }
                true
            }
            TrackerEvent::NftData { marker } => {
                debug!(dpi = marker.dpi, "marker metadata received");
                let _ = self.events.send(PipelineEvent::MarkerInfo(marker));
                true
            }
            TrackerEvent::Found { pose } => {
                if !self.finish_cycle("found") {
                    return false;
                }
                self.pose = Some(pose);
                self.stats.found += 1;
                true
            }
            TrackerEvent::NotFound => {
                if !self.finish_cycle("not found") {
                    return false;
                }
                self.pose = None;
                self.stats.not_found += 1;
                true
            }
        }
    }

    /// Closes one tracking cycle. A response with no request outstanding is
    /// a protocol violation: logged, counted, payload discarded.
    fn finish_cycle(&mut self, kind: &str) -> bool {
        if self.state != PipelineState::AwaitingTrackerResponse {
            warn!("'{kind}' received while idle; ignoring");
            self.stats.protocol_violations += 1;
            return false;
        }
        self.state = PipelineState::Idle;
        true
    }

    /// Captures and sends the next frame if the pipeline is ready:
    /// idle, loaded, channel up, camera healthy.
    fn try_advance(&mut self) {
        if self.state != PipelineState::Idle
            || !self.loaded
            || !self.camera_ok
            || !self.channel.is_connected()
        {
            return;
        }

        if let Err(err) = self.refresh_geometry() {
            warn!("camera changed size, pipeline stalled: {err:#}");
            self.camera_ok = false;
            let _ = self
                .events
                .send(PipelineEvent::CameraFailed(format!("{err:#}")));
            return;
        }

        let frame = match self.processor.capture(self.source.as_mut()) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("frame capture failed, pipeline stalled: {err:#}");
                self.camera_ok = false;
                let _ = self
                    .events
                    .send(PipelineEvent::CameraFailed(format!("{err:#}")));
                return;
            }
        };

        match self.channel.send(TrackerRequest::Process { frame }) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                self.state = PipelineState::AwaitingTrackerResponse;
            }
            Err(err) => {
                warn!("could not send frame to tracker: {err:#}");
            }
        }
    }

    /// Recomputes the layout when the camera reports new dimensions.
    ///
    /// The tracker was loaded with a fixed processed buffer size, so a
    /// change that would alter it cannot be absorbed mid-session.
    fn refresh_geometry(&mut self) -> Result<()> {
        let (raw_width, raw_height) = self.source.dimensions();
        let current = *self.processor.geometry();
        if (raw_width, raw_height) == (current.raw_width, current.raw_height) {
            return Ok(());
        }

        let updated =
            FrameGeometry::compute(raw_width, raw_height, self.target_long_edge, self.display)?;
        anyhow::ensure!(
            (updated.processed_width, updated.processed_height)
                == (current.processed_width, current.processed_height),
            "camera change {}x{} -> {}x{} would alter the processed buffer size",
            current.raw_width,
            current.raw_height,
            raw_width,
            raw_height
        );
        info!("camera now {raw_width}x{raw_height}, letterbox layout recomputed");
        self.processor.set_geometry(updated);
        Ok(())
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Latest tracking response, `None` while the marker is lost.
    pub fn pose(&self) -> Option<&TransformMatrix> {
        self.pose.as_ref()
    }

    /// Corrected projection, available once the tracker has loaded.
    pub fn projection(&self) -> Option<&TransformMatrix> {
        self.projection.as_ref()
    }

    pub fn geometry(&self) -> &FrameGeometry {
        self.processor.geometry()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Tears down the tracker session and frees capture scratch space.
    /// Idempotent; safe while a request is still outstanding.
    pub fn close(&mut self) {
        self.channel.close();
        self.processor.release_buffers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RawFrame;
    use crate::tracker::{MarkerInfo, TrackerRemote};
    use crossbeam_channel::{unbounded, Receiver};

    struct TestCamera {
        frame: Vec<u8>,
        fail: bool,
    }

    impl TestCamera {
        fn new() -> Self {
            Self {
                frame: vec![128; 640 * 480 * 4],
                fail: false,
            }
        }
    }

    impl FrameSource for TestCamera {
        fn dimensions(&self) -> (u32, u32) {
            (640, 480)
        }

        fn capture(&mut self) -> Result<RawFrame<'_>> {
            anyhow::ensure!(!self.fail, "camera unplugged");
            Ok(RawFrame {
                data: &self.frame,
                width: 640,
                height: 480,
            })
        }
    }

    fn build() -> (Coordinator, TrackerRemote, Receiver<PipelineEvent>) {
        build_with_camera(TestCamera::new())
    }

    fn build_with_camera(
        camera: TestCamera,
    ) -> (Coordinator, TrackerRemote, Receiver<PipelineEvent>) {
        let geometry = FrameGeometry::compute(640, 480, 320, DisplayProfile::desktop()).unwrap();
        let (channel, remote) = TrackerChannel::connect();
        let (event_tx, event_rx) = unbounded();
        let coordinator = Coordinator::new(
            channel,
            FrameProcessor::new(geometry),
            Box::new(camera),
            event_tx,
            320,
            DisplayProfile::desktop(),
        );
        (coordinator, remote, event_rx)
    }

    fn loaded_event() -> TrackerEvent {
        TrackerEvent::Loaded {
            projection: TransformMatrix::IDENTITY,
        }
    }

    #[test]
    fn test_loaded_starts_the_first_cycle() {
        let (mut coordinator, remote, _events) = build();

        remote.emit(loaded_event());
        coordinator.pump();

        assert_eq!(coordinator.state(), PipelineState::AwaitingTrackerResponse);
        assert_eq!(coordinator.stats().frames_sent, 1);
        assert!(matches!(
            remote.try_recv(),
            Some(TrackerRequest::Process { .. })
        ));
        assert!(coordinator.projection().is_some());
    }

    #[test]
    fn test_exactly_one_request_outstanding() {
        let (mut coordinator, remote, _events) = build();
        remote.emit(loaded_event());
        coordinator.pump();
        assert!(remote.try_recv().is_some());

        // Extra pumps while awaiting must not send more frames.
        coordinator.pump();
        coordinator.pump();
        assert!(remote.try_recv().is_none());
        assert_eq!(coordinator.stats().frames_sent, 1);

        // Each response releases exactly one more frame.
        for i in 0..5u64 {
            remote.emit(if i % 2 == 0 {
                TrackerEvent::Found {
                    pose: TransformMatrix::IDENTITY,
                }
            } else {
                TrackerEvent::NotFound
            });
            coordinator.pump();
            assert!(remote.try_recv().is_some());
            assert!(remote.try_recv().is_none());
        }
        assert_eq!(coordinator.stats().frames_sent, 6);
    }

    #[test]
    fn test_found_updates_pose_and_not_found_clears_it() {
        let (mut coordinator, remote, _events) = build();
        remote.emit(loaded_event());
        coordinator.pump();

        let mut pose = TransformMatrix::IDENTITY;
        pose[12] = 42.0;
        remote.emit(TrackerEvent::Found { pose });
        coordinator.pump();
        assert_eq!(coordinator.pose().unwrap()[12], 42.0);

        remote.emit(TrackerEvent::NotFound);
        coordinator.pump();
        assert!(coordinator.pose().is_none());

        let stats = coordinator.stats();
        assert_eq!((stats.found, stats.not_found), (1, 1));
    }

    #[test]
    fn test_response_while_idle_is_a_violation() {
        let (mut coordinator, remote, _events) = build();

        // No load, no outstanding request: both responses are violations.
        remote.emit(TrackerEvent::Found {
            pose: TransformMatrix::IDENTITY,
        });
        remote.emit(TrackerEvent::NotFound);
        coordinator.pump();

        assert_eq!(coordinator.stats().protocol_violations, 2);
        assert!(coordinator.pose().is_none());
        assert_eq!(coordinator.stats().frames_sent, 0);
        assert!(remote.try_recv().is_none());
    }

    #[test]
    fn test_repeated_loaded_is_ignored() {
        let (mut coordinator, remote, _events) = build();
        remote.emit(loaded_event());
        coordinator.pump();
        let first = *coordinator.projection().unwrap();

        let mut other = TransformMatrix::IDENTITY;
        other[0] = 99.0;
        remote.emit(TrackerEvent::Loaded { projection: other });
        coordinator.pump();

        assert_eq!(*coordinator.projection().unwrap(), first);
        assert_eq!(coordinator.stats().protocol_violations, 1);
    }

    #[test]
    fn test_metadata_events_are_republished() {
        let (mut coordinator, remote, events) = build();
        let marker = MarkerInfo {
            dpi: 72.0,
            width: 637.0,
            height: 463.0,
        };
        remote.emit(TrackerEvent::NftData { marker });
        remote.emit(TrackerEvent::EndLoading { end: true });
        coordinator.pump();

        assert_eq!(events.try_recv(), Ok(PipelineEvent::MarkerInfo(marker)));
        assert_eq!(events.try_recv(), Ok(PipelineEvent::LoadingDone));
    }

    #[test]
    fn test_camera_failure_stalls_but_keeps_pose() {
        let mut camera = TestCamera::new();
        camera.fail = true;
        let (mut coordinator, remote, events) = build_with_camera(camera);

        remote.emit(loaded_event());
        coordinator.pump();

        assert_eq!(coordinator.state(), PipelineState::Idle);
        assert_eq!(coordinator.stats().frames_sent, 0);
        assert!(matches!(
            events.try_recv(),
            Ok(PipelineEvent::CameraFailed(_))
        ));
    }

    #[test]
    fn test_disconnect_is_reported_once_and_pose_retained() {
        let (mut coordinator, remote, events) = build();
        remote.emit(loaded_event());
        coordinator.pump();
        remote.emit(TrackerEvent::Found {
            pose: TransformMatrix::IDENTITY,
        });
        coordinator.pump();

        drop(remote);
        coordinator.pump();
        coordinator.pump();

        assert_eq!(events.try_recv(), Ok(PipelineEvent::TrackerDisconnected));
        assert!(events.try_recv().is_err());
        assert_eq!(*coordinator.pose().unwrap(), TransformMatrix::IDENTITY);
    }

    /// Camera that switches from VGA to 720p after its first capture.
    struct SwitchingCamera {
        frame: Vec<u8>,
        captures: u32,
    }

    impl FrameSource for SwitchingCamera {
        fn dimensions(&self) -> (u32, u32) {
            if self.captures == 0 {
                (640, 480)
            } else {
                (1280, 720)
            }
        }

        fn capture(&mut self) -> Result<RawFrame<'_>> {
            let (width, height) = self.dimensions();
            self.captures += 1;
            self.frame = vec![128; (width * height * 4) as usize];
            Ok(RawFrame {
                data: &self.frame,
                width,
                height,
            })
        }
    }

    #[test]
    fn test_camera_size_change_recomputes_layout() {
        let geometry = FrameGeometry::compute(640, 480, 320, DisplayProfile::desktop()).unwrap();
        let (channel, remote) = TrackerChannel::connect();
        let (event_tx, _event_rx) = unbounded();
        let mut coordinator = Coordinator::new(
            channel,
            FrameProcessor::new(geometry),
            Box::new(SwitchingCamera {
                frame: Vec::new(),
                captures: 0,
            }),
            event_tx,
            320,
            DisplayProfile::desktop(),
        );

        remote.emit(loaded_event());
        coordinator.pump();
        assert!(remote.try_recv().is_some());

        // The camera now reports 1280x720; same processed size, new layout.
        remote.emit(TrackerEvent::NotFound);
        coordinator.pump();
        assert!(remote.try_recv().is_some());
        assert_eq!(coordinator.geometry().raw_width, 1280);
        assert_eq!(
            (
                coordinator.geometry().processed_width,
                coordinator.geometry().processed_height
            ),
            (320, 240)
        );
        assert_eq!(coordinator.stats().frames_sent, 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut coordinator, _remote, _events) = build();
        coordinator.close();
        coordinator.close();
    }
}
