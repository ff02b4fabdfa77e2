//! Asynchronous session with the out-of-process tracker.
//!
//! The tracker lives on the far side of a channel pair: requests go out,
//! events come back, and no memory is shared. Frame buffers move into the
//! request channel by ownership, so a tracking cycle never copies pixels.
//!
//! Two transports are supported: `spawn` runs a [`Tracker`] implementation
//! on a dedicated worker thread, and `connect` hands back the far end as a
//! [`TrackerRemote`] for genuinely external processes and scripted tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use super::protocol::{LoadRequest, TrackerEvent, TrackerRequest};
use crate::frame::FrameBuffer;

/// Capacity of the request channel. The coordinator never has more than one
/// request outstanding, so a second queued message is a protocol breach.
const REQUEST_CHANNEL_CAPACITY: usize = 1;

/// Timeout for the worker's receive. Allows periodic shutdown checks.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Worker-side tracker implementation.
///
/// Runs entirely on the worker thread; the render side only ever sees the
/// events it returns. The detection algorithm itself is out of scope here.
pub trait Tracker: Send {
    /// Handles the one-time setup message.
    ///
    /// Returned events are delivered in order; a real tracker answers with
    /// `Loaded`, usually followed by `NftData` and `EndLoading`.
    fn load(&mut self, request: LoadRequest) -> Result<Vec<TrackerEvent>>;

    /// Runs one tracking cycle on a processed buffer, consuming it.
    fn process(&mut self, frame: FrameBuffer) -> Result<TrackerEvent>;
}

/// The render side's handle to the tracker session.
///
/// Non-blocking in both directions: `send` refuses rather than waits, and
/// `try_recv` returns immediately. `close` is idempotent and joins the
/// worker thread when one was spawned.
pub struct TrackerChannel {
    sender: Option<Sender<TrackerRequest>>,
    receiver: Receiver<TrackerEvent>,
    worker: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    disconnected: bool,
}

/// The far end of a `connect`ed channel: receives requests, emits events.
pub struct TrackerRemote {
    requests: Receiver<TrackerRequest>,
    events: Sender<TrackerEvent>,
}

impl TrackerChannel {
    /// Runs `tracker` on a dedicated worker thread.
    pub fn spawn<T: Tracker + 'static>(tracker: T) -> Self {
        let (request_tx, request_rx) = bounded::<TrackerRequest>(REQUEST_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = unbounded::<TrackerEvent>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker_shutdown = Arc::clone(&shutdown);
        let worker = thread::spawn(move || {
            run_worker(tracker, request_rx, event_tx, worker_shutdown);
        });

        Self {
            sender: Some(request_tx),
            receiver: event_rx,
            worker: Some(worker),
            shutdown,
            disconnected: false,
        }
    }

    /// Creates a channel whose far end is driven externally.
    ///
    /// Used for out-of-process transports (the host pumps the remote) and
    /// for scripted trackers in tests.
    pub fn connect() -> (Self, TrackerRemote) {
        let (request_tx, request_rx) = bounded::<TrackerRequest>(REQUEST_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = unbounded::<TrackerEvent>();

        let channel = Self {
            sender: Some(request_tx),
            receiver: event_rx,
            worker: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            disconnected: false,
        };
        let remote = TrackerRemote {
            requests: request_rx,
            events: event_tx,
        };
        (channel, remote)
    }

    /// Sends a request without blocking.
    ///
    /// A full queue means the single-in-flight discipline was broken by the
    /// caller; a closed channel marks the session disconnected.
    pub fn send(&mut self, request: TrackerRequest) -> Result<()> {
        let Some(sender) = &self.sender else {
            bail!("tracker channel is closed");
        };
        match sender.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                bail!("tracker request already outstanding")
            }
            Err(TrySendError::Disconnected(_)) => {
                self.disconnected = true;
                bail!("tracker went away")
            }
        }
    }

    /// Receives the next event, if one is ready.
    ///
    /// Returns `None` both when no event is pending and after disconnect;
    /// `is_connected` tells the two apart.
    pub fn try_recv(&mut self) -> Option<TrackerEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(crossbeam_channel::TryRecvError::Empty) => None,
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                if !self.disconnected {
                    self.disconnected = true;
                    warn!("tracker event channel disconnected");
                }
                None
            }
        }
    }

    /// Whether the session is still live. Flips once, never back.
    pub fn is_connected(&self) -> bool {
        !self.disconnected
    }

    /// Tears the session down: signals shutdown, drops the request sender
    /// so the worker's receive loop exits, and joins the worker thread.
    /// Safe to call more than once and from any pipeline state.
    pub fn close(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.sender = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("tracker worker panicked during shutdown");
            }
        }
        self.disconnected = true;
    }
}

impl Drop for TrackerChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl TrackerRemote {
    /// Waits for the next request from the pipeline.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TrackerRequest> {
        self.requests.recv_timeout(timeout).ok()
    }

    /// Returns the next request if one is already queued.
    pub fn try_recv(&self) -> Option<TrackerRequest> {
        self.requests.try_recv().ok()
    }

    /// Delivers an event to the pipeline. Returns false once the pipeline
    /// side has been torn down.
    pub fn emit(&self, event: TrackerEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

/// Worker thread loop: receive, dispatch, answer, until shutdown.
fn run_worker<T: Tracker>(
    mut tracker: T,
    requests: Receiver<TrackerRequest>,
    events: Sender<TrackerEvent>,
    shutdown: Arc<AtomicBool>,
) {
    info!("tracker worker started");
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match requests.recv_timeout(RECV_TIMEOUT) {
            Ok(TrackerRequest::Load(request)) => {
                debug!(
                    width = request.processed_width,
                    height = request.processed_height,
                    "tracker loading"
                );
                match tracker.load(request) {
                    Ok(replies) => {
                        for event in replies {
                            if events.send(event).is_err() {
                                return;
                            }
                        }
                    }
                    // No `loaded` is ever sent, so the pipeline stays
                    // un-started; teardown remains the caller's call.
                    Err(err) => error!("tracker load failed: {err:#}"),
                }
            }
            Ok(TrackerRequest::Process { frame }) => {
                let event = match tracker.process(frame) {
                    Ok(event) => event,
                    // A failed cycle counts as a miss; anything else would
                    // wedge the request/response cycle.
                    Err(err) => {
                        warn!("tracking cycle failed: {err:#}");
                        TrackerEvent::NotFound
                    }
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("tracker worker stopped");
}
