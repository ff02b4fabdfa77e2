//! Tracker session: wire protocol and asynchronous channel.

pub mod channel;
pub mod protocol;

pub use channel::{Tracker, TrackerChannel, TrackerRemote};
pub use protocol::{LoadRequest, MarkerInfo, TrackerEvent, TrackerRequest};
