//! Wire protocol between the pipeline and the tracker.
//!
//! Two closed message sets, one per direction, tagged with `type` on the
//! wire. Every message kind the tracker can send has a variant here, so
//! coordinator dispatch is exhaustive and decoding happens once at the
//! channel boundary.

use serde::{Deserialize, Serialize};

use crate::frame::FrameBuffer;
use crate::geometry::{FrameGeometry, TransformMatrix};

/// Tracker setup parameters, sent once before any frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    /// Processed buffer size every subsequent frame will have.
    pub processed_width: u32,
    pub processed_height: u32,
    /// Camera intrinsics reference (path or URL the tracker understands).
    pub camera_params: String,
    /// Marker descriptor reference.
    pub marker: String,
    /// Location of the tracker runtime itself, for transports that fetch it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    /// Prefix prepended to relative asset references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_root: Option<String>,
}

/// Marker metadata reported by the tracker once it parses the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerInfo {
    /// Marker image resolution in dots per inch.
    pub dpi: f64,
    /// Marker size in descriptor units.
    pub width: f64,
    pub height: f64,
}

/// Messages sent to the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TrackerRequest {
    /// One-time setup; the tracker answers with `loaded`.
    Load(LoadRequest),
    /// One tracking cycle; the buffer's memory moves with the message.
    Process { frame: FrameBuffer },
}

/// Messages received from the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TrackerEvent {
    /// Setup finished; carries the uncorrected projection matrix.
    Loaded { projection: TransformMatrix },
    /// Asset loading finished; drives the host's one-time UI transition.
    EndLoading { end: bool },
    /// Marker metadata, re-published to hosts as a domain event.
    NftData { marker: MarkerInfo },
    /// Marker detected in the last processed frame.
    Found { pose: TransformMatrix },
    /// Marker not detected in the last processed frame.
    #[serde(rename = "not found")]
    NotFound,
}

impl LoadRequest {
    /// Builds the setup message for a computed layout.
    pub fn new(geometry: &FrameGeometry, assets: &crate::config::TrackerAssets) -> Self {
        Self {
            processed_width: geometry.processed_width,
            processed_height: geometry.processed_height,
            camera_params: assets.camera_params.clone(),
            marker: assets.marker.clone(),
            runtime: assets.runtime.clone(),
            asset_root: assets.asset_root.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_request_tags_match_the_wire_protocol() {
        let load = TrackerRequest::Load(LoadRequest {
            processed_width: 320,
            processed_height: 240,
            camera_params: "data/camera_para.dat".into(),
            marker: "data/pinball".into(),
            runtime: None,
            asset_root: None,
        });
        let value: Value = serde_json::to_value(&load).unwrap();
        assert_eq!(value["type"], "load");
        assert_eq!(value["processed_width"], 320);
        assert!(value.get("runtime").is_none());

        let process = TrackerRequest::Process {
            frame: FrameBuffer {
                width: 2,
                height: 1,
                data: vec![0, 0, 0, 255, 0, 0, 0, 255],
            },
        };
        let value: Value = serde_json::to_value(&process).unwrap();
        assert_eq!(value["type"], "process");
        assert_eq!(value["frame"]["width"], 2);
    }

    #[test]
    fn test_event_tags_match_the_wire_protocol() {
        let cases = [
            (
                TrackerEvent::Loaded {
                    projection: TransformMatrix::IDENTITY,
                },
                "loaded",
            ),
            (TrackerEvent::EndLoading { end: true }, "endLoading"),
            (
                TrackerEvent::NftData {
                    marker: MarkerInfo {
                        dpi: 72.0,
                        width: 637.0,
                        height: 463.0,
                    },
                },
                "nftData",
            ),
            (
                TrackerEvent::Found {
                    pose: TransformMatrix::IDENTITY,
                },
                "found",
            ),
            (TrackerEvent::NotFound, "not found"),
        ];
        for (event, tag) in cases {
            let value: Value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], tag, "wrong tag for {event:?}");
        }
    }

    #[test]
    fn test_events_round_trip_through_json() {
        let event = TrackerEvent::Found {
            pose: TransformMatrix::from_array([
                1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0,
                16.0,
            ]),
        };
        let text = serde_json::to_string(&event).unwrap();
        let decoded: TrackerEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, event);

        let not_found: TrackerEvent = serde_json::from_value(json!({"type": "not found"})).unwrap();
        assert_eq!(not_found, TrackerEvent::NotFound);
    }

    #[test]
    fn test_pose_serializes_as_flat_array() {
        let event = TrackerEvent::Loaded {
            projection: TransformMatrix::IDENTITY,
        };
        let value: Value = serde_json::to_value(&event).unwrap();
        let slots = value["projection"].as_array().unwrap();
        assert_eq!(slots.len(), 16);
        assert_eq!(slots[0], 1.0);
        assert_eq!(slots[1], 0.0);
    }
}
