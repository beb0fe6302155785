//! The wire contract between replicas.
//!
//! The closed set of message kinds is an internally tagged enum so that
//! matching is exhaustive at compile time. Payloads travel as JSON bytes
//! inside an opaque transport envelope.

use crate::error::CoreError;
use crate::field::Intent;
use serde::{Deserialize, Serialize};

/// At most this many pulses ride along in one telemetry summary.
pub const TELEMETRY_MAX_PULSES: usize = 3;

/// Compressed summary of one replica's state.
///
/// Full agent state is never replicated; peers exchange only the order
/// metrics, the swarm centroid with the mean phasor, and up to
/// [`TELEMETRY_MAX_PULSES`] recent pulses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    /// Sender's simulated time (replicas do not agree on clocks)
    pub t: f64,

    /// Phase coherence at the sender
    #[serde(rename = "H")]
    pub harmony: f64,

    /// Field irregularity at the sender
    pub tau: f64,

    /// Swarm centroid x
    pub cx: f64,

    /// Swarm centroid y
    pub cy: f64,

    /// Order parameter magnitude
    #[serde(rename = "R")]
    pub order_magnitude: f64,

    /// Mean phase of the phasor sum
    pub mean_phase: f64,

    /// Most recent active pulses, at most [`TELEMETRY_MAX_PULSES`]
    pub pulses: Vec<Intent>,
}

/// Everything a replica can say to the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Periodic compressed state summary
    Telemetry(TelemetrySummary),

    /// A pulse injected at the sender
    Intent(Intent),

    /// The sender activated the global regime switch
    Portal,

    /// The sender applied a pacemaker flip
    Flip,
}

impl WireMessage {
    /// Serializes the message to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserializes a message from wire bytes.
    ///
    /// Unparseable payloads and unknown `type` tags come back as
    /// `CoreError::Codec`; callers log and drop them - they must never
    /// reach the tick loop.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_intent() {
        let msg = WireMessage::Intent(Intent {
            x: 120.0,
            y: 340.0,
            energy: 0.35,
            sigma: 80.0,
        });

        let bytes = msg.encode().unwrap();
        assert_eq!(WireMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_wire_format_uses_type_tag() {
        let bytes = WireMessage::Portal.encode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "portal");

        let bytes = WireMessage::Intent(Intent::at(1.0, 2.0)).encode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "intent");
        assert_eq!(value["E"], 0.35);
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let err = WireMessage::decode(br#"{"type":"teleport"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_garbage_payload_is_an_error() {
        assert!(WireMessage::decode(b"not even json").is_err());
        assert!(WireMessage::decode(b"").is_err());
    }

    #[test]
    fn test_roundtrip_telemetry() {
        let msg = WireMessage::Telemetry(TelemetrySummary {
            t: 12.5,
            harmony: 0.8,
            tau: 0.03,
            cx: 400.0,
            cy: 300.0,
            order_magnitude: 0.8,
            mean_phase: 1.2,
            pulses: vec![Intent::at(10.0, 20.0)],
        });

        let bytes = msg.encode().unwrap();
        assert_eq!(WireMessage::decode(&bytes).unwrap(), msg);
    }
}
