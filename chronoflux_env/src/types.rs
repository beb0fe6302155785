//! Common types for the ChronoFlux environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a simulation replica.
///
/// Uses UUID v4 for global uniqueness without coordination. Ordered so
/// that collections keyed by replica iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(pub Uuid);

impl ReplicaId {
    /// Creates a new random ReplicaId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a ReplicaId from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a deterministic ReplicaId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ReplicaId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Envelope for messages exchanged between replicas.
///
/// This is a transport-layer wrapper - the actual message content is
/// opaque bytes that will be deserialized by the receiving engine.
/// A malformed payload is the engine's problem, never the transport's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// The replica that originated this message
    pub from: ReplicaId,

    /// The raw message bytes
    pub payload: Vec<u8>,

    /// Timestamp when the message was created (sender's clock)
    pub timestamp_ms: u64,
}

impl Envelope {
    /// Creates a new envelope from payload bytes.
    pub fn new(from: ReplicaId, payload: Vec<u8>, timestamp_ms: u64) -> Self {
        Self {
            from,
            payload,
            timestamp_ms,
        }
    }

    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
