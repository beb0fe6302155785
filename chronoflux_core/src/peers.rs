//! Remote replica bookkeeping.
//!
//! Each known peer is represented by its last received compressed
//! summary. There is no sequencing: a stale summary arriving late simply
//! overwrites a newer one. This is the accepted weak-consistency
//! tradeoff of the protocol; a monotonic per-peer sequence number would
//! be the extension point if stronger ordering were ever wanted.

use crate::field::Intent;
use crate::message::TelemetrySummary;
use chronoflux_env::ReplicaId;
use nalgebra::Vector2;
use std::collections::BTreeMap;

/// Last known state of one remote replica.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSummary {
    /// Sender's simulated time (informational only; clocks are independent)
    pub t: f64,

    /// Sender's phase coherence
    pub harmony: f64,

    /// Sender's field irregularity
    pub turbulence: f64,

    /// Sender's swarm centroid
    pub centroid: Vector2<f64>,

    /// Sender's order parameter magnitude
    pub order_magnitude: f64,

    /// Sender's mean phase
    pub mean_phase: f64,

    /// Sender's recent pulses (blended into the local field, down-weighted)
    pub pulses: Vec<Intent>,
}

impl From<TelemetrySummary> for PeerSummary {
    fn from(summary: TelemetrySummary) -> Self {
        Self {
            t: summary.t,
            harmony: summary.harmony,
            turbulence: summary.tau,
            centroid: Vector2::new(summary.cx, summary.cy),
            order_magnitude: summary.order_magnitude,
            mean_phase: summary.mean_phase,
            pulses: summary.pulses,
        }
    }
}

/// All known remote replicas, keyed by id.
///
/// Owned by the state blender; the field engine and metrics only read it.
/// The map is ordered so that pulse blending sums peers in id order;
/// float summation order must not depend on insertion history, or two
/// replicas fed identical telemetry would drift apart bit by bit.
#[derive(Debug, Clone, Default)]
pub struct PeerTable {
    peers: BTreeMap<ReplicaId, PeerSummary>,
}

impl PeerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored summary for a peer wholesale (last-write-wins).
    ///
    /// The entry is created on the first message from that peer.
    pub fn update(&mut self, peer: ReplicaId, summary: PeerSummary) {
        self.peers.insert(peer, summary);
    }

    /// Removes a peer known to have disconnected.
    pub fn remove(&mut self, peer: &ReplicaId) -> Option<PeerSummary> {
        self.peers.remove(peer)
    }

    /// Returns the summary for one peer.
    pub fn get(&self, peer: &ReplicaId) -> Option<&PeerSummary> {
        self.peers.get(peer)
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns true if no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Iterates over all peer summaries.
    pub fn iter(&self) -> impl Iterator<Item = (&ReplicaId, &PeerSummary)> {
        self.peers.iter()
    }

    /// Iterates over every pulse reported by every peer, in peer id
    /// order.
    pub fn pulses(&self) -> impl Iterator<Item = &Intent> {
        self.peers.values().flat_map(|p| p.pulses.iter())
    }
}
