//! The auditable event trail.
//!
//! Every discrete operator action (and its remote counterpart) produces a
//! record capturing the simulated time and the order metrics immediately
//! after application. Persistence/export consumers read this log.

use serde::{Deserialize, Serialize};

/// Kinds of recorded events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Locally injected pulse
    Intent,

    /// Local regime activation
    Portal,

    /// Local pacemaker flip
    Flip,

    /// Pulse received from a peer
    RemoteIntent,

    /// Regime activation received from a peer
    RemotePortal,

    /// Pacemaker flip received from a peer
    RemoteFlip,

    /// Periodic telemetry snapshot
    Telemetry,

    /// Final snapshot on shutdown
    Shutdown,
}

/// One entry of the event trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Wall-clock-style timestamp in milliseconds (derived from the
    /// replica's clock, so deterministic under a virtual clock)
    pub timestamp_ms: u64,

    /// Simulated time at which the event applied
    pub t: f64,

    /// What happened
    pub kind: EventKind,

    /// Event-specific payload (pulse coordinates, etc.)
    pub data: serde_json::Value,

    /// Harmony immediately after application
    #[serde(rename = "H")]
    pub harmony: f64,

    /// Turbulence immediately after application
    pub tau: f64,
}

/// Ordered event trail of one replica.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn push(&mut self, record: EventRecord) {
        self.records.push(record);
    }

    /// Returns all records in application order.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Returns the most recent record.
    pub fn last(&self) -> Option<&EventRecord> {
        self.records.last()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counts records of one kind.
    pub fn count(&self, kind: EventKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: EventKind, t: f64) -> EventRecord {
        EventRecord {
            timestamp_ms: (t * 1000.0) as u64,
            t,
            kind,
            data: serde_json::Value::Null,
            harmony: 0.5,
            tau: 0.01,
        }
    }

    #[test]
    fn test_log_preserves_order() {
        let mut log = EventLog::new();
        log.push(record(EventKind::Intent, 1.0));
        log.push(record(EventKind::Portal, 2.0));
        log.push(record(EventKind::Flip, 3.0));

        assert_eq!(log.len(), 3);
        assert_eq!(log.records()[0].kind, EventKind::Intent);
        assert_eq!(log.last().unwrap().kind, EventKind::Flip);
    }

    #[test]
    fn test_log_count_by_kind() {
        let mut log = EventLog::new();
        log.push(record(EventKind::Intent, 1.0));
        log.push(record(EventKind::RemoteIntent, 1.5));
        log.push(record(EventKind::Intent, 2.0));

        assert_eq!(log.count(EventKind::Intent), 2);
        assert_eq!(log.count(EventKind::RemoteIntent), 1);
        assert_eq!(log.count(EventKind::Portal), 0);
    }
}
