//! JSON exporter for event trails.
//!
//! Writes a replica's complete event log plus final metrics as pretty
//! JSON, matching the download-on-shutdown trail operators archive.

use chronoflux_core::{EventLog, EventRecord, Simulation};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// Interval between periodic telemetry saves, simulated seconds.
pub const AUTOSAVE_PERIOD: f64 = 30.0;

/// Complete telemetry export for one replica run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryExport {
    /// Room the replica was attached to
    pub room: String,

    /// Replica identity (short form)
    pub replica: String,

    /// Seed used
    pub seed: u64,

    /// Duration in simulated seconds
    pub duration_sec: f64,

    /// Full event trail in arrival order
    pub records: Vec<EventRecord>,

    /// Final phase coherence
    pub final_harmony: f64,

    /// Final field irregularity
    pub final_turbulence: f64,
}

impl TelemetryExport {
    /// Creates an empty export container.
    pub fn new(room: &str, replica: &str, seed: u64) -> Self {
        Self {
            room: room.to_string(),
            replica: replica.to_string(),
            seed,
            duration_sec: 0.0,
            records: Vec::new(),
            final_harmony: 0.0,
            final_turbulence: 0.0,
        }
    }

    /// Captures an in-flight copy of a running replica's trail and
    /// current metrics (periodic autosave; the replica keeps running).
    pub fn snapshot(&mut self, sim: &Simulation) {
        self.records = sim.event_log().records().to_vec();
        self.duration_sec = sim.t();
        self.final_harmony = sim.harmony();
        self.final_turbulence = sim.turbulence();
    }

    /// Takes over a finished replica's event trail and final metrics.
    pub fn finalize(&mut self, log: EventLog, duration_sec: f64, harmony: f64, turbulence: f64) {
        self.records = log.records().to_vec();
        self.duration_sec = duration_sec;
        self.final_harmony = harmony;
        self.final_turbulence = turbulence;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
