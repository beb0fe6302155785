//! ChronoFlux Engine
//!
//! A swarm of point agents moves in a bounded 2-D domain under a shared
//! scalar potential field, each agent synchronizing an internal
//! oscillator phase with its nearest neighbors. Multiple independent
//! replicas can run concurrently and loosely share state by exchanging
//! compressed telemetry summaries and discrete events over an
//! interchangeable transport.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Simulation                            │
//! │                                                              │
//! │   Field ──► Motion ──► Coupling ──► Metrics                  │
//! │     ▲         (tick pipeline, single-threaded)               │
//! │     │                                                        │
//! │  PeerTable ◄── state blender ◄── Transport (injected)        │
//! │     │                                                        │
//! │  EventLog ◄── operator actions / remote events               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine makes no consistency promises across replicas: peer
//! summaries merge last-write-wins, events apply without ordering, and
//! message loss is tolerated. Each replica's local view is
//! authoritative for the agents it owns.
//!
//! # Usage
//!
//! ```ignore
//! use chronoflux_core::{SimConfig, Simulation};
//!
//! let mut sim = Simulation::new(SimConfig::default());
//! sim.tick(0.016);
//! sim.inject_intent(120.0, 340.0);
//! println!("H = {:.3}", sim.harmony());
//! ```

mod agents;
mod config;
mod coupling;
mod error;
mod events;
mod field;
mod message;
mod metrics;
mod motion;
mod peers;
mod sim;

pub use agents::{Agent, AgentStore};
pub use config::{SimConfig, SimulationParams};
pub use coupling::{base_frequency, nearest_neighbors, synchronize};
pub use error::CoreError;
pub use events::{EventKind, EventLog, EventRecord};
pub use field::{
    Field, FieldView, Intent, DEFAULT_INTENT_ENERGY, DEFAULT_INTENT_SIGMA, INTENT_DECAY,
    INTENT_MIN_ENERGY,
};
pub use message::{TelemetrySummary, WireMessage, TELEMETRY_MAX_PULSES};
pub use metrics::{centroid, harmony, order_parameter, turbulence};
pub use motion::{gradient_at, integrate, GRADIENT_EPS};
pub use peers::{PeerSummary, PeerTable};
pub use sim::Simulation;
