//! ChronoFlux deterministic multi-replica harness.
//!
//! Runs complete swarm replicas in a controlled environment where every
//! source of non-determinism is intercepted:
//! - **Time**: a virtual clock and an explicit task schedule replace
//!   wall-clock timers
//! - **Transport**: an in-memory broadcast bus with scriptable
//!   partitions and loss replaces the real mesh
//! - **Randomness**: all entropy derives from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ScenarioRunner                         │
//! │  ┌─────────┐      ┌─────────┐      ┌─────────┐               │
//! │  │ Replica │      │ Replica │      │ Replica │   ...         │
//! │  │  (sim + │      │  (sim + │      │  (sim + │               │
//! │  │  sched) │      │  sched) │      │  sched) │               │
//! │  └────┬────┘      └────┬────┘      └────┬────┘               │
//! │       │                │                │                    │
//! │  ┌────▼────────────────▼────────────────▼────┐               │
//! │  │       BusRouter (partitions, loss)        │               │
//! │  └───────────────────────────────────────────┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use chronoflux_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 100).with_duration(10.0);
//! let result = runner.run(ScenarioId::SplitBrain);
//! assert!(result.passed);
//! ```

mod bus;
mod context;
mod exporter;
mod runner;
mod scheduler;
pub mod scenarios;

pub use bus::{BusController, BusNetwork, BusRouter, RouteStats};
pub use context::SimContext;
pub use exporter::{TelemetryExport, AUTOSAVE_PERIOD};
pub use runner::{Replica, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scheduler::Scheduler;
