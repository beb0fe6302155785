//! Simulation configuration.

use chronoflux_env::ReplicaId;
use serde::{Deserialize, Serialize};

/// Operator-adjustable coupling/motion parameters.
///
/// Read every tick by the motion integrator and the phase synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Kuramoto coupling strength (>= 0)
    pub kappa: f64,

    /// Velocity damping (>= 0)
    pub eta: f64,

    /// Gradient-force gain (>= 0)
    pub gamma: f64,

    /// Number of nearest neighbors for phase coupling (>= 1)
    pub k_neighbors: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            kappa: 0.7,
            eta: 0.18,
            gamma: 0.55,
            k_neighbors: 8,
        }
    }
}

impl SimulationParams {
    /// Returns a copy with out-of-range values clamped into their valid
    /// domain. Invalid configuration is corrected, never rejected.
    pub fn clamped(self) -> Self {
        Self {
            kappa: self.kappa.max(0.0),
            eta: self.eta.max(0.0),
            gamma: self.gamma.max(0.0),
            k_neighbors: self.k_neighbors.max(1),
        }
    }

    /// Effective neighbor count for a population of `agent_count` agents.
    ///
    /// `k` must stay below the population size (an agent is never its own
    /// neighbor); a population of one couples to nobody.
    pub fn effective_k(&self, agent_count: usize) -> usize {
        self.k_neighbors.min(agent_count.saturating_sub(1))
    }
}

/// Configuration for one simulation replica.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of agents to spawn
    pub agent_count: usize,

    /// Domain width (positions wrap toroidally)
    pub width: f64,

    /// Domain height (positions wrap toroidally)
    pub height: f64,

    /// Room identifier shared by loosely coupled replicas
    pub room: String,

    /// This replica's identity on the transport
    pub replica: ReplicaId,

    /// Coupling/motion parameters
    pub params: SimulationParams,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            agent_count: 100,
            width: 800.0,
            height: 600.0,
            room: "headless-swarm".to_string(),
            replica: ReplicaId::from_seed(42),
            params: SimulationParams::default(),
        }
    }
}
