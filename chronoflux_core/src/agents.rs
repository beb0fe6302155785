//! Agent storage: per-agent kinetic and oscillator-phase state.

use nalgebra::Vector2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// A single simulated particle with position, velocity, and oscillator
/// phase.
///
/// Positions always lie within `[0, width) x [0, height)` (toroidal
/// wrap); the phase is unbounded - it accumulates, it is never reduced
/// modulo 2 pi.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Stable index within the replica
    pub id: u32,

    /// Position in domain units
    pub position: Vector2<f64>,

    /// Velocity in domain units per normalized frame
    pub velocity: Vector2<f64>,

    /// Oscillator phase, radians, unbounded
    pub phase: f64,

    /// Potential sampled at this agent's position on the last tick
    /// (read by rendering/telemetry consumers)
    pub last_pressure: f64,
}

/// Holds the full agent population of one replica.
///
/// Created once at simulation start for a fixed count; agents are never
/// individually destroyed, and the count only changes on explicit reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentStore {
    agents: Vec<Agent>,
}

impl AgentStore {
    /// Spawns `count` agents at uniformly random positions with random
    /// initial phases and zero velocity.
    pub fn spawn(count: usize, width: f64, height: f64, rng: &mut impl Rng) -> Self {
        let agents = (0..count)
            .map(|i| Agent {
                id: i as u32,
                position: Vector2::new(rng.gen::<f64>() * width, rng.gen::<f64>() * height),
                velocity: Vector2::zeros(),
                phase: rng.gen::<f64>() * TAU,
                last_pressure: 0.0,
            })
            .collect();

        Self { agents }
    }

    /// Builds a store from explicit agents (tests and scenario setup).
    pub fn from_agents(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    /// Returns the number of agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns true if the store holds no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Immutable view of all agents.
    pub fn as_slice(&self) -> &[Agent] {
        &self.agents
    }

    /// Mutable view of all agents.
    pub fn as_mut_slice(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    /// Iterates over all agents.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    /// Iterates mutably over all agents.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_spawn_within_domain() {
        let mut rng = StdRng::seed_from_u64(7);
        let store = AgentStore::spawn(50, 800.0, 600.0, &mut rng);

        assert_eq!(store.len(), 50);
        for agent in store.iter() {
            assert!((0.0..800.0).contains(&agent.position.x));
            assert!((0.0..600.0).contains(&agent.position.y));
            assert_eq!(agent.velocity, Vector2::zeros());
            assert!((0.0..TAU).contains(&agent.phase));
        }
    }

    #[test]
    fn test_spawn_is_seed_deterministic() {
        let mut rng1 = StdRng::seed_from_u64(99);
        let mut rng2 = StdRng::seed_from_u64(99);

        let a = AgentStore::spawn(10, 800.0, 600.0, &mut rng1);
        let b = AgentStore::spawn(10, 800.0, 600.0, &mut rng2);

        assert_eq!(a, b);
    }
}
