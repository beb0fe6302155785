//! Kuramoto-style phase synchronization over k nearest spatial neighbors.

use crate::agents::AgentStore;
use crate::config::SimulationParams;
use std::cmp::Ordering;
use std::f64::consts::TAU;

/// Base oscillator frequency, radians per simulated second.
///
/// Activating the portal lowers the whole swarm's frequency at once:
/// `2 pi x 1.2` normally, `2 pi x 0.9` under the portal regime.
pub fn base_frequency(portal: bool) -> f64 {
    (if portal { 0.9 } else { 1.2 }) * TAU
}

/// Indices of the `k` spatially nearest agents to `index`.
///
/// Distances are unwrapped Euclidean even though positions wrap
/// toroidally, so neighbors across a domain edge are never found. The
/// agent itself gets an infinite distance and is never selected. Ties
/// resolve by index order (stable sort).
pub fn nearest_neighbors(agents: &AgentStore, index: usize, k: usize) -> Vec<usize> {
    let slice = agents.as_slice();
    let me = &slice[index];

    let mut by_distance: Vec<(f64, usize)> = slice
        .iter()
        .enumerate()
        .map(|(j, other)| {
            let d2 = if j == index {
                f64::INFINITY
            } else {
                (other.position - me.position).norm_squared()
            };
            (d2, j)
        })
        .collect();

    by_distance.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    by_distance.truncate(k);
    by_distance.into_iter().map(|(_, j)| j).collect()
}

/// Advances every agent's oscillator phase by one step.
///
/// For each agent the coupling term is `sum(sin(phi_j - phi_i))` over its
/// k nearest neighbors, scaled by `kappa / k`. Phases are updated in
/// agent order within the pass, so later agents see their earlier
/// neighbors' already-updated phases. O(N^2) per tick; fine at tens to
/// low hundreds of agents.
pub fn synchronize(agents: &mut AgentStore, params: &SimulationParams, portal: bool, dt: f64) {
    let n = agents.len();
    let k = params.effective_k(n);
    let omega = base_frequency(portal);

    for i in 0..n {
        let coupling = if k > 0 {
            let neighbors = nearest_neighbors(agents, i, k);
            let me_phase = agents.as_slice()[i].phase;
            let sum: f64 = neighbors
                .iter()
                .map(|&j| (agents.as_slice()[j].phase - me_phase).sin())
                .sum();
            (params.kappa / neighbors.len() as f64) * sum
        } else {
            // A lone agent couples to nobody and just free-runs.
            0.0
        };

        agents.as_mut_slice()[i].phase += (omega + coupling) * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Agent;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    fn agent(id: u32, x: f64, y: f64, phase: f64) -> Agent {
        Agent {
            id,
            position: Vector2::new(x, y),
            velocity: Vector2::zeros(),
            phase,
            last_pressure: 0.0,
        }
    }

    #[test]
    fn test_base_frequency_switches_with_portal() {
        assert_relative_eq!(base_frequency(false), 2.4 * std::f64::consts::PI);
        assert_relative_eq!(base_frequency(true), 1.8 * std::f64::consts::PI);
    }

    #[test]
    fn test_nearest_neighbors_excludes_self() {
        let agents = AgentStore::from_agents(vec![
            agent(0, 0.0, 0.0, 0.0),
            agent(1, 10.0, 0.0, 0.0),
            agent(2, 20.0, 0.0, 0.0),
            agent(3, 500.0, 0.0, 0.0),
        ]);

        let nearest = nearest_neighbors(&agents, 0, 2);
        assert_eq!(nearest, vec![1, 2]);
        assert!(!nearest.contains(&0));
    }

    #[test]
    fn test_nearest_neighbors_ties_resolve_by_index() {
        // Agents 1 and 2 are equidistant from agent 0.
        let agents = AgentStore::from_agents(vec![
            agent(0, 0.0, 0.0, 0.0),
            agent(1, 10.0, 0.0, 0.0),
            agent(2, -10.0, 0.0, 0.0),
        ]);

        let nearest = nearest_neighbors(&agents, 0, 1);
        assert_eq!(nearest, vec![1]);
    }

    #[test]
    fn test_uncoupled_phases_advance_by_omega_exactly() {
        // kappa 0 isolates the free-running advance. With nonzero kappa
        // even initially aligned phases pick up coupling terms, because
        // the pass is sequential: agent 1 already sees agent 0's
        // advanced phase.
        let phase = 1.25;
        let mut agents = AgentStore::from_agents(vec![
            agent(0, 0.0, 0.0, phase),
            agent(1, 10.0, 0.0, phase),
            agent(2, 20.0, 0.0, phase),
        ]);
        let params = SimulationParams {
            kappa: 0.0,
            k_neighbors: 2,
            ..Default::default()
        };

        let dt = 0.016;
        synchronize(&mut agents, &params, false, dt);

        let expected = phase + base_frequency(false) * dt;
        for a in agents.iter() {
            assert_relative_eq!(a.phase, expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_sequential_pass_couples_to_updated_phases() {
        // Aligned phases do not stay torque-free under sequential
        // updates: agent 1 couples to agent 0's already-advanced phase.
        let phase = 1.25;
        let mut agents = AgentStore::from_agents(vec![
            agent(0, 0.0, 0.0, phase),
            agent(1, 10.0, 0.0, phase),
        ]);
        let params = SimulationParams {
            kappa: 0.7,
            k_neighbors: 1,
            ..Default::default()
        };

        let dt = 0.016;
        synchronize(&mut agents, &params, false, dt);

        let omega = base_frequency(false);
        let expected_0 = phase + omega * dt;
        let expected_1 = phase + (omega + 0.7 * (expected_0 - phase).sin()) * dt;

        let slice = agents.as_slice();
        assert_relative_eq!(slice[0].phase, expected_0, max_relative = 1e-12);
        assert_relative_eq!(slice[1].phase, expected_1, max_relative = 1e-12);
        assert!(slice[1].phase > slice[0].phase);
    }

    #[test]
    fn test_single_agent_does_not_produce_nan() {
        let mut agents = AgentStore::from_agents(vec![agent(0, 0.0, 0.0, 0.5)]);
        let params = SimulationParams::default();

        synchronize(&mut agents, &params, false, 0.016);

        let phase = agents.as_slice()[0].phase;
        assert!(phase.is_finite());
        assert_relative_eq!(phase, 0.5 + base_frequency(false) * 0.016);
    }

    #[test]
    fn test_coupling_pulls_phases_together() {
        let mut agents = AgentStore::from_agents(vec![
            agent(0, 0.0, 0.0, 0.0),
            agent(1, 10.0, 0.0, 1.0),
        ]);
        let params = SimulationParams {
            kappa: 0.7,
            k_neighbors: 1,
            ..Default::default()
        };

        let spread_before = 1.0f64;
        for _ in 0..100 {
            synchronize(&mut agents, &params, false, 0.016);
        }
        let spread_after =
            (agents.as_slice()[1].phase - agents.as_slice()[0].phase).abs();

        assert!(spread_after < spread_before);
    }
}
