//! Aggregate order metrics: phase coherence and field irregularity.

use crate::agents::AgentStore;
use crate::field::FieldView;
use nalgebra::Vector2;

/// Turbulence sampling grid resolution (interior cells only).
const TURBULENCE_GRID: usize = 24;

/// Finite-difference offset for turbulence sampling, domain units.
const TURBULENCE_EPS: f64 = 1.0;

/// Harmony: the Kuramoto order parameter.
///
/// Magnitude of the mean unit phasor across all agents, in `[0, 1]`.
/// Exactly 1 when every agent shares one phase; tends to 0 for
/// incoherent phases as the population grows. An empty store reports 0.
pub fn harmony(agents: &AgentStore) -> f64 {
    order_parameter(agents).0
}

/// Full order parameter: magnitude and mean phase of the phasor sum.
pub fn order_parameter(agents: &AgentStore) -> (f64, f64) {
    if agents.is_empty() {
        return (0.0, 0.0);
    }

    let mut sx = 0.0;
    let mut sy = 0.0;
    for agent in agents.iter() {
        sx += agent.phase.cos();
        sy += agent.phase.sin();
    }

    let n = agents.len() as f64;
    ((sx * sx + sy * sy).sqrt() / n, sy.atan2(sx))
}

/// Mean agent position (telemetry compression).
pub fn centroid(agents: &AgentStore) -> Vector2<f64> {
    if agents.is_empty() {
        return Vector2::zeros();
    }

    let sum: Vector2<f64> = agents.iter().map(|a| a.position).sum();
    sum / agents.len() as f64
}

/// Turbulence: averaged local irregularity of the potential field.
///
/// Samples a fixed interior grid; at each point takes the absolute
/// difference between the finite-difference derivatives along the two
/// axes, a curl-like roughness measure. Non-negative; larger right after
/// many overlapping intents.
pub fn turbulence(view: &FieldView) -> f64 {
    let s = TURBULENCE_GRID;
    let dx = view.width / s as f64;
    let dy = view.height / s as f64;

    let mut sum = 0.0;
    let mut count = 0u32;
    for i in 1..s - 1 {
        for j in 1..s - 1 {
            let x = i as f64 * dx;
            let y = j as f64 * dy;
            let px1 = view.potential_at(x + TURBULENCE_EPS, y);
            let px2 = view.potential_at(x - TURBULENCE_EPS, y);
            let py1 = view.potential_at(x, y + TURBULENCE_EPS);
            let py2 = view.potential_at(x, y - TURBULENCE_EPS);
            sum += ((px1 - px2) - (py1 - py2)).abs();
            count += 1;
        }
    }

    sum / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Agent;
    use crate::field::{Field, Intent};
    use crate::peers::PeerTable;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn with_phases(phases: &[f64]) -> AgentStore {
        AgentStore::from_agents(
            phases
                .iter()
                .enumerate()
                .map(|(i, &phase)| Agent {
                    id: i as u32,
                    position: Vector2::new(i as f64 * 10.0, 0.0),
                    velocity: Vector2::zeros(),
                    phase,
                    last_pressure: 0.0,
                })
                .collect(),
        )
    }

    #[test]
    fn test_harmony_is_one_for_aligned_phases() {
        let agents = with_phases(&[2.5; 17]);
        assert_relative_eq!(harmony(&agents), 1.0, max_relative = 1e-12);
    }

    #[test]
    fn test_harmony_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(3);
        for n in [1usize, 2, 10, 100] {
            let phases: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() * 20.0 - 10.0).collect();
            let h = harmony(&with_phases(&phases));
            assert!((0.0..=1.0).contains(&h), "H={} for n={}", h, n);
        }
    }

    #[test]
    fn test_harmony_near_zero_for_opposed_phases() {
        let agents = with_phases(&[0.0, std::f64::consts::PI]);
        assert!(harmony(&agents) < 1e-9);
    }

    #[test]
    fn test_harmony_empty_store() {
        assert_eq!(harmony(&AgentStore::default()), 0.0);
    }

    #[test]
    fn test_centroid() {
        let agents = with_phases(&[0.0, 0.0, 0.0]);
        let c = centroid(&agents);
        assert_relative_eq!(c.x, 10.0);
        assert_relative_eq!(c.y, 0.0);
    }

    #[test]
    fn test_turbulence_non_negative() {
        let mut field = Field::new();
        let peers = PeerTable::new();

        for i in 0..6 {
            field.inject(Intent::at(100.0 + i as f64 * 90.0, 200.0));
        }

        let view = FieldView {
            intents: field.intents(),
            peers: &peers,
            portal: false,
            t: 2.0,
            width: 800.0,
            height: 600.0,
        };

        assert!(turbulence(&view) >= 0.0);
    }
}
