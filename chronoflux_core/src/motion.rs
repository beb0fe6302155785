//! Motion integration: damped gradient descent on the potential field
//! with toroidal position wrap.

use crate::agents::AgentStore;
use crate::config::SimulationParams;
use crate::field::FieldView;
use nalgebra::Vector2;

/// Finite-difference step for gradient sampling, domain units.
pub const GRADIENT_EPS: f64 = 1.5;

/// Velocity is scaled by this factor when applied to positions, so that
/// the same parameters produce the same trajectories at any tick rate
/// (the baseline is 60 updates per second).
const FRAME_RATE_SCALE: f64 = 60.0;

/// Wraps a coordinate into `[0, extent)`.
fn wrap(value: f64, extent: f64) -> f64 {
    value.rem_euclid(extent)
}

/// Local potential gradient by symmetric finite difference.
pub fn gradient_at(view: &FieldView, x: f64, y: f64) -> Vector2<f64> {
    let gx = (view.potential_at(x + GRADIENT_EPS, y) - view.potential_at(x - GRADIENT_EPS, y))
        / (2.0 * GRADIENT_EPS);
    let gy = (view.potential_at(x, y + GRADIENT_EPS) - view.potential_at(x, y - GRADIENT_EPS))
        / (2.0 * GRADIENT_EPS);
    Vector2::new(gx, gy)
}

/// Advances every agent's velocity and position by one step.
///
/// Agents are pushed toward potential minima (pressure troughs) by the
/// negative gradient, with linear drag. Purely numeric: no failure modes,
/// O(1) per agent.
pub fn integrate(agents: &mut AgentStore, view: &FieldView, params: &SimulationParams, dt: f64) {
    for agent in agents.iter_mut() {
        let pressure = view.potential_at(agent.position.x, agent.position.y);
        let grad = gradient_at(view, agent.position.x, agent.position.y);

        agent.velocity += (-params.gamma * grad - params.eta * agent.velocity) * dt;

        let step = agent.velocity * dt * FRAME_RATE_SCALE;
        agent.position.x = wrap(agent.position.x + step.x, view.width);
        agent.position.y = wrap(agent.position.y + step.y, view.height);

        agent.last_pressure = pressure;
    }
}
