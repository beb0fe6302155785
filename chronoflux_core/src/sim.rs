//! The `Simulation` aggregate: one replica's complete state with an
//! explicit lifecycle (`new`, `tick`, `apply_envelope`, `shutdown`).
//!
//! All mutable state - agents, intents, peers, the event log - lives in
//! this single owned value; there is no ambient module-level state. The
//! driver owns the value and calls `tick` from exactly one place, so
//! inbound transport messages can only be applied between ticks, never
//! concurrently with a tick body.

use crate::agents::AgentStore;
use crate::config::{SimConfig, SimulationParams};
use crate::coupling;
use crate::error::CoreError;
use crate::events::{EventKind, EventLog, EventRecord};
use crate::field::{Field, FieldView, Intent};
use crate::message::{TelemetrySummary, WireMessage, TELEMETRY_MAX_PULSES};
use crate::metrics;
use crate::motion;
use crate::peers::PeerTable;

use chronoflux_env::{Envelope, ReplicaId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::f64::consts::FRAC_PI_2;

/// Velocity factor of a pacemaker flip (reverse and damp).
const FLIP_VELOCITY_FACTOR: f64 = -0.6;

/// Virtual epoch for event timestamps: 2024-01-01 00:00:00 UTC.
///
/// Derived from the simulated clock rather than the wall clock so runs
/// stay reproducible.
const EPOCH_MS: u64 = 1_704_067_200_000;

/// One simulation replica.
pub struct Simulation {
    config: SimConfig,
    params: SimulationParams,
    t: f64,
    tick_count: u64,
    portal: bool,
    agents: AgentStore,
    field: Field,
    peers: PeerTable,
    log: EventLog,
    outbox: Vec<WireMessage>,
    rng: StdRng,
}

impl Simulation {
    /// Creates a replica from its configuration, spawning the agent
    /// population deterministically from the seed.
    pub fn new(config: SimConfig) -> Self {
        // Physics entropy is split from the master seed so that unrelated
        // subsystems seeded elsewhere do not disturb trajectories.
        let physics_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let mut rng = StdRng::seed_from_u64(physics_seed);

        let params = config.params.clamped();
        let agents = AgentStore::spawn(config.agent_count, config.width, config.height, &mut rng);

        Self {
            config,
            params,
            t: 0.0,
            tick_count: 0,
            portal: false,
            agents,
            field: Field::new(),
            peers: PeerTable::new(),
            log: EventLog::new(),
            outbox: Vec::new(),
            rng,
        }
    }

    /// Advances the replica by one physics step.
    ///
    /// Order is fixed: clock, intent decay, motion, phase coupling.
    /// Always terminates; nothing in here can fail.
    pub fn tick(&mut self, dt: f64) {
        self.t += dt;
        self.field.decay();

        let view = FieldView {
            intents: self.field.intents(),
            peers: &self.peers,
            portal: self.portal,
            t: self.t,
            width: self.config.width,
            height: self.config.height,
        };
        motion::integrate(&mut self.agents, &view, &self.params, dt);

        coupling::synchronize(&mut self.agents, &self.params, self.portal, dt);
        self.tick_count += 1;
    }

    // ── Operator actions (Event Controller) ────────────────────────────

    /// Injects a pulse at the given point and queues the outbound event.
    pub fn inject_intent(&mut self, x: f64, y: f64) -> Intent {
        let intent = Intent::at(x, y);
        self.field.inject(intent);
        self.record(
            EventKind::Intent,
            json!({ "x": intent.x, "y": intent.y, "E": intent.energy, "sigma": intent.sigma }),
        );
        self.outbox.push(WireMessage::Intent(intent));
        intent
    }

    /// Injects a pulse at a random point.
    pub fn inject_random_intent(&mut self) -> Intent {
        let x = self.rng.gen::<f64>() * self.config.width;
        let y = self.rng.gen::<f64>() * self.config.height;
        self.inject_intent(x, y)
    }

    /// Activates the global regime switch.
    ///
    /// One-way for the lifetime of the replica: the flag never reverts,
    /// and re-activating has no further observable effect on state. The
    /// outbound event is emitted on every local call.
    pub fn activate_portal(&mut self) {
        self.portal = true;
        self.record(EventKind::Portal, json!({ "portal": true }));
        self.outbox.push(WireMessage::Portal);
    }

    /// Applies a pacemaker flip to every agent and queues the outbound
    /// event. Repeatable; each application compounds.
    pub fn pacemaker_flip(&mut self) {
        self.flip_agents();
        self.record(EventKind::Flip, json!({}));
        self.outbox.push(WireMessage::Flip);
    }

    fn flip_agents(&mut self) {
        for agent in self.agents.iter_mut() {
            agent.velocity *= FLIP_VELOCITY_FACTOR;
            agent.phase += FRAC_PI_2;
        }
    }

    // ── Replica state blending ─────────────────────────────────────────

    /// Ingests one inbound transport envelope.
    ///
    /// Messages from this replica itself are ignored. A malformed payload
    /// returns `Err` with no state change; the caller logs and drops it.
    pub fn apply_envelope(&mut self, envelope: &Envelope) -> Result<(), CoreError> {
        if envelope.from == self.config.replica {
            return Ok(());
        }
        let message = WireMessage::decode(&envelope.payload)?;
        self.apply_remote(envelope.from, message);
        Ok(())
    }

    /// Applies an already-decoded remote message.
    ///
    /// Remote portal/flip have the same effect as the local action but
    /// are never re-broadcast - outbound emission only happens for
    /// locally originated actions, which keeps relay loops impossible.
    pub fn apply_remote(&mut self, from: ReplicaId, message: WireMessage) {
        match message {
            WireMessage::Telemetry(summary) => {
                self.peers.update(from, summary.into());
            }
            WireMessage::Intent(intent) => {
                // No deduplication: a pulse relayed over multiple paths
                // lands as multiple independent sources.
                self.field.inject(intent);
                self.record(
                    EventKind::RemoteIntent,
                    json!({ "x": intent.x, "y": intent.y, "E": intent.energy }),
                );
            }
            WireMessage::Portal => {
                self.portal = true;
                self.record(EventKind::RemotePortal, json!({}));
            }
            WireMessage::Flip => {
                self.flip_agents();
                self.record(EventKind::RemoteFlip, json!({}));
            }
        }
    }

    /// Forgets a peer known to have disconnected.
    pub fn peer_disconnected(&mut self, peer: &ReplicaId) {
        self.peers.remove(peer);
    }

    // ── Telemetry ──────────────────────────────────────────────────────

    /// Builds the outbound compressed telemetry summary and records the
    /// snapshot in the event trail.
    pub fn telemetry_message(&mut self) -> WireMessage {
        let (order_magnitude, mean_phase) = metrics::order_parameter(&self.agents);
        let c = metrics::centroid(&self.agents);
        let tau = self.turbulence();

        self.record(
            EventKind::Telemetry,
            json!({
                "agents": self.agents.len(),
                "intents": self.field.len(),
                "peers": self.peers.len(),
            }),
        );

        WireMessage::Telemetry(TelemetrySummary {
            t: self.t,
            harmony: order_magnitude,
            tau,
            cx: c.x,
            cy: c.y,
            order_magnitude,
            mean_phase,
            pulses: self
                .field
                .intents()
                .iter()
                .take(TELEMETRY_MAX_PULSES)
                .copied()
                .collect(),
        })
    }

    /// Drains the queued outbound messages for the driver to send.
    pub fn take_outbox(&mut self) -> Vec<WireMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Stops the replica, recording a final metrics snapshot, and hands
    /// the event trail to the caller for export.
    pub fn shutdown(mut self) -> EventLog {
        self.record(EventKind::Shutdown, json!({ "ticks": self.tick_count }));
        self.log
    }

    // ── Read-only accessors ────────────────────────────────────────────

    /// Current phase coherence.
    pub fn harmony(&self) -> f64 {
        metrics::harmony(&self.agents)
    }

    /// Current field irregularity.
    pub fn turbulence(&self) -> f64 {
        metrics::turbulence(&self.field_view())
    }

    /// Read-only field snapshot for rendering/metrics consumers.
    pub fn field_view(&self) -> FieldView<'_> {
        FieldView {
            intents: self.field.intents(),
            peers: &self.peers,
            portal: self.portal,
            t: self.t,
            width: self.config.width,
            height: self.config.height,
        }
    }

    /// Simulated time.
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Ticks executed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Whether the regime switch has fired.
    pub fn portal(&self) -> bool {
        self.portal
    }

    /// The agent population.
    pub fn agents(&self) -> &AgentStore {
        &self.agents
    }

    /// Active local intents.
    pub fn intents(&self) -> &[Intent] {
        self.field.intents()
    }

    /// Known remote peers.
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// The event trail so far.
    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    /// Current parameters.
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Replaces the parameters (operator adjustment), clamped.
    pub fn set_params(&mut self, params: SimulationParams) {
        self.params = params.clamped();
    }

    /// This replica's configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Replaces the agent population (scenario setup and exact-value tests).
    pub fn set_agents(&mut self, agents: AgentStore) {
        self.agents = agents;
    }

    fn record(&mut self, kind: EventKind, data: serde_json::Value) {
        let harmony = metrics::harmony(&self.agents);
        let tau = {
            let view = FieldView {
                intents: self.field.intents(),
                peers: &self.peers,
                portal: self.portal,
                t: self.t,
                width: self.config.width,
                height: self.config.height,
            };
            metrics::turbulence(&view)
        };

        self.log.push(EventRecord {
            timestamp_ms: EPOCH_MS + (self.t * 1000.0) as u64,
            t: self.t,
            kind,
            data,
            harmony,
            tau,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Agent;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;
    use std::f64::consts::TAU;

    fn config(seed: u64, agent_count: usize) -> SimConfig {
        SimConfig {
            seed,
            agent_count,
            replica: ReplicaId::from_seed(seed),
            ..Default::default()
        }
    }

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
    fn test_same_seed_is_bit_identical() {
        let mut a = Simulation::new(config(7, 40));
        let mut b = Simulation::new(config(7, 40));

        for _ in 0..100 {
            a.tick(0.016);
            b.tick(0.016);
        }

        assert_eq!(a.agents(), b.agents());
        assert_relative_eq!(a.harmony(), b.harmony());
    }

    #[test]
    fn test_same_seed_is_bit_identical_with_peer_telemetry() {
        // Peer pulses enter the potential sum during the tick, so their
        // summation order must be a function of peer ids alone. Two
        // replicas hearing the same room must not drift by a single bit.
        let mut a = Simulation::new(config(7, 20));
        let mut b = Simulation::new(config(7, 20));

        for i in 0..11u64 {
            let peer = ReplicaId::from_seed(100 + i);
            let summary = TelemetrySummary {
                t: i as f64,
                harmony: 0.5,
                tau: 0.01,
                cx: 380.0,
                cy: 290.0,
                order_magnitude: 0.5,
                mean_phase: 0.3,
                pulses: vec![Intent::at(40.0 * i as f64, 30.0 * i as f64)],
            };
            a.apply_remote(peer, WireMessage::Telemetry(summary.clone()));
            b.apply_remote(peer, WireMessage::Telemetry(summary));
        }

        for _ in 0..10 {
            a.tick(0.016);
            b.tick(0.016);
        }

        assert_eq!(a.agents(), b.agents());
    }

    #[test]
    fn test_three_agent_reference_tick() {
        // gamma = 0 removes the field force entirely, so positions hold
        // still and the phase update is the documented Kuramoto rule,
        // checkable against a longhand computation.
        let mut cfg = config(1, 3);
        cfg.params = SimulationParams {
            kappa: 0.7,
            eta: 0.18,
            gamma: 0.0,
            k_neighbors: 2,
        };
        let mut sim = Simulation::new(cfg);
        sim.set_agents(AgentStore::from_agents(vec![
            agent(0, 100.0, 100.0, 0.3),
            agent(1, 200.0, 100.0, 1.1),
            agent(2, 300.0, 100.0, 2.0),
        ]));

        let dt = 0.016;
        sim.tick(dt);

        // Expected: sequential in-place update in agent order, each
        // agent coupling to the other two.
        let omega = 1.2 * TAU;
        let kappa = 0.7;
        let mut p = [0.3f64, 1.1, 2.0];
        p[0] += (omega + kappa / 2.0 * ((p[1] - p[0]).sin() + (p[2] - p[0]).sin())) * dt;
        p[1] += (omega + kappa / 2.0 * ((p[0] - p[1]).sin() + (p[2] - p[1]).sin())) * dt;
        p[2] += (omega + kappa / 2.0 * ((p[1] - p[2]).sin() + (p[0] - p[2]).sin())) * dt;

        let agents = sim.agents().as_slice();
        for (i, expected) in p.iter().enumerate() {
            assert_relative_eq!(agents[i].phase, *expected, epsilon = 1e-9);
            assert_eq!(agents[i].velocity, Vector2::zeros());
        }
        assert_eq!(agents[0].position, Vector2::new(100.0, 100.0));
        assert_eq!(agents[2].position, Vector2::new(300.0, 100.0));
    }

    #[test]
    fn test_pacemaker_flip_is_exact_and_compounds() {
        let mut sim = Simulation::new(config(1, 1));
        sim.set_agents(AgentStore::from_agents(vec![Agent {
            id: 0,
            position: Vector2::new(10.0, 10.0),
            velocity: Vector2::new(3.0, -2.0),
            phase: 1.0,
            last_pressure: 0.0,
        }]));

        sim.pacemaker_flip();
        let a = &sim.agents().as_slice()[0];
        assert_eq!(a.velocity.x, 3.0 * -0.6);
        assert_eq!(a.velocity.y, -2.0 * -0.6);
        assert_eq!(a.phase, 1.0 + FRAC_PI_2);

        sim.pacemaker_flip();
        let a = &sim.agents().as_slice()[0];
        assert_eq!(a.velocity.x, 3.0 * -0.6 * -0.6);
        assert_eq!(a.phase, 1.0 + FRAC_PI_2 + FRAC_PI_2);
    }

    #[test]
    fn test_portal_changes_base_frequency_idempotently() {
        let mut sim = Simulation::new(config(1, 3));
        let phase = 0.5;
        let aligned = AgentStore::from_agents(vec![
            agent(0, 100.0, 100.0, phase),
            agent(1, 200.0, 100.0, phase),
            agent(2, 300.0, 100.0, phase),
        ]);

        // Aligned phases kill the coupling term; gamma 0 keeps agents put.
        let mut params = SimulationParams::default();
        params.gamma = 0.0;
        sim.set_params(params);

        sim.activate_portal();
        sim.activate_portal(); // no further observable effect on state
        assert!(sim.portal());

        sim.set_agents(aligned);
        let dt = 0.016;
        sim.tick(dt);

        let expected = phase + 1.8 * std::f64::consts::PI * dt;
        assert_relative_eq!(sim.agents().as_slice()[0].phase, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_outbox_carries_local_actions_only() {
        let mut sim = Simulation::new(config(1, 2));

        sim.inject_intent(10.0, 20.0);
        sim.activate_portal();
        sim.pacemaker_flip();

        let outbox = sim.take_outbox();
        assert_eq!(outbox.len(), 3);
        assert!(matches!(outbox[0], WireMessage::Intent(_)));
        assert!(matches!(outbox[1], WireMessage::Portal));
        assert!(matches!(outbox[2], WireMessage::Flip));

        // Remote applications never queue outbound messages.
        let peer = ReplicaId::from_seed(99);
        sim.apply_remote(peer, WireMessage::Portal);
        sim.apply_remote(peer, WireMessage::Intent(Intent::at(1.0, 2.0)));
        assert!(sim.take_outbox().is_empty());
    }

    #[test]
    fn test_remote_intent_appends_without_dedup() {
        let mut sim = Simulation::new(config(1, 2));
        let peer = ReplicaId::from_seed(99);
        let intent = Intent::at(50.0, 60.0);

        sim.apply_remote(peer, WireMessage::Intent(intent));
        sim.apply_remote(peer, WireMessage::Intent(intent));

        assert_eq!(sim.intents().len(), 2);
        assert_eq!(sim.intents()[0], intent);
    }

    #[test]
    fn test_envelope_relay_between_replicas() {
        let mut a = Simulation::new(config(1, 2));
        let mut b = Simulation::new(config(2, 2));

        let injected = a.inject_intent(123.0, 45.0);
        let outbox = a.take_outbox();
        assert_eq!(outbox.len(), 1);

        let before = b.intents().len();
        let envelope = Envelope::new(
            a.config().replica,
            outbox[0].encode().unwrap(),
            0,
        );
        b.apply_envelope(&envelope).unwrap();

        assert_eq!(b.intents().len(), before + 1);
        let received = b.intents().last().unwrap();
        assert_eq!(received.x, injected.x);
        assert_eq!(received.y, injected.y);
        assert_eq!(received.energy, injected.energy);
        assert_eq!(received.sigma, injected.sigma);
    }

    #[test]
    fn test_own_envelope_is_ignored() {
        let mut sim = Simulation::new(config(1, 2));
        let payload = WireMessage::Intent(Intent::at(1.0, 2.0)).encode().unwrap();
        let envelope = Envelope::new(sim.config().replica, payload, 0);

        sim.apply_envelope(&envelope).unwrap();
        assert!(sim.intents().is_empty());
    }

    #[test]
    fn test_malformed_envelope_leaves_state_untouched() {
        let mut sim = Simulation::new(config(1, 2));
        let envelope = Envelope::new(ReplicaId::from_seed(9), b"{broken".to_vec(), 0);

        assert!(sim.apply_envelope(&envelope).is_err());
        assert!(sim.intents().is_empty());
        assert!(!sim.portal());
        assert!(sim.event_log().is_empty());
    }

    #[test]
    fn test_telemetry_caps_pulses() {
        let mut sim = Simulation::new(config(1, 5));
        for i in 0..6 {
            sim.inject_intent(i as f64 * 10.0, 0.0);
        }

        match sim.telemetry_message() {
            WireMessage::Telemetry(summary) => {
                assert_eq!(summary.pulses.len(), TELEMETRY_MAX_PULSES);
                assert!((0.0..=1.0).contains(&summary.harmony));
                assert!(summary.tau >= 0.0);
            }
            other => panic!("expected telemetry, got {:?}", other),
        }
    }

    #[test]
    fn test_shutdown_appends_final_record() {
        let mut sim = Simulation::new(config(1, 4));
        sim.tick(0.016);
        sim.inject_intent(5.0, 5.0);

        let log = sim.shutdown();
        let last = log.last().unwrap();
        assert_eq!(last.kind, EventKind::Shutdown);
        assert!((0.0..=1.0).contains(&last.harmony));
    }
}
