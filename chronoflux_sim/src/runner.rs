//! Scenario runner: drives one or more replicas over the in-memory bus.

use crate::bus::{BusNetwork, BusRouter};
use crate::context::SimContext;
use crate::scenarios::ScenarioId;
use crate::scheduler::Scheduler;

use chronoflux_core::{EventKind, SimConfig, Simulation, WireMessage};
use chronoflux_env::{ChronoContext, Envelope, ReplicaId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Telemetry broadcast period in simulated seconds.
const TELEMETRY_PERIOD: f64 = 1.0;

/// Autopilot cadence: intent roll every 5 s, portal at 30 s, flip at 60 s.
const AUTO_INTENT_PERIOD: f64 = 5.0;
const AUTO_PORTAL_AT: f64 = 30.0;
const AUTO_FLIP_AT: f64 = 60.0;

/// One driven replica: simulation, transport handle, and schedule.
pub struct Replica {
    sim: Simulation,
    net: BusNetwork,
    scheduler: Scheduler,
    ctx: SimContext,
    rng: ChaCha8Rng,
}

impl Replica {
    /// Wraps a simulation and its transport; telemetry is always
    /// scheduled, autopilot is opt-in.
    pub fn new(config: SimConfig, net: BusNetwork) -> Self {
        // Autopilot entropy is split from the master seed so the dice
        // rolls never perturb physics trajectories.
        let pilot_seed = config.seed.wrapping_mul(0x517cc1b727220a95);

        let mut scheduler = Scheduler::new();
        scheduler.every("telemetry", TELEMETRY_PERIOD);

        let ctx = SimContext::new(config.seed);

        Self {
            sim: Simulation::new(config),
            net,
            scheduler,
            ctx,
            rng: ChaCha8Rng::seed_from_u64(pilot_seed),
        }
    }

    /// Enables the autonomous schedule: a 30%-chance intent every 5 s,
    /// portal once at 30 s, flip once at 60 s.
    pub fn enable_autopilot(&mut self) {
        self.scheduler.every("auto_intent", AUTO_INTENT_PERIOD);
        self.scheduler.once("portal", AUTO_PORTAL_AT);
        self.scheduler.once("flip", AUTO_FLIP_AT);
    }

    /// One driver step: apply inbound, tick physics, fire due tasks,
    /// flush outbound.
    pub fn step(&mut self, dt: f64) {
        self.ctx.advance_time(Duration::from_secs_f64(dt));

        for envelope in self.net.drain() {
            if let Err(e) = self.sim.apply_envelope(&envelope) {
                // Malformed payloads are dropped; the sender is not ours
                // to correct.
                warn!(from = %envelope.from, "Dropping undecodable envelope: {}", e);
            }
        }

        self.sim.tick(dt);

        for task in self.scheduler.advance(dt) {
            match task {
                "telemetry" => {
                    let message = self.sim.telemetry_message();
                    self.send(message);
                }
                "auto_intent" => {
                    if self.rng.gen::<f64>() > 0.7 {
                        let intent = self.sim.inject_random_intent();
                        debug!(x = intent.x, y = intent.y, "Autopilot intent");
                    }
                }
                "portal" => self.sim.activate_portal(),
                "flip" => self.sim.pacemaker_flip(),
                _ => {}
            }
        }

        for message in self.sim.take_outbox() {
            self.send(message);
        }
    }

    fn send(&mut self, message: WireMessage) {
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode outbound message: {}", e);
                return;
            }
        };
        let timestamp_ms = self
            .ctx
            .system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let envelope = Envelope::new(self.id(), payload, timestamp_ms);
        // Loss is tolerated; a failed send is just a lost message.
        let _ = self.net.try_send(envelope);
    }

    /// This replica's transport identity.
    pub fn id(&self) -> ReplicaId {
        self.sim.config().replica
    }

    /// The driven simulation.
    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    /// Mutable access for scenario setup and operator actions.
    pub fn sim_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    /// Consumes the replica and returns its simulation for shutdown.
    pub fn into_sim(self) -> Simulation {
        self.sim
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed (per replica)
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Final phase coherence of the first replica
    pub final_harmony: f64,

    /// Final field irregularity of the first replica
    pub final_turbulence: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Envelopes delivered by the bus
    pub messages_delivered: u64,

    /// Envelopes dropped by the bus
    pub messages_dropped: u64,

    /// Intents injected locally across all replicas
    pub intents_injected: u64,

    /// Telemetry snapshots recorded across all replicas
    pub telemetry_sent: u64,
}

/// Runs deterministic scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Agents per replica
    agents: usize,

    /// Physics step in seconds
    dt: f64,

    /// Maximum duration in seconds
    max_duration_secs: f64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, agents: usize) -> Self {
        Self {
            seed,
            agents,
            dt: 0.016,
            max_duration_secs: 10.0,
        }
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Sets the physics step.
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        match scenario {
            ScenarioId::Solo => self.run_solo(),
            ScenarioId::Relay => self.run_relay(),
            ScenarioId::PortalWave => self.run_portal_wave(),
            ScenarioId::FlipStorm => self.run_flip_storm(),
            ScenarioId::LossyMesh => self.run_lossy_mesh(),
            ScenarioId::SplitBrain => self.run_split_brain(),
        }
    }

    fn target_ticks(&self) -> u64 {
        (self.max_duration_secs / self.dt).round() as u64
    }

    /// Builds `n` replicas attached to the router, each with its own
    /// derived seed and identity.
    fn build_cluster(&self, n: usize, router: &mut BusRouter) -> Vec<Replica> {
        (0..n)
            .map(|i| {
                let seed = self.seed.wrapping_add(i as u64);
                let replica = ReplicaId::from_seed(seed);
                let config = SimConfig {
                    seed,
                    agent_count: self.agents,
                    replica,
                    ..SimConfig::default()
                };
                let net = router.attach(replica);
                Replica::new(config, net)
            })
            .collect()
    }

    /// Steps every replica once, then routes the bus.
    fn step_all(replicas: &mut [Replica], router: &mut BusRouter, dt: f64) {
        for replica in replicas.iter_mut() {
            replica.step(dt);
        }
        router.route();
    }

    fn finish(
        &self,
        scenario: ScenarioId,
        replicas: &[Replica],
        router: &BusRouter,
        failure_reason: Option<String>,
    ) -> ScenarioResult {
        let first = &replicas[0];
        let passed = failure_reason.is_none();

        let mut metrics = ScenarioMetrics {
            messages_delivered: router.stats().delivered,
            messages_dropped: router.stats().dropped,
            ..Default::default()
        };
        for replica in replicas {
            let log = replica.sim().event_log();
            metrics.intents_injected += log.count(EventKind::Intent) as u64;
            metrics.telemetry_sent += log.count(EventKind::Telemetry) as u64;
        }

        if passed {
            info!(
                "✓ {} complete: H={:.3} τ={:.4} delivered={} dropped={}",
                scenario.name(),
                first.sim().harmony(),
                first.sim().turbulence(),
                metrics.messages_delivered,
                metrics.messages_dropped,
            );
        }

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_ticks: first.sim().tick_count(),
            final_time_secs: first.sim().t(),
            final_harmony: first.sim().harmony(),
            final_turbulence: first.sim().turbulence(),
            failure_reason,
            metrics,
        }
    }

    /// Checks the invariants every scenario relies on: metrics in range
    /// and every agent inside the domain.
    fn check_invariants(replica: &Replica) -> Option<String> {
        let sim = replica.sim();
        let h = sim.harmony();
        if !(0.0..=1.0).contains(&h) {
            return Some(format!("Harmony {} outside [0, 1]", h));
        }
        let tau = sim.turbulence();
        if !tau.is_finite() || tau < 0.0 {
            return Some(format!("Turbulence {} not a finite non-negative", tau));
        }
        let (width, height) = (sim.config().width, sim.config().height);
        for agent in sim.agents().iter() {
            let p = agent.position;
            if !(0.0..width).contains(&p.x) || !(0.0..height).contains(&p.y) {
                return Some(format!("Agent {} escaped domain at {:?}", agent.id, p));
            }
            if !agent.phase.is_finite() {
                return Some(format!("Agent {} phase diverged", agent.id));
            }
        }
        None
    }

    /// Solo: a single autopilot replica with no peers must hold every
    /// invariant on its own.
    fn run_solo(&self) -> ScenarioResult {
        let mut router = BusRouter::new(self.seed);
        let mut replicas = self.build_cluster(1, &mut router);
        replicas[0].enable_autopilot();

        let mut failure = None;
        for _ in 0..self.target_ticks() {
            Self::step_all(&mut replicas, &mut router, self.dt);
            if failure.is_none() {
                failure = Self::check_invariants(&replicas[0]);
            }
        }

        self.finish(ScenarioId::Solo, &replicas, &router, failure)
    }

    /// Relay: an intent injected on one replica must land on the other's
    /// field as a remote pulse.
    fn run_relay(&self) -> ScenarioResult {
        let mut router = BusRouter::new(self.seed);
        let mut replicas = self.build_cluster(2, &mut router);

        let inject_tick = (1.0 / self.dt) as u64;
        for tick in 0..self.target_ticks() {
            if tick == inject_tick {
                replicas[0].sim_mut().inject_intent(120.0, 340.0);
            }
            Self::step_all(&mut replicas, &mut router, self.dt);
        }

        let relayed = replicas[1]
            .sim()
            .event_log()
            .count(EventKind::RemoteIntent);
        let failure = if relayed == 0 {
            Some("Intent never reached the second replica".to_string())
        } else {
            Self::check_invariants(&replicas[1])
        };

        self.finish(ScenarioId::Relay, &replicas, &router, failure)
    }

    /// PortalWave: a portal fired locally must switch the regime on
    /// every replica, and firing it twice must change nothing further.
    fn run_portal_wave(&self) -> ScenarioResult {
        let mut router = BusRouter::new(self.seed);
        let mut replicas = self.build_cluster(3, &mut router);

        let fire_tick = (2.0 / self.dt) as u64;
        for tick in 0..self.target_ticks() {
            if tick == fire_tick {
                replicas[0].sim_mut().activate_portal();
                // Idempotent on the flag.
                replicas[0].sim_mut().activate_portal();
            }
            Self::step_all(&mut replicas, &mut router, self.dt);
        }

        let mut failure = None;
        for (i, replica) in replicas.iter().enumerate() {
            if !replica.sim().portal() {
                failure = Some(format!("Replica {} never entered portal regime", i));
                break;
            }
        }
        if failure.is_none() {
            // Remote portals must not be re-broadcast; each non-origin
            // replica hears it only from the origin.
            for (i, replica) in replicas.iter().enumerate().skip(1) {
                let heard = replica.sim().event_log().count(EventKind::RemotePortal);
                if heard != 2 {
                    failure = Some(format!(
                        "Replica {} heard {} portal events, expected the origin's 2",
                        i, heard
                    ));
                    break;
                }
            }
        }

        self.finish(ScenarioId::PortalWave, &replicas, &router, failure)
    }

    /// FlipStorm: repeated pacemaker flips compound without throwing
    /// agents out of the domain or diverging phases.
    fn run_flip_storm(&self) -> ScenarioResult {
        let mut router = BusRouter::new(self.seed);
        let mut replicas = self.build_cluster(2, &mut router);

        let flip_every = (1.5 / self.dt) as u64;
        let mut flips = 0u64;
        let mut failure = None;
        for tick in 0..self.target_ticks() {
            if tick > 0 && tick % flip_every == 0 {
                replicas[0].sim_mut().pacemaker_flip();
                flips += 1;
            }
            Self::step_all(&mut replicas, &mut router, self.dt);
            if failure.is_none() {
                failure = Self::check_invariants(&replicas[0])
                    .or_else(|| Self::check_invariants(&replicas[1]));
            }
        }

        if failure.is_none() {
            let heard = replicas[1].sim().event_log().count(EventKind::RemoteFlip) as u64;
            if heard != flips {
                failure = Some(format!("Observer heard {} of {} flips", heard, flips));
            }
        }

        self.finish(ScenarioId::FlipStorm, &replicas, &router, failure)
    }

    /// LossyMesh: four replicas under 50% loss keep running and still
    /// learn about each other eventually.
    fn run_lossy_mesh(&self) -> ScenarioResult {
        let mut router = BusRouter::new(self.seed);
        let mut replicas = self.build_cluster(4, &mut router);
        router.controller().set_global_loss(0.5);

        let mut failure = None;
        for _ in 0..self.target_ticks() {
            Self::step_all(&mut replicas, &mut router, self.dt);
        }

        for (i, replica) in replicas.iter().enumerate() {
            if let Some(reason) = Self::check_invariants(replica) {
                failure = Some(reason);
                break;
            }
            if replica.sim().peers().is_empty() {
                failure = Some(format!("Replica {} heard no telemetry at all", i));
                break;
            }
        }
        if failure.is_none() && router.stats().dropped == 0 {
            failure = Some("Loss injection never dropped a message".to_string());
        }

        self.finish(ScenarioId::LossyMesh, &replicas, &router, failure)
    }

    /// SplitBrain: partitioned halves must not hear each other; after
    /// healing, telemetry re-merges the peer tables last-write-wins.
    fn run_split_brain(&self) -> ScenarioResult {
        let mut router = BusRouter::new(self.seed);
        let mut replicas = self.build_cluster(4, &mut router);

        let ids: Vec<ReplicaId> = replicas.iter().map(|r| r.id()).collect();
        router
            .controller()
            .partition(vec![ids[0], ids[1]], vec![ids[2], ids[3]]);

        let half = self.target_ticks() / 2;
        for _ in 0..half {
            Self::step_all(&mut replicas, &mut router, self.dt);
        }

        let mut failure = None;
        if replicas[0].sim().peers().get(&ids[2]).is_some()
            || replicas[0].sim().peers().get(&ids[3]).is_some()
        {
            failure = Some("Telemetry crossed an active partition".to_string());
        }

        router.controller().heal_all();
        for _ in half..self.target_ticks() {
            Self::step_all(&mut replicas, &mut router, self.dt);
        }

        if failure.is_none() {
            for (i, replica) in replicas.iter().enumerate() {
                if replica.sim().peers().len() != 3 {
                    failure = Some(format!(
                        "Replica {} knows {} peers after heal, expected 3",
                        i,
                        replica.sim().peers().len()
                    ));
                    break;
                }
            }
        }

        self.finish(ScenarioId::SplitBrain, &replicas, &router, failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> ScenarioRunner {
        // Small populations keep scenario tests fast.
        ScenarioRunner::new(42, 20).with_duration(6.0)
    }

    #[test]
    fn test_solo_holds_invariants() {
        let result = runner().run(ScenarioId::Solo);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.total_ticks > 0);
    }

    #[test]
    fn test_relay_delivers_intent() {
        let result = runner().run(ScenarioId::Relay);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.messages_delivered > 0);
    }

    #[test]
    fn test_portal_wave_reaches_all() {
        let result = runner().run(ScenarioId::PortalWave);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_flip_storm_stays_bounded() {
        let result = runner().run(ScenarioId::FlipStorm);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_lossy_mesh_survives() {
        let result = runner().run(ScenarioId::LossyMesh);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.messages_dropped > 0);
    }

    #[test]
    fn test_split_brain_remerges() {
        let result = runner().run(ScenarioId::SplitBrain);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let a = runner().run(ScenarioId::Solo);
        let b = runner().run(ScenarioId::Solo);
        assert_eq!(a.final_harmony, b.final_harmony);
        assert_eq!(a.final_turbulence, b.final_turbulence);
        assert_eq!(a.total_ticks, b.total_ticks);
    }

    #[test]
    fn test_replica_autopilot_sends_telemetry() {
        let mut router = BusRouter::new(7);
        let id = ReplicaId::from_seed(7);
        let net = router.attach(id);
        let config = SimConfig {
            seed: 7,
            agent_count: 10,
            replica: id,
            ..SimConfig::default()
        };
        let mut replica = Replica::new(config, net);
        replica.enable_autopilot();

        for _ in 0..80 {
            replica.step(0.016);
        }
        // 80 * 0.016 = 1.28 s, so exactly one telemetry snapshot.
        assert_eq!(replica.sim().event_log().count(EventKind::Telemetry), 1);
    }
}
