//! In-memory broadcast bus with fault injection.
//!
//! The simulated counterpart of the BroadcastChannel/relay transports:
//! every replica attaches to one router, every send fans out to all
//! other attached replicas, and the controller can partition links or
//! drop messages probabilistically. Loss is silent; the protocol
//! tolerates it.

use async_trait::async_trait;
use chronoflux_env::{EnvError, Envelope, ReplicaId, Transport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Channel capacity per inbox; overflow is dropped like any other loss.
const CHANNEL_CAPACITY: usize = 10_000;

/// Delivery statistics for one routing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    /// Envelopes delivered to an inbox
    pub delivered: u64,

    /// Envelopes dropped (partition, loss, or full inbox)
    pub dropped: u64,
}

impl RouteStats {
    /// Accumulates another pass into this one.
    pub fn merge(&mut self, other: RouteStats) {
        self.delivered += other.delivered;
        self.dropped += other.dropped;
    }
}

/// Fault controller shared between the router and test code.
#[derive(Clone, Default)]
pub struct BusController {
    /// Active partitions (groups that cannot reach each other)
    partitions: Arc<Mutex<Vec<(Vec<ReplicaId>, Vec<ReplicaId>)>>>,

    /// Per-link loss rate (0.0 - 1.0)
    link_loss: Arc<Mutex<HashMap<(ReplicaId, ReplicaId), f64>>>,

    /// Loss rate applied to every link
    global_loss: Arc<Mutex<f64>>,
}

impl BusController {
    /// Creates a controller with no faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a partition between two groups.
    pub fn partition(&self, group_a: Vec<ReplicaId>, group_b: Vec<ReplicaId>) {
        let mut partitions = self.partitions.lock().unwrap();
        partitions.push((group_a, group_b));
    }

    /// Heals all active partitions.
    pub fn heal_all(&self) {
        let mut partitions = self.partitions.lock().unwrap();
        partitions.clear();
    }

    /// Sets the loss rate for a specific link.
    pub fn set_loss(&self, from: ReplicaId, to: ReplicaId, rate: f64) {
        let mut losses = self.link_loss.lock().unwrap();
        losses.insert((from, to), rate.clamp(0.0, 1.0));
    }

    /// Sets a loss rate applied to every link.
    pub fn set_global_loss(&self, rate: f64) {
        *self.global_loss.lock().unwrap() = rate.clamp(0.0, 1.0);
    }

    /// Checks whether two replicas can communicate (not partitioned).
    pub fn can_communicate(&self, from: ReplicaId, to: ReplicaId) -> bool {
        let partitions = self.partitions.lock().unwrap();

        for (group_a, group_b) in partitions.iter() {
            let from_in_a = group_a.contains(&from);
            let from_in_b = group_b.contains(&from);
            let to_in_a = group_a.contains(&to);
            let to_in_b = group_b.contains(&to);

            if (from_in_a && to_in_b) || (from_in_b && to_in_a) {
                return false;
            }
        }

        true
    }

    /// Effective loss rate for a link.
    pub fn loss_rate(&self, from: ReplicaId, to: ReplicaId) -> f64 {
        let global = *self.global_loss.lock().unwrap();
        let link = *self
            .link_loss
            .lock()
            .unwrap()
            .get(&(from, to))
            .unwrap_or(&0.0);
        global.max(link)
    }
}

/// Transport handle held by one replica.
pub struct BusNetwork {
    /// This replica's ID
    local_id: ReplicaId,

    /// Sender to the central router
    tx: mpsc::Sender<Envelope>,

    /// Receiver for incoming envelopes
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Envelope>>>,
}

impl BusNetwork {
    /// Creates a detached network that drops everything (degraded mode).
    pub fn detached(local_id: ReplicaId) -> Self {
        let (tx, _) = mpsc::channel(1);
        let (_, rx) = mpsc::channel(1);
        Self {
            local_id,
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }

    /// Non-blocking send; a full or closed channel drops the message.
    pub fn try_send(&self, envelope: Envelope) -> Result<(), EnvError> {
        // Fire-and-forget: overflow and disconnection are ordinary loss.
        let _ = self.tx.try_send(envelope);
        Ok(())
    }

    /// Drains all pending envelopes without blocking.
    ///
    /// Drivers call this between ticks so that inbound messages are
    /// never applied mid-tick.
    pub fn drain(&self) -> Vec<Envelope> {
        let mut out = Vec::new();
        if let Ok(mut rx) = self.rx.try_lock() {
            while let Ok(envelope) = rx.try_recv() {
                out.push(envelope);
            }
        }
        out
    }
}

#[async_trait]
impl Transport for BusNetwork {
    async fn send(&self, envelope: Envelope) -> Result<(), EnvError> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| EnvError::transport("Bus closed"))
    }

    async fn recv(&self) -> Option<Envelope> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    fn local_id(&self) -> ReplicaId {
        self.local_id
    }
}

/// Central router fanning envelopes out to all attached replicas.
pub struct BusRouter {
    /// Sender cloned into every attached network
    router_tx: mpsc::Sender<Envelope>,

    /// Receiver for everything sent on the bus
    router_rx: mpsc::Receiver<Envelope>,

    /// Inbox senders per attached replica
    inboxes: HashMap<ReplicaId, mpsc::Sender<Envelope>>,

    /// Fault controller
    controller: BusController,

    /// Deterministic RNG deciding loss
    rng: StdRng,

    /// Accumulated delivery statistics
    stats: RouteStats,
}

impl BusRouter {
    /// Creates a router; the seed drives loss decisions.
    pub fn new(seed: u64) -> Self {
        let (router_tx, router_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            router_tx,
            router_rx,
            inboxes: HashMap::new(),
            controller: BusController::new(),
            rng: StdRng::seed_from_u64(seed),
            stats: RouteStats::default(),
        }
    }

    /// Attaches a replica and returns its transport handle.
    pub fn attach(&mut self, id: ReplicaId) -> BusNetwork {
        let (inbox_tx, inbox_rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.inboxes.insert(id, inbox_tx);
        BusNetwork {
            local_id: id,
            tx: self.router_tx.clone(),
            rx: Arc::new(tokio::sync::Mutex::new(inbox_rx)),
        }
    }

    /// Detaches a replica; its inbox closes and peers stop reaching it.
    pub fn detach(&mut self, id: &ReplicaId) {
        self.inboxes.remove(id);
    }

    /// Routes all pending envelopes, fanning each out to every attached
    /// replica except the sender, subject to partitions and loss.
    pub fn route(&mut self) -> RouteStats {
        let mut pass = RouteStats::default();

        while let Ok(envelope) = self.router_rx.try_recv() {
            for (&to, inbox) in &self.inboxes {
                if to == envelope.from {
                    continue;
                }
                if !self.controller.can_communicate(envelope.from, to) {
                    pass.dropped += 1;
                    continue;
                }
                let loss = self.controller.loss_rate(envelope.from, to);
                if loss > 0.0 && self.rng.gen::<f64>() < loss {
                    pass.dropped += 1;
                    continue;
                }
                match inbox.try_send(envelope.clone()) {
                    Ok(()) => pass.delivered += 1,
                    Err(_) => pass.dropped += 1,
                }
            }
        }

        self.stats.merge(pass);
        pass
    }

    /// The fault controller for this bus.
    pub fn controller(&self) -> &BusController {
        &self.controller
    }

    /// Totals across all routing passes.
    pub fn stats(&self) -> RouteStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(from: ReplicaId) -> Envelope {
        Envelope::new(from, vec![1, 2, 3], 0)
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let mut router = BusRouter::new(1);
        let a = ReplicaId::from_seed(1);
        let b = ReplicaId::from_seed(2);
        let c = ReplicaId::from_seed(3);

        let net_a = router.attach(a);
        let net_b = router.attach(b);
        let net_c = router.attach(c);

        net_a.try_send(envelope(a)).unwrap();
        let stats = router.route();

        assert_eq!(stats.delivered, 2);
        assert!(net_a.drain().is_empty());
        assert_eq!(net_b.drain().len(), 1);
        assert_eq!(net_c.drain().len(), 1);
    }

    #[test]
    fn test_partition_blocks_and_heals() {
        let mut router = BusRouter::new(1);
        let a = ReplicaId::from_seed(1);
        let b = ReplicaId::from_seed(2);

        let net_a = router.attach(a);
        let net_b = router.attach(b);

        router.controller().partition(vec![a], vec![b]);
        net_a.try_send(envelope(a)).unwrap();
        let stats = router.route();
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.dropped, 1);
        assert!(net_b.drain().is_empty());

        router.controller().heal_all();
        net_a.try_send(envelope(a)).unwrap();
        router.route();
        assert_eq!(net_b.drain().len(), 1);
    }

    #[test]
    fn test_total_loss_drops_everything() {
        let mut router = BusRouter::new(1);
        let a = ReplicaId::from_seed(1);
        let b = ReplicaId::from_seed(2);

        let net_a = router.attach(a);
        let net_b = router.attach(b);
        router.controller().set_global_loss(1.0);

        for _ in 0..20 {
            net_a.try_send(envelope(a)).unwrap();
        }
        let stats = router.route();

        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.dropped, 20);
        assert!(net_b.drain().is_empty());
    }

    #[test]
    fn test_per_link_loss_is_directional() {
        let router = BusRouter::new(1);
        let a = ReplicaId::from_seed(1);
        let b = ReplicaId::from_seed(2);

        router.controller().set_loss(a, b, 1.0);
        assert_eq!(router.controller().loss_rate(a, b), 1.0);
        assert_eq!(router.controller().loss_rate(b, a), 0.0);
    }

    #[tokio::test]
    async fn test_transport_trait_roundtrip() {
        let mut router = BusRouter::new(1);
        let a = ReplicaId::from_seed(1);
        let b = ReplicaId::from_seed(2);

        let net_a = router.attach(a);
        let net_b = router.attach(b);

        net_a.send(envelope(a)).await.unwrap();
        router.route();

        let received = net_b.recv().await.unwrap();
        assert_eq!(received.from, a);
        assert_eq!(net_b.local_id(), b);
    }

    #[test]
    fn test_detached_network_degrades_silently() {
        let net = BusNetwork::detached(ReplicaId::from_seed(5));
        // Sends are swallowed, nothing ever arrives.
        net.try_send(envelope(ReplicaId::from_seed(5))).unwrap();
        assert!(net.drain().is_empty());
    }
}
