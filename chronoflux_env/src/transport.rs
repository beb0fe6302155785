//! Message transport abstraction between ChronoFlux replicas.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{Envelope, ReplicaId};

/// Abstraction for message exchange between simulation replicas.
///
/// A transport connects all replicas of one "room". There is no
/// addressing: every send is a broadcast to the other members.
///
/// # Implementations
///
/// - **Production**: a WebSocket relay or peer data channel
/// - **Simulation**: an in-memory bus with configurable partitions/loss
///
/// # Delivery contract
///
/// Best-effort, fire-and-forget. Messages may be dropped, duplicated, or
/// reordered; there are no acknowledgements and no backpressure. The
/// engine's state blending is written to tolerate all of that, so the
/// transport never needs to retry.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Broadcasts an envelope to all other replicas in the room.
    ///
    /// # Returns
    /// * `Ok(())` - Message queued for delivery
    /// * `Err(EnvError::TransportError)` - Immediate send failure
    ///
    /// # Note
    /// Success does not guarantee delivery - messages may be lost in
    /// transit. Callers must not depend on the envelope arriving.
    async fn send(&self, envelope: Envelope) -> Result<(), EnvError>;

    /// Receives the next envelope addressed to this replica.
    ///
    /// # Returns
    /// * `Some(envelope)` - A message was received
    /// * `None` - The transport was shut down
    ///
    /// # Blocking
    /// This method blocks until a message arrives or the transport closes.
    /// Single-threaded drivers should drain pending messages between ticks
    /// via a non-blocking helper on the concrete transport instead.
    async fn recv(&self) -> Option<Envelope>;

    /// Returns this replica's ID.
    fn local_id(&self) -> ReplicaId;
}
