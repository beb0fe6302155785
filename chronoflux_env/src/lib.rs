//! ChronoFlux Environment Abstraction Layer
//!
//! This crate provides the "sans-IO" seam allowing the ChronoFlux engine
//! to run in both **Production** (tokio, real transports) and
//! **Simulation** (virtual clock, in-memory bus) environments.
//!
//! # Core Concept
//!
//! A replica is one independently running simulation instance. Replicas
//! loosely share state by exchanging opaque message envelopes over an
//! interchangeable [`Transport`]: same-process bus, WebSocket relay, or
//! peer channel. Delivery is best-effort with no ordering guarantee;
//! the engine tolerates message loss, and a disconnected transport
//! simply degrades the replica to local-only operation.
//!
//! Time and randomness flow through [`ChronoContext`] so that the whole
//! engine can be driven by a deterministic virtual clock in tests.
//!
//! # Example
//!
//! ```ignore
//! use chronoflux_env::{ChronoContext, Transport};
//!
//! async fn replica_loop<Ctx: ChronoContext, Net: Transport>(ctx: &Ctx, net: &Net) {
//!     loop {
//!         while let Some(envelope) = net.recv().await {
//!             handle(envelope);
//!         }
//!         ctx.sleep(Duration::from_millis(16)).await;
//!         tick();
//!     }
//! }
//! ```

mod context;
mod transport;
mod types;
mod error;
mod tokio_impl;

pub use context::ChronoContext;
pub use transport::Transport;
pub use types::{Envelope, ReplicaId};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
