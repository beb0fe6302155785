//! Error types for the ChronoFlux environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Transport send failed (channel closed, connection gone, etc.)
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The replica is not connected to any transport
    #[error("Transport detached: {0}")]
    Detached(String),

    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),
}

impl EnvError {
    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Creates a detached error.
    pub fn detached(msg: impl Into<String>) -> Self {
        Self::Detached(msg.into())
    }
}
