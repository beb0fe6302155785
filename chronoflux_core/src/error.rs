//! Error types for the ChronoFlux engine.

use thiserror::Error;

/// Errors that can occur inside the simulation engine.
///
/// There is no fatal path in the core: every error here is either
/// absorbed by the caller (a malformed inbound message is logged and
/// dropped) or surfaced to the operator. The tick loop itself cannot fail.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Wire message encode/decode failed (unparseable payload, unknown type)
    #[error("Malformed wire message: {0}")]
    Codec(#[from] serde_json::Error),
}
