//! Error types for the protocol layer.
//!
//! Each Keyrace crate defines its own error enum, so a `ProtocolError`
//! always means a problem turning messages into bytes or back, never a
//! networking or room problem.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("cannot encode frame: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, wrong field types,
    /// negative counts, truncated frames.
    #[cfg(feature = "json")]
    #[error("malformed frame: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but does not describe exactly one intent.
    #[error("unusable client message: {0}")]
    InvalidMessage(String),
}
