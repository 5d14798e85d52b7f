//! Unified error type for the Keyrace server.

use keyrace_protocol::ProtocolError;
use keyrace_room::RoomError;
use keyrace_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum KeyraceError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (full, not a member, bad progress).
    #[error(transparent)]
    Room(#[from] RoomError),
}
