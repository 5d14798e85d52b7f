//! Network plumbing for Keyrace.
//!
//! The server only ever deals with two traits: a [`Transport`] that hands
//! out connections, and a [`Connection`] that moves opaque frames. The
//! room and the wire format never see a socket.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketTransport`] via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

use std::fmt;
use std::time::Duration;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

/// Process-unique connection number, handed out in accept order
/// starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Source of new connections.
pub trait Transport: Send + Sync + 'static {
    type Pending: Handshake<Connection = Self::Connection, Error = Self::Error>;
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer socket. No protocol I/O happens here, so a
    /// peer that stalls its handshake never holds up the next one.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;
}

/// A peer whose socket is open but whose protocol handshake has not run.
///
/// Complete it on the peer's own task, not on the accept loop.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Runs the handshake, giving up after `timeout`.
    async fn complete(self, timeout: Duration) -> Result<Self::Connection, Self::Error>;
}

/// A bidirectional frame pipe to one peer.
///
/// `send` and `recv` may run at the same time from different tasks.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next inbound frame, or `Ok(None)` once the peer has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_ids_order_by_accept() {
        assert!(ConnectionId::new(2) > ConnectionId::new(1));
        assert_eq!(ConnectionId::new(42).into_inner(), 42);
    }
}
