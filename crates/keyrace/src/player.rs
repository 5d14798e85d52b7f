//! A typist connected over WebSocket.

use std::time::Duration;

use keyrace_protocol::PlayerId;
use keyrace_room::Participant;
use keyrace_transport::{Connection, TransportError, WebSocketConnection};

/// A room [`Participant`] backed by one WebSocket connection.
///
/// The player's id is the connection's id, so it is unique for the
/// lifetime of the process.
pub struct Player {
    id: PlayerId,
    conn: WebSocketConnection,
}

impl Player {
    /// Wraps an accepted connection.
    pub fn new(conn: WebSocketConnection) -> Self {
        Self {
            id: PlayerId(conn.id().into_inner()),
            conn,
        }
    }

    /// Receives the next inbound frame; `None` once the peer has closed.
    pub async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        self.conn.recv().await
    }

    /// Pings the browser to prompt a pong.
    pub async fn ping(&self) -> Result<(), TransportError> {
        self.conn.ping().await
    }

    /// Time since the browser last sent anything, pongs included.
    pub fn idle_for(&self) -> Duration {
        self.conn.idle_for()
    }

    /// Closes the underlying connection.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.conn.close().await
    }
}

impl Participant for Player {
    type Error = TransportError;

    fn id(&self) -> PlayerId {
        self.id
    }

    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        self.conn.send(frame).await
    }
}
