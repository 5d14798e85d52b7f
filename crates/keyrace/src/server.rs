//! `KeyraceServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → room. There is one
//! room per server; every connection that sends a join lands in it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use keyrace_protocol::JsonCodec;
use keyrace_room::{RandomSnippets, Room, RoomConfig, SnippetSource};
use keyrace_transport::{Handshake, Transport, TransportError, WebSocketTransport};

use crate::KeyraceError;
use crate::handler::handle_connection;
use crate::player::Player;

/// Default address the server binds to.
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// How long a connection may go without sending anything, pongs
/// included, before it is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// How often an otherwise quiet connection is pinged. Browsers answer
/// pings on their own, so a typist who is only watching stays connected.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// How long a new socket gets to complete its WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after an accept error that is not about a single peer, such as
/// running out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) room: Room<Player>,
    pub(crate) codec: JsonCodec,
    pub(crate) idle_timeout: Duration,
    pub(crate) keepalive_interval: Duration,
    pub(crate) handshake_timeout: Duration,
}

/// Builder for configuring and starting a Keyrace server.
///
/// # Example
///
/// ```rust,no_run
/// use keyrace::prelude::*;
///
/// # async fn start() -> Result<(), KeyraceError> {
/// let server = KeyraceServer::builder()
///     .bind("127.0.0.1:8080")
///     .snippets(SnippetDeck::new(["fn main() {}"])?)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct KeyraceServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    idle_timeout: Duration,
    keepalive_interval: Duration,
    handshake_timeout: Duration,
    snippets: Option<Box<dyn SnippetSource>>,
}

impl KeyraceServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            room_config: RoomConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            snippets: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets how long a connection may go without sending a frame.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets how often quiet connections are pinged.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Sets how long a new socket may take to upgrade to WebSocket.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets where round snippets come from. Defaults to
    /// [`RandomSnippets::builtin`].
    pub fn snippets(mut self, source: impl SnippetSource) -> Self {
        self.snippets = Some(Box::new(source));
        self
    }

    /// Binds the listener and creates the room.
    pub async fn build(self) -> Result<KeyraceServer, KeyraceError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let room = match self.snippets {
            Some(source) => Room::new(source, self.room_config),
            None => Room::new(RandomSnippets::builtin(), self.room_config),
        };

        let state = Arc::new(ServerState {
            room,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
            keepalive_interval: self.keepalive_interval,
            handshake_timeout: self.handshake_timeout,
        });

        Ok(KeyraceServer { transport, state })
    }
}

impl Default for KeyraceServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Keyrace server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct KeyraceServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl KeyraceServer {
    /// Creates a new builder.
    pub fn builder() -> KeyraceServerBuilder {
        KeyraceServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop, spawning a task per connection that
    /// completes the WebSocket upgrade and then handles the player.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), KeyraceError> {
        match self.local_addr() {
            Ok(addr) => tracing::info!(%addr, "keyrace server running"),
            Err(_) => tracing::info!("keyrace server running"),
        }

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer_addr = pending.peer_addr();
                        let conn = match pending.complete(state.handshake_timeout).await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%peer_addr, error = %e, "handshake failed");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    let delay = accept_backoff(&e);
                    tracing::error!(error = %e, ?delay, "accept failed");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// How long to wait before the next accept. Errors that only concern the
/// peer being accepted are retried at once; anything else (EMFILE,
/// ENOBUFS) would fail again immediately.
fn accept_backoff(err: &TransportError) -> Duration {
    use std::io::ErrorKind;

    match err {
        TransportError::Accept(e)
            if matches!(
                e.kind(),
                ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionRefused
            ) =>
        {
            Duration::ZERO
        }
        _ => ACCEPT_BACKOFF,
    }
}
