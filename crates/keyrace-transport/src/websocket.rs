//! WebSocket transport over `tokio-tungstenite`.
//!
//! Accepting and upgrading are separate steps: `accept` only takes the
//! TCP socket, and the upgrade runs on the peer's own task under a
//! timeout.
//!
//! Each upgraded socket is split into a write half and a read half, each
//! behind its own lock. The room writes to a typist from other typists'
//! tasks while that typist's own task sits in `recv`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, ConnectionId, Handshake, Transport, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Listens for typists connecting over WebSocket.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds the listener. Use port 0 to let the OS pick one.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener =
            TcpListener::bind(addr)
                .await
                .map_err(|source| TransportError::Bind {
                    addr: addr.to_string(),
                    source,
                })?;
        tracing::info!(addr, "listening for websocket connections");
        Ok(Self { listener })
    }

    /// The address actually bound, useful after binding port 0.
    ///
    /// ```rust
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), keyrace_transport::TransportError> {
    /// use keyrace_transport::WebSocketTransport;
    ///
    /// let transport = WebSocketTransport::bind("127.0.0.1:0").await?;
    /// let addr = transport.local_addr().expect("bound socket has an address");
    /// assert_ne!(addr.port(), 0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Pending = PendingWebSocket;
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Accepts one TCP socket. The WebSocket upgrade is left to
    /// [`PendingWebSocket::complete`].
    async fn accept(&mut self) -> Result<PendingWebSocket, TransportError> {
        let (socket, peer_addr) =
            self.listener.accept().await.map_err(TransportError::Accept)?;

        // Keystroke updates are tiny; don't let Nagle batch them.
        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!(%peer_addr, error = %e, "could not set TCP_NODELAY");
        }

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(%id, %peer_addr, "tcp accepted");
        Ok(PendingWebSocket {
            id,
            peer_addr,
            socket,
        })
    }
}

/// A TCP socket that has not sent its WebSocket upgrade request yet.
pub struct PendingWebSocket {
    id: ConnectionId,
    peer_addr: SocketAddr,
    socket: TcpStream,
}

impl PendingWebSocket {
    /// The remote peer's socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Handshake for PendingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn complete(self, timeout: Duration) -> Result<WebSocketConnection, TransportError> {
        let Self {
            id,
            peer_addr,
            socket,
        } = self;

        let ws = tokio::time::timeout(timeout, tokio_tungstenite::accept_async(socket))
            .await
            .map_err(|_| TransportError::HandshakeTimeout { peer_addr, timeout })?
            .map_err(|source| TransportError::Handshake { peer_addr, source })?;
        tracing::debug!(%id, %peer_addr, "websocket upgraded");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            peer_addr,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            opened: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
        })
    }
}

/// One typist's WebSocket.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    opened: Instant,
    /// Milliseconds after `opened` at which the last frame of any kind,
    /// pongs included, arrived.
    last_seen_ms: AtomicU64,
}

impl WebSocketConnection {
    /// The remote peer's socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Time since the peer last sent anything, control frames included.
    ///
    /// Only frames read through [`recv`](Connection::recv) count, so this
    /// is meaningful while some task keeps receiving.
    pub fn idle_for(&self) -> Duration {
        let last_seen = Duration::from_millis(self.last_seen_ms.load(Ordering::Relaxed));
        self.opened.elapsed().saturating_sub(last_seen)
    }

    /// Sends a ping. Browsers answer with a pong on their own, which
    /// resets [`idle_for`](Self::idle_for) without any client code.
    pub async fn ping(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Ping(Default::default()))
            .await
            .map_err(TransportError::Send)
    }

    fn mark_seen(&self) {
        let elapsed = u64::try_from(self.opened.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_seen_ms.store(elapsed, Ordering::Relaxed);
    }
}

/// Wraps an outbound payload. Browsers hand text frames to `onmessage`
/// as strings, which is what the JSON client expects.
fn outbound(data: &[u8]) -> Message {
    match std::str::from_utf8(data) {
        Ok(text) => Message::text(text),
        Err(_) => Message::binary(data.to_vec()),
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.send(outbound(data)).await.map_err(TransportError::Send)
    }

    /// Returns the payload of the next text or binary frame. Control
    /// frames are answered by tungstenite and skipped here.
    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut stream = self.stream.lock().await;
        while let Some(frame) = stream.next().await {
            let frame = frame.map_err(TransportError::Receive)?;
            self.mark_seen();
            match frame {
                Message::Text(text) => return Ok(Some(text.as_bytes().to_vec())),
                Message::Binary(data) => return Ok(Some(data.to_vec())),
                Message::Close(reason) => {
                    tracing::trace!(id = %self.id, ?reason, "peer sent close");
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    /// Sends a close frame. Closing an already closed socket is not an
    /// error.
    async fn close(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        match sink.close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Send(e)),
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
