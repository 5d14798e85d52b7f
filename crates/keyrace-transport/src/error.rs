/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a TCP socket failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The WebSocket upgrade with a freshly accepted peer failed.
    #[cfg(feature = "websocket")]
    #[error("handshake with {peer_addr} failed: {source}")]
    Handshake {
        peer_addr: std::net::SocketAddr,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    /// The peer did not finish its handshake in time.
    #[error("handshake with {peer_addr} timed out after {timeout:?}")]
    HandshakeTimeout {
        peer_addr: std::net::SocketAddr,
        timeout: std::time::Duration,
    },

    /// Writing a frame to the peer failed.
    #[cfg(feature = "websocket")]
    #[error("send failed: {0}")]
    Send(#[source] tokio_tungstenite::tungstenite::Error),

    /// Reading a frame from the peer failed.
    #[cfg(feature = "websocket")]
    #[error("receive failed: {0}")]
    Receive(#[source] tokio_tungstenite::tungstenite::Error),
}

impl TransportError {
    /// Returns `true` if the error means the peer is gone rather than
    /// that something on our side broke.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::HandshakeTimeout { .. } => true,
            #[cfg(feature = "websocket")]
            Self::Send(e) | Self::Receive(e) => {
                use tokio_tungstenite::tungstenite::Error as WsError;
                matches!(
                    e,
                    WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Io(_)
                        | WsError::Protocol(_)
                )
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_names_the_address() {
        let err = TransportError::Bind {
            addr: "10.0.0.1:80".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().starts_with("cannot listen on 10.0.0.1:80"));
        assert!(!err.is_disconnect());
    }

    #[cfg(feature = "websocket")]
    #[test]
    fn test_closed_socket_is_a_disconnect() {
        let err = TransportError::Send(
            tokio_tungstenite::tungstenite::Error::AlreadyClosed,
        );
        assert!(err.is_disconnect());
    }
}
