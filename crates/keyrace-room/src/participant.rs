//! The `Participant` trait: how the room reaches a typist.
//!
//! The room never owns a network connection. It holds handles that know
//! their typist's identity and can accept one outbound frame at a time.
//! The server implements this over a WebSocket connection; tests
//! implement it over an in-memory channel.

use std::future::Future;

use keyrace_protocol::PlayerId;

/// A typist the room can deliver frames to.
///
/// `send` returns a `Send` future because the room awaits it from
/// whichever connection task triggered the broadcast.
///
/// # Contract
///
/// The room never calls `send` on the same participant concurrently:
/// every delivery happens under the room lock. Implementations don't
/// need their own per-participant ordering.
pub trait Participant: Send + Sync + 'static {
    /// Why a delivery failed.
    type Error: std::error::Error + Send + Sync;

    /// The typist's stable identity. Membership is keyed by it.
    fn id(&self) -> PlayerId;

    /// Delivers one encoded frame.
    fn send(
        &self,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
