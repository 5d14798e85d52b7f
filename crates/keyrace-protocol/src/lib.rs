//! Wire protocol for Keyrace.
//!
//! This crate defines what typists and the server say to each other:
//!
//! - **Types** ([`ServerMessage`], [`ClientMessage`], [`PlayerId`],
//!   [`RoundId`]): the shapes that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those shapes are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections or rooms.
//!
//! ```text
//! Transport (frames) → Protocol (ClientIntent / ServerMessage) → Room
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientIntent, ClientMessage, CorrectChars, JoinGame, NewRound,
    OpponentProgress, PlayerId, RoundId, ServerMessage,
};
