//! # Keyrace
//!
//! Real-time multiplayer typing race server.
//!
//! Every connected typist shares one room: the same code snippet, the
//! same round counter. Progress reports are relayed to the other typists,
//! and the first to type the whole snippet starts the next round for
//! everyone.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keyrace::prelude::*;
//!
//! # async fn start() -> Result<(), KeyraceError> {
//! let server = KeyraceServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod player;
mod server;

pub use error::KeyraceError;
pub use player::Player;
pub use server::{
    DEFAULT_BIND, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_KEEPALIVE_INTERVAL, KeyraceServer, KeyraceServerBuilder,
};

/// Convenient re-exports for running a server and talking its protocol.
pub mod prelude {
    pub use crate::{KeyraceError, KeyraceServer, KeyraceServerBuilder, Player};
    pub use keyrace_protocol::{
        ClientMessage, Codec, CorrectChars, JoinGame, JsonCodec, NewRound,
        OpponentProgress, PlayerId, RoundId, ServerMessage,
    };
    pub use keyrace_room::{
        RandomSnippets, RoomConfig, RoomError, SnippetDeck, SnippetSource,
        parse_snippets,
    };
}
