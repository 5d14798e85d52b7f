//! The shared typing-race room for Keyrace.
//!
//! One [`Room`] holds the members, the current snippet, and the round
//! counter behind a single lock. Connection tasks call into it directly;
//! there is no room task or queue.
//!
//! # Key types
//!
//! - [`Room`]: join, leave, progress reports, fan-out
//! - [`Participant`]: how the room reaches a typist
//! - [`SnippetSource`]: where round texts come from
//!   ([`RandomSnippets`], [`SnippetDeck`])
//! - [`RoomConfig`]: send timeout and member cap

mod config;
mod error;
mod participant;
mod room;
mod snippet;

pub use config::RoomConfig;
pub use error::RoomError;
pub use participant::Participant;
pub use room::{ProgressOutcome, Room, RoomInfo, typed_len};
pub use snippet::{RandomSnippets, SnippetDeck, SnippetSource, parse_snippets};
