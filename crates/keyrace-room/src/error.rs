//! Error types for the room layer.

use keyrace_protocol::{PlayerId, ProtocolError, RoundId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The player is not a member of the room.
    #[error("player {0} is not in the room")]
    NotInRoom(PlayerId),

    /// The room already holds `max_members` typists.
    #[error("room is full ({0} members)")]
    RoomFull(usize),

    /// A progress report claimed more correct characters than the
    /// snippet has. Nothing is broadcast.
    #[error(
        "player {player} reported {correct_chars} correct chars but the snippet has {snippet_len}"
    )]
    ProgressOutOfRange {
        player: PlayerId,
        correct_chars: usize,
        snippet_len: usize,
    },

    /// A progress report was tagged with a round that is no longer
    /// current. Nothing is broadcast.
    #[error("player {player} reported progress for {reported}, current is {current}")]
    StaleRound {
        player: PlayerId,
        reported: RoundId,
        current: RoundId,
    },

    /// Delivering a frame to this player failed or timed out; the player
    /// has been evicted.
    #[error("delivery to player {0} failed")]
    SendFailed(PlayerId),

    /// A snippet source was built without any usable snippet.
    #[error("snippet source needs at least one non-empty snippet")]
    NoSnippets,

    /// Encoding an outbound message failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
