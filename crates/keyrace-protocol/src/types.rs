//! Message types for Keyrace's wire format.
//!
//! Field names are PascalCase on the wire because the browser client
//! reads and writes them that way (`"NewRoundId"`, `"CorrectChars"`).
//! The Rust side keeps snake_case names and maps them with
//! `#[serde(rename = "...")]`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable identifier for a typist in the room.
///
/// `#[serde(transparent)]` makes `PlayerId(42)` travel as plain `42`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Identifies one round (one snippet) in a room.
///
/// Rounds are numbered from [`RoundId::FIRST`] and only ever advance by
/// one. [`RoundId::NONE`] is never a real round: it is the "old round"
/// of the message a typist receives on join, meaning "this is your first
/// view of the room, not a transition".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoundId(pub u64);

impl RoundId {
    /// Placeholder old-round id sent on join.
    pub const NONE: RoundId = RoundId(0);

    /// The id of a freshly created room's first round.
    pub const FIRST: RoundId = RoundId(1);

    /// Returns the id of the round after this one.
    #[must_use]
    pub fn next(self) -> RoundId {
        RoundId(self.0 + 1)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ServerMessage: what the room pushes to typists
// ---------------------------------------------------------------------------

/// Announces the snippet of a round.
///
/// Sent to a single typist on join (`old_round_id == RoundId::NONE`) and
/// to everyone when a round is completed (`old_round_id` is the round
/// that just ended). Typists drop any progress they still have in flight
/// for `old_round_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRound {
    #[serde(rename = "Snippet")]
    pub snippet: String,
    #[serde(rename = "NewRoundId")]
    pub new_round_id: RoundId,
    #[serde(rename = "RoundId")]
    pub old_round_id: RoundId,
}

/// Another typist's cumulative progress in the current round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentProgress {
    #[serde(rename = "OpponentID")]
    pub opponent_id: PlayerId,
    #[serde(rename = "CorrectChars")]
    pub correct_chars: usize,
    #[serde(rename = "RoundId")]
    pub round_id: RoundId,
}

/// Every frame the server sends is exactly one of these.
///
/// Serde's default "externally tagged" enum representation puts the
/// variant name as the single key, so only the populated shape appears:
///
/// ```text
/// {"NewRoundMsg":{"Snippet":"...","NewRoundId":2,"RoundId":1}}
/// {"OpponentCorrectCharsMsg":{"OpponentID":7,"CorrectChars":3,"RoundId":2}}
/// ```
///
/// The schema holds only strings and integers, so encoding it cannot
/// fail with `serde_json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    #[serde(rename = "NewRoundMsg")]
    NewRound(NewRound),

    #[serde(rename = "OpponentCorrectCharsMsg")]
    OpponentProgress(OpponentProgress),
}

// ---------------------------------------------------------------------------
// ClientMessage: what typists send
// ---------------------------------------------------------------------------

/// Body of a join request. The game id is accepted but unused: there is
/// one room per server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGame {
    #[serde(rename = "GameId", default)]
    pub game_id: String,
}

/// Body of a progress report: how many characters of the snippet the
/// typist has typed correctly so far (cumulative, never a delta).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectChars {
    #[serde(rename = "CorrectChars")]
    pub correct_chars: usize,
}

/// A raw inbound frame, as the browser client shapes it.
///
/// The client sends an object with one populated body plus an optional
/// round tag, e.g. `{"RoundId":3,"CorrectCharsMsg":{"CorrectChars":12}}`.
/// Use [`ClientMessage::into_intent`] to get a checked [`ClientIntent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "RoundId", default, skip_serializing_if = "Option::is_none")]
    pub round_id: Option<RoundId>,

    #[serde(rename = "JoinGameMsg", default, skip_serializing_if = "Option::is_none")]
    pub join_game: Option<JoinGame>,

    #[serde(
        rename = "CorrectCharsMsg",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub correct_chars: Option<CorrectChars>,
}

/// What a typist asked for, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIntent {
    /// Enter the room and receive the current round.
    Join { game_id: String },

    /// Report cumulative progress. `round` is the round the client
    /// believes it is typing, when it said so.
    Progress {
        round: Option<RoundId>,
        correct_chars: usize,
    },
}

impl ClientMessage {
    /// Builds a join frame.
    pub fn join(game_id: impl Into<String>) -> Self {
        Self {
            join_game: Some(JoinGame {
                game_id: game_id.into(),
            }),
            ..Self::default()
        }
    }

    /// Builds a progress frame tagged with `round`.
    pub fn progress(round: RoundId, correct_chars: usize) -> Self {
        Self {
            round_id: Some(round),
            correct_chars: Some(CorrectChars { correct_chars }),
            ..Self::default()
        }
    }

    /// Converts the frame into exactly one intent.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` when the frame carries no
    /// body or more than one.
    pub fn into_intent(self) -> Result<ClientIntent, ProtocolError> {
        match (self.join_game, self.correct_chars) {
            (Some(join), None) => Ok(ClientIntent::Join {
                game_id: join.game_id,
            }),
            (None, Some(progress)) => Ok(ClientIntent::Progress {
                round: self.round_id,
                correct_chars: progress.correct_chars,
            }),
            (None, None) => Err(ProtocolError::InvalidMessage(
                "frame carries no message body".into(),
            )),
            (Some(_), Some(_)) => Err(ProtocolError::InvalidMessage(
                "frame carries more than one message body".into(),
            )),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
