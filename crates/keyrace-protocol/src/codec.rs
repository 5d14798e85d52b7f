//! Frame encoding.
//!
//! The rest of the workspace never calls `serde_json` directly; it goes
//! through a [`Codec`], so the wire format can change in one place.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Turns messages into frame payloads and back.
///
/// One instance is shared by the room and every connection task.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// [`ProtocolError::Encode`] if the format cannot represent `value`.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    /// [`ProtocolError::Decode`] for malformed or mistyped payloads.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// Compact JSON, the browser client's native format.
///
/// ## Example
///
/// ```rust
/// use keyrace_protocol::{Codec, JsonCodec, NewRound, RoundId, ServerMessage};
///
/// let codec = JsonCodec;
/// let msg = ServerMessage::NewRound(NewRound {
///     snippet: "fn main() {}".into(),
///     new_round_id: RoundId(2),
///     old_round_id: RoundId(1),
/// });
///
/// let bytes = codec.encode(&msg).unwrap();
/// let decoded: ServerMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientIntent, ClientMessage, OpponentProgress, PlayerId, RoundId, ServerMessage};

    #[test]
    fn test_encode_opponent_progress_is_compact_json() {
        let msg = ServerMessage::OpponentProgress(OpponentProgress {
            opponent_id: PlayerId(4),
            correct_chars: 9,
            round_id: RoundId(2),
        });
        let bytes = JsonCodec.encode(&msg).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"OpponentCorrectCharsMsg":{"OpponentID":4,"CorrectChars":9,"RoundId":2}}"#
        );
    }

    #[test]
    fn test_decode_browser_progress_frame() {
        let frame = br#"{"RoundId":3,"CorrectCharsMsg":{"CorrectChars":12}}"#;
        let msg: ClientMessage = JsonCodec.decode(frame).unwrap();
        assert_eq!(
            msg.into_intent().unwrap(),
            ClientIntent::Progress {
                round: Some(RoundId(3)),
                correct_chars: 12,
            }
        );
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let result: Result<ClientMessage, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
