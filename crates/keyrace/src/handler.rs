//! Per-connection handler: decode frames and call into the room.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Wait for frames, pinging every `keepalive_interval` and closing
//!      the connection once nothing, not even a pong, arrived for
//!      `idle_timeout`
//!   2. `JoinGameMsg` → join the room (receive the current round)
//!   3. `CorrectCharsMsg` → report progress, round-tagged when the client
//!      says which round it is typing
//!   4. On exit, leave the room

use std::sync::Arc;
use std::time::Duration;

use keyrace_protocol::{ClientIntent, ClientMessage, Codec, PlayerId};
use keyrace_room::{Participant, RoomError};
use keyrace_transport::WebSocketConnection;
use tokio::time::{Instant, MissedTickBehavior};

use crate::KeyraceError;
use crate::player::Player;
use crate::server::ServerState;

/// Drop guard that removes the player from the room when the handler
/// exits, including by panic. `Drop` is synchronous, so the async leave
/// runs in a fire-and-forget task.
struct LeaveGuard {
    player_id: PlayerId,
    state: Arc<ServerState>,
}

impl Drop for LeaveGuard {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            // NotInRoom just means the player never joined or was evicted.
            if state.room.leave(player_id).await.is_ok() {
                tracing::debug!(%player_id, "removed from room on disconnect");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), KeyraceError> {
    let peer_addr = conn.peer_addr();
    let player = Arc::new(Player::new(conn));
    let player_id = player.id();
    tracing::info!(%player_id, %peer_addr, "player connected");

    let _guard = LeaveGuard {
        player_id,
        state: Arc::clone(&state),
    };

    let period = state
        .keepalive_interval
        .min(state.idle_timeout)
        .max(Duration::from_millis(1));
    let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let received = tokio::select! {
            received = player.recv() => received,
            _ = keepalive.tick() => {
                let idle = player.idle_for();
                if idle >= state.idle_timeout {
                    tracing::info!(%player_id, ?idle, "connection idle, closing");
                    break;
                }
                if let Err(e) = player.ping().await {
                    tracing::debug!(%player_id, error = %e, "keepalive ping failed");
                    break;
                }
                continue;
            }
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Err(e) if e.is_disconnect() => {
                tracing::debug!(%player_id, error = %e, "peer went away");
                break;
            }
            Err(e) => {
                tracing::warn!(%player_id, error = %e, "recv failed");
                break;
            }
        };

        let intent = match state
            .codec
            .decode::<ClientMessage>(&data)
            .and_then(ClientMessage::into_intent)
        {
            Ok(intent) => intent,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "skipping undecodable frame");
                continue;
            }
        };

        if !dispatch(&state, &player, intent).await? {
            break;
        }
    }

    if let Err(e) = player.close().await {
        tracing::debug!(%player_id, error = %e, "close failed");
    }
    // _guard drops here → leave fires.
    Ok(())
}

/// Applies one intent to the room. Returns `false` if the connection
/// should close.
async fn dispatch(
    state: &ServerState,
    player: &Arc<Player>,
    intent: ClientIntent,
) -> Result<bool, KeyraceError> {
    let player_id = player.id();

    let result = match intent {
        ClientIntent::Join { game_id } => {
            tracing::debug!(%player_id, %game_id, "join requested");
            state.room.join(Arc::clone(player)).await.map(|_| ())
        }
        ClientIntent::Progress {
            round: Some(round_id),
            correct_chars,
        } => state
            .room
            .report_progress_in_round(player_id, round_id, correct_chars)
            .await
            .map(|_| ()),
        ClientIntent::Progress {
            round: None,
            correct_chars,
        } => state
            .room
            .report_progress(player_id, correct_chars)
            .await
            .map(|_| ()),
    };

    match result {
        Ok(()) => Ok(true),
        // Reports that race a round transition are expected traffic.
        Err(e @ RoomError::StaleRound { .. }) => {
            tracing::debug!(%player_id, error = %e, "dropped stale progress");
            Ok(true)
        }
        Err(
            e @ (RoomError::ProgressOutOfRange { .. } | RoomError::NotInRoom(_)),
        ) => {
            tracing::warn!(%player_id, error = %e, "rejected progress report");
            Ok(true)
        }
        Err(e @ (RoomError::RoomFull(_) | RoomError::SendFailed(_))) => {
            tracing::info!(%player_id, error = %e, "dropping connection");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
