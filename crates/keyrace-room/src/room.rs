//! The room: one shared snippet, one round counter, many typists.
//!
//! Unlike an actor, the room has no task of its own. Every connection
//! task calls straight into it, and a single `tokio::sync::Mutex` makes
//! each call one atomic step: read state, mutate it, encode the outbound
//! frame, deliver it, release.
//!
//! # Lock scope
//!
//! Delivery happens with the lock held. That is what gives every member
//! the same global order of round transitions and progress reports, and
//! it is what stops two racing completions from both advancing the
//! round. The cost is head-of-line blocking: one slow peer holds up every
//! other join and report until its send finishes or `send_timeout`
//! expires. Snapshotting members and sending after release would remove
//! the stall but lets frames of consecutive events interleave
//! differently for different members.
//!
//! The fan-out helpers live on `RoomInner`, which is only reachable
//! through the lock guard, so there is no way to broadcast without
//! holding the lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use keyrace_protocol::{
    Codec, JsonCodec, NewRound, OpponentProgress, PlayerId, RoundId,
    ServerMessage,
};
use tokio::sync::Mutex;

use crate::{Participant, RoomConfig, RoomError, SnippetSource};

/// What a progress report did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// The round goes on; the other members were told about the progress.
    Continued { round_id: RoundId },

    /// The report completed the round; every member got the next one.
    RoundCompleted { old_round_id: RoundId, new_round_id: RoundId },
}

/// A snapshot of room state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    /// The current round.
    pub round_id: RoundId,
    /// The current round's snippet.
    pub snippet: String,
    /// Number of members.
    pub member_count: usize,
}

/// Everything guarded by the room lock.
struct RoomInner<P: Participant> {
    members: HashMap<PlayerId, Arc<P>>,
    snippet: String,
    round_id: RoundId,
}

/// A typing-race room shared by all connection tasks.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Room<P: Participant, C: Codec = JsonCodec> {
    inner: Mutex<RoomInner<P>>,
    snippets: Box<dyn SnippetSource>,
    codec: C,
    config: RoomConfig,
}

impl<P: Participant> Room<P> {
    /// Creates a room that speaks JSON, drawing its first snippet from
    /// `snippets`. The first round is [`RoundId::FIRST`].
    pub fn new(snippets: impl SnippetSource, config: RoomConfig) -> Self {
        Self::with_codec(snippets, JsonCodec, config)
    }
}

impl<P: Participant, C: Codec> Room<P, C> {
    /// Creates a room that encodes outbound messages with `codec`.
    pub fn with_codec(
        snippets: impl SnippetSource,
        codec: C,
        config: RoomConfig,
    ) -> Self {
        let snippets: Box<dyn SnippetSource> = Box::new(snippets);
        let snippet = draw(snippets.as_ref());
        tracing::info!(
            round_id = %RoundId::FIRST,
            snippet_len = typed_len(&snippet),
            "room created"
        );
        Self {
            inner: Mutex::new(RoomInner {
                members: HashMap::new(),
                snippet,
                round_id: RoundId::FIRST,
            }),
            snippets,
            codec,
            config,
        }
    }

    /// Adds a typist and sends them the current round.
    ///
    /// The joiner receives `NewRound { snippet, new_round_id: current,
    /// old_round_id: RoundId::NONE }`, read under the same lock as the
    /// insertion, so the pair is always consistent. Joining again with
    /// the same id replaces the handle and resends the round.
    ///
    /// Returns the round the typist joined into.
    ///
    /// # Errors
    /// - [`RoomError::RoomFull`] if `max_members` is reached.
    /// - [`RoomError::SendFailed`] if the welcome frame could not be
    ///   delivered; the typist is not left in the room.
    pub async fn join(&self, participant: Arc<P>) -> Result<RoundId, RoomError> {
        let player_id = participant.id();
        let mut inner = self.inner.lock().await;

        if !inner.members.contains_key(&player_id)
            && !self.config.has_room_for_one_more(inner.members.len())
        {
            return Err(RoomError::RoomFull(inner.members.len()));
        }

        inner.members.insert(player_id, Arc::clone(&participant));
        tracing::info!(
            %player_id,
            members = inner.members.len(),
            "player joined"
        );

        let frame = self.codec.encode(&ServerMessage::NewRound(NewRound {
            snippet: inner.snippet.clone(),
            new_round_id: inner.round_id,
            old_round_id: RoundId::NONE,
        }))?;

        if !deliver(&*participant, &frame, self.config.send_timeout)
            .await
        {
            inner.evict(&[player_id]);
            return Err(RoomError::SendFailed(player_id));
        }
        tracing::debug!(%player_id, bytes = frame.len(), "sent current round");

        Ok(inner.round_id)
    }

    /// Removes a typist. Nobody is notified.
    ///
    /// # Errors
    /// Returns [`RoomError::NotInRoom`] if the typist is not a member.
    pub async fn leave(&self, player_id: PlayerId) -> Result<(), RoomError> {
        let mut inner = self.inner.lock().await;
        if inner.members.remove(&player_id).is_none() {
            return Err(RoomError::NotInRoom(player_id));
        }
        tracing::info!(%player_id, members = inner.members.len(), "player left");
        Ok(())
    }

    /// Handles a cumulative progress report.
    ///
    /// If `correct_chars` equals the snippet's [`typed_len`] the
    /// round is complete: a fresh snippet is drawn, the round id goes up
    /// by one, and every member, the reporter included, receives
    /// `NewRound { new snippet, new id, old id }`. Otherwise every member
    /// except the reporter receives `OpponentProgress` tagged with the
    /// current round.
    ///
    /// When two completing reports race, the first to take the lock ends
    /// the round; the second is measured against the new snippet.
    ///
    /// # Errors
    /// - [`RoomError::NotInRoom`] for reports from non-members.
    /// - [`RoomError::ProgressOutOfRange`] if `correct_chars` exceeds the
    ///   snippet length.
    pub async fn report_progress(
        &self,
        player_id: PlayerId,
        correct_chars: usize,
    ) -> Result<ProgressOutcome, RoomError> {
        let mut inner = self.inner.lock().await;
        self.apply_progress(&mut inner, player_id, correct_chars).await
    }

    /// Like [`report_progress`](Self::report_progress), but first drops
    /// the report if it was made for a round other than the current one.
    ///
    /// A completion that arrives tagged with an already-finished round
    /// is rejected here instead of being measured against the new
    /// snippet.
    ///
    /// # Errors
    /// [`RoomError::StaleRound`] in addition to the errors of
    /// `report_progress`.
    pub async fn report_progress_in_round(
        &self,
        player_id: PlayerId,
        round_id: RoundId,
        correct_chars: usize,
    ) -> Result<ProgressOutcome, RoomError> {
        let mut inner = self.inner.lock().await;
        if round_id != inner.round_id {
            return Err(RoomError::StaleRound {
                player: player_id,
                reported: round_id,
                current: inner.round_id,
            });
        }
        self.apply_progress(&mut inner, player_id, correct_chars).await
    }

    /// Returns a snapshot of the room.
    pub async fn info(&self) -> RoomInfo {
        let inner = self.inner.lock().await;
        RoomInfo {
            round_id: inner.round_id,
            snippet: inner.snippet.clone(),
            member_count: inner.members.len(),
        }
    }

    /// Returns `true` if the typist is a member.
    pub async fn contains(&self, player_id: PlayerId) -> bool {
        self.inner.lock().await.members.contains_key(&player_id)
    }

    /// Progress handling shared by both report paths. Runs under the
    /// caller's guard.
    async fn apply_progress(
        &self,
        inner: &mut RoomInner<P>,
        player_id: PlayerId,
        correct_chars: usize,
    ) -> Result<ProgressOutcome, RoomError> {
        if !inner.members.contains_key(&player_id) {
            tracing::warn!(%player_id, "progress from non-member, ignoring");
            return Err(RoomError::NotInRoom(player_id));
        }

        let snippet_len = typed_len(&inner.snippet);
        if correct_chars > snippet_len {
            return Err(RoomError::ProgressOutOfRange {
                player: player_id,
                correct_chars,
                snippet_len,
            });
        }

        if correct_chars < snippet_len {
            let round_id = inner.round_id;
            let frame = self.codec.encode(&ServerMessage::OpponentProgress(
                OpponentProgress {
                    opponent_id: player_id,
                    correct_chars,
                    round_id,
                },
            ))?;
            let sent = inner
                .send_to_all_except(player_id, &frame, self.config.send_timeout)
                .await;
            tracing::debug!(%player_id, correct_chars, %round_id, sent, "progress");
            return Ok(ProgressOutcome::Continued { round_id });
        }

        let old_round_id = inner.round_id;
        inner.snippet = draw(self.snippets.as_ref());
        inner.round_id = old_round_id.next();
        let new_round_id = inner.round_id;

        let frame = self.codec.encode(&ServerMessage::NewRound(NewRound {
            snippet: inner.snippet.clone(),
            new_round_id,
            old_round_id,
        }))?;
        let sent = inner.send_to_all(&frame, self.config.send_timeout).await;
        tracing::info!(
            winner = %player_id,
            %old_round_id,
            %new_round_id,
            sent,
            "round completed"
        );

        Ok(ProgressOutcome::RoundCompleted {
            old_round_id,
            new_round_id,
        })
    }
}

impl<P: Participant> RoomInner<P> {
    /// Delivers `frame` to every member. Returns how many got it.
    async fn send_to_all(&mut self, frame: &[u8], timeout: Duration) -> usize {
        self.fan_out(None, frame, timeout).await
    }

    /// Delivers `frame` to every member except `excluded`.
    async fn send_to_all_except(
        &mut self,
        excluded: PlayerId,
        frame: &[u8],
        timeout: Duration,
    ) -> usize {
        self.fan_out(Some(excluded), frame, timeout).await
    }

    /// Sends to all recipients concurrently, then evicts every member
    /// whose delivery failed. Each member still gets at most one send at
    /// a time because the caller holds the room lock.
    async fn fan_out(
        &mut self,
        excluded: Option<PlayerId>,
        frame: &[u8],
        timeout: Duration,
    ) -> usize {
        let recipients: Vec<&P> = self
            .members
            .iter()
            .filter(|(id, _)| Some(**id) != excluded)
            .map(|(_, p)| &**p)
            .collect();

        let results =
            join_all(recipients.iter().map(|p| deliver(*p, frame, timeout)))
                .await;

        let failed: Vec<PlayerId> = recipients
            .iter()
            .zip(&results)
            .filter(|(_, ok)| !**ok)
            .map(|(p, _)| p.id())
            .collect();
        let delivered = results.len() - failed.len();

        self.evict(&failed);
        delivered
    }

    fn evict(&mut self, players: &[PlayerId]) {
        for player_id in players {
            if self.members.remove(player_id).is_some() {
                tracing::warn!(
                    %player_id,
                    members = self.members.len(),
                    "evicted player after failed delivery"
                );
            }
        }
    }
}

/// Sends one frame, bounded by `timeout`. Returns `false` on failure;
/// the caller decides what to do with the participant.
async fn deliver<P: Participant>(
    participant: &P,
    frame: &[u8],
    timeout: Duration,
) -> bool {
    let player_id = participant.id();
    match tokio::time::timeout(timeout, participant.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(%player_id, error = %e, "send failed");
            false
        }
        Err(_) => {
            tracing::warn!(%player_id, ?timeout, "send timed out");
            false
        }
    }
}

/// Length of a snippet as typing progress counts it: UTF-16 code units,
/// the unit of a browser's `String.length` and string indexing.
///
/// Characters outside the Basic Multilingual Plane (most emoji) count
/// twice.
pub fn typed_len(snippet: &str) -> usize {
    snippet.encode_utf16().count()
}

/// Draws the next snippet. An empty one breaks the completion rule, so
/// it is logged loudly.
fn draw(snippets: &dyn SnippetSource) -> String {
    let snippet = snippets.next_snippet();
    if snippet.is_empty() {
        tracing::error!("snippet source returned an empty snippet");
    }
    snippet
}
