//! Room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a room instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Upper bound on a single frame delivery. A typist whose send does
    /// not finish in time is treated as failed and evicted.
    ///
    /// Frames are delivered while the room lock is held, so this is also
    /// the longest one stalled peer can hold up everyone else per event.
    pub send_timeout: Duration,

    /// Maximum number of members. 0 means unlimited.
    pub max_members: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
            max_members: 0,
        }
    }
}

impl RoomConfig {
    /// Returns `true` if a room with `members` typists can take one more.
    pub fn has_room_for_one_more(&self, members: usize) -> bool {
        self.max_members == 0 || members < self.max_members
    }
}
