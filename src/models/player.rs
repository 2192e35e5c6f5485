//! Player roster model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The numeric stat block tracked per player.
///
/// Two blocks are materially different iff they compare unequal; the
/// reconciler uses that comparison to decide whether a stored player
/// needs a fresh write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Total battles fought
    pub battles: u32,

    /// Battles won
    pub wins: u32,

    /// Battles lost
    pub losses: u32,

    /// Cumulative damage dealt
    pub damage_dealt: u64,

    /// Current ladder rating
    pub rating: u32,
}

/// A clan member as persisted locally.
///
/// Created on first sight of a player id and updated in place on every
/// later fetch. Records are never deleted by the sync pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// External-service player identity (primary key)
    pub player_id: String,

    /// External-service clan identity the player belongs to
    pub clan_id: String,

    /// In-game username
    pub username: String,

    /// Chat-platform user id that first registered this player
    pub originating_user_id: String,

    /// Tag of the clan at the time of the last sync
    pub clan_tag: String,

    /// When this record was last written; strictly increases
    pub last_updated: DateTime<Utc>,

    /// Tracked stat block
    pub stats: PlayerStats,
}

impl PlayerRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        player_id: String,
        clan_id: String,
        username: String,
        clan_tag: String,
        stats: PlayerStats,
    ) -> Self {
        Self {
            player_id,
            clan_id,
            username,
            originating_user_id: String::new(),
            clan_tag,
            last_updated: Utc::now(),
            stats,
        }
    }

    /// Builder method to set the originating chat user.
    pub fn with_originating_user(mut self, user_id: impl Into<String>) -> Self {
        self.originating_user_id = user_id.into();
        self
    }
}
