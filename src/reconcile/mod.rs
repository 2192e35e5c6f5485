//! Reconciliation of fetched records against stored state.
//!
//! Decides insert/update/skip per record. Players are upserted when the
//! tracked stats changed or the stored record has gone stale; battles
//! are historical facts and are only ever inserted, never edited.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use thiserror::Error;
use tracing::debug;

use crate::api::{RawBattleRecord, RawPlayerRecord, RawTeamEntry};
use crate::models::{
    BattleRecord, BattleResult, PlayerBattleEntry, PlayerRecord, PlayerStats, TeamEntry,
};
use crate::registry::ClanIdentity;
use crate::storage::{ClanStore, StorageError};

/// Errors from reconciling one record.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Malformed record: missing {field}")]
    Malformed { field: &'static str },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),
}

impl ReconcileError {
    /// Malformed records never become valid; persistence failures defer
    /// to the storage classification.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Malformed { .. } => false,
            ReconcileError::Persistence(e) => e.is_retryable(),
        }
    }
}

/// How a player record was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerUpsertOutcome {
    /// First sight of this player id
    Inserted,
    /// Stats changed or the stored record was stale
    Updated,
    /// Verified in place, nothing written
    Unchanged,
}

/// How a battle record was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleInsertOutcome {
    Inserted,
    AlreadyRecorded,
}

/// Compares fetched records against the store and writes the deltas.
pub struct Reconciler {
    store: Arc<dyn ClanStore>,
    staleness: ChronoDuration,
}

impl Reconciler {
    /// `staleness` is the maximum age of a stored player record before
    /// it is re-upserted even without a stat change.
    pub fn new(store: Arc<dyn ClanStore>, staleness: Duration) -> Self {
        Self {
            store,
            staleness: ChronoDuration::from_std(staleness)
                .unwrap_or_else(|_| ChronoDuration::hours(24)),
        }
    }

    /// Reconcile one roster entry for `clan`.
    pub async fn reconcile_player(
        &self,
        raw: &RawPlayerRecord,
        clan: &ClanIdentity,
    ) -> Result<PlayerUpsertOutcome, ReconcileError> {
        let account_id = raw
            .account_id
            .ok_or(ReconcileError::Malformed { field: "account_id" })?;
        let username = raw
            .nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(ReconcileError::Malformed { field: "nickname" })?;
        let raw_stats = raw
            .stats
            .as_ref()
            .ok_or(ReconcileError::Malformed { field: "stats" })?;

        let stats = PlayerStats {
            battles: raw_stats.battles,
            wins: raw_stats.wins,
            losses: raw_stats.losses,
            damage_dealt: raw_stats.damage_dealt,
            rating: raw_stats.rating,
        };

        let player_id = account_id.to_string();
        match self.store.get_player(&player_id).await? {
            None => {
                let record = PlayerRecord::new(
                    player_id.clone(),
                    clan.clan_id.to_string(),
                    username.to_string(),
                    clan.tag.clone(),
                    stats,
                );
                self.store.upsert_player(&record).await?;
                debug!(player = %player_id, clan = %clan.tag, "inserted player");
                Ok(PlayerUpsertOutcome::Inserted)
            }
            Some(stored) => {
                let now = Utc::now();
                let stale = now - stored.last_updated > self.staleness;
                if stored.stats == stats && !stale {
                    return Ok(PlayerUpsertOutcome::Unchanged);
                }

                // last_updated strictly increases even if the clock
                // has not moved past the stored value.
                let mut last_updated = now;
                if last_updated <= stored.last_updated {
                    last_updated = stored.last_updated + ChronoDuration::milliseconds(1);
                }

                let record = PlayerRecord {
                    player_id: player_id.clone(),
                    clan_id: clan.clan_id.to_string(),
                    username: username.to_string(),
                    originating_user_id: stored.originating_user_id,
                    clan_tag: clan.tag.clone(),
                    last_updated,
                    stats,
                };
                self.store.upsert_player(&record).await?;
                debug!(player = %player_id, clan = %clan.tag, stale, "updated player");
                Ok(PlayerUpsertOutcome::Updated)
            }
        }
    }

    /// Reconcile one ladder battle.
    pub async fn reconcile_battle(
        &self,
        raw: &RawBattleRecord,
    ) -> Result<BattleInsertOutcome, ReconcileError> {
        let battle_id = raw.id.ok_or(ReconcileError::Malformed { field: "id" })?;
        let finished_at = raw
            .finished_at
            .ok_or(ReconcileError::Malformed { field: "finished_at" })?;

        if self.store.get_battle(battle_id).await?.is_some() {
            return Ok(BattleInsertOutcome::AlreadyRecorded);
        }

        let mut teams = Vec::with_capacity(raw.teams.len());
        for team in &raw.teams {
            teams.push(convert_team(team)?);
        }

        let record = BattleRecord {
            battle_id,
            cluster_id: raw.cluster_id.unwrap_or_default(),
            finished_at,
            realm: raw.realm.clone().unwrap_or_default(),
            season_number: raw.season_number.unwrap_or_default(),
            map_id: raw.map_id.unwrap_or_default(),
            arena_id: raw.arena_id.unwrap_or_default(),
            teams,
        };

        match self.store.insert_battle(&record).await {
            Ok(()) => {
                debug!(battle = battle_id, "inserted battle");
                Ok(BattleInsertOutcome::Inserted)
            }
            // A concurrent writer got there first; the battle is stored,
            // which is all this call promises.
            Err(StorageError::DuplicateKey(_)) => Ok(BattleInsertOutcome::AlreadyRecorded),
            Err(e) => Err(e.into()),
        }
    }
}

fn convert_team(raw: &RawTeamEntry) -> Result<TeamEntry, ReconcileError> {
    let mut players = Vec::with_capacity(raw.players.len());
    for entry in &raw.players {
        let external_player_id = entry
            .player_id
            .ok_or(ReconcileError::Malformed { field: "player_id" })?;
        players.push(PlayerBattleEntry {
            survived: entry.survived,
            external_player_id,
            display_name: entry.name.clone(),
            ship_id: entry.ship_id,
            ship_level: entry.ship_level,
            ship_name: entry.ship_name.clone(),
        });
    }

    Ok(TeamEntry {
        result: parse_result(raw.result.as_deref()),
        clan_id: raw.clan_id,
        team_number: raw.team_number,
        division_rating: raw.division_rating,
        players,
    })
}

fn parse_result(raw: Option<&str>) -> BattleResult {
    match raw {
        Some("win") | Some("victory") => BattleResult::Win,
        Some("loss") | Some("defeat") => BattleResult::Loss,
        Some("draw") => BattleResult::Draw,
        _ => BattleResult::Unknown,
    }
}
