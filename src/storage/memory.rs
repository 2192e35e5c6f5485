//! In-memory store.
//!
//! Backs tests and dry runs; no durability.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ClanStore, StorageError};
use crate::models::{BattleRecord, PlayerRecord};

/// Map-backed [`ClanStore`].
#[derive(Default)]
pub struct MemoryStore {
    players: RwLock<HashMap<String, PlayerRecord>>,
    battles: RwLock<HashMap<i64, BattleRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored players.
    pub async fn player_count(&self) -> usize {
        self.players.read().await.len()
    }

    /// Number of stored battles.
    pub async fn battle_count(&self) -> usize {
        self.battles.read().await.len()
    }
}

#[async_trait]
impl ClanStore for MemoryStore {
    async fn get_player(&self, player_id: &str) -> Result<Option<PlayerRecord>, StorageError> {
        Ok(self.players.read().await.get(player_id).cloned())
    }

    async fn upsert_player(&self, record: &PlayerRecord) -> Result<(), StorageError> {
        self.players
            .write()
            .await
            .insert(record.player_id.clone(), record.clone());
        Ok(())
    }

    async fn get_battle(&self, battle_id: i64) -> Result<Option<BattleRecord>, StorageError> {
        Ok(self.battles.read().await.get(&battle_id).cloned())
    }

    async fn insert_battle(&self, record: &BattleRecord) -> Result<(), StorageError> {
        let mut battles = self.battles.write().await;
        if battles.contains_key(&record.battle_id) {
            return Err(StorageError::DuplicateKey(record.battle_id.to_string()));
        }
        battles.insert(record.battle_id, record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlayerStats, TeamEntry};
    use chrono::Utc;

    fn player(id: &str) -> PlayerRecord {
        PlayerRecord::new(
            id.to_string(),
            "776".to_string(),
            "sea_wolf".to_string(),
            "PN31".to_string(),
            PlayerStats::default(),
        )
    }

    fn battle(id: i64) -> BattleRecord {
        BattleRecord {
            battle_id: id,
            cluster_id: 3,
            finished_at: Utc::now(),
            realm: "eu".to_string(),
            season_number: 21,
            map_id: 40,
            arena_id: 994,
            teams: vec![TeamEntry {
                result: crate::models::BattleResult::Win,
                clan_id: Some(776),
                team_number: Some(1),
                division_rating: None,
                players: vec![],
            }],
        }
    }

    #[tokio::test]
    async fn test_player_upsert_and_get() {
        let store = MemoryStore::new();

        assert!(store.get_player("1").await.unwrap().is_none());

        store.upsert_player(&player("1")).await.unwrap();
        let stored = store.get_player("1").await.unwrap().unwrap();
        assert_eq!(stored.username, "sea_wolf");

        // Upsert replaces in place
        let mut updated = player("1");
        updated.username = "sea_wolf_2".to_string();
        store.upsert_player(&updated).await.unwrap();

        assert_eq!(store.player_count().await, 1);
        let stored = store.get_player("1").await.unwrap().unwrap();
        assert_eq!(stored.username, "sea_wolf_2");
    }

    #[tokio::test]
    async fn test_battle_insert_rejects_duplicate() {
        let store = MemoryStore::new();

        store.insert_battle(&battle(880231)).await.unwrap();
        let result = store.insert_battle(&battle(880231)).await;

        assert!(matches!(result, Err(StorageError::DuplicateKey(_))));
        assert_eq!(store.battle_count().await, 1);
    }

    #[tokio::test]
    async fn test_battle_round_trip_keeps_teams() {
        let store = MemoryStore::new();
        store.insert_battle(&battle(880231)).await.unwrap();

        let stored = store.get_battle(880231).await.unwrap().unwrap();
        assert_eq!(stored.teams.len(), 1);
        assert_eq!(stored.teams[0].clan_id, Some(776));
    }
}
