//! JSON Lines store.
//!
//! Append-only files, one JSON object per line: `players.jsonl` holds
//! every player write with last-wins semantics on load, `battles.jsonl`
//! holds one line per battle. A battle is exactly one line, so a torn
//! write fails to parse and is skipped on load; no partial battle is
//! ever observable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use async_trait::async_trait;

use super::{ClanStore, StorageError};
use crate::models::{BattleRecord, PlayerRecord};

const PLAYERS_FILE: &str = "players.jsonl";
const BATTLES_FILE: &str = "battles.jsonl";

/// File-backed [`ClanStore`] with an in-memory index.
pub struct JsonlStore {
    players_path: PathBuf,
    battles_path: PathBuf,
    players: RwLock<HashMap<String, PlayerRecord>>,
    battles: RwLock<HashMap<i64, BattleRecord>>,
}

impl JsonlStore {
    /// Open the store under `data_dir`, loading existing files.
    pub async fn open(data_dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(data_dir).await?;

        let players_path = data_dir.join(PLAYERS_FILE);
        let battles_path = data_dir.join(BATTLES_FILE);

        let mut players = HashMap::new();
        for record in load_lines::<PlayerRecord>(&players_path).await? {
            players.insert(record.player_id.clone(), record);
        }

        let mut battles = HashMap::new();
        for record in load_lines::<BattleRecord>(&battles_path).await? {
            battles.insert(record.battle_id, record);
        }

        info!(
            players = players.len(),
            battles = battles.len(),
            "opened store at {:?}",
            data_dir
        );

        Ok(Self {
            players_path,
            battles_path,
            players: RwLock::new(players),
            battles: RwLock::new(battles),
        })
    }

    /// Rewrite both files from the in-memory index, dropping superseded
    /// player lines.
    pub async fn compact(&self) -> Result<(), StorageError> {
        let players = self.players.read().await;
        let mut lines = String::new();
        for record in players.values() {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }
        fs::write(&self.players_path, lines).await?;

        let battles = self.battles.read().await;
        let mut lines = String::new();
        for record in battles.values() {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }
        fs::write(&self.battles_path, lines).await?;

        info!(
            players = players.len(),
            battles = battles.len(),
            "compacted store"
        );
        Ok(())
    }

    async fn append_line(path: &Path, json: &str) -> Result<(), StorageError> {
        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

async fn load_lines<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Vec<T>, StorageError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = fs::read_to_string(path).await?;
    let mut records = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("skipping unparseable line {} in {:?}: {}", number + 1, path, e);
            }
        }
    }
    debug!("loaded {} records from {:?}", records.len(), path);
    Ok(records)
}

#[async_trait]
impl ClanStore for JsonlStore {
    async fn get_player(&self, player_id: &str) -> Result<Option<PlayerRecord>, StorageError> {
        Ok(self.players.read().await.get(player_id).cloned())
    }

    async fn upsert_player(&self, record: &PlayerRecord) -> Result<(), StorageError> {
        // The write lock is held across the file append so writes to the
        // same player id are serialized.
        let mut players = self.players.write().await;
        let json = serde_json::to_string(record)?;
        Self::append_line(&self.players_path, &json).await?;
        players.insert(record.player_id.clone(), record.clone());
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
        let json = serde_json::to_string(record)?;
        Self::append_line(&self.battles_path, &json).await?;
        battles.insert(record.battle_id, record.clone());
        Ok(())
    }
}
