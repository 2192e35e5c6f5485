//! Persistence port.
//!
//! The sync pipeline reads and writes through the narrow [`ClanStore`]
//! contract; the backing engine is an implementation detail. Two
//! implementations ship here: an in-memory store and a JSON Lines
//! file store.

pub mod jsonl;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{BattleRecord, PlayerRecord};

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

/// Errors from the persistence port.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl StorageError {
    /// I/O hiccups are worth retrying; key and constraint violations
    /// never resolve on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Io(_))
    }
}

/// Narrow read/write contract over the storage backend.
///
/// `upsert_player` replaces the whole record and `insert_battle` writes
/// the whole battle or nothing, so writes to the same external id are
/// idempotent units rather than field-level mutations.
#[async_trait]
pub trait ClanStore: Send + Sync {
    /// Fetch a player by external id.
    async fn get_player(&self, player_id: &str) -> Result<Option<PlayerRecord>, StorageError>;

    /// Insert or replace a player record.
    async fn upsert_player(&self, record: &PlayerRecord) -> Result<(), StorageError>;

    /// Fetch a battle by external id.
    async fn get_battle(&self, battle_id: i64) -> Result<Option<BattleRecord>, StorageError>;

    /// Insert a battle; fails with [`StorageError::DuplicateKey`] if the
    /// id is already stored.
    async fn insert_battle(&self, record: &BattleRecord) -> Result<(), StorageError>;
}
