//! Battle ladder history model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one team's participation in a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BattleResult {
    Win,
    Loss,
    Draw,
    #[default]
    Unknown,
}

/// One player's entry within a team roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerBattleEntry {
    /// Whether the player survived the battle
    pub survived: bool,

    /// External-service player identity
    pub external_player_id: i64,

    /// Display name at battle time
    pub display_name: String,

    /// Ship fielded
    pub ship_id: i64,

    /// Tier of the ship
    pub ship_level: u32,

    /// Human-readable ship name
    pub ship_name: String,
}

/// One team within a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamEntry {
    /// Outcome for this team
    pub result: BattleResult,

    /// Clan that fielded the team, if known
    pub clan_id: Option<i64>,

    /// Team slot number within the battle
    pub team_number: Option<u32>,

    /// Division rating at battle time
    pub division_rating: Option<u32>,

    /// Roster in the order reported by the service
    pub players: Vec<PlayerBattleEntry>,
}

/// A finished ladder battle.
///
/// Immutable once stored: a battle that finished is a historical fact,
/// so reconciliation only ever inserts new battle ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleRecord {
    /// External-service battle identity (primary key)
    pub battle_id: i64,

    /// Server cluster the battle ran on
    pub cluster_id: i64,

    /// When the battle finished
    pub finished_at: DateTime<Utc>,

    /// Realm the battle was played on (e.g. "eu")
    pub realm: String,

    /// Ladder season
    pub season_number: u32,

    /// Map played
    pub map_id: i64,

    /// Arena instance
    pub arena_id: i64,

    /// Both teams, in the order reported by the service
    pub teams: Vec<TeamEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battle() -> BattleRecord {
        BattleRecord {
            battle_id: 880_231,
            cluster_id: 3,
            finished_at: Utc::now(),
            realm: "eu".to_string(),
            season_number: 21,
            map_id: 40,
            arena_id: 994,
            teams: vec![
                TeamEntry {
                    result: BattleResult::Win,
                    clan_id: Some(776),
                    team_number: Some(1),
                    division_rating: Some(1510),
                    players: vec![PlayerBattleEntry {
                        survived: true,
                        external_player_id: 5_031_882,
                        display_name: "sea_wolf".to_string(),
                        ship_id: 4_288_624_592,
                        ship_level: 10,
                        ship_name: "Des Moines".to_string(),
                    }],
                },
                TeamEntry {
                    result: BattleResult::Loss,
                    clan_id: Some(801),
                    team_number: Some(2),
                    division_rating: Some(1495),
                    players: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_battle_result_default_unknown() {
        assert_eq!(BattleResult::default(), BattleResult::Unknown);
    }

    #[test]
    fn test_battle_result_serialization() {
        let json = serde_json::to_string(&BattleResult::Win).unwrap();
        assert_eq!(json, "\"win\"");

        let parsed: BattleResult = serde_json::from_str("\"draw\"").unwrap();
        assert_eq!(parsed, BattleResult::Draw);
    }

    #[test]
    fn test_battle_record_serialization() {
        let record = battle();

        let json = serde_json::to_string(&record).unwrap();
        let parsed: BattleRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(record, parsed);
        assert_eq!(parsed.teams.len(), 2);
        assert_eq!(parsed.teams[0].players.len(), 1);
    }

    #[test]
    fn test_team_order_preserved() {
        let record = battle();
        assert_eq!(record.teams[0].team_number, Some(1));
        assert_eq!(record.teams[1].team_number, Some(2));
    }
}
