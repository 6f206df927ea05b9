use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Best-score record for one (normalized email, game type) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LeaderboardEntry {
    pub id: i32,
    pub email: String,
    pub game_type: String,
    pub name: String,
    pub best_score: u32,
    pub total_games_played: u32,
    pub created_at: String, // ISO 8601 string for simplicity
    pub updated_at: String,
}

/// Leaderboard row as shown to other players. Carries no email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PublicLeaderboardEntry {
    pub rank: u32,
    pub name: String,
    pub best_score: u32,
    pub total_games_played: u32,
}

impl PublicLeaderboardEntry {
    pub fn from_entry(entry: &LeaderboardEntry, rank: u32) -> Self {
        Self {
            rank,
            name: entry.name.clone(),
            best_score: entry.best_score,
            total_games_played: entry.total_games_played,
        }
    }
}

/// Result of recording one round against the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpsertOutcome {
    pub entry: LeaderboardEntry,
    /// True when the row was created or the score beat the previous best.
    pub is_new_best: bool,
    pub created: bool,
}
