use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{GameRun, LeaderboardEntry, PublicLeaderboardEntry, RoundId};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayRoundRequest {
    pub predictions: Vec<i32>,
    pub game_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaveScoreRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaveScoreResponse {
    pub run: GameRun,
    pub is_new_best: bool,
    pub best_score: u32,
    pub total_games_played: u32,
    pub rank: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LeaderboardResponse {
    pub game_type: String,
    pub entries: Vec<PublicLeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserAnalyticsRequest {
    pub email: String,
    pub game_type: Option<String>,
}

/// Outcome of saving a round, before it is shaped into an API response.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub run: GameRun,
    pub entry: LeaderboardEntry,
    pub is_new_best: bool,
    /// The save inserted the player's leaderboard row.
    pub created: bool,
    pub rank: Option<u32>,
}

impl SaveOutcome {
    /// Player-facing summary, mirroring what the game shows after a save.
    pub fn message(&self, max_score: u32) -> String {
        if self.created {
            "Added to leaderboard!".to_string()
        } else if self.is_new_best {
            "New high score!".to_string()
        } else {
            format!("Your best is still {}/{}", self.entry.best_score, max_score)
        }
    }
}

impl From<(SaveOutcome, u32)> for SaveScoreResponse {
    fn from((outcome, max_score): (SaveOutcome, u32)) -> Self {
        let message = outcome.message(max_score);
        SaveScoreResponse {
            best_score: outcome.entry.best_score,
            total_games_played: outcome.entry.total_games_played,
            rank: outcome.rank,
            is_new_best: outcome.is_new_best,
            run: outcome.run,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GameRules, Numbers};

    fn outcome(created: bool, is_new_best: bool, best_score: u32, total: u32) -> SaveOutcome {
        let rules = GameRules::standard();
        let numbers = Numbers::new((1..=10).collect(), &rules).unwrap();
        SaveOutcome {
            run: GameRun {
                id: 1,
                user_name: "Alice".to_string(),
                email: "alice@x.com".to_string(),
                predictions: numbers.clone(),
                random_numbers: numbers,
                score: best_score,
                game_type: rules.game_type.clone(),
                created_at: "2024-01-01T00:00:00Z".to_string(),
            },
            entry: LeaderboardEntry {
                id: 1,
                email: "alice@x.com".to_string(),
                game_type: rules.game_type,
                name: "Alice".to_string(),
                best_score,
                total_games_played: total,
                created_at: "2024-01-01T00:00:00Z".to_string(),
                updated_at: "2024-01-01T00:00:00Z".to_string(),
            },
            is_new_best,
            created,
            rank: Some(1),
        }
    }

    #[test]
    fn test_added_message_only_for_new_rows() {
        assert_eq!(outcome(true, true, 4, 1).message(10), "Added to leaderboard!");
    }

    #[test]
    fn test_existing_row_with_one_game_is_not_added() {
        // A reconciled row that had no games recorded before this save
        assert_eq!(outcome(false, true, 6, 1).message(10), "New high score!");
        assert_eq!(
            outcome(false, false, 6, 1).message(10),
            "Your best is still 6/10"
        );
    }
}
