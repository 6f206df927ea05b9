use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GlobalStats {
    pub total_games: u32,
    pub average_score: f64,
    pub best_score: u32,
    pub total_players: u32,
    /// score -> number of runs with that score
    pub score_distribution: BTreeMap<u32, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NumberFrequencies {
    pub predictions: BTreeMap<i32, u32>,
    pub random_numbers: BTreeMap<i32, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FavoriteNumber {
    pub number: i32,
    pub times_predicted: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserStats {
    pub total_games: u32,
    pub best_score: u32,
    pub average_score: f64,
    pub latest_score: u32,
    pub first_game: String,
    pub games_last_week: u32,
    /// Up to the ten most recent scores, oldest first.
    pub score_trend: Vec<u32>,
    pub favorite_numbers: Vec<FavoriteNumber>,
}

/// Share of picks (in percent) that fall into a number class, next to the
/// share a uniform chooser would produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PatternShare {
    pub human_percent: f64,
    pub random_percent: f64,
    pub expected_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PatternInsights {
    pub primes: PatternShare,
    pub even: PatternShare,
    pub multiples_of_five: PatternShare,
    pub repeating_digits: PatternShare,
    pub lucky_sevens: PatternShare,
    pub most_predicted: Option<i32>,
    pub most_drawn: Option<i32>,
    /// 0-100, higher means human picks look closer to uniform.
    pub randomness_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GlobalAnalyticsResponse {
    pub game_type: String,
    pub stats: Option<GlobalStats>,
    pub frequencies: NumberFrequencies,
    pub insights: Option<PatternInsights>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserAnalyticsResponse {
    pub game_type: String,
    pub stats: Option<UserStats>,
}
