use chrono::{DateTime, TimeZone, Utc};
use prediction_core::ScoringEngine;
use prediction_core::reconciliation::{LeaderboardRow, RunSummary};
use prediction_types::{GameRules, GameRun, Numbers, DEFAULT_GAME_TYPE};

pub const PICKS: [i32; 10] = [1, 5, 9, 20, 33, 44, 55, 66, 77, 88];
pub const DRAWN: [i32; 10] = [5, 9, 12, 20, 33, 44, 55, 66, 77, 99];

pub fn numbers(values: &[i32]) -> Numbers {
    Numbers::new(values.to_vec(), &GameRules::standard()).unwrap()
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

/// Creates a scored run the way the run log would store it
pub fn create_test_run(id: i32, email: &str, picks: &[i32], drawn: &[i32], when: DateTime<Utc>) -> GameRun {
    let predictions = numbers(picks);
    let random_numbers = numbers(drawn);
    GameRun {
        id,
        user_name: format!("player-{id}"),
        email: email.to_string(),
        score: ScoringEngine::score(&predictions, &random_numbers),
        predictions,
        random_numbers,
        game_type: DEFAULT_GAME_TYPE.to_string(),
        created_at: when.to_rfc3339(),
    }
}

pub fn create_test_row(id: i32, email: &str, best_score: i32, total_games_played: i32) -> LeaderboardRow {
    LeaderboardRow {
        id,
        email: email.to_string(),
        game_type: DEFAULT_GAME_TYPE.to_string(),
        name: format!("row-{id}"),
        best_score,
        total_games_played,
    }
}

pub fn summarize(run: &GameRun) -> RunSummary {
    RunSummary {
        id: run.id,
        email: run.email.clone(),
        game_type: run.game_type.clone(),
        user_name: run.user_name.clone(),
        created_at: DateTime::parse_from_rfc3339(&run.created_at)
            .unwrap()
            .with_timezone(&Utc),
    }
}
