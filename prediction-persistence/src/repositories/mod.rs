mod game_run_repository;
mod leaderboard_repository;

pub use game_run_repository::GameRunRepository;
pub use leaderboard_repository::{LeaderboardRepository, MAX_UPSERT_ATTEMPTS};
