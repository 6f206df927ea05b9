pub use super::game_runs::Entity as GameRuns;
pub use super::leaderboard::Entity as Leaderboard;
