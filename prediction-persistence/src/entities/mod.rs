pub mod prelude;

pub mod game_runs;
pub mod leaderboard;
