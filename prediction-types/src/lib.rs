pub mod analytics;
pub mod errors;
pub mod game;
pub mod leaderboard;
pub mod messages;

// Re-export all types
pub use analytics::*;
pub use errors::*;
pub use game::*;
pub use leaderboard::*;
pub use messages::*;

pub type RoundId = uuid::Uuid;
