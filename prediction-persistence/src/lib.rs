pub mod connection;
pub mod entities;
pub mod errors;
pub mod repositories;

pub use errors::{PersistenceError, PersistenceResult};
pub use repositories::{GameRunRepository, LeaderboardRepository, MAX_UPSERT_ATTEMPTS};

use sea_orm::{DatabaseConnection, DbErr};

pub struct DatabaseManager {
    connection: DatabaseConnection,
}

impl DatabaseManager {
    /// Connects and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, DbErr> {
        let connection = connection::connect_and_migrate(database_url).await?;
        Ok(Self { connection })
    }

    pub fn get_connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub fn leaderboard(&self) -> LeaderboardRepository {
        LeaderboardRepository::new(self.connection.clone())
    }

    pub fn game_runs(&self) -> GameRunRepository {
        GameRunRepository::new(self.connection.clone())
    }
}
