pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_leaderboard_table;
mod m20240101_000002_create_game_runs_table;
mod m20240201_000003_reconcile_leaderboard_emails;
pub mod reconcile;

pub use m20240101_000001_create_leaderboard_table::Leaderboard;
pub use m20240101_000002_create_game_runs_table::GameRuns;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_leaderboard_table::Migration),
            Box::new(m20240101_000002_create_game_runs_table::Migration),
            Box::new(m20240201_000003_reconcile_leaderboard_emails::Migration),
        ]
    }
}
