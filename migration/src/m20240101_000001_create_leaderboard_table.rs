use prediction_types::DEFAULT_GAME_TYPE;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Emails are not unique here. Rows written before normalization are
        // merged by the reconcile migration, which also installs the index.
        manager
            .create_table(
                Table::create()
                    .table(Leaderboard::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Leaderboard::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Leaderboard::Name).string().not_null())
                    .col(ColumnDef::new(Leaderboard::Email).string().not_null())
                    .col(
                        ColumnDef::new(Leaderboard::GameType)
                            .string()
                            .not_null()
                            .default(DEFAULT_GAME_TYPE),
                    )
                    .col(
                        ColumnDef::new(Leaderboard::BestScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Leaderboard::TotalGamesPlayed)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Leaderboard::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Leaderboard::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create index on (game_type, best_score) for leaderboard queries
        manager
            .create_index(
                Index::create()
                    .name("idx_leaderboard_game_type_best_score")
                    .table(Leaderboard::Table)
                    .col(Leaderboard::GameType)
                    .col(Leaderboard::BestScore)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Leaderboard::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Leaderboard {
    Table,
    Id,
    Name,
    Email,
    GameType,
    BestScore,
    TotalGamesPlayed,
    CreatedAt,
    UpdatedAt,
}
