use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GameRuns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GameRuns::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GameRuns::UserName).string().not_null())
                    .col(ColumnDef::new(GameRuns::Email).string().not_null())
                    .col(ColumnDef::new(GameRuns::Predictions).json().not_null())
                    .col(ColumnDef::new(GameRuns::RandomNumbers).json().not_null())
                    .col(ColumnDef::new(GameRuns::Score).integer().not_null())
                    .col(ColumnDef::new(GameRuns::GameType).string().not_null())
                    .col(
                        ColumnDef::new(GameRuns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_game_runs_email")
                    .table(GameRuns::Table)
                    .col(GameRuns::Email)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_game_runs_game_type_created_at")
                    .table(GameRuns::Table)
                    .col(GameRuns::GameType)
                    .col(GameRuns::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GameRuns::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum GameRuns {
    Table,
    Id,
    UserName,
    Email,
    Predictions,
    RandomNumbers,
    Score,
    GameType,
    CreatedAt,
}
