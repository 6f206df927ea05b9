use prediction_core::reconciliation::NameSource;
use sea_orm_migration::prelude::*;
use tracing::info;

use crate::reconcile::{drop_guards, reconcile_leaderboard};

/// Merges duplicate leaderboard rows and installs the uniqueness guarantee.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let report = reconcile_leaderboard(manager.get_connection(), NameSource::default()).await?;
        info!(
            "Leaderboard reconciled: {} rows scanned, {} deleted, {} emails normalized, {} names re-pointed",
            report.rows_scanned, report.rows_deleted, report.emails_normalized, report.names_repointed
        );
        Ok(())
    }

    /// Removes the guards only. Deleted duplicates are not restored.
    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_guards(manager.get_connection()).await
    }
}
