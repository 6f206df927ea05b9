use migration::reconcile::{leaderboard_rows, reconcile_leaderboard, ReconciliationReport};
use prediction_core::reconciliation::{audit, AuditReport, NameSource};
use prediction_core::{validate_email, validate_name, validate_score};
use prediction_types::{GameRules, LeaderboardEntry, PublicLeaderboardEntry, UpsertOutcome};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, SqlErr,
};
use tracing::{debug, warn};

use crate::entities::{leaderboard, prelude::*};
use crate::errors::{PersistenceError, PersistenceResult};

/// Attempts before a racing insert is reported as a conflict.
pub const MAX_UPSERT_ATTEMPTS: u32 = 3;

pub struct LeaderboardRepository {
    db: DatabaseConnection,
}

impl LeaderboardRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_entry(model: leaderboard::Model) -> LeaderboardEntry {
        LeaderboardEntry {
            id: model.id,
            email: model.email,
            game_type: model.game_type,
            name: model.name,
            best_score: model.best_score.max(0) as u32,
            total_games_played: model.total_games_played.max(0) as u32,
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
        }
    }

    /// Matches the `(lower(email), game_type)` unique index.
    fn key_filter(email: &str, game_type: &str) -> SimpleExpr {
        Expr::expr(Func::lower(Expr::col(leaderboard::Column::Email)))
            .eq(email)
            .and(leaderboard::Column::GameType.eq(game_type))
    }

    /// Record one completed round for `(email, game_type)`.
    ///
    /// Updates in place when the key exists, inserts otherwise. An insert that
    /// loses a race against another insert for the same key hits the unique
    /// index and is retried as an update.
    pub async fn upsert_best(
        &self,
        email: &str,
        game_type: &str,
        name: &str,
        score: u32,
    ) -> PersistenceResult<UpsertOutcome> {
        let email = validate_email(email)?;
        let name = validate_name(name)?;
        let rules = GameRules::for_game_type(game_type)?;
        let score = validate_score(score, &rules)?;

        for attempt in 1..=MAX_UPSERT_ATTEMPTS {
            if let Some(is_new_best) = self.update_existing(&email, game_type, &name, score).await? {
                let entry = self.fetch(&email, game_type).await?;
                debug!(
                    "Updated leaderboard for {} ({}): best {}, games {}",
                    email, game_type, entry.best_score, entry.total_games_played
                );
                return Ok(UpsertOutcome {
                    entry,
                    is_new_best,
                    created: false,
                });
            }

            match self.insert_new(&email, game_type, &name, score).await {
                Ok(entry) => {
                    debug!("Added {} ({}) to leaderboard", email, game_type);
                    return Ok(UpsertOutcome {
                        entry,
                        is_new_best: true,
                        created: true,
                    });
                }
                Err(err) if is_unique_violation(&err) => {
                    warn!(
                        "Concurrent insert for {} ({}), retrying as update (attempt {}/{})",
                        email, game_type, attempt, MAX_UPSERT_ATTEMPTS
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(PersistenceError::Conflict {
            email,
            game_type: game_type.to_string(),
            attempts: MAX_UPSERT_ATTEMPTS,
        })
    }

    /// Returns `None` when no row exists for the key, otherwise whether the
    /// score raised the stored best. Each statement is atomic on its own so
    /// concurrent updates never lose an increment.
    async fn update_existing(
        &self,
        email: &str,
        game_type: &str,
        name: &str,
        score: u32,
    ) -> Result<Option<bool>, DbErr> {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let games_plus_one = Expr::col(leaderboard::Column::TotalGamesPlayed).add(1);

        let improved = Leaderboard::update_many()
            .col_expr(leaderboard::Column::BestScore, Expr::value(score as i32))
            .col_expr(leaderboard::Column::TotalGamesPlayed, games_plus_one.clone())
            .col_expr(leaderboard::Column::Name, Expr::value(name))
            .col_expr(leaderboard::Column::UpdatedAt, Expr::value(now))
            .filter(Self::key_filter(email, game_type))
            .filter(leaderboard::Column::BestScore.lt(score as i32))
            .exec(&self.db)
            .await?;
        if improved.rows_affected > 0 {
            return Ok(Some(true));
        }

        let played = Leaderboard::update_many()
            .col_expr(leaderboard::Column::TotalGamesPlayed, games_plus_one)
            .col_expr(leaderboard::Column::Name, Expr::value(name))
            .col_expr(leaderboard::Column::UpdatedAt, Expr::value(now))
            .filter(Self::key_filter(email, game_type))
            .exec(&self.db)
            .await?;
        if played.rows_affected > 0 {
            return Ok(Some(false));
        }

        Ok(None)
    }

    async fn insert_new(
        &self,
        email: &str,
        game_type: &str,
        name: &str,
        score: u32,
    ) -> Result<LeaderboardEntry, DbErr> {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let model = leaderboard::ActiveModel {
            id: ActiveValue::NotSet,
            email: ActiveValue::Set(email.to_string()),
            game_type: ActiveValue::Set(game_type.to_string()),
            name: ActiveValue::Set(name.to_string()),
            best_score: ActiveValue::Set(score as i32),
            total_games_played: ActiveValue::Set(1),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let inserted = Leaderboard::insert(model).exec(&self.db).await?;
        let created = Leaderboard::find_by_id(inserted.last_insert_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                DbErr::RecordNotFound(format!("leaderboard row {}", inserted.last_insert_id))
            })?;

        Ok(Self::model_to_entry(created))
    }

    async fn fetch(&self, email: &str, game_type: &str) -> PersistenceResult<LeaderboardEntry> {
        self.find(email, game_type).await?.ok_or_else(|| {
            DbErr::RecordNotFound(format!("leaderboard entry for {email} ({game_type})")).into()
        })
    }

    pub async fn find(
        &self,
        email: &str,
        game_type: &str,
    ) -> PersistenceResult<Option<LeaderboardEntry>> {
        let email = validate_email(email)?;
        let model = Leaderboard::find()
            .filter(Self::key_filter(&email, game_type))
            .one(&self.db)
            .await?;
        Ok(model.map(Self::model_to_entry))
    }

    /// Best scores for one game type, highest first. Equal scores are ordered
    /// by who got there first. Equal scores share a rank.
    pub async fn top_n(
        &self,
        game_type: &str,
        limit: u64,
    ) -> PersistenceResult<Vec<PublicLeaderboardEntry>> {
        let models = Leaderboard::find()
            .filter(leaderboard::Column::GameType.eq(game_type))
            .order_by_desc(leaderboard::Column::BestScore)
            .order_by_asc(leaderboard::Column::UpdatedAt)
            .order_by_asc(leaderboard::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        let mut entries: Vec<PublicLeaderboardEntry> = Vec::with_capacity(models.len());
        for (index, model) in models.into_iter().enumerate() {
            let entry = Self::model_to_entry(model);
            let rank = match entries.last() {
                Some(previous) if previous.best_score == entry.best_score => previous.rank,
                _ => index as u32 + 1,
            };
            entries.push(PublicLeaderboardEntry::from_entry(&entry, rank));
        }

        Ok(entries)
    }

    /// 1 + the number of players with a strictly higher best score.
    pub async fn rank_of(&self, email: &str, game_type: &str) -> PersistenceResult<Option<u32>> {
        let Some(entry) = self.find(email, game_type).await? else {
            return Ok(None);
        };

        let above = Leaderboard::find()
            .filter(leaderboard::Column::GameType.eq(game_type))
            .filter(leaderboard::Column::BestScore.gt(entry.best_score as i32))
            .count(&self.db)
            .await?;

        Ok(Some(above as u32 + 1))
    }

    /// Read-only view of what reconciliation would change.
    pub async fn audit(&self) -> PersistenceResult<AuditReport> {
        let rows = leaderboard_rows(&self.db).await?;
        Ok(audit(&rows))
    }

    /// Run the deduplication pass outside the migrator.
    pub async fn reconcile(&self, source: NameSource) -> PersistenceResult<ReconciliationReport> {
        Ok(reconcile_leaderboard(&self.db, source).await?)
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use futures_util::future::join_all;
    use migration::{Migrator, MigratorTrait};
    use prediction_types::{ValidationError, DEFAULT_GAME_TYPE};

    async fn setup_test_db() -> LeaderboardRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        LeaderboardRepository::new(db)
    }

    #[tokio::test]
    async fn test_first_save_creates_entry() {
        let repo = setup_test_db().await;

        let outcome = repo
            .upsert_best("  Alice@Example.com ", DEFAULT_GAME_TYPE, "Alice", 4)
            .await
            .unwrap();

        assert!(outcome.created);
        assert!(outcome.is_new_best);
        assert_eq!(outcome.entry.email, "alice@example.com");
        assert_eq!(outcome.entry.best_score, 4);
        assert_eq!(outcome.entry.total_games_played, 1);
    }

    #[tokio::test]
    async fn test_best_score_never_decreases() {
        let repo = setup_test_db().await;

        repo.upsert_best("bob@x.com", DEFAULT_GAME_TYPE, "Bob", 6)
            .await
            .unwrap();
        let lower = repo
            .upsert_best("BOB@x.com", DEFAULT_GAME_TYPE, "Bobby", 2)
            .await
            .unwrap();
        assert!(!lower.created);
        assert!(!lower.is_new_best);
        assert_eq!(lower.entry.best_score, 6);
        assert_eq!(lower.entry.total_games_played, 2);
        // Latest name wins even without a new best
        assert_eq!(lower.entry.name, "Bobby");

        let higher = repo
            .upsert_best("bob@x.com", DEFAULT_GAME_TYPE, "Bob", 9)
            .await
            .unwrap();
        assert!(higher.is_new_best);
        assert_eq!(higher.entry.best_score, 9);
        assert_eq!(higher.entry.total_games_played, 3);

        let equal = repo
            .upsert_best("bob@x.com", DEFAULT_GAME_TYPE, "Bob", 9)
            .await
            .unwrap();
        assert!(!equal.is_new_best);
        assert_eq!(equal.entry.total_games_played, 4);
    }

    #[tokio::test]
    async fn test_concurrent_first_saves_make_one_row() {
        let repo = setup_test_db().await;

        let (first, second) = tokio::join!(
            repo.upsert_best("carol@x.com", DEFAULT_GAME_TYPE, "Carol", 3),
            repo.upsert_best("Carol@x.com ", DEFAULT_GAME_TYPE, "Carol", 5),
        );
        let first = first.unwrap();
        let second = second.unwrap();
        assert!(first.created ^ second.created);

        let entry = repo
            .find("carol@x.com", DEFAULT_GAME_TYPE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.total_games_played, 2);
        assert_eq!(entry.best_score, 5);

        let report = repo.audit().await.unwrap();
        assert_eq!(report.total_rows, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_many_concurrent_saves_count_every_round() {
        let repo = setup_test_db().await;

        let saves = (0..8).map(|i| repo.upsert_best("dave@x.com", DEFAULT_GAME_TYPE, "Dave", i));
        for result in join_all(saves).await {
            result.unwrap();
        }

        let entry = repo
            .find("dave@x.com", DEFAULT_GAME_TYPE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.total_games_played, 8);
        assert_eq!(entry.best_score, 7);
    }

    #[tokio::test]
    async fn test_upsert_rejects_bad_input() {
        let repo = setup_test_db().await;

        let err = repo
            .upsert_best("   ", DEFAULT_GAME_TYPE, "Nobody", 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Validation(ValidationError::EmptyEmail)
        ));

        let err = repo
            .upsert_best("e@x.com", "1-10_range_3_numbers", "Erin", 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Validation(ValidationError::UnknownGameType { .. })
        ));

        let err = repo
            .upsert_best("e@x.com", DEFAULT_GAME_TYPE, "Erin", 11)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Validation(ValidationError::ScoreOutOfRange { .. })
        ));

        assert!(repo.find("e@x.com", DEFAULT_GAME_TYPE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_top_n_orders_and_ranks() {
        let repo = setup_test_db().await;

        repo.upsert_best("low@x.com", DEFAULT_GAME_TYPE, "Low", 2)
            .await
            .unwrap();
        repo.upsert_best("early@x.com", DEFAULT_GAME_TYPE, "Early", 7)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.upsert_best("late@x.com", DEFAULT_GAME_TYPE, "Late", 7)
            .await
            .unwrap();
        repo.upsert_best("top@x.com", DEFAULT_GAME_TYPE, "Top", 9)
            .await
            .unwrap();

        let top = repo.top_n(DEFAULT_GAME_TYPE, 10).await.unwrap();
        let names: Vec<&str> = top.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["Top", "Early", "Late", "Low"]);
        let ranks: Vec<u32> = top.iter().map(|entry| entry.rank).collect();
        assert_eq!(ranks, vec![1, 2, 2, 4]);

        let limited = repo.top_n(DEFAULT_GAME_TYPE, 2).await.unwrap();
        assert_eq!(limited.len(), 2);

        let json = serde_json::to_string(&top).unwrap();
        assert!(!json.contains("@x.com"));
    }

    #[tokio::test]
    async fn test_rank_of() {
        let repo = setup_test_db().await;

        repo.upsert_best("one@x.com", DEFAULT_GAME_TYPE, "One", 8)
            .await
            .unwrap();
        repo.upsert_best("two@x.com", DEFAULT_GAME_TYPE, "Two", 5)
            .await
            .unwrap();
        repo.upsert_best("three@x.com", DEFAULT_GAME_TYPE, "Three", 5)
            .await
            .unwrap();

        assert_eq!(repo.rank_of("ONE@x.com", DEFAULT_GAME_TYPE).await.unwrap(), Some(1));
        assert_eq!(repo.rank_of("two@x.com", DEFAULT_GAME_TYPE).await.unwrap(), Some(2));
        assert_eq!(repo.rank_of("three@x.com", DEFAULT_GAME_TYPE).await.unwrap(), Some(2));
        assert_eq!(repo.rank_of("nobody@x.com", DEFAULT_GAME_TYPE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reconcile_on_clean_table_is_noop() {
        let repo = setup_test_db().await;
        repo.upsert_best("fay@x.com", DEFAULT_GAME_TYPE, "Fay", 3)
            .await
            .unwrap();

        let report = repo.reconcile(NameSource::default()).await.unwrap();
        assert_eq!(report.rows_scanned, 1);
        assert_eq!(report.rows_deleted, 0);
        assert_eq!(report.emails_normalized, 0);
    }
}
