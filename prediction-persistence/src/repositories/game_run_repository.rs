use prediction_core::{validate_email, validate_name, ScoringEngine};
use prediction_types::{GameRules, GameRun, Numbers};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use tracing::debug;

use crate::entities::{
    game_runs::{self, NumberList},
    prelude::*,
};
use crate::errors::{PersistenceError, PersistenceResult};

/// Append-only log of every played round.
pub struct GameRunRepository {
    db: DatabaseConnection,
}

impl GameRunRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_run(model: game_runs::Model) -> PersistenceResult<GameRun> {
        let id = model.id;
        let corrupt = |reason| PersistenceError::CorruptRun { id, reason };

        let rules = GameRules::for_game_type(&model.game_type).map_err(corrupt)?;
        let predictions = Numbers::new(model.predictions.0, &rules).map_err(corrupt)?;
        let random_numbers = Numbers::new(model.random_numbers.0, &rules).map_err(corrupt)?;

        Ok(GameRun {
            id,
            user_name: model.user_name,
            email: model.email,
            predictions,
            random_numbers,
            score: model.score.max(0) as u32,
            game_type: model.game_type,
            created_at: model.created_at.to_rfc3339(),
        })
    }

    fn models_to_runs(models: Vec<game_runs::Model>) -> PersistenceResult<Vec<GameRun>> {
        models.into_iter().map(Self::model_to_run).collect()
    }

    /// Record a played round. The score is always computed here from the two
    /// sequences; the email is stored as the player typed it.
    pub async fn append_run(
        &self,
        user_name: &str,
        email: &str,
        predictions: Vec<i32>,
        random_numbers: Vec<i32>,
        game_type: &str,
    ) -> PersistenceResult<GameRun> {
        let rules = GameRules::for_game_type(game_type)?;
        let user_name = validate_name(user_name)?;
        validate_email(email)?;
        let predictions = Numbers::new(predictions, &rules)?;
        let random_numbers = Numbers::new(random_numbers, &rules)?;
        let score = ScoringEngine::score(&predictions, &random_numbers);

        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let model = game_runs::ActiveModel {
            id: ActiveValue::NotSet,
            user_name: ActiveValue::Set(user_name),
            email: ActiveValue::Set(email.to_string()),
            predictions: ActiveValue::Set(NumberList(predictions.into_inner())),
            random_numbers: ActiveValue::Set(NumberList(random_numbers.into_inner())),
            score: ActiveValue::Set(score as i32),
            game_type: ActiveValue::Set(game_type.to_string()),
            created_at: ActiveValue::Set(now),
        };

        let inserted = GameRuns::insert(model).exec(&self.db).await?;
        let created = GameRuns::find_by_id(inserted.last_insert_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("game run {}", inserted.last_insert_id)))?;

        debug!("Logged game run {} ({}): score {}", created.id, game_type, score);
        Self::model_to_run(created)
    }

    /// Every run for a game type, oldest first.
    pub async fn runs_for_game_type(&self, game_type: &str) -> PersistenceResult<Vec<GameRun>> {
        let models = GameRuns::find()
            .filter(game_runs::Column::GameType.eq(game_type))
            .order_by_asc(game_runs::Column::CreatedAt)
            .order_by_asc(game_runs::Column::Id)
            .all(&self.db)
            .await?;
        Self::models_to_runs(models)
    }

    /// A player's runs for one game type, newest first. Emails are compared
    /// in normalized form since the log keeps them raw.
    pub async fn runs_for_email(
        &self,
        email: &str,
        game_type: &str,
    ) -> PersistenceResult<Vec<GameRun>> {
        let email = validate_email(email)?;
        let models = GameRuns::find()
            .filter(Expr::cust_with_values("lower(trim(email)) = ?", [email]))
            .filter(game_runs::Column::GameType.eq(game_type))
            .order_by_desc(game_runs::Column::CreatedAt)
            .order_by_desc(game_runs::Column::Id)
            .all(&self.db)
            .await?;
        Self::models_to_runs(models)
    }

    /// Name from the player's most recent run of this game type.
    pub async fn latest_name_for(
        &self,
        email: &str,
        game_type: &str,
    ) -> PersistenceResult<Option<String>> {
        let runs = self.runs_for_email(email, game_type).await?;
        Ok(runs.into_iter().next().map(|run| run.user_name))
    }
}
