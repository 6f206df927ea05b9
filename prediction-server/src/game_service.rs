use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use prediction_core::{AnalyticsEngine, PredictionError, PredictionResult, RandomSource, ScoringEngine};
use prediction_persistence::{GameRunRepository, LeaderboardRepository};
use prediction_types::{
    GameRules, GameRun, GlobalAnalyticsResponse, LeaderboardResponse, Numbers, RoundId,
    RoundOutcome, SaveOutcome, UserAnalyticsResponse, DEFAULT_GAME_TYPE,
};
use sea_orm::DatabaseConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_LEADERBOARD_LIMIT: u64 = 10;
pub const MAX_LEADERBOARD_LIMIT: u64 = 100;

/// A drawn round waiting for the player to save it.
#[derive(Debug, Clone)]
struct PendingRound {
    outcome: RoundOutcome,
    /// Set once the run is in the log, so a retried save does not log it twice.
    logged_run: Option<GameRun>,
    created_at: Instant,
}

impl PendingRound {
    fn new(outcome: RoundOutcome) -> Self {
        Self {
            outcome,
            logged_run: None,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

pub struct GameService {
    random_source: Arc<dyn RandomSource>,
    leaderboard: LeaderboardRepository,
    game_runs: GameRunRepository,
    pending_rounds: DashMap<RoundId, PendingRound>,
}

impl GameService {
    pub fn new(random_source: Arc<dyn RandomSource>, db: DatabaseConnection) -> Self {
        Self {
            random_source,
            leaderboard: LeaderboardRepository::new(db.clone()),
            game_runs: GameRunRepository::new(db),
            pending_rounds: DashMap::new(),
        }
    }

    fn rules(game_type: Option<&str>) -> PredictionResult<GameRules> {
        Ok(GameRules::for_game_type(game_type.unwrap_or(DEFAULT_GAME_TYPE))?)
    }

    /// Draw numbers for a set of predictions and score them. The round is kept
    /// until it is saved or expires.
    pub async fn play_round(
        &self,
        game_type: Option<&str>,
        predictions: Vec<i32>,
    ) -> PredictionResult<RoundOutcome> {
        let rules = Self::rules(game_type)?;
        let predictions = Numbers::new(predictions, &rules)?;

        let drawn = self
            .random_source
            .fetch_random_numbers(rules.count, rules.min, rules.max)
            .await?;
        let random_numbers = Numbers::new(drawn, &rules).map_err(|e| {
            PredictionError::ExternalService(format!("Random source returned invalid numbers: {e}"))
        })?;

        let outcome = RoundOutcome {
            round_id: Uuid::new_v4(),
            game_type: rules.game_type.clone(),
            score: ScoringEngine::score(&predictions, &random_numbers),
            max_score: rules.max_score(),
            matching_numbers: ScoringEngine::matching_numbers(&predictions, &random_numbers),
            predictions,
            random_numbers,
        };

        info!(
            "Round {} scored {}/{}",
            outcome.round_id, outcome.score, outcome.max_score
        );
        self.pending_rounds
            .insert(outcome.round_id, PendingRound::new(outcome.clone()));
        Ok(outcome)
    }

    /// Log a pending round and record it on the leaderboard.
    ///
    /// On failure the round goes back to the pending store so the player can
    /// retry. A retry after the run was logged reuses that run and its
    /// name and email.
    pub async fn save_round(
        &self,
        round_id: RoundId,
        name: &str,
        email: &str,
    ) -> PredictionResult<SaveOutcome> {
        let (_, mut pending) = self
            .pending_rounds
            .remove(&round_id)
            .ok_or(PredictionError::RoundNotFound(round_id))?;

        match self.record_round(&mut pending, name, email).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!("Saving round {} failed, keeping it pending: {}", round_id, err);
                self.pending_rounds.insert(round_id, pending);
                Err(err)
            }
        }
    }

    async fn record_round(
        &self,
        pending: &mut PendingRound,
        name: &str,
        email: &str,
    ) -> PredictionResult<SaveOutcome> {
        let run = if let Some(run) = pending.logged_run.clone() {
            run
        } else {
            let outcome = &pending.outcome;
            let run = self
                .game_runs
                .append_run(
                    name,
                    email,
                    outcome.predictions.as_slice().to_vec(),
                    outcome.random_numbers.as_slice().to_vec(),
                    &outcome.game_type,
                )
                .await?;
            pending.logged_run = Some(run.clone());
            run
        };

        let upsert = self
            .leaderboard
            .upsert_best(&run.email, &run.game_type, &run.user_name, run.score)
            .await?;

        let rank = match self.leaderboard.rank_of(&run.email, &run.game_type).await {
            Ok(rank) => rank,
            Err(err) => {
                warn!("Failed to compute rank after save: {}", err);
                None
            }
        };

        debug!(
            "Saved run {} for {}: best {}, games {}",
            run.id, upsert.entry.email, upsert.entry.best_score, upsert.entry.total_games_played
        );

        Ok(SaveOutcome {
            run,
            entry: upsert.entry,
            is_new_best: upsert.is_new_best,
            created: upsert.created,
            rank,
        })
    }

    pub async fn leaderboard(
        &self,
        game_type: Option<&str>,
        limit: Option<u64>,
    ) -> PredictionResult<LeaderboardResponse> {
        let rules = Self::rules(game_type)?;
        let limit = limit
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .clamp(1, MAX_LEADERBOARD_LIMIT);
        let entries = self.leaderboard.top_n(&rules.game_type, limit).await?;
        Ok(LeaderboardResponse {
            game_type: rules.game_type,
            entries,
        })
    }

    pub async fn global_analytics(
        &self,
        game_type: Option<&str>,
    ) -> PredictionResult<GlobalAnalyticsResponse> {
        let rules = Self::rules(game_type)?;
        let runs = self.game_runs.runs_for_game_type(&rules.game_type).await?;
        let frequencies = AnalyticsEngine::number_frequencies(&runs);

        Ok(GlobalAnalyticsResponse {
            stats: AnalyticsEngine::global_stats(&runs),
            insights: AnalyticsEngine::pattern_insights(&frequencies, &rules),
            frequencies,
            game_type: rules.game_type,
        })
    }

    pub async fn user_analytics(
        &self,
        email: &str,
        game_type: Option<&str>,
    ) -> PredictionResult<UserAnalyticsResponse> {
        let rules = Self::rules(game_type)?;
        let runs = self.game_runs.runs_for_email(email, &rules.game_type).await?;

        Ok(UserAnalyticsResponse {
            stats: AnalyticsEngine::user_stats(&runs, Utc::now()),
            game_type: rules.game_type,
        })
    }

    /// Drop rounds that were never saved. Returns how many were removed.
    pub fn cleanup_expired_rounds(&self, ttl: Duration) -> usize {
        let before = self.pending_rounds.len();
        self.pending_rounds.retain(|_, round| !round.is_expired(ttl));
        let removed = before.saturating_sub(self.pending_rounds.len());
        if removed > 0 {
            info!("Removed {} expired rounds", removed);
        }
        removed
    }

    pub fn pending_rounds_count(&self) -> usize {
        self.pending_rounds.len()
    }
}
