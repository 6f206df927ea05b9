use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use warp::Filter;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};

use crate::game_service::GameService;
use prediction_core::{PredictionError, PredictionResult};
use prediction_types::{
    ErrorKind, ErrorResponse, PlayRoundRequest, SaveScoreRequest, SaveScoreResponse,
    UserAnalyticsRequest,
};

pub mod config;
pub mod game_service;
pub mod random_org;

#[derive(Deserialize)]
struct LeaderboardQuery {
    game_type: Option<String>,
    limit: Option<u64>,
}

#[derive(Deserialize)]
struct GameTypeQuery {
    game_type: Option<String>,
}

pub fn create_routes(
    game_service: Arc<GameService>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let game_service_filter = warp::any().map({
        let game_service = game_service.clone();
        move || game_service.clone()
    });

    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    let play_round = warp::path!("rounds")
        .and(warp::post())
        .and(warp::body::json::<PlayRoundRequest>())
        .and(game_service_filter.clone())
        .and_then(handle_play_round);

    let save_round = warp::path!("rounds" / Uuid / "save")
        .and(warp::post())
        .and(warp::body::json::<SaveScoreRequest>())
        .and(game_service_filter.clone())
        .and_then(handle_save_round);

    let leaderboard = warp::path!("leaderboard")
        .and(warp::get())
        .and(warp::query::<LeaderboardQuery>())
        .and(game_service_filter.clone())
        .and_then(handle_leaderboard);

    let global_analytics = warp::path!("analytics" / "global")
        .and(warp::get())
        .and(warp::query::<GameTypeQuery>())
        .and(game_service_filter.clone())
        .and_then(handle_global_analytics);

    let user_analytics = warp::path!("analytics" / "user")
        .and(warp::post())
        .and(warp::body::json::<UserAnalyticsRequest>())
        .and(game_service_filter.clone())
        .and_then(handle_user_analytics);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    health
        .or(play_round)
        .or(save_round)
        .or(leaderboard)
        .or(global_analytics)
        .or(user_analytics)
        .with(cors)
        .with(warp::log("prediction_game"))
}

fn status_for(kind: &ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_reply(err: &PredictionError) -> WithStatus<Json> {
    let kind = err.kind();
    let status = status_for(&kind);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::debug!("Request rejected: {}", err);
    }

    let body = ErrorResponse {
        error: err.to_string(),
        kind,
        retryable: err.is_retryable(),
    };
    warp::reply::with_status(warp::reply::json(&body), status)
}

fn to_reply<T: Serialize>(result: PredictionResult<T>) -> WithStatus<Json> {
    match result {
        Ok(body) => warp::reply::with_status(warp::reply::json(&body), StatusCode::OK),
        Err(err) => error_reply(&err),
    }
}

async fn handle_play_round(
    request: PlayRoundRequest,
    game_service: Arc<GameService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let result = game_service
        .play_round(request.game_type.as_deref(), request.predictions)
        .await;
    Ok(to_reply(result))
}

async fn handle_save_round(
    round_id: Uuid,
    request: SaveScoreRequest,
    game_service: Arc<GameService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let result = game_service
        .save_round(round_id, &request.name, &request.email)
        .await
        .map(|outcome| {
            // One point per drawn number
            let max_score = outcome.run.random_numbers.len() as u32;
            SaveScoreResponse::from((outcome, max_score))
        });
    Ok(to_reply(result))
}

async fn handle_leaderboard(
    query: LeaderboardQuery,
    game_service: Arc<GameService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let result = game_service
        .leaderboard(query.game_type.as_deref(), query.limit)
        .await;
    Ok(to_reply(result))
}

async fn handle_global_analytics(
    query: GameTypeQuery,
    game_service: Arc<GameService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let result = game_service
        .global_analytics(query.game_type.as_deref())
        .await;
    Ok(to_reply(result))
}

async fn handle_user_analytics(
    request: UserAnalyticsRequest,
    game_service: Arc<GameService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let result = game_service
        .user_analytics(&request.email, request.game_type.as_deref())
        .await;
    Ok(to_reply(result))
}
