use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{current_user, validate_request, ApiError};
use crate::{
    authz::{authorize, Action},
    extractors::{AppJson, AppQuery},
    middlewares::auth::JwtClaims,
    models::{
        leaderboard::LeaderboardResponse,
        season::SeasonSummary,
        typing::{SubmitTypingRequest, SubmitTypingResponse, TypingAttemptView},
        user::WalletResponse,
    },
    services::{
        leaderboard_service::LeaderboardService,
        season_service::{summarize, SeasonService},
        typing_service::TypingService,
        wallet_service::WalletService,
        AppState,
    },
};

const MAX_LEADERBOARD_SIZE: i64 = 100;

fn season_service(state: &AppState) -> SeasonService {
    SeasonService::new(state.mongo.clone(), state.config.season.clone())
}

pub(crate) async fn submit_typing(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SubmitTypingRequest>,
) -> Result<(StatusCode, Json<SubmitTypingResponse>), ApiError> {
    authorize(claims.role, Action::PlayTypingGame)?;
    validate_request(&req)?;
    let student_id = current_user(&claims)?;

    let service = TypingService::new(state.mongo.clone(), season_service(&state));
    let response = service.submit(&student_id, &req).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub(crate) async fn list_typing(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<TypingAttemptView>>, ApiError> {
    authorize(claims.role, Action::PlayTypingGame)?;
    let student_id = current_user(&claims)?;

    let service = TypingService::new(state.mongo.clone(), season_service(&state));
    Ok(Json(service.list_mine(&student_id).await?))
}

pub(crate) async fn active_season(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<ActiveSeasonResponse>, ApiError> {
    authorize(claims.role, Action::ViewLeaderboard)?;

    let seasons = season_service(&state);
    let season = seasons
        .find_active()
        .await?
        .map(|season| summarize(&season, &seasons.default_rewards(), Utc::now()));

    Ok(Json(ActiveSeasonResponse { season }))
}

pub(crate) async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppQuery(query): AppQuery<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    authorize(claims.role, Action::ViewLeaderboard)?;
    let viewer_id = current_user(&claims)?;

    let size = query
        .limit
        .unwrap_or(state.config.leaderboard_size)
        .clamp(1, MAX_LEADERBOARD_SIZE);

    let seasons = season_service(&state);
    let active = seasons.find_active().await?;
    let response = LeaderboardService::new(state.mongo.clone())
        .leaderboard(
            active,
            &seasons.default_rewards(),
            &viewer_id,
            size,
            Utc::now(),
        )
        .await?;

    Ok(Json(response))
}

pub(crate) async fn wallet(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<WalletResponse>, ApiError> {
    authorize(claims.role, Action::ViewWallet)?;
    let user_id = current_user(&claims)?;

    let balance = WalletService::new(state.mongo.clone())
        .balance(&user_id)
        .await?;
    Ok(Json(balance))
}

#[derive(Debug, Serialize)]
pub(crate) struct ActiveSeasonResponse {
    season: Option<SeasonSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeaderboardQuery {
    limit: Option<i64>,
}
