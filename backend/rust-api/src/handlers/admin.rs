use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use chrono::Utc;

use super::ApiError;
use crate::{
    authz::{authorize, Action},
    middlewares::auth::JwtClaims,
    models::season::{EndSeasonResponse, RotationReport},
    services::{rotation_service::RotationService, AppState},
};

/// POST /api/v1/admin/seasons/end
pub(crate) async fn end_season(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<EndSeasonResponse>, ApiError> {
    authorize(claims.role, Action::ManageSeasons)?;
    tracing::info!(admin_id = %claims.sub, "Ending active season early");

    let response = RotationService::new(&state)
        .end_active_season(Utc::now())
        .await?;
    Ok(Json(response))
}

/// POST /api/v1/admin/seasons/rotate
pub(crate) async fn rotate_seasons(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<RotationReport>, ApiError> {
    authorize(claims.role, Action::ManageSeasons)?;
    tracing::info!(admin_id = %claims.sub, "Manual season rotation requested");

    let report = RotationService::new(&state).rotate(Utc::now()).await?;
    Ok(Json(report))
}
