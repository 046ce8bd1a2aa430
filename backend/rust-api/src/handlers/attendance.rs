use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};

use super::{current_user, validate_request, ApiError};
use crate::{
    authz::{authorize, Action},
    extractors::{AppJson, AppQuery},
    middlewares::auth::JwtClaims,
    models::attendance::{
        AttendanceQuery, AttendanceView, MarkAttendanceRequest, MarkAttendanceResponse,
    },
    services::{attendance_service::AttendanceService, parse_object_id, AppState},
};

fn attendance_service(state: &AppState) -> AttendanceService {
    AttendanceService::new(state.mongo.clone(), state.config.attendance_window_days)
}

pub(crate) async fn mark(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<MarkAttendanceRequest>,
) -> Result<Json<MarkAttendanceResponse>, ApiError> {
    authorize(claims.role, Action::MarkAttendance)?;
    validate_request(&req)?;
    let marker_id = current_user(&claims)?;
    let group_id = parse_object_id(&req.group_id, "group_id")?;

    let response = attendance_service(&state)
        .mark(&marker_id, claims.role, &group_id, req.date, &req.records)
        .await?;
    Ok(Json(response))
}

pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppQuery(query): AppQuery<AttendanceQuery>,
) -> Result<Json<Vec<AttendanceView>>, ApiError> {
    authorize(claims.role, Action::ViewAttendance)?;
    let viewer_id = current_user(&claims)?;
    let group_id = parse_object_id(&query.group_id, "group_id")?;

    let rows = attendance_service(&state)
        .list_for_group(&viewer_id, claims.role, &group_id, query.date)
        .await?;
    Ok(Json(rows))
}
