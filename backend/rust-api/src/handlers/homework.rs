use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};

use super::{current_user, validate_request, ApiError};
use crate::{
    authz::{authorize, Action},
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::homework::{HomeworkView, ReviewHomeworkRequest, SubmitHomeworkRequest},
    services::{homework_service::HomeworkService, parse_object_id, AppState},
};

pub(crate) async fn list_mine(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<HomeworkView>>, ApiError> {
    let student_id = current_user(&claims)?;
    let rows = HomeworkService::new(state.mongo.clone())
        .list_mine(&student_id)
        .await?;
    Ok(Json(rows))
}

pub(crate) async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SubmitHomeworkRequest>,
) -> Result<(StatusCode, Json<HomeworkView>), ApiError> {
    authorize(claims.role, Action::SubmitHomework)?;
    validate_request(&req)?;
    let student_id = current_user(&claims)?;
    let lesson_id = parse_object_id(&req.lesson_id, "lesson_id")?;

    let submission = HomeworkService::new(state.mongo.clone())
        .submit(&student_id, &lesson_id, &req.file_url)
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

pub(crate) async fn list_pending(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<HomeworkView>>, ApiError> {
    authorize(claims.role, Action::ReviewHomework)?;
    let rows = HomeworkService::new(state.mongo.clone())
        .list_pending()
        .await?;
    Ok(Json(rows))
}

pub(crate) async fn review(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(submission_id): Path<String>,
    AppJson(req): AppJson<ReviewHomeworkRequest>,
) -> Result<Json<HomeworkView>, ApiError> {
    authorize(claims.role, Action::ReviewHomework)?;
    validate_request(&req)?;
    let reviewer_id = current_user(&claims)?;
    let submission_id = parse_object_id(&submission_id, "submission_id")?;

    let reviewed = HomeworkService::new(state.mongo.clone())
        .review(&reviewer_id, &submission_id, &req)
        .await?;
    Ok(Json(reviewed))
}
