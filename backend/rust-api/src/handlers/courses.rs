use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::{current_user, ApiError};
use crate::{
    authz::{authorize, Action},
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::course::{CompleteLessonOutcome, CompleteLessonRequest, ProgressView},
    services::{course_service::CourseService, parse_object_id, AppState},
};

pub(crate) async fn list_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<ProgressView>>, ApiError> {
    let student_id = current_user(&claims)?;
    let rows = CourseService::new(state.mongo.clone())
        .list_progress(&student_id)
        .await?;
    Ok(Json(rows))
}

/// Completes the next lesson in order; repeats of earlier lessons answer 200 with a notice.
pub(crate) async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CompleteLessonRequest>,
) -> Result<Response, ApiError> {
    authorize(claims.role, Action::CompleteLesson)?;
    let student_id = current_user(&claims)?;

    let raw_id = req
        .lesson_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Lesson ID is required"))?;
    let lesson_id = parse_object_id(&raw_id, "lesson_id")?;

    let outcome = CourseService::new(state.mongo.clone())
        .complete_lesson(&student_id, &lesson_id)
        .await?;

    Ok(match outcome {
        CompleteLessonOutcome::Advanced(progress) => {
            Json(ProgressView::from(progress)).into_response()
        }
        CompleteLessonOutcome::AlreadyCompleted => {
            Json(json!({ "detail": "Lesson already completed" })).into_response()
        }
    })
}
