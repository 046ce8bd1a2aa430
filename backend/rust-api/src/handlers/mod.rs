use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use mongodb::bson::oid::ObjectId;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::metrics;
use crate::middlewares::auth::JwtClaims;
use crate::services::{AppState, ServiceError};

pub mod admin;
pub mod attendance;
pub mod courses;
pub mod game;
pub mod homework;
pub mod shop;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    InsufficientFunds { balance: i64, price: i64 },
    Internal(String),
}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(message) => ApiError::NotFound(message),
            ServiceError::Validation(message) => ApiError::BadRequest(message),
            ServiceError::InsufficientFunds { balance, price } => {
                ApiError::InsufficientFunds { balance, price }
            }
            ServiceError::OutOfStock => ApiError::BadRequest(err.to_string()),
            ServiceError::Forbidden(message) => ApiError::Forbidden(message),
            ServiceError::Conflict(message) => ApiError::Conflict(message),
            ServiceError::Locked(_) => ApiError::Conflict(err.to_string()),
            other => {
                tracing::error!(error = %other, "Request failed");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, json!({ "error": message }))
            }
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, json!({ "error": message })),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, json!({ "error": message })),
            ApiError::InsufficientFunds { balance, price } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Not enough coins", "balance": balance, "price": price }),
            ),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
            }
        };
        (status, Json(body)).into_response()
    }
}

/// The authenticated user's id. The auth middleware has already checked it parses.
pub(crate) fn current_user(claims: &JwtClaims) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))
}

pub(crate) fn validate_request<T: Validate>(req: &T) -> Result<(), ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mongo_health = check_mongodb(&state).await;
    let redis_health = check_redis(&state).await;

    let all_healthy = [&mongo_health, &redis_health]
        .iter()
        .all(|dep| dep.get("status").and_then(|v| v.as_str()) == Some("healthy"));

    let (status_code, status) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "eduverse-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": {
                "mongodb": mongo_health,
                "redis": redis_health,
            }
        })),
    )
}

async fn check_mongodb(state: &AppState) -> serde_json::Value {
    match tokio::time::timeout(
        std::time::Duration::from_secs(1),
        state.mongo.run_command(mongodb::bson::doc! { "ping": 1 }),
    )
    .await
    {
        Ok(Ok(_)) => json!({ "status": "healthy" }),
        Ok(Err(e)) => json!({ "status": "unhealthy", "error": format!("MongoDB error: {}", e) }),
        Err(_) => json!({ "status": "unhealthy", "error": "MongoDB timeout after 1s" }),
    }
}

async fn check_redis(state: &AppState) -> serde_json::Value {
    let mut conn = state.redis.clone();
    match tokio::time::timeout(
        std::time::Duration::from_millis(500),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    {
        Ok(Ok(_)) => json!({ "status": "healthy" }),
        Ok(Err(e)) => json!({ "status": "unhealthy", "error": format!("Redis error: {}", e) }),
        Err(_) => json!({ "status": "unhealthy", "error": "Redis timeout after 500ms" }),
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// `user:password` from a Basic authorization header
fn basic_credentials(headers: &HeaderMap) -> Option<String> {
    let encoded = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    String::from_utf8(decoded).ok()
}

/// Protects /metrics with HTTP Basic auth against `METRICS_AUTH` (`user:password`)
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let credentials = basic_credentials(&headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());

    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
