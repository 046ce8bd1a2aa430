use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::sync::Arc;

use super::auth::JwtClaims;
use crate::services::AppState;

const TYPING_RATE_LIMIT: u32 = 30; // submissions per window
const TYPING_RATE_WINDOW_SECONDS: u64 = 60;

const RATE_LIMIT_SCRIPT: &str = r#"
    local key = KEYS[1]
    local limit = tonumber(ARGV[1])
    local window = tonumber(ARGV[2])

    local current = redis.call('GET', key)

    if current == false then
        redis.call('SET', key, 1, 'EX', window)
        return 1
    end

    current = tonumber(current)

    if current >= limit then
        return 0
    end

    redis.call('INCR', key)
    return 1
"#;

fn rate_limit_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1"
}

fn limit_from_env(var: &str, default: u32) -> u32 {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(default)
}

/// Caps typing submissions per user. Runs after `auth_middleware`, so claims are present.
pub async fn typing_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if rate_limit_disabled() {
        tracing::debug!("Rate limiting disabled via RATE_LIMIT_DISABLED=1");
        return Ok(next.run(request).await);
    }

    let Some(user_id) = request
        .extensions()
        .get::<JwtClaims>()
        .map(|claims| claims.sub.clone())
    else {
        return Ok(next.run(request).await);
    };

    let limit = limit_from_env("RATE_LIMIT_TYPING_PER_MINUTE", TYPING_RATE_LIMIT);
    let allowed = check_rate_limit(
        &state.redis,
        &format!("ratelimit:typing:{}", user_id),
        limit,
        TYPING_RATE_WINDOW_SECONDS,
    )
    .await
    .map_err(|e| {
        tracing::error!("Rate limit check failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if !allowed {
        tracing::warn!("Typing rate limit exceeded for user: {}", user_id);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(request).await)
}

/// Fixed-window counter, checked and incremented atomically in Lua
async fn check_rate_limit(
    redis: &ConnectionManager,
    key: &str,
    limit: u32,
    window_secs: u64,
) -> anyhow::Result<bool> {
    let mut conn = redis.clone();

    let allowed: u32 = redis::Script::new(RATE_LIMIT_SCRIPT)
        .key(key)
        .arg(limit)
        .arg(window_secs)
        .invoke_async(&mut conn)
        .await?;

    Ok(allowed == 1)
}
