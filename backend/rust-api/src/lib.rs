use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod authz;
pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Public endpoints
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Everything under /api/v1 requires a JWT
        .nest(
            "/api/v1",
            api_routes(app_state.clone()).layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn api_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Only submissions are rate limited; the layer is applied before GET is added
    let typing = post(handlers::game::submit_typing)
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::rate_limit::typing_rate_limit_middleware,
        ))
        .get(handlers::game::list_typing);

    Router::new()
        .route("/typing", typing)
        .route("/seasons/active", get(handlers::game::active_season))
        .route("/leaderboard", get(handlers::game::leaderboard))
        .route("/wallet", get(handlers::game::wallet))
        .route("/shop/items", get(handlers::shop::list_items))
        .route("/shop/buy", post(handlers::shop::buy))
        .route("/shop/orders", get(handlers::shop::list_orders))
        .route("/progress", get(handlers::courses::list_progress))
        .route(
            "/progress/complete-lesson",
            post(handlers::courses::complete_lesson),
        )
        .route(
            "/homework",
            get(handlers::homework::list_mine).post(handlers::homework::submit),
        )
        .route("/homework/pending", get(handlers::homework::list_pending))
        .route("/homework/{id}/review", post(handlers::homework::review))
        .route("/attendance/mark", post(handlers::attendance::mark))
        .route("/attendance", get(handlers::attendance::list))
        .route("/admin/seasons/end", post(handlers::admin::end_season))
        .route("/admin/seasons/rotate", post(handlers::admin::rotate_seasons))
}
