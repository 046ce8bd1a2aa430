#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Days, NaiveDate, Utc};
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    Database,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use eduverse_api::{
    authz::Role,
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::season::Season,
    services::{season_service::new_season, AppState},
    utils::time::chrono_to_bson,
};

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: Database,
}

/// Builds the real router against the MongoDB replica set and Redis named in
/// `.env.test`. Panics when either is unavailable.
pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    dotenvy::from_filename(".env.test").ok();

    let config = Config::load().expect("Failed to load test configuration");

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    // Transactions need a replica set; `hello` reports `setName` only on one
    let hello = tokio::time::timeout(
        Duration::from_secs(5),
        mongo_client
            .database("admin")
            .run_command(doc! { "hello": 1 }),
    )
    .await
    .expect("Test MongoDB did not answer within 5s")
    .expect("Test MongoDB rejected the hello command");
    assert!(
        hello.contains_key("setName"),
        "Test MongoDB must run as a replica set (transactions are required)"
    );

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    let state = Arc::new(
        AppState::new(config, mongo_client, redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    let db = state.mongo.clone();
    TestApp {
        router: create_router(state.clone()),
        state,
        db,
    }
}

impl TestApp {
    pub fn token_for(&self, user_id: &ObjectId, role: Role) -> String {
        JwtService::new(&self.state.config.jwt_secret)
            .generate_token(&JwtClaims::new(user_id, role, 3600))
            .unwrap()
    }

    /// Sends a request and returns the status with the parsed JSON body (`Null` when empty).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn seed_user(&self, role: Role, coins: i64) -> ObjectId {
        let id = ObjectId::new();
        let username = format!("{}-{}", role.as_str().to_lowercase(), Uuid::new_v4());
        self.db
            .collection::<Document>("users")
            .insert_one(doc! {
                "_id": id,
                "username": username,
                "role": role.as_str(),
                "coins": coins,
                "points": 0_i64,
                "group_ids": [],
                "createdAt": mongodb::bson::DateTime::now(),
            })
            .await
            .unwrap();
        id
    }

    pub async fn user_doc(&self, id: &ObjectId) -> Document {
        self.db
            .collection::<Document>("users")
            .find_one(doc! { "_id": id })
            .await
            .unwrap()
            .expect("user exists")
    }

    pub async fn coins(&self, id: &ObjectId) -> i64 {
        self.user_doc(id).await.get_i64("coins").unwrap()
    }

    pub async fn points(&self, id: &ObjectId) -> i64 {
        self.user_doc(id).await.get_i64("points").unwrap()
    }

    /// Closes every active season and drops a stale rotation lock so a test
    /// starts from a known state.
    pub async fn reset_seasons(&self) {
        let mut conn = self.state.redis.clone();
        redis::cmd("DEL")
            .arg("season:rotation:lock")
            .query_async::<()>(&mut conn)
            .await
            .unwrap();
        self.db
            .collection::<Document>("seasons")
            .update_many(
                doc! { "is_active": true },
                doc! { "$set": { "is_active": false, "is_completed": true } },
            )
            .await
            .unwrap();
    }

    /// Takes the rotation lock as another holder would, for `ttl_seconds`.
    pub async fn hold_rotation_lock(&self, ttl_seconds: u64) {
        let mut conn = self.state.redis.clone();
        redis::cmd("SET")
            .arg("season:rotation:lock")
            .arg("held-by-another-run")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<()>(&mut conn)
            .await
            .unwrap();
    }

    /// Inserts an active season covering `start..=end`.
    pub async fn seed_season(&self, title: &str, start: NaiveDate, end: NaiveDate) -> Season {
        let mut season = new_season(title.to_string(), start, &self.state.config.season, Utc::now());
        season.end_date = end;
        self.db
            .collection::<Season>("seasons")
            .insert_one(&season)
            .await
            .unwrap();
        season
    }

    pub async fn seed_attempt(
        &self,
        student_id: &ObjectId,
        season_id: &ObjectId,
        score: f64,
        seconds_ago: i64,
    ) {
        let created = Utc::now() - chrono::Duration::seconds(seconds_ago);
        self.db
            .collection::<Document>("typing_attempts")
            .insert_one(doc! {
                "_id": ObjectId::new(),
                "student_id": student_id,
                "season_id": season_id,
                "wpm": score,
                "accuracy": 100.0,
                "score": score,
                "coins_reward": 0_i64,
                "createdAt": chrono_to_bson(created),
            })
            .await
            .unwrap();
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn days_ago(days: u64) -> NaiveDate {
    today().checked_sub_days(Days::new(days)).unwrap()
}

pub fn days_ahead(days: u64) -> NaiveDate {
    today().checked_add_days(Days::new(days)).unwrap()
}
