mod common;

use axum::http::StatusCode;
use eduverse_api::{authz::Role, models::season::Season};
use mongodb::bson::{doc, Document};
use serial_test::serial;

async fn active_count(app: &common::TestApp) -> u64 {
    app.db
        .collection::<Document>("seasons")
        .count_documents(doc! { "is_active": true })
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn test_rotation_pays_podium_once_and_opens_next_season() {
    let app = common::create_test_app().await;
    app.reset_seasons().await;

    let season = app
        .seed_season("Season 41", common::days_ago(15), common::days_ago(1))
        .await;
    let first = app.seed_user(Role::Student, 0).await;
    let second = app.seed_user(Role::Student, 0).await;
    let third = app.seed_user(Role::Student, 0).await;
    let fourth = app.seed_user(Role::Student, 0).await;
    app.seed_attempt(&first, &season.id, 60.0, 400).await;
    app.seed_attempt(&first, &season.id, 40.0, 300).await;
    app.seed_attempt(&second, &season.id, 80.0, 200).await;
    app.seed_attempt(&third, &season.id, 50.0, 100).await;
    app.seed_attempt(&fourth, &season.id, 10.0, 50).await;

    let admin = app.seed_user(Role::Admin, 0).await;
    let token = app.token_for(&admin, Role::Admin);

    let (status, report) = app
        .send("POST", "/api/v1/admin/seasons/rotate", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let closed = report["closed"].as_array().unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0]["season_id"], season.id.to_hex());
    assert_eq!(closed[0]["total_awarded"], 600);
    assert_eq!(report["created"]["title"], "Season 42");

    assert_eq!(app.coins(&first).await, 300);
    assert_eq!(app.points(&first).await, 300);
    assert_eq!(app.coins(&second).await, 200);
    assert_eq!(app.coins(&third).await, 100);
    assert_eq!(app.coins(&fourth).await, 0);

    let stored = app
        .db
        .collection::<Season>("seasons")
        .find_one(doc! { "_id": season.id })
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_completed);
    assert!(!stored.is_active);
    assert!(stored.completed_at.is_some());
    assert_eq!(stored.disbursements.len(), 3);
    assert_eq!(stored.disbursements[0].user_id, first);
    assert_eq!(active_count(&app).await, 1);

    // A second run finds nothing expired and pays nobody again
    let (status, report) = app
        .send("POST", "/api/v1/admin/seasons/rotate", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(report["closed"].as_array().unwrap().is_empty());
    assert!(report["created"].is_null());
    assert_eq!(app.coins(&first).await, 300);
    assert_eq!(active_count(&app).await, 1);
}

#[tokio::test]
#[serial]
async fn test_rotation_without_expired_season_keeps_active_one() {
    let app = common::create_test_app().await;
    app.reset_seasons().await;
    let season = app
        .seed_season("Season 7", common::days_ago(2), common::today())
        .await;

    let admin = app.seed_user(Role::Admin, 0).await;
    let token = app.token_for(&admin, Role::Admin);
    let (status, report) = app
        .send("POST", "/api/v1/admin/seasons/rotate", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(report["closed"].as_array().unwrap().is_empty());
    assert!(report["created"].is_null());
    assert_eq!(active_count(&app).await, 1);

    let (_, active) = app
        .send("GET", "/api/v1/seasons/active", Some(&token), None)
        .await;
    assert_eq!(active["season"]["id"], season.id.to_hex());
}

#[tokio::test]
#[serial]
async fn test_rotation_opens_first_season_when_none_exist() {
    let app = common::create_test_app().await;
    app.reset_seasons().await;

    let admin = app.seed_user(Role::Admin, 0).await;
    let token = app.token_for(&admin, Role::Admin);
    let (status, report) = app
        .send("POST", "/api/v1/admin/seasons/rotate", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["created"]["is_active"], true);
    assert_eq!(
        report["created"]["start_date"],
        common::today().to_string()
    );
    assert_eq!(
        report["created"]["end_date"],
        common::days_ahead(14).to_string()
    );
    assert_eq!(active_count(&app).await, 1);
}

#[tokio::test]
#[serial]
async fn test_leaderboard_ranks_with_earliest_entrant_tie_break() {
    let app = common::create_test_app().await;
    app.reset_seasons().await;
    let season = app
        .seed_season("Season 3", common::today(), common::days_ahead(13))
        .await;

    let early = app.seed_user(Role::Student, 0).await;
    let late = app.seed_user(Role::Student, 0).await;
    let trailing = app.seed_user(Role::Student, 0).await;
    // Equal totals; `early` entered first
    app.seed_attempt(&early, &season.id, 50.0, 600).await;
    app.seed_attempt(&early, &season.id, 50.0, 10).await;
    app.seed_attempt(&late, &season.id, 100.0, 300).await;
    app.seed_attempt(&trailing, &season.id, 30.5, 200).await;

    let token = app.token_for(&late, Role::Student);
    let (status, body) = app
        .send("GET", "/api/v1/leaderboard", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["season"]["id"], season.id.to_hex());
    assert!(body["season"]["time_remaining_seconds"].as_i64().unwrap() > 0);

    let board = body["leaderboard"].as_array().unwrap();
    assert_eq!(board.len(), 3);
    assert_eq!(board[0]["user_id"], early.to_hex());
    assert_eq!(board[0]["attempts_count"], 2);
    assert_eq!(board[0]["potential_reward"], 300);
    assert_eq!(board[1]["user_id"], late.to_hex());
    assert_eq!(board[1]["potential_reward"], 200);
    assert_eq!(board[2]["user_id"], trailing.to_hex());
    assert_eq!(board[2]["total_score"], 30.5);
    assert_eq!(body["current_user_rank"], 2);
}

#[tokio::test]
#[serial]
async fn test_leaderboard_without_active_season_is_empty() {
    let app = common::create_test_app().await;
    app.reset_seasons().await;

    let student = app.seed_user(Role::Student, 0).await;
    let token = app.token_for(&student, Role::Student);
    let (status, body) = app
        .send("GET", "/api/v1/leaderboard", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["season"].is_null());
    assert!(body["leaderboard"].as_array().unwrap().is_empty());
    assert!(body["current_user_rank"].is_null());
}

#[tokio::test]
#[serial]
async fn test_admin_can_end_season_early() {
    let app = common::create_test_app().await;
    app.reset_seasons().await;
    let season = app
        .seed_season("Season 9", common::days_ago(3), common::days_ahead(10))
        .await;
    let winner = app.seed_user(Role::Student, 0).await;
    app.seed_attempt(&winner, &season.id, 70.0, 60).await;

    let student_token = app.token_for(&winner, Role::Student);
    let (status, _) = app
        .send("POST", "/api/v1/admin/seasons/end", Some(&student_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.seed_user(Role::Admin, 0).await;
    let token = app.token_for(&admin, Role::Admin);
    let (status, body) = app
        .send("POST", "/api/v1/admin/seasons/end", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["closed"]["season_id"], season.id.to_hex());
    assert_eq!(body["closed"]["trigger"], "manual");
    assert_eq!(body["next_season"]["title"], "Season 10");
    assert_eq!(app.coins(&winner).await, 300);
    assert_eq!(active_count(&app).await, 1);

    // Ending again closes the fresh season, never the paid one
    let (status, body) = app
        .send("POST", "/api/v1/admin/seasons/end", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["closed"]["season_id"], season.id.to_hex());
    assert_eq!(app.coins(&winner).await, 300);
}

#[tokio::test]
#[serial]
async fn test_held_rotation_lock_rejects_rotate_and_end() {
    let app = common::create_test_app().await;
    app.reset_seasons().await;
    let season = app
        .seed_season("Season 12", common::days_ago(15), common::days_ago(1))
        .await;
    let student = app.seed_user(Role::Student, 0).await;
    app.seed_attempt(&student, &season.id, 90.0, 120).await;

    let admin = app.seed_user(Role::Admin, 0).await;
    let token = app.token_for(&admin, Role::Admin);
    app.hold_rotation_lock(60).await;

    let (status, _) = app
        .send("POST", "/api/v1/admin/seasons/rotate", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send("POST", "/api/v1/admin/seasons/end", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let stored = app
        .db
        .collection::<Season>("seasons")
        .find_one(doc! { "_id": season.id })
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_active);
    assert!(!stored.is_completed);
    assert_eq!(app.coins(&student).await, 0);

    // Once the other holder is gone the same run goes through
    app.reset_seasons().await;
    let (status, _) = app
        .send("POST", "/api/v1/admin/seasons/rotate", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_rotation_skips_season_already_claimed() {
    let app = common::create_test_app().await;
    app.reset_seasons().await;
    let season = app
        .seed_season("Season 20", common::days_ago(15), common::days_ago(1))
        .await;
    // Left active but already marked completed, as after a crashed run
    app.db
        .collection::<Document>("seasons")
        .update_one(
            doc! { "_id": season.id },
            doc! { "$set": { "is_completed": true } },
        )
        .await
        .unwrap();
    let student = app.seed_user(Role::Student, 0).await;
    app.seed_attempt(&student, &season.id, 95.0, 120).await;

    let admin = app.seed_user(Role::Admin, 0).await;
    let token = app.token_for(&admin, Role::Admin);
    let (status, report) = app
        .send("POST", "/api/v1/admin/seasons/rotate", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(report["closed"].as_array().unwrap().is_empty());
    assert_eq!(report["skipped"][0], season.id.to_hex());
    assert!(report["created"].is_null());
    assert_eq!(app.coins(&student).await, 0);
    assert_eq!(app.points(&student).await, 0);

    let stored = app
        .db
        .collection::<Season>("seasons")
        .find_one(doc! { "_id": season.id })
        .await
        .unwrap()
        .unwrap();
    assert!(stored.disbursements.is_empty());
}

#[tokio::test]
#[serial]
async fn test_leaderboard_compares_totals_at_cent_precision() {
    let app = common::create_test_app().await;
    app.reset_seasons().await;
    let season = app
        .seed_season("Season 5", common::today(), common::days_ahead(13))
        .await;

    let early = app.seed_user(Role::Student, 0).await;
    let late = app.seed_user(Role::Student, 0).await;
    app.seed_attempt(&early, &season.id, 0.3, 600).await;
    // 0.1 + 0.2 sums to 0.30000000000000004
    app.seed_attempt(&late, &season.id, 0.1, 300).await;
    app.seed_attempt(&late, &season.id, 0.2, 200).await;

    let token = app.token_for(&early, Role::Student);
    let (status, body) = app
        .send("GET", "/api/v1/leaderboard", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let board = body["leaderboard"].as_array().unwrap();
    assert_eq!(board[0]["user_id"], early.to_hex());
    assert_eq!(board[0]["potential_reward"], 300);
    assert_eq!(board[1]["user_id"], late.to_hex());
    assert_eq!(board[1]["total_score"], 0.3);
}
