mod common;

use axum::http::StatusCode;
use eduverse_api::{authz::Role, services::is_duplicate_key};
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde_json::json;

async fn seed_group(app: &common::TestApp, teacher: &ObjectId, students: &[ObjectId]) -> ObjectId {
    let id = ObjectId::new();
    app.db
        .collection::<Document>("study_groups")
        .insert_one(doc! {
            "_id": id,
            "name": format!("Group {}", id.to_hex()),
            "teacher_ids": [teacher],
            "student_ids": students.to_vec(),
            "is_active": true,
        })
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn test_assigned_teacher_marks_members_and_skips_strangers() {
    let app = common::create_test_app().await;
    let teacher = app.seed_user(Role::Teacher, 0).await;
    let alice = app.seed_user(Role::Student, 0).await;
    let bob = app.seed_user(Role::Student, 0).await;
    let stranger = app.seed_user(Role::Student, 0).await;
    let group = seed_group(&app, &teacher, &[alice, bob]).await;
    let token = app.token_for(&teacher, Role::Teacher);
    let today = common::today().to_string();

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/attendance/mark",
            Some(&token),
            Some(json!({
                "group_id": group.to_hex(),
                "date": today,
                "records": [
                    { "student_id": alice.to_hex(), "is_present": true },
                    { "student_id": bob.to_hex(), "is_present": false, "notes": "sick" },
                    { "student_id": stranger.to_hex(), "is_present": true },
                ],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 2);
    assert_eq!(body["skipped"][0], stranger.to_hex());

    // Marking again overwrites instead of duplicating
    let (status, _) = app
        .send(
            "POST",
            "/api/v1/attendance/mark",
            Some(&token),
            Some(json!({
                "group_id": group.to_hex(),
                "date": today,
                "records": [{ "student_id": bob.to_hex(), "is_present": true }],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, rows) = app
        .send(
            "GET",
            &format!("/api/v1/attendance?group_id={}&date={}", group.to_hex(), today),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row["is_present"] == true));
}

#[tokio::test]
async fn test_unassigned_teacher_is_forbidden() {
    let app = common::create_test_app().await;
    let owner = app.seed_user(Role::Teacher, 0).await;
    let outsider = app.seed_user(Role::Teacher, 0).await;
    let student = app.seed_user(Role::Student, 0).await;
    let group = seed_group(&app, &owner, &[student]).await;
    let token = app.token_for(&outsider, Role::Teacher);

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/attendance/mark",
            Some(&token),
            Some(json!({
                "group_id": group.to_hex(),
                "date": common::today().to_string(),
                "records": [{ "student_id": student.to_hex(), "is_present": true }],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You are not assigned to this group");
}

#[tokio::test]
async fn test_future_date_and_students_are_rejected() {
    let app = common::create_test_app().await;
    let teacher = app.seed_user(Role::Teacher, 0).await;
    let student = app.seed_user(Role::Student, 0).await;
    let group = seed_group(&app, &teacher, &[student]).await;
    let payload = json!({
        "group_id": group.to_hex(),
        "date": common::days_ahead(1).to_string(),
        "records": [{ "student_id": student.to_hex(), "is_present": true }],
    });

    let teacher_token = app.token_for(&teacher, Role::Teacher);
    let (status, _) = app
        .send("POST", "/api/v1/attendance/mark", Some(&teacher_token), Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let student_token = app.token_for(&student, Role::Student);
    let (status, _) = app
        .send("POST", "/api/v1/attendance/mark", Some(&student_token), Some(payload))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stored = app
        .db
        .collection::<Document>("attendance")
        .count_documents(doc! { "group_id": group })
        .await
        .unwrap();
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn test_attendance_key_is_unique() {
    let app = common::create_test_app().await;
    let records = app.db.collection::<Document>("attendance");
    let row = doc! {
        "student_id": ObjectId::new(),
        "group_id": ObjectId::new(),
        "date": common::today().to_string(),
        "is_present": true,
    };

    records.insert_one(row.clone()).await.unwrap();
    let err = records.insert_one(row).await.unwrap_err();

    assert!(is_duplicate_key(&err));
}
