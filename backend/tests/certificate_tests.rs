mod common;

use axum::http::StatusCode;
use chrono::NaiveTime;
use serde_json::{json, Value};

use campus_events_backend::services::attendance_service::AttendanceService;

use common::{bearer, spawn_app, tomorrow, TestApp, ORGANIZER, STUDENT};

const TEMPLATES: &str = "/api/v1/organizer/certificate-templates";

async fn add_template(app: &TestApp, token: &str, body: Value) -> axum_test::TestResponse {
    bearer(app.server.post(TEMPLATES), token).json(&body).await
}

async fn templates(app: &TestApp, token: &str) -> Vec<Value> {
    bearer(app.server.get(TEMPLATES), token).await.json()
}

fn defaults(list: &[Value]) -> Vec<i64> {
    list.iter()
        .filter(|t| t["is_default"] == true)
        .filter_map(|t| t["template_id"].as_i64())
        .collect()
}

#[tokio::test]
async fn test_exactly_one_default_template() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;

    let first = add_template(&app, &organizer, json!({ "image_url": "uploads/templates/gold.png" })).await;
    assert_eq!(first.status_code(), StatusCode::CREATED, "{}", first.text());
    let first: Value = first.json();
    assert_eq!(first["is_default"], true);
    assert_eq!(first["name"], "Template 1");
    let first_id = first["template_id"].as_i64().unwrap();

    let second = add_template(
        &app,
        &organizer,
        json!({ "name": "Silver", "image_url": "uploads/templates/silver.webp" }),
    )
    .await
    .json::<Value>();
    assert_eq!(second["is_default"], false);
    let second_id = second["template_id"].as_i64().unwrap();

    let promoted = bearer(
        app.server
            .post(&format!("{}/{}/default", TEMPLATES, second_id)),
        &organizer,
    )
    .await;
    assert_eq!(promoted.status_code(), StatusCode::OK);
    assert_eq!(defaults(&templates(&app, &organizer).await), vec![second_id]);

    // Removing the default hands it to the newest remaining template.
    let third_id = add_template(&app, &organizer, json!({ "image_url": "uploads/templates/bronze.jpg" }))
        .await
        .json::<Value>()["template_id"]
        .as_i64()
        .unwrap();
    let deleted = bearer(
        app.server.delete(&format!("{}/{}", TEMPLATES, second_id)),
        &organizer,
    )
    .await;
    assert_eq!(deleted.status_code(), StatusCode::OK);
    let remaining = templates(&app, &organizer).await;
    assert_eq!(remaining.len(), 2);
    assert_eq!(defaults(&remaining), vec![third_id]);
    assert!(remaining
        .iter()
        .any(|t| t["template_id"].as_i64() == Some(first_id)));

    let not_an_image = add_template(&app, &organizer, json!({ "image_url": "uploads/notes.pdf" })).await;
    assert_eq!(not_an_image.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_template_limit_per_organizer() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;

    for n in 0..10 {
        let created = add_template(
            &app,
            &organizer,
            json!({ "image_url": format!("uploads/templates/t{}.png", n) }),
        )
        .await;
        assert_eq!(created.status_code(), StatusCode::CREATED, "{}", created.text());
    }
    let eleventh = add_template(&app, &organizer, json!({ "image_url": "uploads/templates/extra.png" })).await;
    assert_eq!(eleventh.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        eleventh.json::<Value>()["message"],
        "You can upload up to 10 certificate templates only."
    );
    let list = templates(&app, &organizer).await;
    assert_eq!(list.len(), 10);
    assert_eq!(defaults(&list).len(), 1);
}

#[tokio::test]
async fn test_downloaded_certificate_uses_template_layout() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    let organizer_id = app.login(ORGANIZER.0, ORGANIZER.1).await.1["user_id"]
        .as_i64()
        .unwrap();

    let created = add_template(
        &app,
        &organizer,
        json!({
            "name": "Placed",
            "image_url": "uploads/templates/placed.png",
            "positions": { "name": { "x": 50, "y": 42, "font_size": 38 } },
        }),
    )
    .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);

    let bad_layout = add_template(
        &app,
        &organizer,
        json!({ "image_url": "uploads/templates/bad.png", "positions": [1, 2] }),
    )
    .await;
    assert_eq!(bad_layout.status_code(), StatusCode::BAD_REQUEST);

    let event_id = app.create_event(&organizer, json!({})).await["event_id"]
        .as_i64()
        .unwrap();
    app.approve_fully(event_id).await;
    let student = app.token(STUDENT).await;
    let registration_id = bearer(
        app.server
            .post(&format!("/api/v1/student/events/{}/register", event_id)),
        &student,
    )
    .await
    .json::<Value>()["registration_id"]
        .as_i64()
        .unwrap();

    let during = tomorrow().and_time(NaiveTime::from_hms_opt(10, 15, 0).unwrap());
    AttendanceService::new(app.state.db.clone())
        .mark_manual(registration_id, organizer_id, during)
        .await
        .unwrap();

    let certificates: Vec<Value> = bearer(app.server.get("/api/v1/student/certificates"), &student)
        .await
        .json();
    let certificate_id = certificates[0]["certificate_id"].as_i64().unwrap();
    let download = bearer(
        app.server
            .get(&format!("/api/v1/student/certificates/{}/download", certificate_id)),
        &student,
    )
    .await;
    assert_eq!(download.status_code(), StatusCode::OK);
    let html = download.text();
    assert!(html.contains("background-image:url('uploads/templates/placed.png')"));
    assert!(html.contains("left:50%;top:42%"));
    assert!(html.contains("font-size:38px"));
}
