mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{bearer, spawn_app, ADMIN, ORGANIZER, STUDENT};

#[tokio::test]
async fn test_admin_logs_in_with_email() {
    let app = spawn_app().await;
    let (token, user) = app.login(ADMIN.0, ADMIN.1).await;
    assert!(!token.is_empty());
    assert_eq!(user["role_name"], "Admin");
    assert!(user.get("password").is_none());

    let me = bearer(app.server.get("/api/v1/auth/me"), &token).await;
    assert_eq!(me.status_code(), StatusCode::OK);
    assert_eq!(me.json::<Value>()["email"], ADMIN.0);
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let app = spawn_app().await;
    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "identifier": ADMIN.0, "password": "not-the-password" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_demo_student_without_username_uses_email() {
    let app = spawn_app().await;
    let (_, user) = app.login(STUDENT.0, STUDENT.1).await;
    assert_eq!(user["role_name"], "Student");
    assert!(user["username"].is_null());
}

#[tokio::test]
async fn test_student_with_username_must_use_it() {
    let app = spawn_app().await;
    app.create_student(Some("cs2024001"), "asha@campus.edu", "password123")
        .await;

    let by_email = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "identifier": "asha@campus.edu", "password": "password123" }))
        .await;
    assert_eq!(by_email.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        by_email.json::<Value>()["message"],
        "Students must login using username."
    );

    let (_, user) = app.login("cs2024001", "password123").await;
    assert_eq!(user["email"], "asha@campus.edu");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = spawn_app().await;
    let response = app.server.get("/api/v1/auth/me").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let garbage = bearer(app.server.get("/api/v1/student/dashboard"), "not-a-jwt").await;
    assert_eq!(garbage.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_gates_return_forbidden() {
    let app = spawn_app().await;
    let student = app.token(STUDENT).await;
    let organizer = app.token(ORGANIZER).await;

    let admin_area = bearer(app.server.get("/api/v1/admin/dashboard"), &student).await;
    assert_eq!(admin_area.status_code(), StatusCode::FORBIDDEN);

    let approvals = bearer(app.server.get("/api/v1/approvals/pending"), &organizer).await;
    assert_eq!(approvals.status_code(), StatusCode::FORBIDDEN);

    let student_area = bearer(app.server.get("/api/v1/student/events"), &organizer).await;
    assert_eq!(student_area.status_code(), StatusCode::FORBIDDEN);

    let own_area = bearer(app.server.get("/api/v1/student/events"), &student).await;
    assert_eq!(own_area.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_guest_link_flow() {
    let app = spawn_app().await;

    let disabled = app
        .server
        .post("/api/v1/auth/guest/email")
        .json(&json!({ "email": "visitor@example.org" }))
        .await;
    assert_eq!(disabled.status_code(), StatusCode::FORBIDDEN);

    let admin = app.token(ADMIN).await;
    let toggled = bearer(app.server.post("/api/v1/admin/guest-login/toggle"), &admin).await;
    assert_eq!(toggled.json::<Value>()["guest_enabled"], true);

    let sent = app
        .server
        .post("/api/v1/auth/guest/email")
        .json(&json!({ "email": "visitor@example.org" }))
        .await;
    assert_eq!(sent.status_code(), StatusCode::OK);

    let mail = app.mailer.sent_to("visitor@example.org");
    assert_eq!(mail.len(), 1);
    let token = mail[0]
        .body
        .split("token=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap()
        .to_string();

    let verified = app
        .server
        .get("/api/v1/auth/guest/email/verify")
        .add_query_param("token", &token)
        .await;
    assert_eq!(verified.status_code(), StatusCode::OK);
    let body: Value = verified.json();
    assert_eq!(body["user"]["role_name"], "Guest");
    assert!(body["user"]["username"].as_str().is_some());

    let guest_token = body["token"].as_str().unwrap();
    let events = bearer(app.server.get("/api/v1/student/events"), guest_token).await;
    assert_eq!(events.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_guest_link_rejects_registered_email() {
    let app = spawn_app().await;
    let admin = app.token(ADMIN).await;
    bearer(app.server.post("/api/v1/admin/guest-login/toggle"), &admin).await;

    let response = app
        .server
        .post("/api/v1/auth/guest/email")
        .json(&json!({ "email": STUDENT.0 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let app = spawn_app().await;
    let known = app
        .server
        .post("/api/v1/auth/forgot-password")
        .json(&json!({ "identifier": ORGANIZER.0 }))
        .await;
    let unknown = app
        .server
        .post("/api/v1/auth/forgot-password")
        .json(&json!({ "identifier": "nobody@campus.edu" }))
        .await;
    assert_eq!(known.status_code(), StatusCode::OK);
    assert_eq!(unknown.status_code(), StatusCode::OK);
    assert_eq!(known.text(), unknown.text());
    assert_eq!(app.mailer.sent_to(ORGANIZER.0).len(), 1);
    assert!(app.mailer.sent_to("nobody@campus.edu").is_empty());
}
