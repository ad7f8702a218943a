mod common;

use axum::http::StatusCode;
use chrono::NaiveTime;
use serde_json::{json, Value};

use campus_events_backend::services::attendance_service::AttendanceService;

use common::{bearer, spawn_app, tomorrow, TestApp, ORGANIZER, STUDENT};

const PASSWORD: &str = "password123";

/// Create students with the given usernames and return their tokens.
async fn students(app: &TestApp, usernames: &[&str]) -> Vec<String> {
    let mut tokens = Vec::new();
    for &username in usernames {
        app.create_student(Some(username), &format!("{}@campus.edu", username), PASSWORD)
            .await;
        tokens.push(app.token((username, PASSWORD)).await);
    }
    tokens
}

async fn approved_team_event(app: &TestApp, overrides: Value) -> i64 {
    let organizer = app.token(ORGANIZER).await;
    let mut payload = json!({
        "title": "Capture the Flag",
        "is_team_event": true,
        "min_team_size": 2,
        "max_team_size": 2,
        "has_prizes": true,
    });
    if let (Some(base), Some(extra)) = (payload.as_object_mut(), overrides.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    let event = app.create_event(&organizer, payload).await;
    let event_id = event["event_id"].as_i64().unwrap();
    app.approve_fully(event_id).await;
    event_id
}

async fn create_team(app: &TestApp, token: &str, event_id: i64, name: &str) -> axum_test::TestResponse {
    bearer(
        app.server
            .post(&format!("/api/v1/student/events/{}/teams", event_id)),
        token,
    )
    .json(&json!({ "team_name": name }))
    .await
}

async fn invite(app: &TestApp, token: &str, team_id: i64, username: &str) -> axum_test::TestResponse {
    bearer(
        app.server
            .post(&format!("/api/v1/student/teams/{}/invitations", team_id)),
        token,
    )
    .json(&json!({ "username": username }))
    .await
}

async fn invitation_status(app: &TestApp, invitation_id: i64) -> String {
    sqlx::query_scalar("SELECT status FROM team_invitations WHERE invitation_id = ?")
        .bind(invitation_id)
        .fetch_one(&app.state.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_team_creation_and_invitation_rules() {
    let app = spawn_app().await;
    let event_id = approved_team_event(&app, json!({})).await;
    let tokens = students(&app, &["lead01", "mate01", "mate02", "rival01"]).await;
    let (leader, mate, second_mate, rival) = (&tokens[0], &tokens[1], &tokens[2], &tokens[3]);

    let created = create_team(&app, leader, event_id, "  Null Pointers ").await;
    assert_eq!(created.status_code(), StatusCode::CREATED, "{}", created.text());
    let team: Value = created.json();
    assert_eq!(team["team_name"], "Null Pointers");
    let team_id = team["team_id"].as_i64().unwrap();

    // Individual registration is closed for team events.
    let solo = bearer(
        app.server
            .post(&format!("/api/v1/student/events/{}/register", event_id)),
        mate,
    )
    .await;
    assert_eq!(solo.status_code(), StatusCode::BAD_REQUEST);

    let duplicate = create_team(&app, rival, event_id, "Null Pointers").await;
    assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
    let rival_team = create_team(&app, rival, event_id, "Segfaults").await;
    assert_eq!(rival_team.status_code(), StatusCode::CREATED);

    let not_leader = invite(&app, mate, team_id, "mate02").await;
    assert_eq!(not_leader.status_code(), StatusCode::FORBIDDEN);

    let myself = invite(&app, leader, team_id, "lead01").await;
    assert_eq!(myself.status_code(), StatusCode::BAD_REQUEST);

    let registered = invite(&app, leader, team_id, "rival01").await;
    assert_eq!(registered.status_code(), StatusCode::CONFLICT);

    let unknown = invite(&app, leader, team_id, "nobody").await;
    assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);

    let sent = invite(&app, leader, team_id, "mate01").await;
    assert_eq!(sent.status_code(), StatusCode::CREATED, "{}", sent.text());
    let again = invite(&app, leader, team_id, "mate01").await;
    assert_eq!(again.status_code(), StatusCode::CONFLICT);

    let inbox = bearer(app.server.get("/api/v1/student/invitations"), mate).await;
    let inbox: Vec<Value> = inbox.json();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["team_name"], "Null Pointers");

    // Someone else cannot answer the invitation.
    let invitation_id = inbox[0]["invitation_id"].as_i64().unwrap();
    let hijack = bearer(
        app.server
            .post(&format!("/api/v1/student/invitations/{}/accept", invitation_id)),
        second_mate,
    )
    .await;
    assert_eq!(hijack.status_code(), StatusCode::FORBIDDEN);

    let view = bearer(app.server.get(&format!("/api/v1/student/teams/{}", team_id)), leader).await;
    let view: Value = view.json();
    assert_eq!(view["is_leader"], true);
    assert_eq!(view["pending_invitations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_accepting_into_full_team_is_refused() {
    let app = spawn_app().await;
    let event_id = approved_team_event(&app, json!({})).await;
    let tokens = students(&app, &["lead02", "mate03", "mate04"]).await;
    let (leader, first, second) = (&tokens[0], &tokens[1], &tokens[2]);

    let team_id = create_team(&app, leader, event_id, "Borrow Checkers")
        .await
        .json::<Value>()["team_id"]
        .as_i64()
        .unwrap();

    // Both invitations go out while one seat is still free.
    let first_invite = invite(&app, leader, team_id, "mate03").await.json::<Value>()["invitation_id"]
        .as_i64()
        .unwrap();
    let second_invite = invite(&app, leader, team_id, "mate04").await.json::<Value>()["invitation_id"]
        .as_i64()
        .unwrap();

    let accepted = bearer(
        app.server
            .post(&format!("/api/v1/student/invitations/{}/accept", first_invite)),
        first,
    )
    .await;
    assert_eq!(accepted.status_code(), StatusCode::OK, "{}", accepted.text());
    assert_eq!(accepted.json::<Value>()["status"], "accepted");

    let full = bearer(
        app.server
            .post(&format!("/api/v1/student/invitations/{}/accept", second_invite)),
        second,
    )
    .await;
    assert_eq!(full.status_code(), StatusCode::CONFLICT);
    assert_eq!(full.json::<Value>()["message"], "Team is already full");
    assert_eq!(invitation_status(&app, second_invite).await, "rejected");

    let inbox = bearer(app.server.get("/api/v1/student/invitations"), second).await;
    assert!(inbox.json::<Vec<Value>>().is_empty());

    // The team is full, so the leader cannot invite more.
    app.create_student(Some("mate05"), "mate05@campus.edu", PASSWORD)
        .await;
    let more = invite(&app, leader, team_id, "mate05").await;
    assert_eq!(more.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_team_prize_needs_minimum_attendance() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    let organizer_id = app.login(ORGANIZER.0, ORGANIZER.1).await.1["user_id"]
        .as_i64()
        .unwrap();
    let event_id = approved_team_event(&app, json!({})).await;
    let tokens = students(&app, &["lead03", "mate06"]).await;

    let team_id = create_team(&app, &tokens[0], event_id, "Lifetimes")
        .await
        .json::<Value>()["team_id"]
        .as_i64()
        .unwrap();
    let invitation_id = invite(&app, &tokens[0], team_id, "mate06").await.json::<Value>()
        ["invitation_id"]
        .as_i64()
        .unwrap();
    bearer(
        app.server
            .post(&format!("/api/v1/student/invitations/{}/accept", invitation_id)),
        &tokens[1],
    )
    .await;

    let detail = bearer(
        app.server.get(&format!("/api/v1/organizer/events/{}", event_id)),
        &organizer,
    )
    .await
    .json::<Value>();
    let registration_ids: Vec<i64> = detail["registrations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["registration_id"].as_i64())
        .collect();
    assert_eq!(registration_ids.len(), 2);

    let prize = json!({ "team_id": team_id, "prize_position": "1st", "prize_title": "Best Exploit" });
    let assign = |body: Value| {
        bearer(
            app.server
                .post(&format!("/api/v1/organizer/events/{}/prizes/team", event_id)),
            &organizer,
        )
        .json(&body)
    };

    let attendance = AttendanceService::new(app.state.db.clone());
    let during = tomorrow().and_time(NaiveTime::from_hms_opt(11, 0, 0).unwrap());
    attendance
        .mark_manual(registration_ids[0], organizer_id, during)
        .await
        .unwrap();

    let short = assign(prize.clone()).await;
    assert_eq!(short.status_code(), StatusCode::BAD_REQUEST);
    assert!(short.json::<Value>()["message"]
        .as_str()
        .unwrap()
        .contains("At least 2 team members"));

    attendance
        .mark_manual(registration_ids[1], organizer_id, during)
        .await
        .unwrap();
    let awarded = assign(prize).await;
    assert_eq!(awarded.status_code(), StatusCode::OK, "{}", awarded.text());
    assert_eq!(awarded.json::<Value>()["certificates_updated"], 2);

    let certificates = bearer(app.server.get("/api/v1/student/certificates"), &tokens[1]).await;
    let certificates: Vec<Value> = certificates.json();
    let won = certificates
        .iter()
        .find(|c| c["event_id"].as_i64() == Some(event_id))
        .unwrap();
    assert_eq!(won["prize_text"], "1st - Best Exploit");

    // Individual prizes do not apply to team events.
    let individual = bearer(
        app.server
            .post(&format!("/api/v1/organizer/events/{}/prizes/individual", event_id)),
        &organizer,
    )
    .json(&json!({ "registration_id": registration_ids[0], "prize_position": "2nd" }))
    .await;
    assert_eq!(individual.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_individual_prize_rules() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    let organizer_id = app.login(ORGANIZER.0, ORGANIZER.1).await.1["user_id"]
        .as_i64()
        .unwrap();

    let quiz = app
        .create_event(&organizer, json!({ "title": "Rust Quiz", "has_prizes": true }))
        .await["event_id"]
        .as_i64()
        .unwrap();
    let talk = app
        .create_event(
            &organizer,
            json!({ "title": "Tech Talk", "start_time": "13:00", "end_time": "14:00" }),
        )
        .await["event_id"]
        .as_i64()
        .unwrap();
    app.approve_fully(quiz).await;
    app.approve_fully(talk).await;

    let student = app.token(STUDENT).await;
    let tokens = students(&app, &["quiz01"]).await;
    let mut registrations = Vec::new();
    for (event_id, token) in [(quiz, &student), (quiz, &tokens[0]), (talk, &student)] {
        let registered = bearer(
            app.server
                .post(&format!("/api/v1/student/events/{}/register", event_id)),
            token,
        )
        .await;
        assert_eq!(registered.status_code(), StatusCode::CREATED);
        registrations.push(registered.json::<Value>()["registration_id"].as_i64().unwrap());
    }
    let (present, absent, talk_registration) = (registrations[0], registrations[1], registrations[2]);

    let attendance = AttendanceService::new(app.state.db.clone());
    let during = tomorrow().and_time(NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    attendance.mark_manual(present, organizer_id, during).await.unwrap();
    let talk_time = tomorrow().and_time(NaiveTime::from_hms_opt(13, 30, 0).unwrap());
    attendance
        .mark_manual(talk_registration, organizer_id, talk_time)
        .await
        .unwrap();

    let assign = |event_id: i64, registration_id: i64| {
        bearer(
            app.server
                .post(&format!("/api/v1/organizer/events/{}/prizes/individual", event_id)),
            &organizer,
        )
        .json(&json!({ "registration_id": registration_id, "prize_position": "2nd" }))
    };

    let not_attended = assign(quiz, absent).await;
    assert_eq!(not_attended.status_code(), StatusCode::BAD_REQUEST);

    let no_prizes = assign(talk, talk_registration).await;
    assert_eq!(no_prizes.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        no_prizes.json::<Value>()["message"],
        "This event does not have prizes enabled."
    );

    let awarded = assign(quiz, present).await;
    assert_eq!(awarded.status_code(), StatusCode::OK, "{}", awarded.text());

    let certificates = bearer(app.server.get("/api/v1/student/certificates"), &student).await;
    let won = certificates
        .json::<Vec<Value>>()
        .into_iter()
        .find(|c| c["event_id"].as_i64() == Some(quiz))
        .unwrap();
    assert_eq!(won["prize_text"], "2nd Place");
}
