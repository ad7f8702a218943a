mod common;

use axum::http::StatusCode;
use chrono::NaiveTime;
use serde_json::{json, Value};

use campus_events_backend::error::AppError;
use campus_events_backend::services::attendance_service::{
    AttendanceService, AttendanceUploadReport, ScanRequest, ScanStatus,
};
use campus_events_backend::services::feedback_service::{FeedbackService, SubmitFeedbackRequest};

use common::{bearer, spawn_app, tomorrow, ADMIN, HOD, ORGANIZER, PRINCIPAL, STUDENT};

async fn event_status(app: &common::TestApp, event_id: i64) -> String {
    let organizer = app.token(ORGANIZER).await;
    let response = bearer(
        app.server.get(&format!("/api/v1/organizer/events/{}", event_id)),
        &organizer,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK, "{}", response.text());
    response.json::<Value>()["event"]["status"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_event_passes_hod_then_principal() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    let event = app.create_event(&organizer, json!({})).await;
    let event_id = event["event_id"].as_i64().unwrap();
    assert_eq!(event["status"], "pending");

    // The principal's step waits on the HOD.
    let principal = app.token(PRINCIPAL).await;
    assert!(app.pending_for(&principal, event_id).await.is_empty());
    assert_eq!(app.mailer.sent_to(HOD.0).len(), 1);

    let hod = app.token(HOD).await;
    let pending = app.pending_for(&hod, event_id).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["approver_role"], "HOD");
    let hod_step = pending[0]["approval_id"].as_i64().unwrap();
    assert_eq!(app.decide(&hod, hod_step, "approve").await, StatusCode::OK);
    assert_eq!(event_status(&app, event_id).await, "pending");

    // Deciding twice is refused.
    assert_eq!(app.decide(&hod, hod_step, "approve").await, StatusCode::CONFLICT);

    let pending = app.pending_for(&principal, event_id).await;
    assert_eq!(pending.len(), 1);
    let principal_step = pending[0]["approval_id"].as_i64().unwrap();
    assert_eq!(
        app.decide(&principal, principal_step, "approve").await,
        StatusCode::OK
    );
    assert_eq!(event_status(&app, event_id).await, "approved");

    let student = app.token(STUDENT).await;
    let listing = bearer(app.server.get("/api/v1/student/events"), &student).await;
    let ids: Vec<i64> = listing.json::<Value>()["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["event_id"].as_i64())
        .collect();
    assert!(ids.contains(&event_id));
}

#[tokio::test]
async fn test_hod_rejection_closes_the_event() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    let event = app.create_event(&organizer, json!({ "title": "Late Night Gaming" })).await;
    let event_id = event["event_id"].as_i64().unwrap();

    let hod = app.token(HOD).await;
    let step = app.pending_for(&hod, event_id).await[0]["approval_id"]
        .as_i64()
        .unwrap();
    assert_eq!(app.decide(&hod, step, "reject").await, StatusCode::OK);
    assert_eq!(event_status(&app, event_id).await, "rejected");

    let principal = app.token(PRINCIPAL).await;
    assert!(app.pending_for(&principal, event_id).await.is_empty());

    // The principal's step stays closed even when addressed directly.
    let detail = bearer(
        app.server.get(&format!("/api/v1/organizer/events/{}", event_id)),
        &organizer,
    )
    .await;
    let principal_step = detail.json::<Value>()["approvals"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["approver_role"] == "Principal")
        .and_then(|a| a["approval_id"].as_i64())
        .unwrap();
    assert_eq!(
        app.decide(&principal, principal_step, "approve").await,
        StatusCode::CONFLICT
    );
    assert_eq!(event_status(&app, event_id).await, "rejected");

    let notices = app.mailer.sent_to(ORGANIZER.0);
    assert!(notices
        .iter()
        .any(|m| m.subject.contains("Event rejected") && m.body.contains("reject by test")));

    let student = app.token(STUDENT).await;
    let register = bearer(
        app.server
            .post(&format!("/api/v1/student/events/{}/register", event_id)),
        &student,
    )
    .await;
    assert_eq!(register.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_assigned_approver_can_decide() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    let event = app.create_event(&organizer, json!({})).await;
    let event_id = event["event_id"].as_i64().unwrap();

    let hod = app.token(HOD).await;
    let step = app.pending_for(&hod, event_id).await[0]["approval_id"]
        .as_i64()
        .unwrap();
    let principal = app.token(PRINCIPAL).await;
    assert_eq!(
        app.decide(&principal, step, "approve").await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_invalid_event_form_is_rejected() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;

    let backwards = bearer(app.server.post("/api/v1/organizer/events"), &organizer)
        .json(&json!({
            "title": "Backwards",
            "event_date": tomorrow().format("%Y-%m-%d").to_string(),
            "start_time": "12:00",
            "end_time": "10:00",
            "venue_id": common::CS_SEMINAR_HALL,
        }))
        .await;
    assert_eq!(backwards.status_code(), StatusCode::BAD_REQUEST);

    let online_without_link = bearer(app.server.post("/api/v1/organizer/events"), &organizer)
        .json(&json!({
            "title": "Webinar",
            "event_date": tomorrow().format("%Y-%m-%d").to_string(),
            "start_time": "10:00",
            "end_time": "11:00",
            "mode": "online",
        }))
        .await;
    assert_eq!(online_without_link.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_guests_never_see_campus_events() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    let campus = app
        .create_event(&organizer, json!({ "title": "Campus Only", "audience": "campus" }))
        .await;
    let public = app
        .create_event(
            &organizer,
            json!({ "title": "Open Day", "start_time": "13:00", "end_time": "15:00" }),
        )
        .await;
    let campus_id = campus["event_id"].as_i64().unwrap();
    let public_id = public["event_id"].as_i64().unwrap();
    app.approve_fully(campus_id).await;
    app.approve_fully(public_id).await;

    let (guest, _) = app.guest_login("visitor@example.org").await;

    let listing = bearer(app.server.get("/api/v1/student/events"), &guest).await;
    let ids: Vec<i64> = listing.json::<Value>()["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["event_id"].as_i64())
        .collect();
    assert!(ids.contains(&public_id));
    assert!(!ids.contains(&campus_id));

    let register = bearer(
        app.server
            .post(&format!("/api/v1/student/events/{}/register", campus_id)),
        &guest,
    )
    .await;
    assert_eq!(register.status_code(), StatusCode::BAD_REQUEST);

    let student = app.token(STUDENT).await;
    let listing = bearer(app.server.get("/api/v1/student/events"), &student).await;
    let ids: Vec<i64> = listing.json::<Value>()["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["event_id"].as_i64())
        .collect();
    assert!(ids.contains(&campus_id) && ids.contains(&public_id));
}

#[tokio::test]
async fn test_scan_and_feedback() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    let (organizer_id, student_id) = {
        let (_, org) = app.login(ORGANIZER.0, ORGANIZER.1).await;
        let (_, student) = app.login(STUDENT.0, STUDENT.1).await;
        (
            org["user_id"].as_i64().unwrap(),
            student["user_id"].as_i64().unwrap(),
        )
    };

    let workshop = app.create_event(&organizer, json!({})).await;
    let other = app
        .create_event(
            &organizer,
            json!({ "title": "Seminar", "start_time": "14:00", "end_time": "15:00" }),
        )
        .await;
    let workshop_id = workshop["event_id"].as_i64().unwrap();
    let other_id = other["event_id"].as_i64().unwrap();
    app.approve_fully(workshop_id).await;
    app.approve_fully(other_id).await;

    let student = app.token(STUDENT).await;
    let registered = bearer(
        app.server
            .post(&format!("/api/v1/student/events/{}/register", workshop_id)),
        &student,
    )
    .await;
    assert_eq!(registered.status_code(), StatusCode::CREATED);
    let qr_code = registered.json::<Value>()["qr_code"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(qr_code.starts_with(&format!("CE-{}-", workshop_id)));

    let again = bearer(
        app.server
            .post(&format!("/api/v1/student/events/{}/register", workshop_id)),
        &student,
    )
    .await;
    assert_eq!(again.status_code(), StatusCode::CONFLICT);

    let attendance = AttendanceService::new(app.state.db.clone());
    let during = tomorrow().and_time(NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    let before = tomorrow().and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap());

    let early = attendance
        .scan(
            organizer_id,
            &ScanRequest {
                qr_code: qr_code.clone(),
                event_id: workshop_id,
            },
            before,
        )
        .await
        .unwrap();
    assert_eq!(early.status, ScanStatus::Invalid);

    let wrong_event = attendance
        .scan(
            organizer_id,
            &ScanRequest {
                qr_code: qr_code.clone(),
                event_id: other_id,
            },
            during,
        )
        .await
        .unwrap();
    assert_eq!(wrong_event.status, ScanStatus::Invalid);
    assert_eq!(wrong_event.message, "This QR code is for a different event.");

    let first = attendance
        .scan(
            organizer_id,
            &ScanRequest {
                qr_code: format!("{}/scan?code={}", app.state.config.base_url, qr_code),
                event_id: workshop_id,
            },
            during,
        )
        .await
        .unwrap();
    assert_eq!(first.status, ScanStatus::Success);
    assert_eq!(first.student_email.as_deref(), Some(STUDENT.0));

    let second = attendance
        .scan(
            organizer_id,
            &ScanRequest {
                qr_code: qr_code.clone(),
                event_id: workshop_id,
            },
            during,
        )
        .await
        .unwrap();
    assert_eq!(second.status, ScanStatus::Duplicate);

    let feedback = FeedbackService::new(app.state.db.clone());
    let after = tomorrow().and_time(NaiveTime::from_hms_opt(18, 0, 0).unwrap());

    let too_soon = feedback
        .submit(
            workshop_id,
            student_id,
            SubmitFeedbackRequest {
                rating: 4,
                comments: None,
            },
            during,
        )
        .await;
    assert!(matches!(too_soon, Err(AppError::Validation(_))));

    for rating in [0, 6] {
        let out_of_range = feedback
            .submit(
                workshop_id,
                student_id,
                SubmitFeedbackRequest {
                    rating,
                    comments: None,
                },
                after,
            )
            .await;
        assert!(matches!(out_of_range, Err(AppError::Validation(_))));
    }

    let saved = feedback
        .submit(
            workshop_id,
            student_id,
            SubmitFeedbackRequest {
                rating: 5,
                comments: Some("  Great session  ".to_string()),
            },
            after,
        )
        .await
        .unwrap();
    assert_eq!(saved.rating, 5);
    assert_eq!(saved.comments.as_deref(), Some("Great session"));

    let not_attended = feedback
        .submit(
            other_id,
            student_id,
            SubmitFeedbackRequest {
                rating: 3,
                comments: None,
            },
            after,
        )
        .await;
    assert!(matches!(not_attended, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_scan_of_foreign_event_is_forbidden() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    let event = app.create_event(&organizer, json!({})).await;
    let event_id = event["event_id"].as_i64().unwrap();

    let admin = app.token(ADMIN).await;
    let second_organizer = bearer(app.server.post("/api/v1/admin/users"), &admin)
        .json(&json!({
            "full_name": "Second Organizer",
            "email": "org2@campus.edu",
            "password": "password123",
            "role_id": 4,
            "dept_id": 1,
        }))
        .await;
    assert_eq!(second_organizer.status_code(), StatusCode::CREATED);

    let other = app.token(("org2@campus.edu", "password123")).await;
    let response = bearer(app.server.post("/api/v1/organizer/scan"), &other)
        .json(&json!({ "qr_code": "CE-1-1-1-abcdef12", "event_id": event_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_dashboard_tolerates_huge_page_numbers() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    app.create_event(&organizer, json!({})).await;

    let response = bearer(app.server.get("/api/v1/organizer/dashboard"), &organizer)
        .add_query_param("page", i64::MAX)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK, "{}", response.text());
    let body: Value = response.json();
    assert_eq!(body["page"], i64::MAX / 10);
    assert_eq!(body["total"], 1);
    assert!(body["events"].as_array().unwrap().is_empty());

    let first = bearer(app.server.get("/api/v1/organizer/dashboard"), &organizer)
        .add_query_param("page", -3)
        .await;
    assert_eq!(first.json::<Value>()["page"], 1);
}

#[tokio::test]
async fn test_attendance_sheet_upload_for_online_event() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    let organizer_id = app.login(ORGANIZER.0, ORGANIZER.1).await.1["user_id"]
        .as_i64()
        .unwrap();

    let webinar = app
        .create_event(
            &organizer,
            json!({
                "title": "Async Rust Webinar",
                "mode": "online",
                "venue_id": null,
                "meeting_url": "https://meet.example.org/async-rust",
            }),
        )
        .await;
    let webinar_id = webinar["event_id"].as_i64().unwrap();
    let workshop = app
        .create_event(&organizer, json!({ "start_time": "14:00", "end_time": "16:00" }))
        .await;
    let workshop_id = workshop["event_id"].as_i64().unwrap();
    app.approve_fully(webinar_id).await;
    app.approve_fully(workshop_id).await;

    app.create_student(Some("21CS042"), "ana@campus.edu", "password123")
        .await;
    for account in [STUDENT, ("21CS042", "password123")] {
        let token = app.token(account).await;
        let registered = bearer(
            app.server
                .post(&format!("/api/v1/student/events/{}/register", webinar_id)),
            &token,
        )
        .await;
        assert_eq!(registered.status_code(), StatusCode::CREATED, "{}", registered.text());
    }

    // Before the start the route refuses the sheet.
    let early = bearer(
        app.server
            .post(&format!("/api/v1/organizer/events/{}/attendance-upload", webinar_id)),
        &organizer,
    )
    .text("Email\nstudent@campus.edu\n")
    .await;
    assert_eq!(early.status_code(), StatusCode::BAD_REQUEST);

    let sheet = "Student Email,Reg-No\n\
                 student@campus.edu,\n\
                 STUDENT@campus.edu,\n\
                 ,21cs042\n\
                 stranger@campus.edu,\n\
                 ,\n";
    let attendance = AttendanceService::new(app.state.db.clone());
    let during = tomorrow().and_time(NaiveTime::from_hms_opt(11, 0, 0).unwrap());

    let report = attendance
        .upload_attendance(webinar_id, organizer_id, sheet, during)
        .await
        .unwrap();
    assert_eq!(
        report,
        AttendanceUploadReport {
            marked: 2,
            already_marked: 0,
            not_registered: 1,
            invalid: 1,
        }
    );

    let again = attendance
        .upload_attendance(webinar_id, organizer_id, sheet, during)
        .await
        .unwrap();
    assert_eq!(again.marked, 0);
    assert_eq!(again.already_marked, 2);

    let student = app.token(STUDENT).await;
    let certificates = bearer(app.server.get("/api/v1/student/certificates"), &student).await;
    let certificates: Vec<Value> = certificates.json();
    assert!(certificates
        .iter()
        .any(|c| c["event_id"].as_i64() == Some(webinar_id)));

    let no_columns = attendance
        .upload_attendance(webinar_id, organizer_id, "Name\nAna\n", during)
        .await;
    assert!(matches!(no_columns, Err(AppError::Validation(_))));

    let offline = attendance
        .upload_attendance(workshop_id, organizer_id, sheet, during)
        .await;
    assert!(matches!(offline, Err(AppError::Validation(_))));

    let too_late = tomorrow().and_time(NaiveTime::from_hms_opt(12, 1, 0).unwrap())
        + chrono::Duration::days(3);
    let expired = attendance
        .upload_attendance(webinar_id, organizer_id, sheet, too_late)
        .await;
    assert!(matches!(expired, Err(AppError::Validation(_))));

    let foreign = attendance
        .upload_attendance(webinar_id, organizer_id + 1000, sheet, during)
        .await;
    assert!(matches!(foreign, Err(AppError::Authorization(_))));
}

fn event_form(title: &str, start: &str, end: &str) -> Value {
    json!({
        "title": title,
        "description": "Hands-on systems programming",
        "event_date": tomorrow().format("%Y-%m-%d").to_string(),
        "start_time": start,
        "end_time": end,
        "venue_id": common::CS_SEMINAR_HALL,
        "mode": "offline",
    })
}

#[tokio::test]
async fn test_cosmetic_edit_keeps_approval_but_reschedule_restarts_it() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    let event = app.create_event(&organizer, json!({})).await;
    let event_id = event["event_id"].as_i64().unwrap();
    app.approve_fully(event_id).await;
    let url = format!("/api/v1/organizer/events/{}", event_id);

    let renamed = bearer(app.server.put(&url), &organizer)
        .json(&event_form("Rust Workshop II", "10:00", "12:00"))
        .await;
    assert_eq!(renamed.status_code(), StatusCode::OK, "{}", renamed.text());
    let renamed: Value = renamed.json();
    assert_eq!(renamed["submitted_for_approval"], false);
    assert_eq!(renamed["event"]["title"], "Rust Workshop II");
    assert_eq!(event_status(&app, event_id).await, "approved");

    let hod_mail_before = app.mailer.sent_to(HOD.0).len();
    let moved = bearer(app.server.put(&url), &organizer)
        .json(&event_form("Rust Workshop II", "14:00", "16:00"))
        .await;
    assert_eq!(moved.status_code(), StatusCode::OK, "{}", moved.text());
    assert_eq!(moved.json::<Value>()["submitted_for_approval"], true);
    assert_eq!(event_status(&app, event_id).await, "pending");

    let detail = bearer(app.server.get(&url), &organizer).await.json::<Value>();
    let approvals = detail["approvals"].as_array().unwrap();
    assert_eq!(approvals.len(), 2);
    assert!(approvals.iter().all(|a| a["status"] == "pending"));
    assert!(approvals
        .iter()
        .all(|a| a["remarks"] == "Event updated (not new). Approval required."));
    assert_eq!(app.mailer.sent_to(HOD.0).len(), hod_mail_before + 1);

    // The rebuilt chain runs HOD then Principal again.
    let principal = app.token(PRINCIPAL).await;
    assert!(app.pending_for(&principal, event_id).await.is_empty());
    app.approve_fully(event_id).await;
    assert_eq!(event_status(&app, event_id).await, "approved");
}

#[tokio::test]
async fn test_offline_venue_clash() {
    let app = spawn_app().await;
    let organizer = app.token(ORGANIZER).await;
    app.create_event(&organizer, json!({})).await;

    let overlapping = bearer(app.server.post("/api/v1/organizer/events"), &organizer)
        .json(&event_form("Overlap", "11:00", "13:00"))
        .await;
    assert_eq!(overlapping.status_code(), StatusCode::CONFLICT);

    // Back-to-back slots share only the boundary.
    let adjacent = app
        .create_event(&organizer, json!({ "title": "Adjacent", "start_time": "12:00", "end_time": "13:00" }))
        .await;
    let adjacent_id = adjacent["event_id"].as_i64().unwrap();

    let moved_into_clash = bearer(
        app.server
            .put(&format!("/api/v1/organizer/events/{}", adjacent_id)),
        &organizer,
    )
    .json(&event_form("Adjacent", "11:30", "13:00"))
    .await;
    assert_eq!(moved_into_clash.status_code(), StatusCode::CONFLICT);

    // Online events never hold a room.
    app.create_event(
        &organizer,
        json!({
            "title": "Online Overlap",
            "mode": "online",
            "meeting_url": "https://meet.example.org/overlap",
            "start_time": "11:00",
            "end_time": "13:00",
        }),
    )
    .await;
}
