//! Shared harness for HTTP-level tests: an in-memory database prepared the
//! same way as at startup, plus a mailer that records what it sends.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use chrono::{Duration, Local, NaiveDate};
use serde_json::{json, Value};

use campus_events_backend::api::{routes, AppState, SharedState};
use campus_events_backend::config::Config;
use campus_events_backend::error::Result;
use campus_events_backend::launcher;
use campus_events_backend::services::email_service::Mailer;

pub const ADMIN: (&str, &str) = ("admin@campus.edu", "admin123");
pub const PRINCIPAL: (&str, &str) = ("principal@campus.edu", "principal123");
pub const HOD: (&str, &str) = ("hod.cse@campus.edu", "hod12345");
pub const ORGANIZER: (&str, &str) = ("organizer@campus.edu", "organizer123");
pub const STUDENT: (&str, &str) = ("student@campus.edu", "student123");

pub const STUDENT_ROLE_ID: i64 = 5;
pub const CS_SEMINAR_HALL: i64 = 2;

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<SentMail> {
        self.sent().into_iter().filter(|m| m.to == to).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: SharedState,
    pub mailer: Arc<RecordingMailer>,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(Config::for_tests()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let pool = launcher::prepare(&config).await.unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let state = Arc::new(AppState::new(config, pool, mailer.clone(), None));
    let server = TestServer::new(routes::create_router(state.clone())).unwrap();
    TestApp {
        server,
        state,
        mailer,
    }
}

pub fn bearer(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

pub fn today() -> NaiveDate {
    Local::now().naive_local().date()
}

pub fn tomorrow() -> NaiveDate {
    today() + Duration::days(1)
}

impl TestApp {
    /// Log in and return `(token, user)`.
    pub async fn login(&self, identifier: &str, password: &str) -> (String, Value) {
        let response = self
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "identifier": identifier, "password": password }))
            .await;
        assert_eq!(
            response.status_code(),
            StatusCode::OK,
            "login failed for {}: {}",
            identifier,
            response.text()
        );
        let body: Value = response.json();
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"].clone(),
        )
    }

    pub async fn token(&self, account: (&str, &str)) -> String {
        self.login(account.0, account.1).await.0
    }

    /// Create an offline event in the CS Seminar Hall and return its JSON.
    pub async fn create_event(&self, organizer_token: &str, overrides: Value) -> Value {
        let mut payload = json!({
            "title": "Rust Workshop",
            "description": "Hands-on systems programming",
            "event_date": tomorrow().format("%Y-%m-%d").to_string(),
            "start_time": "10:00",
            "end_time": "12:00",
            "venue_id": CS_SEMINAR_HALL,
            "mode": "offline",
        });
        if let (Some(base), Some(extra)) = (payload.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        let response = bearer(self.server.post("/api/v1/organizer/events"), organizer_token)
            .json(&payload)
            .await;
        assert_eq!(
            response.status_code(),
            StatusCode::CREATED,
            "{}",
            response.text()
        );
        response.json::<Value>()["event"].clone()
    }

    /// Pending approvals visible to the approver, restricted to one event.
    pub async fn pending_for(&self, approver_token: &str, event_id: i64) -> Vec<Value> {
        let response = bearer(self.server.get("/api/v1/approvals/pending"), approver_token).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        response
            .json::<Vec<Value>>()
            .into_iter()
            .filter(|a| a["event_id"].as_i64() == Some(event_id))
            .collect()
    }

    pub async fn decide(&self, approver_token: &str, approval_id: i64, action: &str) -> StatusCode {
        bearer(
            self.server
                .post(&format!("/api/v1/approvals/{}/{}", approval_id, action)),
            approver_token,
        )
        .json(&json!({ "remarks": format!("{} by test", action) }))
        .await
        .status_code()
    }

    /// Walk an event through the HOD and Principal steps.
    pub async fn approve_fully(&self, event_id: i64) {
        for account in [HOD, PRINCIPAL] {
            let token = self.token(account).await;
            let pending = self.pending_for(&token, event_id).await;
            assert_eq!(pending.len(), 1, "expected one pending step for {}", account.0);
            let approval_id = pending[0]["approval_id"].as_i64().unwrap();
            assert_eq!(self.decide(&token, approval_id, "approve").await, StatusCode::OK);
        }
    }

    /// Enable guest login, request a link for `email` and follow it.
    /// Returns `(token, user)` of the guest session.
    pub async fn guest_login(&self, email: &str) -> (String, Value) {
        let admin = self.token(ADMIN).await;
        let settings = bearer(self.server.get("/api/v1/admin/guests"), &admin).await;
        if settings.json::<Value>()["settings"]["guest_enabled"] != true {
            bearer(self.server.post("/api/v1/admin/guest-login/toggle"), &admin).await;
        }

        let sent = self
            .server
            .post("/api/v1/auth/guest/email")
            .json(&json!({ "email": email }))
            .await;
        assert_eq!(sent.status_code(), StatusCode::OK, "{}", sent.text());

        let mail = self.mailer.sent_to(email);
        let body = &mail.last().unwrap().body;
        let link_token = body
            .split("token=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap();
        let verified = self
            .server
            .get("/api/v1/auth/guest/email/verify")
            .add_query_param("token", link_token)
            .await;
        assert_eq!(verified.status_code(), StatusCode::OK, "{}", verified.text());
        let body: Value = verified.json();
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"].clone(),
        )
    }

    /// Create a student through the admin API.
    pub async fn create_student(&self, username: Option<&str>, email: &str, password: &str) -> Value {
        let admin = self.token(ADMIN).await;
        let response = bearer(self.server.post("/api/v1/admin/users"), &admin)
            .json(&json!({
                "full_name": "Test Student",
                "username": username,
                "email": email,
                "password": password,
                "role_id": STUDENT_ROLE_ID,
                "dept_id": 1,
            }))
            .await;
        assert_eq!(
            response.status_code(),
            StatusCode::CREATED,
            "{}",
            response.text()
        );
        response.json()
    }
}
