//! QR attendance scanning, manual marking and bulk upload for online events.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::models::event::{AttendanceWindow, Event, EventMode};
use crate::models::registration::{Attendance, Registration};
use crate::services::certificate_service::CertificateService;
use crate::services::event_service::fetch_event;
use crate::services::metrics_service;
use crate::services::registration_service::QR_PREFIX;
use crate::services::user_service::normalize_header;

const SCAN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ids carried by a registration QR code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrPayload {
    pub event_id: i64,
    pub registration_id: i64,
    pub student_id: i64,
}

/// Strip a scanner URL down to its `code` query parameter, if any.
pub fn raw_qr_code(input: &str) -> String {
    let input = input.trim();
    if input.starts_with("http://") || input.starts_with("https://") {
        if let Ok(parsed) = url::Url::parse(input) {
            if let Some((_, code)) = parsed.query_pairs().find(|(k, _)| k == "code") {
                return code.into_owned();
            }
        }
    }
    input.to_string()
}

/// Parse `CE-<event_id>-<registration_id>-<student_id>-<nonce>`, raw or
/// embedded in a URL as `?code=`.
pub fn parse_qr_code(input: &str) -> Option<QrPayload> {
    let code = raw_qr_code(input);
    let mut parts = code.split('-');
    if parts.next()? != QR_PREFIX {
        return None;
    }
    let event_id = parts.next()?.parse().ok()?;
    let registration_id = parts.next()?.parse().ok()?;
    let student_id = parts.next()?.parse().ok()?;
    let nonce = parts.next()?;
    if nonce.is_empty() || parts.next().is_some() {
        return None;
    }
    Some(QrPayload {
        event_id,
        registration_id,
        student_id,
    })
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScanRequest {
    pub qr_code: String,
    pub event_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Success,
    Duplicate,
    Invalid,
}

/// Scanner response. Every outcome is a 200 except an unowned event.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanResult {
    pub status: ScanStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_time: Option<String>,
}

impl ScanResult {
    fn invalid(message: impl Into<String>, event: &Event) -> Self {
        Self {
            status: ScanStatus::Invalid,
            message: message.into(),
            student_name: None,
            student_email: None,
            event_name: Some(event.title.clone()),
            timestamp: None,
            scan_time: None,
        }
    }

    fn with_student(mut self, name: &str, email: Option<&str>) -> Self {
        self.student_name = Some(name.to_string());
        self.student_email = email.map(str::to_string);
        self
    }
}

/// Window check shared by scanning and manual marking.
pub fn window_message(event: &Event, now: NaiveDateTime) -> Option<String> {
    match event.attendance_window(now) {
        AttendanceWindow::Open => None,
        AttendanceWindow::NotStarted => Some(format!(
            "Event has not started yet. Scanning begins at {}.",
            event.start_time.format("%H:%M")
        )),
        AttendanceWindow::Expired => {
            Some("Attendance marking window has expired (3 days after event).".to_string())
        }
    }
}

/// Normalized header names accepted for the email column.
pub const EMAIL_HEADERS: &[&str] = &[
    "email",
    "email_address",
    "student_email",
    "user_email",
    "email_id",
    "mail",
];

/// Normalized header names accepted for the username column.
pub const USERNAME_HEADERS: &[&str] = &[
    "username",
    "user_id",
    "roll_no",
    "roll_number",
    "student_id",
    "register_no",
    "reg_no",
    "registration_no",
];

/// Tally of an attendance sheet upload.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AttendanceUploadReport {
    pub marked: usize,
    pub already_marked: usize,
    pub not_registered: usize,
    pub invalid: usize,
}

fn column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| h == alias))
}

pub struct AttendanceService {
    db: SqlitePool,
}

impl AttendanceService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn registration_by_code(&self, code: &str) -> Result<Option<Registration>> {
        sqlx::query_as("SELECT * FROM registrations WHERE qr_code = ?")
            .bind(code)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn registration_by_id(&self, registration_id: i64) -> Result<Option<Registration>> {
        sqlx::query_as("SELECT * FROM registrations WHERE registration_id = ?")
            .bind(registration_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn attendance_for(&self, registration_id: i64) -> Result<Option<Attendance>> {
        sqlx::query_as("SELECT * FROM attendance WHERE registration_id = ?")
            .bind(registration_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn student(&self, student_id: i64) -> Result<Option<(String, Option<String>)>> {
        sqlx::query_as("SELECT full_name, email FROM users WHERE user_id = ?")
            .bind(student_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert the attendance row, then issue the certificate. Certificate
    /// failures are logged and do not undo attendance.
    async fn record(&self, registration: &Registration, scanned_by: i64) -> Result<Attendance> {
        sqlx::query(
            "INSERT INTO attendance (registration_id, scan_time, scanned_by, status) VALUES (?, ?, ?, 'present')",
        )
        .bind(registration.registration_id)
        .bind(Utc::now())
        .bind(scanned_by)
        .execute(&self.db)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => AppError::Conflict(
                "Attendance already recorded for this student.".to_string(),
            ),
            _ => AppError::Database(e.to_string()),
        })?;

        if let Err(e) = CertificateService::new(self.db.clone())
            .issue(registration.student_id, registration.event_id)
            .await
        {
            tracing::warn!(
                registration_id = registration.registration_id,
                error = %e,
                "Certificate generation failed"
            );
        }

        self.attendance_for(registration.registration_id)
            .await?
            .ok_or_else(|| AppError::Internal("Attendance missing after insert".to_string()))
    }

    /// Validate a scanned code against an event owned by `organizer_id`.
    pub async fn scan(
        &self,
        organizer_id: i64,
        req: &ScanRequest,
        now: NaiveDateTime,
    ) -> Result<ScanResult> {
        let qr_code = req.qr_code.trim();
        if qr_code.is_empty() {
            return Err(AppError::Validation("QR code is required".to_string()));
        }

        let event = match fetch_event(&self.db, req.event_id).await? {
            Some(event) if event.organizer_id == organizer_id => event,
            _ => {
                return Err(AppError::Authorization(
                    "Event not found or access denied".to_string(),
                ))
            }
        };

        let result = self.evaluate(&event, qr_code, organizer_id, now).await?;
        let outcome = match result.status {
            ScanStatus::Success => "success",
            ScanStatus::Duplicate => "duplicate",
            ScanStatus::Invalid => "invalid",
        };
        metrics_service::record_attendance_scan(outcome);
        tracing::info!(event_id = event.event_id, outcome, "QR code scanned");
        Ok(result)
    }

    async fn evaluate(
        &self,
        event: &Event,
        qr_code: &str,
        organizer_id: i64,
        now: NaiveDateTime,
    ) -> Result<ScanResult> {
        let Some(payload) = parse_qr_code(qr_code) else {
            return Ok(ScanResult::invalid(
                "Invalid QR code format. Please scan a valid registration QR code.",
                event,
            ));
        };

        let registration = match self.registration_by_code(&raw_qr_code(qr_code)).await? {
            Some(registration) => Some(registration),
            None => self.registration_by_id(payload.registration_id).await?,
        };
        let Some(registration) = registration else {
            return Ok(ScanResult::invalid(
                "Registration not found. This QR code may be invalid or expired.",
                event,
            ));
        };

        if registration.event_id != event.event_id {
            return Ok(ScanResult::invalid(
                "This QR code is for a different event.",
                event,
            ));
        }

        let Some((name, email)) = self.student(registration.student_id).await? else {
            return Ok(ScanResult::invalid("Student record not found.", event));
        };

        if let Some(message) = window_message(event, now) {
            let mut result = ScanResult::invalid(message, event);
            result.student_name = Some(name);
            return Ok(result);
        }

        if let Some(existing) = self.attendance_for(registration.registration_id).await? {
            return Ok(ScanResult {
                status: ScanStatus::Duplicate,
                message: "Attendance already recorded for this student.".to_string(),
                scan_time: Some(existing.scan_time.format(SCAN_TIME_FORMAT).to_string()),
                ..ScanResult::invalid("", event)
            }
            .with_student(&name, email.as_deref()));
        }

        let attendance = self.record(&registration, organizer_id).await?;
        Ok(ScanResult {
            status: ScanStatus::Success,
            message: "Attendance marked successfully!".to_string(),
            timestamp: Some(attendance.scan_time.format(SCAN_TIME_FORMAT).to_string()),
            ..ScanResult::invalid("", event)
        }
        .with_student(&name, email.as_deref()))
    }

    /// Organizer marks a registration present without a scan.
    pub async fn mark_manual(
        &self,
        registration_id: i64,
        organizer_id: i64,
        now: NaiveDateTime,
    ) -> Result<Attendance> {
        let registration = self
            .registration_by_id(registration_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))?;
        let event = fetch_event(&self.db, registration.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        if event.organizer_id != organizer_id {
            return Err(AppError::Authorization("Access denied".to_string()));
        }

        if self
            .attendance_for(registration.registration_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Attendance already marked for this registration".to_string(),
            ));
        }
        match event.attendance_window(now) {
            AttendanceWindow::Open => {}
            AttendanceWindow::NotStarted => {
                return Err(AppError::Validation(
                    "Cannot mark attendance before the event start time".to_string(),
                ))
            }
            AttendanceWindow::Expired => {
                return Err(AppError::Validation(
                    "Attendance marking window has expired (3 days).".to_string(),
                ))
            }
        }

        let attendance = self.record(&registration, organizer_id).await?;
        metrics_service::record_attendance_scan("manual");
        tracing::info!(registration_id, event_id = event.event_id, "Attendance marked manually");
        Ok(attendance)
    }

    /// `(registration, lower-cased email, lower-cased username)` for every
    /// registration of the event.
    async fn registrants(
        &self,
        event_id: i64,
    ) -> Result<Vec<(Registration, Option<String>, Option<String>)>> {
        let registrations: Vec<Registration> =
            sqlx::query_as("SELECT * FROM registrations WHERE event_id = ?")
                .bind(event_id)
                .fetch_all(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        let mut out = Vec::with_capacity(registrations.len());
        for registration in registrations {
            let identity: Option<(Option<String>, Option<String>)> =
                sqlx::query_as("SELECT email, username FROM users WHERE user_id = ?")
                    .bind(registration.student_id)
                    .fetch_optional(&self.db)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            let (email, username) = identity.unwrap_or_default();
            let clean = |v: Option<String>| {
                v.map(|v| v.trim().to_lowercase()).filter(|v| !v.is_empty())
            };
            out.push((registration, clean(email), clean(username)));
        }
        Ok(out)
    }

    /// Mark attendance for an online event from a CSV sheet of participants.
    ///
    /// Rows are matched to registrations by email, then by username. A
    /// registration listed more than once counts once.
    pub async fn upload_attendance(
        &self,
        event_id: i64,
        organizer_id: i64,
        csv_text: &str,
        now: NaiveDateTime,
    ) -> Result<AttendanceUploadReport> {
        let event = match fetch_event(&self.db, event_id).await? {
            Some(event) if event.organizer_id == organizer_id => event,
            _ => {
                return Err(AppError::Authorization(
                    "Event not found or access denied".to_string(),
                ))
            }
        };
        if event.mode() != EventMode::Online {
            return Err(AppError::Validation(
                "Attendance upload is available only for online events.".to_string(),
            ));
        }
        match event.attendance_window(now) {
            AttendanceWindow::Open => {}
            AttendanceWindow::NotStarted => {
                return Err(AppError::Validation(
                    "Cannot upload attendance before the event start time.".to_string(),
                ))
            }
            AttendanceWindow::Expired => {
                return Err(AppError::Validation(
                    "Attendance upload window has expired (3 days).".to_string(),
                ))
            }
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(csv_text.as_bytes());
        let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
        if headers.iter().all(String::is_empty) {
            return Err(AppError::Validation("The uploaded file is empty.".to_string()));
        }
        let email_col = column(&headers, EMAIL_HEADERS);
        let username_col = column(&headers, USERNAME_HEADERS);
        if email_col.is_none() && username_col.is_none() {
            return Err(AppError::Validation(
                "No Email or Username column found. Please include Email/Username in the file."
                    .to_string(),
            ));
        }

        let registrants = self.registrants(event.event_id).await?;
        let mut by_email: HashMap<&str, &Registration> = HashMap::new();
        let mut by_username: HashMap<&str, &Registration> = HashMap::new();
        for (registration, email, username) in &registrants {
            if let Some(email) = email {
                by_email.insert(email.as_str(), registration);
            }
            if let Some(username) = username {
                by_username.insert(username.as_str(), registration);
            }
        }

        let mut report = AttendanceUploadReport::default();
        let mut seen = HashSet::new();
        let mut matched: Vec<&Registration> = Vec::new();

        for record in reader.records() {
            let record = record?;
            let cell = |idx: Option<usize>| {
                idx.and_then(|i| record.get(i))
                    .map(|v| v.trim().to_lowercase())
                    .filter(|v| !v.is_empty())
            };
            let email = cell(email_col);
            let username = cell(username_col);
            if email.is_none() && username.is_none() {
                report.invalid += 1;
                continue;
            }

            let registration = email
                .as_deref()
                .and_then(|e| by_email.get(e))
                .or_else(|| username.as_deref().and_then(|u| by_username.get(u)));
            let Some(registration) = registration.copied() else {
                report.not_registered += 1;
                continue;
            };
            if seen.insert(registration.registration_id) {
                matched.push(registration);
            }
        }

        for registration in matched {
            if self
                .attendance_for(registration.registration_id)
                .await?
                .is_some()
            {
                report.already_marked += 1;
                continue;
            }
            match self.record(registration, organizer_id).await {
                Ok(_) => report.marked += 1,
                Err(AppError::Conflict(_)) => report.already_marked += 1,
                Err(e) => return Err(e),
            }
        }

        metrics_service::record_attendance_upload(report.marked);
        tracing::info!(
            event_id = event.event_id,
            marked = report.marked,
            already_marked = report.already_marked,
            not_registered = report.not_registered,
            invalid = report.invalid,
            "Attendance sheet uploaded"
        );
        Ok(report)
    }
}
