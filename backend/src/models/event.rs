//! Event model and its scheduling helpers.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Days after an event ends during which attendance can still be marked.
pub const ATTENDANCE_GRACE_DAYS: i64 = 3;

/// Column list shared by every query that loads an [`Event`].
pub const EVENT_SELECT: &str = r#"
    SELECT e.event_id, e.title, e.description, e.event_date, e.start_time, e.end_time,
           e.venue_id, v.venue_name, e.dept_id, d.dept_name, e.mode, e.meeting_url,
           e.poster_url, e.certificate_template_id, e.scan_token, e.organizer_id,
           o.full_name AS organizer_name, e.status, e.created_at, e.is_team_event,
           e.min_team_size, e.max_team_size, e.is_campus_exclusive, e.has_prizes,
           e.duty_leave_provided
    FROM events e
    LEFT JOIN venues v ON v.venue_id = e.venue_id
    LEFT JOIN departments d ON d.dept_id = e.dept_id
    LEFT JOIN users o ON o.user_id = e.organizer_id
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventMode {
    Online,
    Offline,
}

impl EventMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }

    /// Anything other than `online` is an offline event.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("online") {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// Where `now` falls relative to an event's attendance window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceWindow {
    NotStarted,
    Open,
    Expired,
}

/// Event entity joined with venue, department and organizer names.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Event {
    pub event_id: i64,
    pub title: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub venue_id: Option<i64>,
    pub venue_name: Option<String>,
    pub dept_id: Option<i64>,
    pub dept_name: Option<String>,
    pub mode: String,
    pub meeting_url: Option<String>,
    pub poster_url: Option<String>,
    pub certificate_template_id: Option<i64>,
    #[serde(skip_serializing)]
    pub scan_token: Option<String>,
    pub organizer_id: i64,
    pub organizer_name: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub is_team_event: bool,
    pub min_team_size: i64,
    pub max_team_size: i64,
    pub is_campus_exclusive: bool,
    pub has_prizes: bool,
    pub duty_leave_provided: bool,
}

impl Event {
    pub fn status(&self) -> Option<EventStatus> {
        EventStatus::parse(&self.status)
    }

    pub fn is_approved(&self) -> bool {
        self.status() == Some(EventStatus::Approved)
    }

    pub fn mode(&self) -> EventMode {
        EventMode::parse(&self.mode)
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.event_date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.event_date.and_time(self.end_time)
    }

    pub fn has_ended(&self, now: NaiveDateTime) -> bool {
        now > self.ends_at()
    }

    /// Attendance may be recorded from the start time until
    /// [`ATTENDANCE_GRACE_DAYS`] after the end time, inclusive.
    pub fn attendance_window(&self, now: NaiveDateTime) -> AttendanceWindow {
        if now < self.starts_at() {
            AttendanceWindow::NotStarted
        } else if now > self.ends_at() + Duration::days(ATTENDANCE_GRACE_DAYS) {
            AttendanceWindow::Expired
        } else {
            AttendanceWindow::Open
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_on(date: NaiveDate, start: (u32, u32), end: (u32, u32)) -> Event {
        Event {
            event_id: 1,
            title: "Hackathon".into(),
            description: "24h".into(),
            event_date: date,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            venue_id: None,
            venue_name: None,
            dept_id: None,
            dept_name: None,
            mode: "offline".into(),
            meeting_url: None,
            poster_url: None,
            certificate_template_id: None,
            scan_token: None,
            organizer_id: 1,
            organizer_name: None,
            status: "approved".into(),
            created_at: Utc::now(),
            is_team_event: false,
            min_team_size: 1,
            max_team_size: 1,
            is_campus_exclusive: false,
            has_prizes: false,
            duty_leave_provided: false,
        }
    }

    #[test]
    fn test_attendance_window_boundaries() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let event = event_on(date, (10, 0), (12, 0));

        let before = date.and_hms_opt(9, 59, 59).unwrap();
        let at_start = date.and_hms_opt(10, 0, 0).unwrap();
        let last_moment = date.and_hms_opt(12, 0, 0).unwrap() + Duration::days(3);
        let after = last_moment + Duration::seconds(1);

        assert_eq!(event.attendance_window(before), AttendanceWindow::NotStarted);
        assert_eq!(event.attendance_window(at_start), AttendanceWindow::Open);
        assert_eq!(event.attendance_window(last_moment), AttendanceWindow::Open);
        assert_eq!(event.attendance_window(after), AttendanceWindow::Expired);
    }

    #[test]
    fn test_has_ended() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let event = event_on(date, (10, 0), (12, 0));
        assert!(!event.has_ended(date.and_hms_opt(12, 0, 0).unwrap()));
        assert!(event.has_ended(date.and_hms_opt(12, 0, 1).unwrap()));
    }

    #[test]
    fn test_status_and_mode_parsing() {
        assert_eq!(EventStatus::parse("Approved"), Some(EventStatus::Approved));
        assert_eq!(EventStatus::parse("draft"), None);
        assert_eq!(EventMode::parse("ONLINE"), EventMode::Online);
        assert_eq!(EventMode::parse("hybrid"), EventMode::Offline);
    }
}
