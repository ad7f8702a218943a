//! Registrations, teams, invitations and attendance.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Registration {
    pub registration_id: i64,
    pub event_id: i64,
    pub student_id: i64,
    pub qr_code: String,
    pub registered_at: DateTime<Utc>,
    pub team_id: Option<i64>,
    pub prize_position: Option<String>,
    pub prize_title: Option<String>,
    pub prize_certificate_template_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Team {
    pub team_id: i64,
    pub event_id: i64,
    pub team_name: String,
    pub leader_id: i64,
    pub created_at: DateTime<Utc>,
    pub prize_position: Option<String>,
    pub prize_title: Option<String>,
    pub prize_certificate_template_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// Team invitation joined with team, event and leader names.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct TeamInvitation {
    pub invitation_id: i64,
    pub team_id: i64,
    pub team_name: String,
    pub event_id: i64,
    pub event_title: String,
    pub leader_name: String,
    pub invitee_id: i64,
    pub invitee_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

pub const INVITATION_SELECT: &str = r#"
    SELECT i.invitation_id, i.team_id, t.team_name, t.event_id, e.title AS event_title,
           l.full_name AS leader_name, i.invitee_id, u.full_name AS invitee_name,
           i.status, i.created_at, i.responded_at
    FROM team_invitations i
    JOIN teams t ON t.team_id = i.team_id
    JOIN events e ON e.event_id = t.event_id
    JOIN users l ON l.user_id = t.leader_id
    JOIN users u ON u.user_id = i.invitee_id
"#;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub attendance_id: i64,
    pub registration_id: i64,
    pub scan_time: DateTime<Utc>,
    pub scanned_by: i64,
    pub status: String,
}
