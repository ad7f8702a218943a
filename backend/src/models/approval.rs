//! Approval model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const APPROVAL_SELECT: &str = r#"
    SELECT a.approval_id, a.event_id, e.title AS event_title, e.event_date,
           e.organizer_id, a.approver_id, u.full_name AS approver_name,
           a.approver_role, a.status, a.remarks, a.approved_at
    FROM approvals a
    JOIN events e ON e.event_id = a.event_id
    JOIN users u ON u.user_id = a.approver_id
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// One step of an event's approval chain, joined with event and approver names.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Approval {
    pub approval_id: i64,
    pub event_id: i64,
    pub event_title: String,
    pub event_date: NaiveDate,
    pub organizer_id: i64,
    pub approver_id: i64,
    pub approver_name: String,
    /// `HOD` or `Principal`
    pub approver_role: String,
    pub status: String,
    pub remarks: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Approval {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending.as_str()
    }

    pub fn is_hod_step(&self) -> bool {
        self.approver_role.eq_ignore_ascii_case("hod")
    }
}
