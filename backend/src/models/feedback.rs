use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Feedback entry joined with the submitting student's name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Feedback {
    pub feedback_id: i64,
    pub event_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub rating: i64,
    pub comments: Option<String>,
    pub submitted_at: DateTime<Utc>,
}
