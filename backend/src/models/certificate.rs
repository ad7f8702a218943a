//! Issued certificates and organizer certificate templates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Certificate joined with its event for listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Certificate {
    pub certificate_id: i64,
    pub student_id: i64,
    pub event_id: i64,
    pub event_title: String,
    pub event_date: NaiveDate,
    pub certificate_url: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct CertificateTemplate {
    pub template_id: i64,
    pub organizer_id: i64,
    pub name: String,
    pub image_url: String,
    pub is_default: bool,
    /// JSON object describing text placement on the template image
    pub positions: Option<String>,
    pub created_at: DateTime<Utc>,
}
