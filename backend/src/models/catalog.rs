//! Departments and venues.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Department {
    pub dept_id: i64,
    pub dept_name: String,
}

/// Venue joined with its owning department name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Venue {
    pub venue_id: i64,
    pub venue_name: String,
    pub dept_id: Option<i64>,
    pub dept_name: Option<String>,
    pub capacity: i64,
}
