//! Departments and venues.

use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::models::catalog::{Department, Venue};

const VENUE_SELECT: &str = r#"
    SELECT v.venue_id, v.venue_name, v.dept_id, d.dept_name, v.capacity
    FROM venues v
    LEFT JOIN departments d ON d.dept_id = v.dept_id
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDepartmentRequest {
    pub dept_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVenueRequest {
    pub venue_name: String,
    pub dept_id: Option<i64>,
    pub capacity: i64,
}

pub struct CatalogService {
    db: SqlitePool,
}

impl CatalogService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn list_departments(&self) -> Result<Vec<Department>> {
        sqlx::query_as("SELECT dept_id, dept_name FROM departments ORDER BY dept_name")
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_department(&self, dept_id: i64) -> Result<Option<Department>> {
        sqlx::query_as("SELECT dept_id, dept_name FROM departments WHERE dept_id = ?")
            .bind(dept_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn create_department(&self, req: CreateDepartmentRequest) -> Result<Department> {
        let name = req.dept_name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(
                "Department name is required".to_string(),
            ));
        }
        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM departments WHERE lower(dept_name) = lower(?)")
                .bind(name)
                .fetch_one(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        if existing > 0 {
            return Err(AppError::Conflict(format!(
                "Department '{}' already exists",
                name
            )));
        }

        let result = sqlx::query("INSERT INTO departments (dept_name) VALUES (?)")
            .bind(name)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Department {
            dept_id: result.last_insert_rowid(),
            dept_name: name.to_string(),
        })
    }

    pub async fn list_venues(&self) -> Result<Vec<Venue>> {
        let sql = format!("{} ORDER BY v.venue_name", VENUE_SELECT);
        sqlx::query_as(&sql)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_venue(&self, venue_id: i64) -> Result<Option<Venue>> {
        let sql = format!("{} WHERE v.venue_id = ?", VENUE_SELECT);
        sqlx::query_as(&sql)
            .bind(venue_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn create_venue(&self, req: CreateVenueRequest) -> Result<Venue> {
        let name = req.venue_name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Venue name is required".to_string()));
        }
        if req.capacity <= 0 {
            return Err(AppError::Validation(
                "Capacity must be greater than zero".to_string(),
            ));
        }
        if let Some(dept_id) = req.dept_id {
            if self.find_department(dept_id).await?.is_none() {
                return Err(AppError::Validation("Department not found".to_string()));
            }
        }

        let result =
            sqlx::query("INSERT INTO venues (venue_name, dept_id, capacity) VALUES (?, ?, ?)")
                .bind(name)
                .bind(req.dept_id)
                .bind(req.capacity)
                .execute(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_venue(result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::Internal("Venue vanished after insert".to_string()))
    }
}
