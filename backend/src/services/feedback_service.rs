//! Post-event feedback: student submission, organizer and admin views.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::ToSchema;

use crate::api::validation::parse_optional_date;
use crate::error::{AppError, Result};
use crate::models::event::Event;
use crate::models::feedback::Feedback;
use crate::services::event_service::{fetch_event, EventService};

const FEEDBACK_SELECT: &str = r#"
    SELECT f.feedback_id, f.event_id, f.student_id, u.full_name AS student_name,
           f.rating, f.comments, f.submitted_at
    FROM feedback f
    JOIN users u ON u.user_id = f.student_id
"#;

/// Round to two decimals for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitFeedbackRequest {
    pub rating: i64,
    pub comments: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventFeedback {
    pub event: Event,
    pub items: Vec<Feedback>,
    pub avg_rating: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedbackFilter {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub dept_id: Option<i64>,
    pub event_id: Option<i64>,
    pub organizer_id: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct EventFeedbackSummary {
    pub event_id: i64,
    pub title: String,
    pub event_date: NaiveDate,
    pub organizer_name: Option<String>,
    pub dept_name: Option<String>,
    pub avg_rating: f64,
    pub feedback_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackOverview {
    pub summary: Vec<EventFeedbackSummary>,
    pub total_feedback: i64,
    pub avg_rating: f64,
}

pub struct FeedbackService {
    db: SqlitePool,
}

impl FeedbackService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create or replace the caller's feedback for an event they attended.
    pub async fn submit(
        &self,
        event_id: i64,
        student_id: i64,
        req: SubmitFeedbackRequest,
        now: NaiveDateTime,
    ) -> Result<Feedback> {
        if !(1..=5).contains(&req.rating) {
            return Err(AppError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        let event = fetch_event(&self.db, event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        let attended: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT (a.attendance_id IS NOT NULL) FROM registrations r
            LEFT JOIN attendance a ON a.registration_id = r.registration_id
            WHERE r.event_id = ? AND r.student_id = ?
            "#,
        )
        .bind(event_id)
        .bind(student_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match attended {
            None => {
                return Err(AppError::Validation(
                    "You must be registered for the event to submit feedback".to_string(),
                ))
            }
            Some(false) => {
                return Err(AppError::Validation(
                    "You must attend the event to submit feedback".to_string(),
                ))
            }
            Some(true) => {}
        }
        if !event.has_ended(now) {
            return Err(AppError::Validation(
                "Feedback is available only after the event has ended".to_string(),
            ));
        }

        let comments = req
            .comments
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        sqlx::query(
            r#"
            INSERT INTO feedback (event_id, student_id, rating, comments, submitted_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (event_id, student_id)
            DO UPDATE SET rating = excluded.rating, comments = excluded.comments
            "#,
        )
        .bind(event_id)
        .bind(student_id)
        .bind(req.rating)
        .bind(comments)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let sql = format!("{} WHERE f.event_id = ? AND f.student_id = ?", FEEDBACK_SELECT);
        sqlx::query_as(&sql)
            .bind(event_id)
            .bind(student_id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn for_event(&self, event: Event) -> Result<EventFeedback> {
        let sql = format!(
            "{} WHERE f.event_id = ? ORDER BY f.feedback_id DESC",
            FEEDBACK_SELECT
        );
        let items: Vec<Feedback> = sqlx::query_as(&sql)
            .bind(event.event_id)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let avg_rating = if items.is_empty() {
            0.0
        } else {
            items.iter().map(|f| f.rating as f64).sum::<f64>() / items.len() as f64
        };
        Ok(EventFeedback {
            event,
            items,
            avg_rating: round2(avg_rating),
        })
    }

    /// Organizer view; only once the event is over.
    pub async fn organizer_view(
        &self,
        event_id: i64,
        organizer_id: i64,
        now: NaiveDateTime,
    ) -> Result<EventFeedback> {
        let event = EventService::new(self.db.clone())
            .owned(event_id, organizer_id)
            .await?;
        if !event.has_ended(now) {
            return Err(AppError::Validation(
                "Feedback is available only after the event has ended.".to_string(),
            ));
        }
        self.for_event(event).await
    }

    pub async fn admin_event_view(&self, event_id: i64) -> Result<EventFeedback> {
        let event = EventService::new(self.db.clone()).get(event_id).await?;
        self.for_event(event).await
    }

    /// Per-event averages under the filter plus overall totals.
    pub async fn overview(&self, filter: &FeedbackFilter) -> Result<FeedbackOverview> {
        let date_from = parse_optional_date(filter.date_from.as_deref(), "date_from")?;
        let date_to = parse_optional_date(filter.date_to.as_deref(), "date_to")?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT e.event_id, e.title, e.event_date, o.full_name AS organizer_name,
                   d.dept_name, AVG(f.rating) AS avg_rating, COUNT(f.feedback_id) AS feedback_count
            FROM events e
            JOIN feedback f ON f.event_id = e.event_id
            LEFT JOIN users o ON o.user_id = e.organizer_id
            LEFT JOIN departments d ON d.dept_id = e.dept_id
            WHERE 1 = 1"#,
        );
        if let Some(from) = date_from {
            qb.push(" AND e.event_date >= ").push_bind(from);
        }
        if let Some(to) = date_to {
            qb.push(" AND e.event_date <= ").push_bind(to);
        }
        if let Some(dept_id) = filter.dept_id {
            qb.push(" AND e.dept_id = ").push_bind(dept_id);
        }
        if let Some(event_id) = filter.event_id {
            qb.push(" AND e.event_id = ").push_bind(event_id);
        }
        if let Some(organizer_id) = filter.organizer_id {
            qb.push(" AND e.organizer_id = ").push_bind(organizer_id);
        }
        qb.push(" GROUP BY e.event_id ORDER BY e.event_date DESC");

        let mut summary: Vec<EventFeedbackSummary> = qb
            .build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        for row in &mut summary {
            row.avg_rating = round2(row.avg_rating);
        }

        let (total_feedback, avg_rating): (i64, Option<f64>) =
            sqlx::query_as("SELECT COUNT(*), AVG(rating) FROM feedback")
                .fetch_one(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(FeedbackOverview {
            summary,
            total_feedback,
            avg_rating: round2(avg_rating.unwrap_or(0.0)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(4.333333), 4.33);
        assert_eq!(round2(3.666666), 3.67);
        assert_eq!(round2(0.0), 0.0);
    }
}
