//! Administrator dashboard, event listings, exports and reports.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::ToSchema;

use crate::api::validation::parse_optional_date;
use crate::error::{AppError, Result};
use crate::models::event::{Event, EventStatus, EVENT_SELECT};
use crate::models::feedback::Feedback;
use crate::services::event_service::{EventService, RegistrationDetail};
use crate::services::feedback_service::{round2, FeedbackService};
use crate::services::settings_service::SettingsService;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct DepartmentCount {
    pub dept_name: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminDashboard {
    pub total_events: i64,
    pub approved_events: i64,
    pub pending_events: i64,
    pub total_students: i64,
    pub total_registrations: i64,
    pub total_attendance: i64,
    pub recent_events: Vec<Event>,
    pub dept_stats: Vec<DepartmentCount>,
    pub upcoming_events: Vec<Event>,
    pub guest_enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminEventFilter {
    pub status: Option<String>,
    pub department: Option<i64>,
    pub organizer: Option<i64>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminEventDetail {
    pub event: Event,
    pub registrations: Vec<RegistrationDetail>,
    pub attended_count: i64,
    pub feedback: Vec<Feedback>,
    pub avg_rating: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub dept_id: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct PersonCount {
    pub full_name: String,
    pub email: Option<String>,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct OrganizerRating {
    pub full_name: String,
    pub email: Option<String>,
    pub avg_rating: f64,
    pub feedback_count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct RatingBucket {
    pub rating: i64,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Reports {
    pub events_this_month: i64,
    pub top_students: Vec<PersonCount>,
    pub top_organizers: Vec<PersonCount>,
    pub organizer_feedback: Vec<OrganizerRating>,
    pub dept_participation: Vec<DepartmentCount>,
    pub feedback_summary: Vec<RatingBucket>,
}

/// Parsed date and department restrictions on events.
#[derive(Debug, Default, Clone, Copy)]
struct EventScope {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    dept_id: Option<i64>,
}

impl EventScope {
    fn push(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(from) = self.from {
            qb.push(" AND e.event_date >= ").push_bind(from);
        }
        if let Some(to) = self.to {
            qb.push(" AND e.event_date <= ").push_bind(to);
        }
        if let Some(dept_id) = self.dept_id {
            qb.push(" AND e.dept_id = ").push_bind(dept_id);
        }
    }
}

pub struct ReportService {
    db: SqlitePool,
}

impl ReportService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn count(&self, sql: &str) -> Result<i64> {
        sqlx::query_scalar(sql)
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn dashboard(&self, today: NaiveDate) -> Result<AdminDashboard> {
        let total_students: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users u JOIN roles r ON r.role_id = u.role_id WHERE lower(r.role_name) = 'student'",
        )
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let sql = format!("{} ORDER BY e.event_id DESC LIMIT 10", EVENT_SELECT);
        let recent_events = sqlx::query_as(&sql)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let dept_stats = sqlx::query_as(
            r#"
            SELECT d.dept_name, COUNT(e.event_id) AS count
            FROM departments d JOIN events e ON e.dept_id = d.dept_id
            GROUP BY d.dept_id ORDER BY d.dept_name
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let sql = format!(
            "{} WHERE e.status = ? AND e.event_date >= ? ORDER BY e.event_date, e.start_time LIMIT 5",
            EVENT_SELECT
        );
        let upcoming_events = sqlx::query_as(&sql)
            .bind(EventStatus::Approved.as_str())
            .bind(today)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(AdminDashboard {
            total_events: self.count("SELECT COUNT(*) FROM events").await?,
            approved_events: self
                .count("SELECT COUNT(*) FROM events WHERE status = 'approved'")
                .await?,
            pending_events: self
                .count("SELECT COUNT(*) FROM events WHERE status = 'pending'")
                .await?,
            total_students,
            total_registrations: self.count("SELECT COUNT(*) FROM registrations").await?,
            total_attendance: self.count("SELECT COUNT(*) FROM attendance").await?,
            recent_events,
            dept_stats,
            upcoming_events,
            guest_enabled: SettingsService::new(self.db.clone()).guest_enabled().await?,
        })
    }

    pub async fn events(&self, filter: &AdminEventFilter) -> Result<Vec<Event>> {
        let from = parse_optional_date(filter.date_from.as_deref(), "date_from")?;
        let to = parse_optional_date(filter.date_to.as_deref(), "date_to")?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(EVENT_SELECT);
        qb.push(" WHERE 1 = 1");
        if let Some(status) = filter.status.as_deref().filter(|s| !s.trim().is_empty()) {
            let status = EventStatus::parse(status)
                .ok_or_else(|| AppError::Validation(format!("Unknown status '{}'", status)))?;
            qb.push(" AND e.status = ").push_bind(status.as_str());
        }
        if let Some(organizer) = filter.organizer {
            qb.push(" AND e.organizer_id = ").push_bind(organizer);
        }
        EventScope {
            from,
            to,
            dept_id: filter.department,
        }
        .push(&mut qb);
        qb.push(" ORDER BY e.event_date DESC, e.event_id DESC");

        qb.build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Filtered events as CSV. Returns `(filename, body)`.
    pub async fn events_csv(&self, filter: &AdminEventFilter) -> Result<(String, String)> {
        let events = self.events(filter).await?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Title", "Date", "Status", "Department", "Organizer"])?;
        for event in &events {
            let date = event.event_date.format("%Y-%m-%d").to_string();
            writer.write_record([
                event.title.as_str(),
                date.as_str(),
                event.status.as_str(),
                event.dept_name.as_deref().unwrap_or("-"),
                event.organizer_name.as_deref().unwrap_or("-"),
            ])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Internal(format!("Failed to finish CSV: {}", e)))?;
        let body = String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("CSV is not UTF-8: {}", e)))?;
        Ok(("events_report.csv".to_string(), body))
    }

    /// Top students, active organizers and best rated organizers as one
    /// sheet, each row tagged with its section.
    pub async fn reports_csv(
        &self,
        filter: &ReportFilter,
        today: NaiveDate,
    ) -> Result<(String, String)> {
        let reports = self.reports(filter, today).await?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Section", "Name", "Email", "Value", "Feedback Count"])?;
        for student in &reports.top_students {
            let count = student.count.to_string();
            writer.write_record([
                "Top Students",
                student.full_name.as_str(),
                student.email.as_deref().unwrap_or(""),
                count.as_str(),
                "",
            ])?;
        }
        for organizer in &reports.top_organizers {
            let count = organizer.count.to_string();
            writer.write_record([
                "Active Organizers",
                organizer.full_name.as_str(),
                organizer.email.as_deref().unwrap_or(""),
                count.as_str(),
                "",
            ])?;
        }
        for rated in &reports.organizer_feedback {
            let avg = format!("{:.2}", rated.avg_rating);
            let count = rated.feedback_count.to_string();
            writer.write_record([
                "Organizer Feedback",
                rated.full_name.as_str(),
                rated.email.as_deref().unwrap_or(""),
                avg.as_str(),
                count.as_str(),
            ])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Internal(format!("Failed to finish CSV: {}", e)))?;
        let body = String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("CSV is not UTF-8: {}", e)))?;
        Ok(("reports_analytics.csv".to_string(), body))
    }

    pub async fn event_detail(&self, event_id: i64) -> Result<AdminEventDetail> {
        let events = EventService::new(self.db.clone());
        let event = events.get(event_id).await?;
        let registrations = events.registrations(event_id).await?;
        let attended_count = registrations.iter().filter(|r| r.attended).count() as i64;
        let feedback = FeedbackService::new(self.db.clone())
            .admin_event_view(event_id)
            .await?;
        Ok(AdminEventDetail {
            event,
            registrations,
            attended_count,
            feedback: feedback.items,
            avg_rating: feedback.avg_rating,
        })
    }

    pub async fn reports(&self, filter: &ReportFilter, today: NaiveDate) -> Result<Reports> {
        let scope = EventScope {
            from: parse_optional_date(filter.date_from.as_deref(), "date_from")?,
            to: parse_optional_date(filter.date_to.as_deref(), "date_to")?,
            dept_id: filter.dept_id,
        };
        let month_start = today.with_day(1).unwrap_or(today);

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM events e WHERE e.event_date >= ");
        qb.push_bind(month_start);
        scope.push(&mut qb);
        let events_this_month: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT u.full_name, u.email, COUNT(r.registration_id) AS count
            FROM users u
            JOIN roles ro ON ro.role_id = u.role_id
            JOIN registrations r ON r.student_id = u.user_id
            JOIN events e ON e.event_id = r.event_id
            WHERE lower(ro.role_name) = 'student'"#,
        );
        scope.push(&mut qb);
        qb.push(" GROUP BY u.user_id ORDER BY count DESC LIMIT 10");
        let top_students = qb
            .build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT u.full_name, u.email, COUNT(e.event_id) AS count
            FROM users u JOIN events e ON e.organizer_id = u.user_id
            WHERE 1 = 1"#,
        );
        scope.push(&mut qb);
        qb.push(" GROUP BY u.user_id ORDER BY count DESC LIMIT 10");
        let top_organizers = qb
            .build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT u.full_name, u.email, AVG(f.rating) AS avg_rating,
                   COUNT(f.feedback_id) AS feedback_count
            FROM users u
            JOIN events e ON e.organizer_id = u.user_id
            JOIN feedback f ON f.event_id = e.event_id
            WHERE 1 = 1"#,
        );
        scope.push(&mut qb);
        qb.push(" GROUP BY u.user_id ORDER BY avg_rating DESC LIMIT 10");
        let mut organizer_feedback: Vec<OrganizerRating> = qb
            .build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        for row in &mut organizer_feedback {
            row.avg_rating = round2(row.avg_rating);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT d.dept_name, COUNT(r.registration_id) AS count
            FROM departments d
            JOIN users u ON u.dept_id = d.dept_id
            JOIN registrations r ON r.student_id = u.user_id
            JOIN events e ON e.event_id = r.event_id
            WHERE 1 = 1"#,
        );
        scope.push(&mut qb);
        qb.push(" GROUP BY d.dept_id ORDER BY d.dept_name");
        let dept_participation = qb
            .build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT f.rating, COUNT(f.feedback_id) AS count
            FROM feedback f JOIN events e ON e.event_id = f.event_id
            WHERE 1 = 1"#,
        );
        scope.push(&mut qb);
        qb.push(" GROUP BY f.rating ORDER BY f.rating");
        let feedback_summary = qb
            .build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Reports {
            events_this_month,
            top_students,
            top_organizers,
            organizer_feedback,
            dept_participation,
            feedback_summary,
        })
    }
}
