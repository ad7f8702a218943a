//! Organizer event management: create, edit, delete, dashboard and exports.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::ToSchema;

use crate::api::validation::{parse_date, parse_time, validate_http_url, validate_poster_url};
use crate::error::{AppError, Result};
use crate::models::approval::{Approval, ApprovalStatus, APPROVAL_SELECT};
use crate::models::event::{Event, EventMode, EventStatus, EVENT_SELECT};
use crate::models::notification::{sort_newest_first, Notification};
use crate::models::registration::Team;
use crate::services::approval_service::{ApprovalService, ChainOutcome};

pub const DASHBOARD_PAGE_SIZE: i64 = 10;
pub const DASHBOARD_NOTIFICATION_LIMIT: usize = 5;
pub const REAPPROVAL_REMARK: &str = "Event updated (not new). Approval required.";

pub async fn fetch_event(db: &SqlitePool, event_id: i64) -> Result<Option<Event>> {
    let sql = format!("{} WHERE e.event_id = ?", EVENT_SELECT);
    sqlx::query_as(&sql)
        .bind(event_id)
        .fetch_optional(db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

pub async fn set_event_status(db: &SqlitePool, event_id: i64, status: EventStatus) -> Result<()> {
    sqlx::query("UPDATE events SET status = ? WHERE event_id = ?")
        .bind(status.as_str())
        .bind(event_id)
        .execute(db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

/// 1-based page number, bounded so the row offset cannot overflow.
pub fn clamp_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).clamp(1, i64::MAX / DASHBOARD_PAGE_SIZE)
}

/// Half-open interval overlap on the same day.
pub fn overlaps(a_start: NaiveTime, a_end: NaiveTime, b_start: NaiveTime, b_end: NaiveTime) -> bool {
    a_start < b_end && a_end > b_start
}

/// Event form as submitted by an organizer.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EventRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// `YYYY-MM-DD`
    pub event_date: String,
    /// `HH:MM`
    pub start_time: String,
    /// `HH:MM`
    pub end_time: String,
    pub venue_id: Option<i64>,
    pub dept_id: Option<i64>,
    /// `online` or `offline` (default)
    pub mode: Option<String>,
    pub meeting_url: Option<String>,
    pub poster_url: Option<String>,
    pub certificate_template_id: Option<i64>,
    #[serde(default)]
    pub is_team_event: bool,
    pub min_team_size: Option<i64>,
    pub max_team_size: Option<i64>,
    /// `campus` restricts the event to campus accounts; anything else is public
    pub audience: Option<String>,
    #[serde(default)]
    pub has_prizes: bool,
    #[serde(default)]
    pub duty_leave_provided: bool,
}

/// An [`EventRequest`] that passed the checks needing no database access.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub venue_id: Option<i64>,
    pub dept_id: Option<i64>,
    pub mode: EventMode,
    pub meeting_url: Option<String>,
    pub poster_url: Option<String>,
    pub certificate_template_id: Option<i64>,
    pub is_team_event: bool,
    pub min_team_size: i64,
    pub max_team_size: i64,
    pub is_campus_exclusive: bool,
    pub has_prizes: bool,
    pub duty_leave_provided: bool,
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl EventDraft {
    pub fn from_request(req: &EventRequest, today: NaiveDate) -> Result<Self> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }

        let event_date = parse_date(&req.event_date, "event date")?;
        let start_time = parse_time(&req.start_time, "start time")?;
        let end_time = parse_time(&req.end_time, "end time")?;

        if event_date < today {
            return Err(AppError::Validation(
                "Event date cannot be in the past".to_string(),
            ));
        }
        if start_time >= end_time {
            return Err(AppError::Validation(
                "End time must be after start time".to_string(),
            ));
        }

        let mode = EventMode::parse(req.mode.as_deref().unwrap_or("offline"));
        let meeting_url = trimmed(req.meeting_url.as_ref());
        let positive_venue = req.venue_id.filter(|id| *id > 0);

        let venue_id = match mode {
            EventMode::Online => {
                let url = meeting_url.as_deref().ok_or_else(|| {
                    AppError::Validation("Meeting URL is required for online events".to_string())
                })?;
                validate_http_url(url, "Meeting URL")?;
                positive_venue
            }
            EventMode::Offline => Some(positive_venue.ok_or_else(|| {
                AppError::Validation("Venue is required for offline events".to_string())
            })?),
        };

        let poster_url = trimmed(req.poster_url.as_ref());
        if let Some(poster) = &poster_url {
            validate_poster_url(poster)?;
        }

        let (min_team_size, max_team_size) = if req.is_team_event {
            let min = req.min_team_size.unwrap_or(2);
            let max = req.max_team_size.unwrap_or(4);
            if min < 1 || min > max {
                return Err(AppError::Validation(
                    "Team size must satisfy 1 <= minimum <= maximum".to_string(),
                ));
            }
            (min, max)
        } else {
            (1, 1)
        };

        let is_campus_exclusive = req
            .audience
            .as_deref()
            .is_some_and(|a| a.trim().eq_ignore_ascii_case("campus"));

        Ok(Self {
            title: title.to_string(),
            description: req.description.trim().to_string(),
            event_date,
            start_time,
            end_time,
            venue_id,
            dept_id: req.dept_id.filter(|id| *id > 0),
            mode,
            meeting_url,
            poster_url,
            certificate_template_id: req.certificate_template_id.filter(|id| *id > 0),
            is_team_event: req.is_team_event,
            min_team_size,
            max_team_size,
            is_campus_exclusive,
            has_prizes: req.has_prizes,
            duty_leave_provided: req.duty_leave_provided,
        })
    }

    /// Scheduling or routing changes send the event back through approval.
    pub fn requires_reapproval(&self, current: &Event) -> bool {
        current.event_date != self.event_date
            || current.start_time != self.start_time
            || current.end_time != self.end_time
            || current.venue_id != self.venue_id
            || current.mode() != self.mode
            || current.meeting_url.as_deref().filter(|u| !u.is_empty())
                != self.meeting_url.as_deref()
            || current.dept_id != self.dept_id
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizerDashboard {
    pub events: Vec<Event>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
    pub pending_count: i64,
    pub approved_count: i64,
    pub rejected_count: i64,
    pub past_event_ids: Vec<i64>,
    pub notifications: Vec<Notification>,
}

/// Registration row as shown on the organizer's event page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct RegistrationDetail {
    pub registration_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub student_email: Option<String>,
    pub username: Option<String>,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
    pub qr_code: String,
    pub registered_at: DateTime<Utc>,
    pub attended: bool,
    pub scan_time: Option<DateTime<Utc>>,
    pub prize_position: Option<String>,
    pub prize_title: Option<String>,
}

const REGISTRATION_DETAIL_SELECT: &str = r#"
    SELECT r.registration_id, r.student_id, u.full_name AS student_name,
           u.email AS student_email, u.username, r.team_id, t.team_name, r.qr_code,
           r.registered_at, (a.attendance_id IS NOT NULL) AS attended, a.scan_time,
           r.prize_position, r.prize_title
    FROM registrations r
    JOIN users u ON u.user_id = r.student_id
    LEFT JOIN teams t ON t.team_id = r.team_id
    LEFT JOIN attendance a ON a.registration_id = r.registration_id
"#;

#[derive(Debug, Serialize, ToSchema)]
pub struct EventDetail {
    pub event: Event,
    pub registrations: Vec<RegistrationDetail>,
    pub attended_count: i64,
    pub approvals: Vec<Approval>,
    pub teams: Vec<Team>,
    pub has_ended: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventStats {
    pub registered: i64,
    pub attended: i64,
    pub remaining: i64,
}

/// Result of creating or editing an event.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventSaved {
    pub event: Event,
    /// True when an approval chain was (re)built for this save.
    pub submitted_for_approval: bool,
}

pub struct EventService {
    db: SqlitePool,
}

impl EventService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get(&self, event_id: i64) -> Result<Event> {
        fetch_event(&self.db, event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
    }

    /// Load an event that belongs to `organizer_id`.
    pub async fn owned(&self, event_id: i64, organizer_id: i64) -> Result<Event> {
        match fetch_event(&self.db, event_id).await? {
            Some(event) if event.organizer_id == organizer_id => Ok(event),
            _ => Err(AppError::NotFound("Event not found".to_string())),
        }
    }

    /// Checks needing the database: venue existence and booking, template
    /// ownership and department existence.
    async fn check_references(
        &self,
        draft: &mut EventDraft,
        organizer_id: i64,
        exclude_event: Option<i64>,
    ) -> Result<()> {
        if let Some(venue_id) = draft.venue_id {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM venues WHERE venue_id = ?")
                .bind(venue_id)
                .fetch_one(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            if exists == 0 {
                match draft.mode {
                    EventMode::Online => draft.venue_id = None,
                    EventMode::Offline => {
                        return Err(AppError::Validation(
                            "Selected venue was not found. Please pick a valid venue."
                                .to_string(),
                        ))
                    }
                }
            }
        }

        if let (EventMode::Offline, Some(venue_id)) = (draft.mode, draft.venue_id) {
            if self
                .venue_booked(venue_id, draft.event_date, draft.start_time, draft.end_time, exclude_event)
                .await?
            {
                return Err(AppError::Conflict(
                    "Selected venue is already booked for the chosen date/time".to_string(),
                ));
            }
        }

        if let Some(dept_id) = draft.dept_id {
            let exists: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM departments WHERE dept_id = ?")
                    .bind(dept_id)
                    .fetch_one(&self.db)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            if exists == 0 {
                return Err(AppError::Validation("Department not found".to_string()));
            }
        }

        if let Some(template_id) = draft.certificate_template_id {
            let owner: Option<i64> = sqlx::query_scalar(
                "SELECT organizer_id FROM certificate_templates WHERE template_id = ?",
            )
            .bind(template_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
            if owner != Some(organizer_id) {
                return Err(AppError::Validation(
                    "Certificate template not found".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Whether a pending or approved event already holds the venue at an
    /// overlapping time on the same date.
    pub async fn venue_booked(
        &self,
        venue_id: i64,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude_event: Option<i64>,
    ) -> Result<bool> {
        let slots: Vec<(i64, NaiveTime, NaiveTime)> = sqlx::query_as(
            r#"
            SELECT event_id, start_time, end_time FROM events
            WHERE venue_id = ? AND event_date = ? AND status IN ('pending', 'approved')
            "#,
        )
        .bind(venue_id)
        .bind(date)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(slots.into_iter().any(|(event_id, other_start, other_end)| {
            Some(event_id) != exclude_event && overlaps(start, end, other_start, other_end)
        }))
    }

    pub async fn create(
        &self,
        organizer_id: i64,
        req: EventRequest,
        today: NaiveDate,
        approvals: &ApprovalService,
    ) -> Result<(Event, ChainOutcome)> {
        let mut draft = EventDraft::from_request(&req, today)?;
        self.check_references(&mut draft, organizer_id, None).await?;

        let scan_token = uuid::Uuid::new_v4().simple().to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO events (
                title, description, event_date, start_time, end_time, venue_id, dept_id,
                mode, meeting_url, poster_url, certificate_template_id, scan_token,
                organizer_id, status, created_at, is_team_event, min_team_size,
                max_team_size, is_campus_exclusive, has_prizes, duty_leave_provided
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.event_date)
        .bind(draft.start_time)
        .bind(draft.end_time)
        .bind(draft.venue_id)
        .bind(draft.dept_id)
        .bind(draft.mode.as_str())
        .bind(&draft.meeting_url)
        .bind(&draft.poster_url)
        .bind(draft.certificate_template_id)
        .bind(&scan_token)
        .bind(organizer_id)
        .bind(EventStatus::Pending.as_str())
        .bind(Utc::now())
        .bind(draft.is_team_event)
        .bind(draft.min_team_size)
        .bind(draft.max_team_size)
        .bind(draft.is_campus_exclusive)
        .bind(draft.has_prizes)
        .bind(draft.duty_leave_provided)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let event_id = result.last_insert_rowid();
        let chain = approvals.create_chain(event_id, None).await?;
        tracing::info!(event_id, organizer_id, "Event created");

        Ok((self.get(event_id).await?, chain))
    }

    pub async fn edit(
        &self,
        event_id: i64,
        organizer_id: i64,
        req: EventRequest,
        today: NaiveDate,
        approvals: &ApprovalService,
    ) -> Result<EventSaved> {
        let current = self.owned(event_id, organizer_id).await?;
        let mut draft = EventDraft::from_request(&req, today)?;
        self.check_references(&mut draft, organizer_id, Some(event_id))
            .await?;

        let reapprove = draft.requires_reapproval(&current);
        let poster_url = draft.poster_url.clone().or(current.poster_url.clone());

        sqlx::query(
            r#"
            UPDATE events SET
                title = ?, description = ?, event_date = ?, start_time = ?, end_time = ?,
                venue_id = ?, dept_id = ?, mode = ?, meeting_url = ?, poster_url = ?,
                certificate_template_id = ?, is_team_event = ?, min_team_size = ?,
                max_team_size = ?, is_campus_exclusive = ?, has_prizes = ?,
                duty_leave_provided = ?
            WHERE event_id = ?
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.event_date)
        .bind(draft.start_time)
        .bind(draft.end_time)
        .bind(draft.venue_id)
        .bind(draft.dept_id)
        .bind(draft.mode.as_str())
        .bind(&draft.meeting_url)
        .bind(&poster_url)
        .bind(draft.certificate_template_id)
        .bind(draft.is_team_event)
        .bind(draft.min_team_size)
        .bind(draft.max_team_size)
        .bind(draft.is_campus_exclusive)
        .bind(draft.has_prizes)
        .bind(draft.duty_leave_provided)
        .bind(event_id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if reapprove {
            set_event_status(&self.db, event_id, EventStatus::Pending).await?;
            approvals.clear_chain(event_id).await?;
            approvals
                .create_chain(event_id, Some(REAPPROVAL_REMARK))
                .await?;
            tracing::info!(event_id, "Event updated and re-submitted for approval");
        }

        Ok(EventSaved {
            event: self.get(event_id).await?,
            submitted_for_approval: reapprove,
        })
    }

    pub async fn delete(&self, event_id: i64, organizer_id: i64) -> Result<()> {
        self.owned(event_id, organizer_id).await?;
        sqlx::query("DELETE FROM events WHERE event_id = ?")
            .bind(event_id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(event_id, organizer_id, "Event deleted");
        Ok(())
    }

    async fn status_count(&self, organizer_id: i64, status: EventStatus) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE organizer_id = ? AND status = ?")
            .bind(organizer_id)
            .bind(status.as_str())
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn dashboard(
        &self,
        organizer_id: i64,
        query: &DashboardQuery,
        now: NaiveDateTime,
    ) -> Result<OrganizerDashboard> {
        let search = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());
        let page = clamp_page(query.page);

        let mut count_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM events e WHERE e.organizer_id = ");
        count_qb.push_bind(organizer_id);
        if let Some(q) = search {
            count_qb
                .push(" AND lower(e.title) LIKE ")
                .push_bind(format!("%{}%", q.to_lowercase()));
        }
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(EVENT_SELECT);
        qb.push(" WHERE e.organizer_id = ").push_bind(organizer_id);
        if let Some(q) = search {
            qb.push(" AND lower(e.title) LIKE ")
                .push_bind(format!("%{}%", q.to_lowercase()));
        }
        qb.push(" ORDER BY e.event_id DESC LIMIT ")
            .push_bind(DASHBOARD_PAGE_SIZE)
            .push(" OFFSET ")
            .push_bind((page - 1) * DASHBOARD_PAGE_SIZE);
        let events: Vec<Event> = qb
            .build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let past_event_ids = events
            .iter()
            .filter(|e| now >= e.ends_at())
            .map(|e| e.event_id)
            .collect();

        Ok(OrganizerDashboard {
            events,
            page,
            per_page: DASHBOARD_PAGE_SIZE,
            total,
            total_pages: (total + DASHBOARD_PAGE_SIZE - 1) / DASHBOARD_PAGE_SIZE,
            pending_count: self.status_count(organizer_id, EventStatus::Pending).await?,
            approved_count: self.status_count(organizer_id, EventStatus::Approved).await?,
            rejected_count: self.status_count(organizer_id, EventStatus::Rejected).await?,
            past_event_ids,
            notifications: self.notifications(organizer_id, now.date()).await?,
        })
    }

    /// Recent approval decisions and "ready to go" notices for the organizer.
    async fn notifications(&self, organizer_id: i64, today: NaiveDate) -> Result<Vec<Notification>> {
        let now = Utc::now();
        let week_ago = now - Duration::days(7);

        let sql = format!(
            "{} WHERE e.organizer_id = ? AND a.approved_at IS NOT NULL",
            APPROVAL_SELECT
        );
        let mut decided: Vec<Approval> = sqlx::query_as(&sql)
            .bind(organizer_id)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        decided.retain(|a| a.approved_at.is_some_and(|t| t >= week_ago));
        decided.sort_by(|a, b| b.approved_at.cmp(&a.approved_at));

        let mut notifications: Vec<Notification> = decided
            .iter()
            .take(DASHBOARD_NOTIFICATION_LIMIT)
            .filter_map(|a| {
                if a.status == ApprovalStatus::Approved.as_str() {
                    Some(
                        Notification::new(
                            "success",
                            format!(
                                "Your event \"{}\" was approved by {}!",
                                a.event_title, a.approver_role
                            ),
                            Some(a.event_id),
                        )
                        .at(a.approved_at),
                    )
                } else if a.status == ApprovalStatus::Rejected.as_str() {
                    let mut n = Notification::new(
                        "error",
                        format!(
                            "Your event \"{}\" was rejected by {}.",
                            a.event_title, a.approver_role
                        ),
                        Some(a.event_id),
                    )
                    .at(a.approved_at);
                    n.remarks = a.remarks.clone();
                    Some(n)
                } else {
                    None
                }
            })
            .collect();

        let sql = format!(
            "{} WHERE e.organizer_id = ? AND e.status = ? AND e.event_date >= ?",
            EVENT_SELECT
        );
        let upcoming: Vec<Event> = sqlx::query_as(&sql)
            .bind(organizer_id)
            .bind(EventStatus::Approved.as_str())
            .bind(today)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for event in upcoming {
            let sql = format!("{} WHERE a.event_id = ?", APPROVAL_SELECT);
            let chain: Vec<Approval> = sqlx::query_as(&sql)
                .bind(event.event_id)
                .fetch_all(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            let latest = chain
                .iter()
                .filter(|a| a.status == ApprovalStatus::Approved.as_str())
                .filter_map(|a| a.approved_at)
                .max();
            let all_approved = chain
                .iter()
                .all(|a| a.status == ApprovalStatus::Approved.as_str());
            if let Some(latest) = latest.filter(|t| *t >= week_ago) {
                if all_approved {
                    notifications.push(
                        Notification::new(
                            "ready",
                            format!(
                                "\"{}\" is fully approved and ready for {}!",
                                event.title,
                                event.event_date.format("%b %d")
                            ),
                            Some(event.event_id),
                        )
                        .at(Some(latest)),
                    );
                }
            }
        }

        sort_newest_first(&mut notifications, now);
        notifications.truncate(DASHBOARD_NOTIFICATION_LIMIT);
        Ok(notifications)
    }

    pub async fn registrations(&self, event_id: i64) -> Result<Vec<RegistrationDetail>> {
        let sql = format!(
            "{} WHERE r.event_id = ? ORDER BY r.registration_id",
            REGISTRATION_DETAIL_SELECT
        );
        sqlx::query_as(&sql)
            .bind(event_id)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn view(
        &self,
        event_id: i64,
        organizer_id: i64,
        now: NaiveDateTime,
    ) -> Result<EventDetail> {
        let event = self.owned(event_id, organizer_id).await?;
        let registrations = self.registrations(event_id).await?;
        let attended_count = registrations.iter().filter(|r| r.attended).count() as i64;

        let sql = format!("{} WHERE a.event_id = ? ORDER BY a.approval_id", APPROVAL_SELECT);
        let approvals = sqlx::query_as(&sql)
            .bind(event_id)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let teams = if event.is_team_event {
            sqlx::query_as("SELECT * FROM teams WHERE event_id = ? ORDER BY team_id")
                .bind(event_id)
                .fetch_all(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?
        } else {
            Vec::new()
        };

        Ok(EventDetail {
            has_ended: now >= event.ends_at(),
            event,
            registrations,
            attended_count,
            approvals,
            teams,
        })
    }

    pub async fn stats(&self, event_id: i64, organizer_id: i64) -> Result<EventStats> {
        self.owned(event_id, organizer_id).await?;
        let (registered, attended): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(r.registration_id), COUNT(a.attendance_id)
            FROM registrations r
            LEFT JOIN attendance a ON a.registration_id = r.registration_id
            WHERE r.event_id = ?
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(EventStats {
            registered,
            attended,
            remaining: registered - attended,
        })
    }

    /// Attended participants as CSV. Returns `(filename, body)`.
    pub async fn attendance_csv(&self, event_id: i64, organizer_id: i64) -> Result<(String, String)> {
        let event = self.owned(event_id, organizer_id).await?;
        let attended: Vec<RegistrationDetail> = self
            .registrations(event_id)
            .await?
            .into_iter()
            .filter(|r| r.attended)
            .collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        if event.is_team_event {
            writer.write_record(["S.No", "Team Name", "Student Name", "Username", "Email", "Scan Time"])?;
        } else {
            writer.write_record(["S.No", "Student Name", "Username", "Email", "Scan Time"])?;
        }
        for (index, reg) in attended.iter().enumerate() {
            let serial = (index + 1).to_string();
            let username = reg.username.clone().unwrap_or_default();
            let email = reg.student_email.clone().unwrap_or_default();
            let scanned = reg
                .scan_time
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            if event.is_team_event {
                let team = reg.team_name.clone().unwrap_or_else(|| "-".to_string());
                writer.write_record([
                    serial.as_str(),
                    team.as_str(),
                    reg.student_name.as_str(),
                    username.as_str(),
                    email.as_str(),
                    scanned.as_str(),
                ])?;
            } else {
                writer.write_record([
                    serial.as_str(),
                    reg.student_name.as_str(),
                    username.as_str(),
                    email.as_str(),
                    scanned.as_str(),
                ])?;
            }
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Internal(format!("Failed to finish CSV: {}", e)))?;
        let body = String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("CSV is not UTF-8: {}", e)))?;
        Ok((format!("attendance_event_{}.csv", event.event_id), body))
    }
}
