//! Student and guest registrations, teams and team invitations.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::models::event::{Event, EventMode, EventStatus, EVENT_SELECT};
use crate::models::notification::{sort_newest_first, Notification};
use crate::models::registration::{
    InvitationStatus, Registration, Team, TeamInvitation, INVITATION_SELECT,
};
use crate::models::role::Role;
use crate::models::user::User;
use crate::services::event_service::fetch_event;
use crate::services::metrics_service;
use crate::services::user_service::UserService;

pub const QR_PREFIX: &str = "CE";

/// `CE-<event_id>-<registration_id>-<student_id>-<8 hex>`
pub fn qr_code_for(event_id: i64, registration_id: i64, student_id: i64) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}-{}-{}",
        QR_PREFIX,
        event_id,
        registration_id,
        student_id,
        &nonce[..8]
    )
}

/// Interpret a naive local timestamp as UTC for notice ordering.
pub fn local_to_utc(at: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&at)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

/// Guests never see campus-exclusive events.
pub fn visible_to(event: &Event, user: &User) -> bool {
    event.is_approved() && !(event.is_campus_exclusive && user.is_guest())
}

#[derive(Debug, Default, Deserialize)]
pub struct StudentEventsQuery {
    pub organizer: Option<i64>,
    pub mode: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentEventList {
    pub events: Vec<Event>,
    pub registered_event_ids: Vec<i64>,
    /// Attended events that have already ended.
    pub attended_event_ids: Vec<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentDashboard {
    pub upcoming_events: Vec<Event>,
    pub registered_event_ids: Vec<i64>,
    pub past_events: Vec<Event>,
    pub attended_event_ids: Vec<i64>,
    pub pending_invitations_count: i64,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTeamRequest {
    pub team_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InviteRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct TeamMember {
    pub registration_id: i64,
    pub student_id: i64,
    pub full_name: String,
    pub username: Option<String>,
    pub attended: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeamView {
    pub team: Team,
    pub event: Event,
    pub members: Vec<TeamMember>,
    pub pending_invitations: Vec<TeamInvitation>,
    pub is_leader: bool,
}

/// A registration listed on the student's "my registrations" page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct MyRegistration {
    pub registration_id: i64,
    pub event_id: i64,
    pub event_title: String,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub venue_name: Option<String>,
    pub mode: String,
    pub meeting_url: Option<String>,
    pub qr_code: String,
    pub registered_at: DateTime<Utc>,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
    pub attended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvitationAction {
    Accept,
    Reject,
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

/// Insert a registration and stamp its QR code; the id is part of the code.
async fn insert_registration(
    conn: &mut SqliteConnection,
    event_id: i64,
    student_id: i64,
    team_id: Option<i64>,
) -> Result<i64> {
    let placeholder = format!("pending-{}", uuid::Uuid::new_v4().simple());
    let result = sqlx::query(
        r#"
        INSERT INTO registrations (event_id, student_id, qr_code, registered_at, team_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(event_id)
    .bind(student_id)
    .bind(&placeholder)
    .bind(Utc::now())
    .bind(team_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| match e.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            AppError::Conflict("You are already registered for this event".to_string())
        }
        _ => db_err(e),
    })?;

    let registration_id = result.last_insert_rowid();
    sqlx::query("UPDATE registrations SET qr_code = ? WHERE registration_id = ?")
        .bind(qr_code_for(event_id, registration_id, student_id))
        .bind(registration_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(registration_id)
}

pub struct RegistrationService {
    db: SqlitePool,
}

impl RegistrationService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get(&self, registration_id: i64) -> Result<Registration> {
        sqlx::query_as("SELECT * FROM registrations WHERE registration_id = ?")
            .bind(registration_id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))
    }

    pub async fn find_for(&self, event_id: i64, student_id: i64) -> Result<Option<Registration>> {
        sqlx::query_as("SELECT * FROM registrations WHERE event_id = ? AND student_id = ?")
            .bind(event_id)
            .bind(student_id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn registered_event_ids(&self, student_id: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar("SELECT event_id FROM registrations WHERE student_id = ? ORDER BY event_id")
            .bind(student_id)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    /// Events the student attended, with their end times.
    async fn attended_events(&self, student_id: i64) -> Result<Vec<Event>> {
        let sql = format!(
            r#"{}
            JOIN registrations r ON r.event_id = e.event_id
            JOIN attendance a ON a.registration_id = r.registration_id
            WHERE r.student_id = ?
            ORDER BY e.event_date DESC"#,
            EVENT_SELECT
        );
        sqlx::query_as(&sql)
            .bind(student_id)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn upcoming_visible(
        &self,
        user: &User,
        today: NaiveDate,
        filters: &StudentEventsQuery,
    ) -> Result<Vec<Event>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(EVENT_SELECT);
        qb.push(" WHERE e.status = ")
            .push_bind(EventStatus::Approved.as_str())
            .push(" AND e.event_date >= ")
            .push_bind(today);
        if user.is_guest() {
            qb.push(" AND e.is_campus_exclusive = 0");
        }
        if let Some(organizer_id) = filters.organizer {
            qb.push(" AND e.organizer_id = ").push_bind(organizer_id);
        }
        if let Some(mode) = filters.mode.as_deref().filter(|m| !m.trim().is_empty()) {
            qb.push(" AND e.mode = ")
                .push_bind(EventMode::parse(mode).as_str());
        }
        if let Some(q) = filters.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            qb.push(" AND lower(e.title) LIKE ")
                .push_bind(format!("%{}%", q.to_lowercase()));
        }
        qb.push(" ORDER BY e.event_date, e.start_time");
        qb.build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    pub async fn list_events(
        &self,
        user: &User,
        filters: &StudentEventsQuery,
        now: NaiveDateTime,
    ) -> Result<StudentEventList> {
        let events = self.upcoming_visible(user, now.date(), filters).await?;
        let attended_event_ids = self
            .attended_events(user.user_id)
            .await?
            .into_iter()
            .filter(|e| now >= e.ends_at())
            .map(|e| e.event_id)
            .collect();
        Ok(StudentEventList {
            events,
            registered_event_ids: self.registered_event_ids(user.user_id).await?,
            attended_event_ids,
        })
    }

    pub async fn dashboard(&self, user: &User, now: NaiveDateTime) -> Result<StudentDashboard> {
        let today = now.date();
        let upcoming_events = self
            .upcoming_visible(user, today, &StudentEventsQuery::default())
            .await?;
        let registered_event_ids = self.registered_event_ids(user.user_id).await?;
        let attended = self.attended_events(user.user_id).await?;
        let attended_event_ids: Vec<i64> = attended.iter().map(|e| e.event_id).collect();
        let past_events = attended
            .iter()
            .filter(|e| e.event_date <= today)
            .cloned()
            .collect();

        let pending_invitations_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM team_invitations WHERE invitee_id = ? AND status = ?",
        )
        .bind(user.user_id)
        .bind(InvitationStatus::Pending.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(db_err)?;

        let notifications = self.notifications(user, &attended, now).await?;

        Ok(StudentDashboard {
            upcoming_events,
            registered_event_ids,
            past_events,
            attended_event_ids,
            pending_invitations_count,
            notifications,
        })
    }

    async fn notifications(
        &self,
        user: &User,
        attended: &[Event],
        now: NaiveDateTime,
    ) -> Result<Vec<Notification>> {
        let now_utc = Utc::now();
        let week_ago = now_utc - Duration::days(7);
        let mut notifications = Vec::new();

        let certificates: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT e.title, c.issued_at FROM certificates c
            JOIN events e ON e.event_id = c.event_id
            WHERE c.student_id = ?
            "#,
        )
        .bind(user.user_id)
        .fetch_all(&self.db)
        .await
        .map_err(db_err)?;
        for (title, issued_at) in certificates.into_iter().filter(|(_, t)| *t >= week_ago) {
            notifications.push(
                Notification::new(
                    "certificate",
                    format!("Hooray! Your certificate for \"{}\" is ready!", title),
                    None,
                )
                .at(Some(issued_at)),
            );
        }

        let reviewed: Vec<i64> =
            sqlx::query_scalar("SELECT event_id FROM feedback WHERE student_id = ?")
                .bind(user.user_id)
                .fetch_all(&self.db)
                .await
                .map_err(db_err)?;
        for event in attended
            .iter()
            .filter(|e| !reviewed.contains(&e.event_id) && e.has_ended(now))
            .take(3)
        {
            notifications.push(
                Notification::new(
                    "feedback",
                    format!("How was \"{}\"? Share your feedback!", event.title),
                    Some(event.event_id),
                )
                .at(local_to_utc(event.ends_at())),
            );
        }

        for invitation in self.pending_invitations(user.user_id).await?.into_iter().take(3) {
            notifications.push(
                Notification::new(
                    "invitation",
                    format!(
                        "You've been invited to join team \"{}\" for \"{}\"!",
                        invitation.team_name, invitation.event_title
                    ),
                    Some(invitation.event_id),
                )
                .at(Some(invitation.created_at)),
            );
        }

        let sql = format!(
            "{} JOIN registrations r ON r.event_id = e.event_id WHERE r.student_id = ?",
            EVENT_SELECT
        );
        let registered: Vec<Event> = sqlx::query_as(&sql)
            .bind(user.user_id)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)?;
        for event in registered {
            let days_until = (event.event_date - now.date()).num_days();
            let when = match days_until {
                0 => "today".to_string(),
                1 => "tomorrow".to_string(),
                2 => "in 2 days".to_string(),
                _ => continue,
            };
            notifications.push(
                Notification::new(
                    "reminder",
                    format!(
                        "Reminder: \"{}\" is {} at {}!",
                        event.title,
                        when,
                        event.start_time.format("%H:%M")
                    ),
                    Some(event.event_id),
                )
                .at(local_to_utc(event.starts_at())),
            );
        }

        sort_newest_first(&mut notifications, now_utc);
        notifications.truncate(5);
        Ok(notifications)
    }

    async fn open_event(&self, event_id: i64, user: &User) -> Result<Event> {
        let event = fetch_event(&self.db, event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        if !visible_to(&event, user) {
            return Err(AppError::Validation(
                "This event is not open for registration".to_string(),
            ));
        }
        Ok(event)
    }

    async fn ensure_not_registered(&self, event_id: i64, student_id: i64) -> Result<()> {
        if self.find_for(event_id, student_id).await?.is_some() {
            return Err(AppError::Conflict(
                "You are already registered for this event".to_string(),
            ));
        }
        Ok(())
    }

    /// Individual registration.
    pub async fn register(&self, event_id: i64, user: &User) -> Result<Registration> {
        let event = self.open_event(event_id, user).await?;
        self.ensure_not_registered(event_id, user.user_id).await?;
        if event.is_team_event {
            return Err(AppError::Validation(
                "This is a team event. Create a team or accept an invitation to register."
                    .to_string(),
            ));
        }

        let mut conn = self.db.acquire().await?;
        let registration_id = insert_registration(&mut conn, event_id, user.user_id, None).await?;
        drop(conn);

        metrics_service::record_registration("individual");
        tracing::info!(event_id, student_id = user.user_id, "Student registered");
        self.get(registration_id).await
    }

    /// Create a team with the caller as leader and register the leader.
    pub async fn create_team(
        &self,
        event_id: i64,
        user: &User,
        req: CreateTeamRequest,
    ) -> Result<Team> {
        let event = self.open_event(event_id, user).await?;
        if !event.is_team_event {
            return Err(AppError::Validation("This is not a team event".to_string()));
        }
        self.ensure_not_registered(event_id, user.user_id).await?;

        let team_name = req.team_name.trim();
        if team_name.is_empty() {
            return Err(AppError::Validation("Team name is required".to_string()));
        }
        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM teams WHERE event_id = ? AND team_name = ?")
                .bind(event_id)
                .bind(team_name)
                .fetch_one(&self.db)
                .await
                .map_err(db_err)?;
        if taken > 0 {
            return Err(AppError::Conflict(
                "A team with this name already exists for this event".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        let result = sqlx::query(
            "INSERT INTO teams (event_id, team_name, leader_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(event_id)
        .bind(team_name)
        .bind(user.user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let team_id = result.last_insert_rowid();
        insert_registration(&mut tx, event_id, user.user_id, Some(team_id)).await?;
        tx.commit().await?;

        metrics_service::record_registration("team");
        tracing::info!(event_id, team_id, leader_id = user.user_id, "Team created");
        self.team(team_id).await
    }

    pub async fn team(&self, team_id: i64) -> Result<Team> {
        sqlx::query_as("SELECT * FROM teams WHERE team_id = ?")
            .bind(team_id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound("Team not found".to_string()))
    }

    async fn member_count(&self, team_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE team_id = ?")
            .bind(team_id)
            .fetch_one(&self.db)
            .await
            .map_err(db_err)
    }

    pub async fn members(&self, team_id: i64) -> Result<Vec<TeamMember>> {
        sqlx::query_as(
            r#"
            SELECT r.registration_id, r.student_id, u.full_name, u.username,
                   (a.attendance_id IS NOT NULL) AS attended
            FROM registrations r
            JOIN users u ON u.user_id = r.student_id
            LEFT JOIN attendance a ON a.registration_id = r.registration_id
            WHERE r.team_id = ?
            ORDER BY r.registration_id
            "#,
        )
        .bind(team_id)
        .fetch_all(&self.db)
        .await
        .map_err(db_err)
    }

    /// Team page, visible to the leader and members.
    pub async fn team_view(&self, team_id: i64, user: &User) -> Result<TeamView> {
        let team = self.team(team_id).await?;
        let members = self.members(team_id).await?;
        let is_leader = team.leader_id == user.user_id;
        if !is_leader && !members.iter().any(|m| m.student_id == user.user_id) {
            return Err(AppError::Authorization(
                "You are not a member of this team".to_string(),
            ));
        }

        let event = fetch_event(&self.db, team.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        let sql = format!(
            "{} WHERE i.team_id = ? AND i.status = ? ORDER BY i.invitation_id",
            INVITATION_SELECT
        );
        let pending_invitations = sqlx::query_as(&sql)
            .bind(team_id)
            .bind(InvitationStatus::Pending.as_str())
            .fetch_all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(TeamView {
            team,
            event,
            members,
            pending_invitations,
            is_leader,
        })
    }

    pub async fn invite(&self, team_id: i64, leader: &User, req: InviteRequest) -> Result<TeamInvitation> {
        let team = self.team(team_id).await?;
        if team.leader_id != leader.user_id {
            return Err(AppError::Authorization(
                "Only team leader can invite members".to_string(),
            ));
        }
        let event = fetch_event(&self.db, team.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        if self.member_count(team_id).await? >= event.max_team_size {
            return Err(AppError::Validation(format!(
                "Team already has maximum {} members",
                event.max_team_size
            )));
        }

        let username = req.username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        let invitee = UserService::new(self.db.clone())
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User \"{}\" not found", username)))?;
        if !matches!(invitee.role(), Some(Role::Student) | Some(Role::Guest)) {
            return Err(AppError::Validation(
                "You can only invite students or guest users by username".to_string(),
            ));
        }
        if invitee.user_id == leader.user_id {
            return Err(AppError::Validation("You cannot invite yourself".to_string()));
        }
        if self.find_for(team.event_id, invitee.user_id).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "{} is already registered for this event",
                invitee.full_name
            )));
        }
        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM team_invitations WHERE team_id = ? AND invitee_id = ? AND status = ?",
        )
        .bind(team_id)
        .bind(invitee.user_id)
        .bind(InvitationStatus::Pending.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(db_err)?;
        if pending > 0 {
            return Err(AppError::Conflict(format!(
                "{} already has a pending invitation",
                invitee.full_name
            )));
        }

        let result = sqlx::query(
            "INSERT INTO team_invitations (team_id, invitee_id, status, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(team_id)
        .bind(invitee.user_id)
        .bind(InvitationStatus::Pending.as_str())
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(db_err)?;

        tracing::info!(team_id, invitee_id = invitee.user_id, "Team invitation sent");
        self.invitation(result.last_insert_rowid()).await
    }

    async fn invitation(&self, invitation_id: i64) -> Result<TeamInvitation> {
        let sql = format!("{} WHERE i.invitation_id = ?", INVITATION_SELECT);
        sqlx::query_as(&sql)
            .bind(invitation_id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))
    }

    pub async fn pending_invitations(&self, invitee_id: i64) -> Result<Vec<TeamInvitation>> {
        let sql = format!(
            "{} WHERE i.invitee_id = ? AND i.status = ? ORDER BY i.invitation_id DESC",
            INVITATION_SELECT
        );
        sqlx::query_as(&sql)
            .bind(invitee_id)
            .bind(InvitationStatus::Pending.as_str())
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn close_invitation(&self, invitation_id: i64, status: InvitationStatus) -> Result<()> {
        sqlx::query("UPDATE team_invitations SET status = ?, responded_at = ? WHERE invitation_id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(invitation_id)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Accept or reject an invitation addressed to `user`.
    pub async fn respond(
        &self,
        invitation_id: i64,
        user: &User,
        action: InvitationAction,
    ) -> Result<TeamInvitation> {
        let invitation = self.invitation(invitation_id).await?;
        if invitation.invitee_id != user.user_id {
            return Err(AppError::Authorization("Invalid invitation".to_string()));
        }
        if invitation.status != InvitationStatus::Pending.as_str() {
            return Err(AppError::Conflict(
                "This invitation has already been responded to".to_string(),
            ));
        }

        if action == InvitationAction::Reject {
            self.close_invitation(invitation_id, InvitationStatus::Rejected)
                .await?;
            return self.invitation(invitation_id).await;
        }

        let event = fetch_event(&self.db, invitation.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        if self.find_for(event.event_id, user.user_id).await?.is_some() {
            self.close_invitation(invitation_id, InvitationStatus::Rejected)
                .await?;
            return Err(AppError::Conflict(
                "You are already registered for this event".to_string(),
            ));
        }
        if self.member_count(invitation.team_id).await? >= event.max_team_size {
            self.close_invitation(invitation_id, InvitationStatus::Rejected)
                .await?;
            return Err(AppError::Conflict("Team is already full".to_string()));
        }

        let mut tx = self.db.begin().await?;
        insert_registration(&mut tx, event.event_id, user.user_id, Some(invitation.team_id))
            .await?;
        sqlx::query("UPDATE team_invitations SET status = ?, responded_at = ? WHERE invitation_id = ?")
            .bind(InvitationStatus::Accepted.as_str())
            .bind(Utc::now())
            .bind(invitation_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await?;

        metrics_service::record_registration("invitation");
        tracing::info!(
            team_id = invitation.team_id,
            student_id = user.user_id,
            "Team invitation accepted"
        );
        self.invitation(invitation_id).await
    }

    pub async fn my_registrations(&self, student_id: i64, q: Option<&str>) -> Result<Vec<MyRegistration>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT r.registration_id, r.event_id, e.title AS event_title, e.event_date,
                   e.start_time, e.end_time, v.venue_name, e.mode, e.meeting_url, r.qr_code,
                   r.registered_at, r.team_id, t.team_name,
                   (a.attendance_id IS NOT NULL) AS attended
            FROM registrations r
            JOIN events e ON e.event_id = r.event_id
            LEFT JOIN venues v ON v.venue_id = e.venue_id
            LEFT JOIN teams t ON t.team_id = r.team_id
            LEFT JOIN attendance a ON a.registration_id = r.registration_id
            WHERE r.student_id = "#,
        );
        qb.push_bind(student_id);
        if let Some(q) = q.map(str::trim).filter(|q| !q.is_empty()) {
            qb.push(" AND lower(e.title) LIKE ")
                .push_bind(format!("%{}%", q.to_lowercase()));
        }
        qb.push(" ORDER BY r.registration_id DESC");
        qb.build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(campus_only: bool, status: &str) -> Event {
        Event {
            event_id: 7,
            title: "Quiz".into(),
            description: String::new(),
            event_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            venue_id: None,
            venue_name: None,
            dept_id: None,
            dept_name: None,
            mode: "offline".into(),
            meeting_url: None,
            poster_url: None,
            certificate_template_id: None,
            scan_token: None,
            organizer_id: 2,
            organizer_name: None,
            status: status.into(),
            created_at: Utc::now(),
            is_team_event: false,
            min_team_size: 1,
            max_team_size: 1,
            is_campus_exclusive: campus_only,
            has_prizes: false,
            duty_leave_provided: false,
        }
    }

    fn user(role: &str) -> User {
        User {
            user_id: 5,
            full_name: "Asha".into(),
            username: None,
            email: None,
            password: String::new(),
            role_id: 1,
            role_name: role.into(),
            dept_id: None,
            dept_name: None,
            created_at: Utc::now(),
            expiry_date: None,
            guest_status: "active".into(),
        }
    }

    #[test]
    fn test_qr_code_shape() {
        let code = qr_code_for(12, 34, 56);
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(&parts[..4], &["CE", "12", "34", "56"]);
        assert_eq!(parts[4].len(), 8);
        assert!(parts[4].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_guests_do_not_see_campus_events() {
        let campus = event(true, "approved");
        assert!(visible_to(&campus, &user("Student")));
        assert!(!visible_to(&campus, &user("Guest")));
        assert!(visible_to(&event(false, "approved"), &user("Guest")));
    }

    #[test]
    fn test_unapproved_events_hidden() {
        assert!(!visible_to(&event(false, "pending"), &user("Student")));
    }
}
