//! Organizer handlers: events, scanning, certificate templates and prizes.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::api::handlers::{attachment, local_now, MessageResponse, CSV_CONTENT_TYPE};
use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::certificate::CertificateTemplate;
use crate::models::registration::Attendance;
use crate::services::attendance_service::{
    AttendanceService, AttendanceUploadReport, ScanRequest, ScanResult, ScanStatus,
};
use crate::services::certificate_service::{
    CertificateService, CreateTemplateRequest, IndividualPrizeRequest, PrizeOutcome,
    TeamPrizeRequest, UpdateTemplateRequest,
};
use crate::services::event_service::{
    DashboardQuery, EventDetail, EventRequest, EventSaved, EventService, EventStats,
    OrganizerDashboard,
};
use crate::services::feedback_service::{EventFeedback, FeedbackService};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/events", post(create_event))
        .route(
            "/events/:id",
            get(view_event).put(edit_event).delete(delete_event),
        )
        .route("/events/:id/stats", get(event_stats))
        .route("/events/:id/feedback", get(event_feedback))
        .route("/events/:id/attendance.csv", get(export_attendance))
        .route("/events/:id/attendance-upload", post(upload_attendance))
        .route("/events/:id/prizes/team", post(assign_team_prize))
        .route("/events/:id/prizes/team/:team_id", delete(clear_team_prize))
        .route("/events/:id/prizes/individual", post(assign_individual_prize))
        .route(
            "/events/:id/prizes/individual/:registration_id",
            delete(clear_individual_prize),
        )
        .route("/scan", post(scan))
        .route("/registrations/:id/attendance", post(mark_attendance))
        .route(
            "/certificate-templates",
            get(list_templates).post(create_template),
        )
        .route(
            "/certificate-templates/:id",
            put(update_template).delete(delete_template),
        )
        .route("/certificate-templates/:id/default", post(set_default_template))
}

fn events(state: &SharedState) -> EventService {
    EventService::new(state.db.clone())
}

fn certificates(state: &SharedState) -> CertificateService {
    CertificateService::new(state.db.clone())
}

/// GET /api/v1/organizer/dashboard
pub async fn dashboard(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<OrganizerDashboard>> {
    let dashboard = events(&state)
        .dashboard(auth.user_id, &query, local_now())
        .await?;
    Ok(Json(dashboard))
}

/// POST /api/v1/organizer/events
pub async fn create_event(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<EventRequest>,
) -> Result<(StatusCode, Json<EventSaved>)> {
    let today = local_now().date();
    let (event, chain) = events(&state)
        .create(auth.user_id, payload, today, &state.approval_service())
        .await?;

    state
        .event_bus
        .emit("event.created", event.event_id, Some(auth.user_id));
    if chain.is_empty() {
        state
            .event_bus
            .emit("event.auto_approved", event.event_id, Some(auth.user_id));
    }

    // The chain may have changed the status.
    let event = events(&state).get(event.event_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(EventSaved {
            event,
            submitted_for_approval: !chain.is_empty(),
        }),
    ))
}

/// GET /api/v1/organizer/events/:id
pub async fn view_event(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<EventDetail>> {
    Ok(Json(events(&state).view(id, auth.user_id, local_now()).await?))
}

/// PUT /api/v1/organizer/events/:id
pub async fn edit_event(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    Json(payload): Json<EventRequest>,
) -> Result<Json<EventSaved>> {
    let today = local_now().date();
    let saved = events(&state)
        .edit(id, auth.user_id, payload, today, &state.approval_service())
        .await?;
    state.event_bus.emit("event.updated", id, Some(auth.user_id));
    if saved.submitted_for_approval {
        state
            .event_bus
            .emit("event.resubmitted", id, Some(auth.user_id));
    }
    Ok(Json(saved))
}

/// DELETE /api/v1/organizer/events/:id
pub async fn delete_event(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    events(&state).delete(id, auth.user_id).await?;
    state.event_bus.emit("event.deleted", id, Some(auth.user_id));
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/organizer/events/:id/stats
pub async fn event_stats(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<EventStats>> {
    Ok(Json(events(&state).stats(id, auth.user_id).await?))
}

/// GET /api/v1/organizer/events/:id/feedback
pub async fn event_feedback(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<EventFeedback>> {
    let feedback = FeedbackService::new(state.db.clone())
        .organizer_view(id, auth.user_id, local_now())
        .await?;
    Ok(Json(feedback))
}

/// GET /api/v1/organizer/events/:id/attendance.csv
pub async fn export_attendance(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Response> {
    let (filename, body) = events(&state).attendance_csv(id, auth.user_id).await?;
    Ok(attachment(CSV_CONTENT_TYPE, &filename, body))
}

/// POST /api/v1/organizer/events/:id/attendance-upload
///
/// The body is a CSV sheet with an email or username column.
pub async fn upload_attendance(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    body: String,
) -> Result<Json<AttendanceUploadReport>> {
    let report = AttendanceService::new(state.db.clone())
        .upload_attendance(id, auth.user_id, &body, local_now())
        .await?;
    if report.marked > 0 {
        state
            .event_bus
            .emit("attendance.uploaded", id, Some(auth.user_id));
    }
    Ok(Json(report))
}

/// POST /api/v1/organizer/scan
pub async fn scan(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<ScanResult>> {
    let result = AttendanceService::new(state.db.clone())
        .scan(auth.user_id, &payload, local_now())
        .await?;
    if result.status == ScanStatus::Success {
        state
            .event_bus
            .emit("attendance.marked", payload.event_id, Some(auth.user_id));
    }
    Ok(Json(result))
}

/// POST /api/v1/organizer/registrations/:id/attendance
pub async fn mark_attendance(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<Attendance>)> {
    let attendance = AttendanceService::new(state.db.clone())
        .mark_manual(id, auth.user_id, local_now())
        .await?;
    state
        .event_bus
        .emit("attendance.marked", id, Some(auth.user_id));
    Ok((StatusCode::CREATED, Json(attendance)))
}

/// GET /api/v1/organizer/certificate-templates
pub async fn list_templates(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<Vec<CertificateTemplate>>> {
    Ok(Json(certificates(&state).list_templates(auth.user_id).await?))
}

/// POST /api/v1/organizer/certificate-templates
pub async fn create_template(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<CertificateTemplate>)> {
    let template = certificates(&state)
        .create_template(auth.user_id, payload)
        .await?;
    state.event_bus.emit(
        "certificate_template.created",
        template.template_id,
        Some(auth.user_id),
    );
    Ok((StatusCode::CREATED, Json(template)))
}

/// PUT /api/v1/organizer/certificate-templates/:id
pub async fn update_template(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTemplateRequest>,
) -> Result<Json<CertificateTemplate>> {
    let template = certificates(&state)
        .update_template(id, auth.user_id, payload)
        .await?;
    Ok(Json(template))
}

/// POST /api/v1/organizer/certificate-templates/:id/default
pub async fn set_default_template(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<CertificateTemplate>> {
    let template = certificates(&state)
        .set_default_template(id, auth.user_id)
        .await?;
    Ok(Json(template))
}

/// DELETE /api/v1/organizer/certificate-templates/:id
pub async fn delete_template(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    certificates(&state)
        .delete_template(id, auth.user_id)
        .await?;
    state
        .event_bus
        .emit("certificate_template.deleted", id, Some(auth.user_id));
    Ok(Json(MessageResponse::new("Template deleted successfully.")))
}

/// POST /api/v1/organizer/events/:id/prizes/team
pub async fn assign_team_prize(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    Json(payload): Json<TeamPrizeRequest>,
) -> Result<Json<PrizeOutcome>> {
    let outcome = certificates(&state)
        .assign_team_prize(id, auth.user_id, payload)
        .await?;
    state.event_bus.emit("prize.assigned", id, Some(auth.user_id));
    Ok(Json(outcome))
}

/// DELETE /api/v1/organizer/events/:id/prizes/team/:team_id
pub async fn clear_team_prize(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path((id, team_id)): Path<(i64, i64)>,
) -> Result<Json<PrizeOutcome>> {
    let outcome = certificates(&state)
        .clear_team_prize(id, auth.user_id, team_id)
        .await?;
    state.event_bus.emit("prize.cleared", id, Some(auth.user_id));
    Ok(Json(outcome))
}

/// POST /api/v1/organizer/events/:id/prizes/individual
pub async fn assign_individual_prize(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    Json(payload): Json<IndividualPrizeRequest>,
) -> Result<Json<PrizeOutcome>> {
    let outcome = certificates(&state)
        .assign_individual_prize(id, auth.user_id, payload)
        .await?;
    state.event_bus.emit("prize.assigned", id, Some(auth.user_id));
    Ok(Json(outcome))
}

/// DELETE /api/v1/organizer/events/:id/prizes/individual/:registration_id
pub async fn clear_individual_prize(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path((id, registration_id)): Path<(i64, i64)>,
) -> Result<Json<PrizeOutcome>> {
    let outcome = certificates(&state)
        .clear_individual_prize(id, auth.user_id, registration_id)
        .await?;
    state.event_bus.emit("prize.cleared", id, Some(auth.user_id));
    Ok(Json(outcome))
}
