//! Administration handlers: dashboard, reports, users, guests and feedback.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::handlers::{attachment, catalog, local_now, MessageResponse, CSV_CONTENT_TYPE};
use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::event::Event;
use crate::models::role::RoleRow;
use crate::models::user::User;
use crate::services::feedback_service::{EventFeedback, FeedbackFilter, FeedbackOverview, FeedbackService};
use crate::services::guest_service::{CleanupReport, GuestOverview, GuestService};
use crate::services::report_service::{
    AdminDashboard, AdminEventDetail, AdminEventFilter, ReportFilter, ReportService, Reports,
};
use crate::services::settings_service::{GuestSettings, SettingsService};
use crate::services::user_service::{
    BulkUploadResult, CreateUserRequest, UpdateUserRequest, UserListQuery, UserService,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/events", get(list_events))
        .route("/events/export.csv", get(export_events))
        .route("/events/:id", get(view_event))
        .route("/reports", get(reports))
        .route("/reports/export", get(export_reports))
        .route("/roles", get(list_roles))
        .route("/users", get(list_users).post(create_user))
        .route("/users/bulk-upload", post(bulk_upload))
        .route("/users/bulk-template.csv", get(bulk_template))
        .route("/users/:id", put(update_user).delete(delete_user))
        .route("/guest-login/toggle", post(toggle_guest_login))
        .route("/guests", get(list_guests))
        .route("/guests/settings", put(update_guest_settings))
        .route("/guests/cleanup", post(cleanup_guests))
        .route("/guests/:id", delete(delete_guest))
        .route("/guests/:id/deactivate", post(deactivate_guest))
        .route("/feedback", get(feedback_overview))
        .route("/feedback/events/:id", get(event_feedback))
        .merge(catalog::admin_router())
}

fn reports_service(state: &SharedState) -> ReportService {
    ReportService::new(state.db.clone())
}

fn users(state: &SharedState) -> UserService {
    UserService::new(state.db.clone())
}

/// GET /api/v1/admin/dashboard
pub async fn dashboard(State(state): State<SharedState>) -> Result<Json<AdminDashboard>> {
    Ok(Json(
        reports_service(&state)
            .dashboard(local_now().date())
            .await?,
    ))
}

/// GET /api/v1/admin/events
pub async fn list_events(
    State(state): State<SharedState>,
    Query(filter): Query<AdminEventFilter>,
) -> Result<Json<Vec<Event>>> {
    Ok(Json(reports_service(&state).events(&filter).await?))
}

/// GET /api/v1/admin/events/export.csv
pub async fn export_events(
    State(state): State<SharedState>,
    Query(filter): Query<AdminEventFilter>,
) -> Result<Response> {
    let (filename, body) = reports_service(&state).events_csv(&filter).await?;
    Ok(attachment(CSV_CONTENT_TYPE, &filename, body))
}

/// GET /api/v1/admin/events/:id
pub async fn view_event(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<AdminEventDetail>> {
    Ok(Json(reports_service(&state).event_detail(id).await?))
}

/// GET /api/v1/admin/reports
pub async fn reports(
    State(state): State<SharedState>,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<Reports>> {
    Ok(Json(
        reports_service(&state)
            .reports(&filter, local_now().date())
            .await?,
    ))
}

/// GET /api/v1/admin/reports/export
///
/// CSV of the report aggregates under the same filters.
pub async fn export_reports(
    State(state): State<SharedState>,
    Query(filter): Query<ReportFilter>,
) -> Result<Response> {
    let (filename, body) = reports_service(&state)
        .reports_csv(&filter, local_now().date())
        .await?;
    Ok(attachment(CSV_CONTENT_TYPE, &filename, body))
}

/// GET /api/v1/admin/roles
pub async fn list_roles(State(state): State<SharedState>) -> Result<Json<Vec<RoleRow>>> {
    Ok(Json(users(&state).list_roles().await?))
}

/// GET /api/v1/admin/users
pub async fn list_users(
    State(state): State<SharedState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(users(&state).list_users(&query).await?))
}

/// POST /api/v1/admin/users
pub async fn create_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = users(&state)
        .create_user_admin(payload, state.config.bcrypt_cost)
        .await?;
    state
        .event_bus
        .emit("user.created", user.user_id, Some(auth.user_id));
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /api/v1/admin/users/:id
pub async fn update_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    let user = users(&state).update_user_admin(id, payload).await?;
    state
        .event_bus
        .emit("user.updated", user.user_id, Some(auth.user_id));
    Ok(Json(user))
}

/// DELETE /api/v1/admin/users/:id
pub async fn delete_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    users(&state).delete_user(id, auth.user_id).await?;
    state.event_bus.emit("user.deleted", id, Some(auth.user_id));
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct BulkUploadQuery {
    pub default_password: Option<String>,
}

/// POST /api/v1/admin/users/bulk-upload
///
/// The body is the CSV text itself.
pub async fn bulk_upload(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Query(query): Query<BulkUploadQuery>,
    body: String,
) -> Result<Json<BulkUploadResult>> {
    let result = users(&state)
        .bulk_upload_students(
            &body,
            query.default_password.as_deref().unwrap_or(""),
            state.config.bcrypt_cost,
        )
        .await?;
    state
        .event_bus
        .emit("user.bulk_upload", result.created, Some(auth.user_id));
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    pub dept_id: Option<i64>,
}

/// GET /api/v1/admin/users/bulk-template.csv
pub async fn bulk_template(
    State(state): State<SharedState>,
    Query(query): Query<TemplateQuery>,
) -> Result<Response> {
    let (filename, body) = users(&state).bulk_template(query.dept_id).await?;
    Ok(attachment(CSV_CONTENT_TYPE, &filename, body))
}

#[derive(Debug, Serialize)]
pub struct GuestToggleResponse {
    pub guest_enabled: bool,
    pub message: String,
}

/// POST /api/v1/admin/guest-login/toggle
pub async fn toggle_guest_login(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<GuestToggleResponse>> {
    let enabled = SettingsService::new(state.db.clone())
        .toggle_guest_enabled()
        .await?;
    tracing::info!(enabled, admin = auth.user_id, "Guest login toggled");
    Ok(Json(GuestToggleResponse {
        guest_enabled: enabled,
        message: if enabled {
            "Guest login enabled.".to_string()
        } else {
            "Guest login disabled.".to_string()
        },
    }))
}

/// GET /api/v1/admin/guests
pub async fn list_guests(State(state): State<SharedState>) -> Result<Json<GuestOverview>> {
    Ok(Json(GuestService::new(state.db.clone()).overview().await?))
}

/// PUT /api/v1/admin/guests/settings
pub async fn update_guest_settings(
    State(state): State<SharedState>,
    Json(payload): Json<GuestSettings>,
) -> Result<Json<GuestSettings>> {
    Ok(Json(
        SettingsService::new(state.db.clone())
            .update_guest_settings(&payload)
            .await?,
    ))
}

/// POST /api/v1/admin/guests/:id/deactivate
pub async fn deactivate_guest(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<User>> {
    let guest = GuestService::new(state.db.clone()).deactivate(id).await?;
    state
        .event_bus
        .emit("guest.deactivated", id, Some(auth.user_id));
    Ok(Json(guest))
}

/// DELETE /api/v1/admin/guests/:id
pub async fn delete_guest(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    GuestService::new(state.db.clone()).delete(id).await?;
    state.event_bus.emit("guest.deleted", id, Some(auth.user_id));
    Ok(Json(MessageResponse::new(
        "Guest user and related data deleted.",
    )))
}

/// POST /api/v1/admin/guests/cleanup
pub async fn cleanup_guests(
    State(state): State<SharedState>,
) -> Result<Json<CleanupReport>> {
    Ok(Json(
        GuestService::new(state.db.clone())
            .cleanup(Utc::now())
            .await?,
    ))
}

/// GET /api/v1/admin/feedback
pub async fn feedback_overview(
    State(state): State<SharedState>,
    Query(filter): Query<FeedbackFilter>,
) -> Result<Json<FeedbackOverview>> {
    Ok(Json(
        FeedbackService::new(state.db.clone())
            .overview(&filter)
            .await?,
    ))
}

/// GET /api/v1/admin/feedback/events/:id
pub async fn event_feedback(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<EventFeedback>> {
    Ok(Json(
        FeedbackService::new(state.db.clone())
            .admin_event_view(id)
            .await?,
    ))
}
