//! Student and guest handlers: browsing, registration, teams, certificates
//! and feedback.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::handlers::{attachment, local_now, HTML_CONTENT_TYPE};
use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::feedback::Feedback;
use crate::models::registration::{Registration, Team, TeamInvitation};
use crate::services::certificate_service::{CertificateService, StudentCertificate};
use crate::services::feedback_service::{FeedbackService, SubmitFeedbackRequest};
use crate::services::registration_service::{
    CreateTeamRequest, InvitationAction, InviteRequest, MyRegistration, RegistrationService,
    StudentDashboard, StudentEventList, StudentEventsQuery, TeamView,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/events", get(list_events))
        .route("/events/:id/register", post(register))
        .route("/events/:id/teams", post(create_team))
        .route("/events/:id/feedback", post(submit_feedback))
        .route("/teams/:id", get(view_team))
        .route("/teams/:id/invitations", post(invite))
        .route("/invitations", get(list_invitations))
        .route("/invitations/:id/accept", post(accept_invitation))
        .route("/invitations/:id/reject", post(reject_invitation))
        .route("/registrations", get(my_registrations))
        .route("/certificates", get(my_certificates))
        .route("/certificates/:id/download", get(download_certificate))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

fn registrations(state: &SharedState) -> RegistrationService {
    RegistrationService::new(state.db.clone())
}

/// GET /api/v1/student/dashboard
pub async fn dashboard(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<StudentDashboard>> {
    Ok(Json(
        registrations(&state)
            .dashboard(&auth.user, local_now())
            .await?,
    ))
}

/// GET /api/v1/student/events
pub async fn list_events(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Query(query): Query<StudentEventsQuery>,
) -> Result<Json<StudentEventList>> {
    Ok(Json(
        registrations(&state)
            .list_events(&auth.user, &query, local_now())
            .await?,
    ))
}

/// POST /api/v1/student/events/:id/register
pub async fn register(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<Registration>)> {
    let registration = registrations(&state).register(id, &auth.user).await?;
    state.event_bus.emit(
        "registration.created",
        registration.registration_id,
        Some(auth.user_id),
    );
    Ok((StatusCode::CREATED, Json(registration)))
}

/// POST /api/v1/student/events/:id/teams
pub async fn create_team(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<Team>)> {
    let team = registrations(&state)
        .create_team(id, &auth.user, payload)
        .await?;
    state
        .event_bus
        .emit("team.created", team.team_id, Some(auth.user_id));
    Ok((StatusCode::CREATED, Json(team)))
}

/// GET /api/v1/student/teams/:id
pub async fn view_team(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<TeamView>> {
    Ok(Json(registrations(&state).team_view(id, &auth.user).await?))
}

/// POST /api/v1/student/teams/:id/invitations
pub async fn invite(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    Json(payload): Json<InviteRequest>,
) -> Result<(StatusCode, Json<TeamInvitation>)> {
    let invitation = registrations(&state)
        .invite(id, &auth.user, payload)
        .await?;
    state.event_bus.emit(
        "invitation.sent",
        invitation.invitation_id,
        Some(auth.user_id),
    );
    Ok((StatusCode::CREATED, Json(invitation)))
}

/// GET /api/v1/student/invitations
pub async fn list_invitations(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<Vec<TeamInvitation>>> {
    Ok(Json(
        registrations(&state)
            .pending_invitations(auth.user_id)
            .await?,
    ))
}

async fn respond(
    state: SharedState,
    auth: AuthExtension,
    invitation_id: i64,
    action: InvitationAction,
) -> Result<Json<TeamInvitation>> {
    let invitation = registrations(&state)
        .respond(invitation_id, &auth.user, action)
        .await?;
    let event_type = match action {
        InvitationAction::Accept => "invitation.accepted",
        InvitationAction::Reject => "invitation.rejected",
    };
    state
        .event_bus
        .emit(event_type, invitation_id, Some(auth.user_id));
    Ok(Json(invitation))
}

/// POST /api/v1/student/invitations/:id/accept
pub async fn accept_invitation(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<TeamInvitation>> {
    respond(state, auth, id, InvitationAction::Accept).await
}

/// POST /api/v1/student/invitations/:id/reject
pub async fn reject_invitation(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<TeamInvitation>> {
    respond(state, auth, id, InvitationAction::Reject).await
}

/// GET /api/v1/student/registrations
pub async fn my_registrations(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<MyRegistration>>> {
    Ok(Json(
        registrations(&state)
            .my_registrations(auth.user_id, query.q.as_deref())
            .await?,
    ))
}

/// POST /api/v1/student/events/:id/feedback
pub async fn submit_feedback(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitFeedbackRequest>,
) -> Result<Json<Feedback>> {
    let feedback = FeedbackService::new(state.db.clone())
        .submit(id, auth.user_id, payload, local_now())
        .await?;
    state
        .event_bus
        .emit("feedback.submitted", feedback.feedback_id, Some(auth.user_id));
    Ok(Json(feedback))
}

/// GET /api/v1/student/certificates
pub async fn my_certificates(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<StudentCertificate>>> {
    Ok(Json(
        CertificateService::new(state.db.clone())
            .student_certificates(auth.user_id, query.q.as_deref())
            .await?,
    ))
}

/// GET /api/v1/student/certificates/:id/download
pub async fn download_certificate(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Response> {
    let (filename, html) = CertificateService::new(state.db.clone())
        .download(id, auth.user_id)
        .await?;
    Ok(attachment(HTML_CONTENT_TYPE, &filename, html))
}
