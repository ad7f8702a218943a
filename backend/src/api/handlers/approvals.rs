//! HOD and Principal approval handlers.

use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use utoipa::OpenApi;

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::approval::Approval;
use crate::services::approval_service::{Decision, DecisionOutcome, DecisionRequest};

#[derive(OpenApi)]
#[openapi(
    paths(list_pending, list_history, approve, reject),
    components(schemas(Approval, DecisionRequest, DecisionOutcome))
)]
pub struct ApprovalsApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/pending", get(list_pending))
        .route("/history", get(list_history))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
}

/// GET /api/v1/approvals/pending
#[utoipa::path(
    get,
    path = "/pending",
    context_path = "/api/v1/approvals",
    tag = "approvals",
    responses(
        (status = 200, description = "Approvals awaiting the caller", body = Vec<Approval>),
        (status = 403, description = "Caller is not an approver", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_pending(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<Vec<Approval>>> {
    Ok(Json(state.approval_service().pending_for(&auth.user).await?))
}

/// GET /api/v1/approvals/history
#[utoipa::path(
    get,
    path = "/history",
    context_path = "/api/v1/approvals",
    tag = "approvals",
    responses(
        (status = 200, description = "Approvals already decided by the caller", body = Vec<Approval>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_history(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<Vec<Approval>>> {
    Ok(Json(state.approval_service().history_for(&auth.user).await?))
}

async fn decide(
    state: SharedState,
    auth: AuthExtension,
    approval_id: i64,
    decision: Decision,
    payload: Option<DecisionRequest>,
) -> Result<Json<DecisionOutcome>> {
    let remarks = payload.and_then(|p| p.remarks);
    let outcome = state
        .approval_service()
        .decide(approval_id, &auth.user, decision, remarks)
        .await?;

    let event_type = match decision {
        Decision::Approve => "approval.approved",
        Decision::Reject => "approval.rejected",
    };
    state
        .event_bus
        .emit(event_type, approval_id, Some(auth.user_id));
    Ok(Json(outcome))
}

/// POST /api/v1/approvals/:id/approve
#[utoipa::path(
    post,
    path = "/{id}/approve",
    context_path = "/api/v1/approvals",
    tag = "approvals",
    params(("id" = i64, Path, description = "Approval ID")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Approval recorded", body = DecisionOutcome),
        (status = 400, description = "Waiting for an earlier step", body = crate::api::openapi::ErrorResponse),
        (status = 403, description = "Assigned to someone else", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "Already decided", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn approve(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    payload: Option<Json<DecisionRequest>>,
) -> Result<Json<DecisionOutcome>> {
    decide(state, auth, id, Decision::Approve, payload.map(|Json(p)| p)).await
}

/// POST /api/v1/approvals/:id/reject
#[utoipa::path(
    post,
    path = "/{id}/reject",
    context_path = "/api/v1/approvals",
    tag = "approvals",
    params(("id" = i64, Path, description = "Approval ID")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Rejection recorded", body = DecisionOutcome),
        (status = 403, description = "Assigned to someone else", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "Already decided", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn reject(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    payload: Option<Json<DecisionRequest>>,
) -> Result<Json<DecisionOutcome>> {
    decide(state, auth, id, Decision::Reject, payload.map(|Json(p)| p)).await
}
