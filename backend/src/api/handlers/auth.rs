//! Authentication handlers.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::handlers::MessageResponse;
use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::user::User;
use crate::services::auth_service::{LoginResponse, FORGOT_PASSWORD_MESSAGE};

#[derive(OpenApi)]
#[openapi(
    paths(login, me, request_guest_link, verify_guest_link, change_password, forgot_password, reset_password),
    components(schemas(
        LoginRequest,
        LoginResponse,
        GuestLinkRequest,
        ChangePasswordRequest,
        ForgotPasswordRequest,
        ResetPasswordRequest,
        MessageResponse,
        User,
    ))
)]
pub struct AuthApiDoc;

/// Routes reachable without a session.
pub fn public_router() -> Router<SharedState> {
    Router::new()
        .route("/login", post(login))
        .route("/guest/email", post(request_guest_link))
        .route("/guest/email/verify", get(verify_guest_link))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/:token", post(reset_password))
}

/// Routes that need a bearer token. Paths are absolute under `/api/v1`.
pub fn session_router() -> Router<SharedState> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/change-password", post(change_password))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username (students) or email address
    pub identifier: String,
    pub password: String,
}

/// POST /api/v1/auth/login
#[utoipa::path(
    post,
    path = "/login",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let response = state
        .auth_service()
        .login(&payload.identifier, &payload.password)
        .await?;
    state
        .event_bus
        .emit("user.login", response.user.user_id, Some(response.user.user_id));
    Ok(Json(response))
}

/// GET /api/v1/auth/me
#[utoipa::path(
    get,
    path = "/me",
    context_path = "/api/v1/auth",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(Extension(auth): Extension<AuthExtension>) -> Json<User> {
    Json(auth.user)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GuestLinkRequest {
    pub email: String,
}

/// POST /api/v1/auth/guest/email
#[utoipa::path(
    post,
    path = "/guest/email",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = GuestLinkRequest,
    responses(
        (status = 200, description = "Link sent", body = MessageResponse),
        (status = 403, description = "Guest login disabled", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "Email belongs to a registered account", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn request_guest_link(
    State(state): State<SharedState>,
    Json(payload): Json<GuestLinkRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .auth_service()
        .request_guest_link(&payload.email, state.notifier.mailer())
        .await?;
    Ok(Json(MessageResponse::new(
        "Login link sent to your email. Please check your inbox.",
    )))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

/// GET /api/v1/auth/guest/email/verify
#[utoipa::path(
    get,
    path = "/guest/email/verify",
    context_path = "/api/v1/auth",
    tag = "auth",
    params(("token" = String, Query, description = "Signed guest login token")),
    responses(
        (status = 200, description = "Guest session", body = LoginResponse),
        (status = 401, description = "Invalid or expired link", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn verify_guest_link(
    State(state): State<SharedState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<LoginResponse>> {
    let response = state.auth_service().verify_guest_link(&query.token).await?;
    state
        .event_bus
        .emit("guest.login", response.user.user_id, Some(response.user.user_id));
    Ok(Json(response))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// POST /api/v1/auth/change-password
#[utoipa::path(
    post,
    path = "/change-password",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Validation failed", body = crate::api::openapi::ErrorResponse),
        (status = 403, description = "Guests cannot change passwords", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .auth_service()
        .change_password(
            &auth.user,
            &payload.old_password,
            &payload.new_password,
            &payload.confirm_password,
        )
        .await?;
    state
        .event_bus
        .emit("user.password_changed", auth.user_id, Some(auth.user_id));
    Ok(Json(MessageResponse::new("Password updated successfully.")))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    /// Email address or username
    pub identifier: String,
}

/// POST /api/v1/auth/forgot-password
#[utoipa::path(
    post,
    path = "/forgot-password",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Generic acknowledgement", body = MessageResponse))
)]
pub async fn forgot_password(
    State(state): State<SharedState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .auth_service()
        .forgot_password(&payload.identifier, state.notifier.mailer())
        .await?;
    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub new_password: String,
    pub confirm_password: String,
}

/// POST /api/v1/auth/reset-password/:token
#[utoipa::path(
    post,
    path = "/reset-password/{token}",
    context_path = "/api/v1/auth",
    tag = "auth",
    params(("token" = String, Path, description = "Signed reset token")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 401, description = "Invalid or expired link", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn reset_password(
    State(state): State<SharedState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .auth_service()
        .reset_password(&token, &payload.new_password, &payload.confirm_password)
        .await?;
    Ok(Json(MessageResponse::new(
        "Your password has been reset. You can now log in.",
    )))
}
