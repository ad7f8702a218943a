//! Self-service profile handlers.

use axum::{
    extract::{Extension, State},
    routing::get,
    Json, Router,
};

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::user::User;
use crate::services::user_service::{UpdateProfileRequest, UserService};

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_profile).put(update_profile))
}

/// GET /api/v1/profile
pub async fn get_profile(Extension(auth): Extension<AuthExtension>) -> Json<User> {
    Json(auth.user)
}

/// PUT /api/v1/profile
pub async fn update_profile(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let user = UserService::new(state.db.clone())
        .update_profile(&auth.user, payload)
        .await?;
    state
        .event_bus
        .emit("user.profile_updated", user.user_id, Some(auth.user_id));
    Ok(Json(user))
}
