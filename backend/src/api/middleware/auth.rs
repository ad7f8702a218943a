//! Bearer-token authentication and role gates.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::SharedState;
use crate::error::AppError;
use crate::models::role::Role;
use crate::models::user::User;

/// Authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthExtension {
    pub user_id: i64,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_admin: bool,
    pub user: User,
}

impl AuthExtension {
    pub fn from_user(user: User) -> Self {
        let role = user.role();
        Self {
            user_id: user.user_id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            role,
            is_admin: role == Some(Role::Admin),
            user,
        }
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.role.map(|r| roles.contains(&r)).unwrap_or(false)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let header = header?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Require a valid session token and attach the caller to the request.
pub async fn auth_middleware(
    State(state): State<SharedState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let Some(token) = bearer_token(header) else {
        return AppError::Unauthorized("Authentication required".to_string()).into_response();
    };

    match state.auth_service().authenticate(token).await {
        Ok(user) => {
            request
                .extensions_mut()
                .insert(AuthExtension::from_user(user));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

async fn require_roles(roles: &[Role], request: Request<Body>, next: Next) -> Response {
    let allowed = request
        .extensions()
        .get::<AuthExtension>()
        .map(|auth| auth.has_any_role(roles));

    match allowed {
        Some(true) => next.run(request).await,
        Some(false) => {
            AppError::Authorization("You do not have permission to access this page".to_string())
                .into_response()
        }
        None => AppError::Unauthorized("Authentication required".to_string()).into_response(),
    }
}

pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    require_roles(&[Role::Admin], request, next).await
}

pub async fn require_organizer(request: Request<Body>, next: Next) -> Response {
    require_roles(&[Role::Organizer], request, next).await
}

pub async fn require_approver(request: Request<Body>, next: Next) -> Response {
    require_roles(&[Role::Hod, Role::Principal], request, next).await
}

/// Students and guests.
pub async fn require_participant(request: Request<Body>, next: Next) -> Response {
    require_roles(&[Role::Student, Role::Guest], request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(Some("bearer   xyz ")), Some("xyz"));
        assert_eq!(bearer_token(Some("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("Bearer")), None);
        assert_eq!(bearer_token(None), None);
    }
}
