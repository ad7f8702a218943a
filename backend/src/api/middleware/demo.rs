//! Read-only mode: rejects writes except authentication.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::SharedState;
use crate::error::AppError;

/// Paths that stay writable in demo mode so users can still log in.
const WRITABLE_PREFIX: &str = "/api/v1/auth";

fn is_allowed(method: &Method, path: &str) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
        || path.starts_with(WRITABLE_PREFIX)
}

/// Middleware that rejects write operations (POST/PUT/DELETE/PATCH) in demo mode.
pub async fn demo_guard(
    State(state): State<SharedState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.demo_mode || is_allowed(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    AppError::Authorization(
        "Write operations are disabled in demo mode.".to_string(),
    )
    .into_response()
}
