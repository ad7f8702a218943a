//! Router assembly.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::auth::{
    auth_middleware, require_admin, require_approver, require_organizer, require_participant,
};
use super::middleware::demo::demo_guard;
use super::SharedState;

/// Build the full application router.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics))
        .route("/api-docs/openapi.json", get(handlers::health::openapi_json))
        .nest("/api/v1", api_v1_routes(state.clone()))
        .layer(from_fn_with_state(state.clone(), demo_guard))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

fn api_v1_routes(state: SharedState) -> Router<SharedState> {
    let protected = Router::new()
        .merge(handlers::auth::session_router())
        .nest("/profile", handlers::profile::router())
        .merge(handlers::catalog::router())
        .nest(
            "/organizer",
            handlers::organizer::router().route_layer(from_fn(require_organizer)),
        )
        .nest(
            "/approvals",
            handlers::approvals::router().route_layer(from_fn(require_approver)),
        )
        .nest(
            "/student",
            handlers::student::router().route_layer(from_fn(require_participant)),
        )
        .nest(
            "/admin",
            handlers::admin::router().route_layer(from_fn(require_admin)),
        )
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .nest("/auth", handlers::auth::public_router())
        .merge(protected)
}
