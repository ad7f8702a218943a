//! Departments and venues.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::SharedState;
use crate::error::Result;
use crate::models::catalog::{Department, Venue};
use crate::services::catalog_service::{CatalogService, CreateDepartmentRequest, CreateVenueRequest};

/// Read-only listings for any signed-in user.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/departments", get(list_departments))
        .route("/venues", get(list_venues))
}

/// Creation endpoints, nested under `/admin`.
pub fn admin_router() -> Router<SharedState> {
    Router::new()
        .route("/departments", post(create_department))
        .route("/venues", post(create_venue))
}

/// GET /api/v1/departments
pub async fn list_departments(State(state): State<SharedState>) -> Result<Json<Vec<Department>>> {
    Ok(Json(
        CatalogService::new(state.db.clone())
            .list_departments()
            .await?,
    ))
}

/// GET /api/v1/venues
pub async fn list_venues(State(state): State<SharedState>) -> Result<Json<Vec<Venue>>> {
    Ok(Json(CatalogService::new(state.db.clone()).list_venues().await?))
}

/// POST /api/v1/admin/departments
pub async fn create_department(
    State(state): State<SharedState>,
    Json(payload): Json<CreateDepartmentRequest>,
) -> Result<(StatusCode, Json<Department>)> {
    let department = CatalogService::new(state.db.clone())
        .create_department(payload)
        .await?;
    state
        .event_bus
        .emit("department.created", department.dept_id, None);
    Ok((StatusCode::CREATED, Json(department)))
}

/// POST /api/v1/admin/venues
pub async fn create_venue(
    State(state): State<SharedState>,
    Json(payload): Json<CreateVenueRequest>,
) -> Result<(StatusCode, Json<Venue>)> {
    let venue = CatalogService::new(state.db.clone())
        .create_venue(payload)
        .await?;
    state.event_bus.emit("venue.created", venue.venue_id, None);
    Ok((StatusCode::CREATED, Json(venue)))
}
