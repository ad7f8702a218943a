//! Request handlers, one module per area.

pub mod admin;
pub mod approvals;
pub mod auth;
pub mod catalog;
pub mod health;
pub mod organizer;
pub mod profile;
pub mod student;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Plain acknowledgement body.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A downloadable body with a suggested file name.
pub fn attachment(content_type: &'static str, filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

/// Event dates and times are wall-clock values in the server's zone.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}
