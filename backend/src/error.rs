//! Application error types and result alias.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Missing credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    Authorization(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Duplicate resource (e.g., email already registered)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and the stable `code` string sent to clients.
    fn classify(&self) -> (StatusCode, &'static str) {
        use StatusCode as S;
        match self {
            Self::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Json(_) => (S::BAD_REQUEST, "INVALID_JSON"),
            Self::Csv(_) => (S::BAD_REQUEST, "INVALID_CSV"),
            Self::Authentication(_) => (S::UNAUTHORIZED, "LOGIN_FAILED"),
            Self::Unauthorized(_) => (S::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Jwt(_) => (S::UNAUTHORIZED, "INVALID_TOKEN"),
            Self::Authorization(_) => (S::FORBIDDEN, "FORBIDDEN"),
            Self::NotFound(_) => (S::NOT_FOUND, "NOT_FOUND"),
            Self::Conflict(_) => (S::CONFLICT, "CONFLICT"),
            Self::Database(_) | Self::Sqlx(_) | Self::Migration(_) => {
                (S::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")
            }
            Self::Mail(_) => (S::INTERNAL_SERVER_ERROR, "MAIL_ERROR"),
            Self::Config(_) | Self::AddrParse(_) => (S::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Io(_) | Self::Internal(_) => (S::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Message safe to show a client. Server-side variants carry SQL, hosts
    /// or secrets, so only a generic sentence goes out for them.
    fn public_message(&self) -> String {
        match self {
            Self::Authentication(msg)
            | Self::Unauthorized(msg)
            | Self::Authorization(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Validation(msg) => msg.clone(),
            Self::Csv(e) => format!("Could not read the CSV file: {}", e),
            Self::Json(_) => "Request body is not valid JSON".to_string(),
            Self::Jwt(_) => "Session is invalid or has expired".to_string(),
            Self::Mail(_) => "Failed to send email. Please contact the administrator.".to_string(),
            Self::Database(_) | Self::Sqlx(_) | Self::Migration(_) => {
                "The campus database is unavailable. Please try again.".to_string()
            }
            Self::Config(_) | Self::AddrParse(_) => "The server is misconfigured".to_string(),
            Self::Io(_) | Self::Internal(_) => "Something went wrong on our side".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        if status.is_server_error() {
            tracing::error!(error = %self, code, "Request failed");
        } else {
            tracing::debug!(error = %self, code, "Request rejected");
        }

        let body = Json(json!({
            "code": code,
            "message": self.public_message(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_masked() {
        let cases = [
            AppError::Database("SELECT * FROM users WHERE user_id = 42".into()),
            AppError::Config("JWT_SECRET is invalid".into()),
            AppError::Mail("connection refused: smtp.internal:587".into()),
            AppError::Internal("stack trace at 0x7fff".into()),
        ];
        for err in cases {
            let message = err.public_message();
            assert!(!message.contains("SELECT"));
            assert!(!message.contains("JWT_SECRET"));
            assert!(!message.contains("smtp.internal"));
            assert!(!message.contains("0x7fff"));
            assert!(err.classify().0.is_server_error());
        }
    }

    #[test]
    fn test_client_errors_keep_their_message() {
        let err = AppError::Validation("End time must be after start time".into());
        assert_eq!(err.public_message(), "End time must be after start time");
        assert_eq!(err.classify(), (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"));

        let err = AppError::Authentication("Students must login using username.".into());
        assert_eq!(err.classify().0, StatusCode::UNAUTHORIZED);
        assert_eq!(err.public_message(), "Students must login using username.");
    }

    #[test]
    fn test_bad_token_is_unauthorized() {
        let err = jsonwebtoken::decode::<serde_json::Value>(
            "garbage",
            &jsonwebtoken::DecodingKey::from_secret(b"campus"),
            &jsonwebtoken::Validation::default(),
        )
        .unwrap_err();
        let err = AppError::from(err);
        assert_eq!(err.classify(), (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Authorization("no".into()).classify().0, StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("Event not found".into()).classify().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("taken".into()).classify().0, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_response_body_shape() {
        let response = AppError::NotFound("Event not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["message"], "Event not found");
    }
}
