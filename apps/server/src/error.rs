//! Error types and HTTP error mapping

use crate::services::validation::ValidationReport;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Business rule violated: {0}")]
    BusinessRule(String),

    /// Clinical safety validation produced at least one critical issue.
    #[error("Clinical safety checks failed")]
    UnsafeTreatment(ValidationReport),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Error::NotFound(format!("{entity} {id} not found"))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::BusinessRule(_) | Error::UnsafeTreatment(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            Error::Database(_) | Error::Migration(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "database_error",
            Error::Migration(_) => "migration_error",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "invalid_request",
            Error::Conflict(_) => "conflict",
            Error::BusinessRule(_) => "business_rule_violation",
            Error::UnsafeTreatment(_) => "unsafe_treatment",
            Error::Unauthorized(_) => "unauthorized",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::Validation(errors.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        // Internal details stay in the logs.
        let message = match &self {
            Error::Database(sqlx::Error::RowNotFound) => "Record not found".to_string(),
            Error::Database(_) | Error::Migration(_) => "A database error occurred".to_string(),
            other => other.to_string(),
        };

        let body = match self {
            Error::UnsafeTreatment(report) => json!({
                "error": "unsafe_treatment",
                "message": message,
                "report": report,
            }),
            other => json!({
                "error": other.code(),
                "message": message,
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_variant() {
        assert_eq!(
            Error::not_found("Doctor", "x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::UnsafeTreatment(ValidationReport::default()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::Database(sqlx::Error::PoolTimedOut).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = Error::not_found("Blog", "abc");
        assert_eq!(err.to_string(), "Not found: Blog abc not found");
    }
}
