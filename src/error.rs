//! Error types for Athenaeum server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error codes reported in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthenticated = 2,
    NotAuthorized = 3,
    DbFailure = 4,
    NoSuchAuthor = 5,
    NoSuchBook = 6,
    NoSuchMember = 7,
    NoSuchProfile = 8,
    NoSuchBorrowing = 9,
    IntegrityMismatch = 10,
    InvalidState = 11,
    Duplicate = 12,
    BadValue = 13,
    CacheFailure = 14,
}

/// Entity kinds, so clients can tell which reference was missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Author,
    Book,
    Member,
    Profile,
    Borrowing,
}

impl EntityKind {
    fn error_code(self) -> ErrorCode {
        match self {
            EntityKind::Author => ErrorCode::NoSuchAuthor,
            EntityKind::Book => ErrorCode::NoSuchBook,
            EntityKind::Member => ErrorCode::NoSuchMember,
            EntityKind::Profile => ErrorCode::NoSuchProfile,
            EntityKind::Borrowing => ErrorCode::NoSuchBorrowing,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EntityKind::Author => "Author",
            EntityKind::Book => "Book",
            EntityKind::Member => "Member",
            EntityKind::Profile => "Member profile",
            EntityKind::Borrowing => "Borrowing record",
        };
        write!(f, "{}", label)
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("{0} not found: {1}")]
    NotFound(EntityKind, String),

    #[error("Integrity mismatch: {0}")]
    IntegrityMismatch(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a not-found error on a numeric id
    pub fn not_found(kind: EntityKind, id: i32) -> Self {
        AppError::NotFound(kind, format!("{} with id {} not found", kind, id))
    }

    /// Authorization failure with the generic message shown to clients
    pub fn forbidden() -> Self {
        AppError::Authorization("Access denied".to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(kind, msg) => (StatusCode::NOT_FOUND, kind.error_code(), msg.clone()),
            AppError::IntegrityMismatch(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::IntegrityMismatch,
                msg.clone(),
            ),
            AppError::InvalidState(msg) => {
                (StatusCode::CONFLICT, ErrorCode::InvalidState, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Cache(msg) => {
                tracing::error!("Cache error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::CacheFailure,
                    "Cache error".to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone())
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::forbidden(), StatusCode::FORBIDDEN),
            (AppError::not_found(EntityKind::Book, 3), StatusCode::NOT_FOUND),
            (AppError::IntegrityMismatch("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::InvalidState("x".into()), StatusCode::CONFLICT),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Cache("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_not_found_names_entity() {
        let err = AppError::not_found(EntityKind::Borrowing, 12);
        assert_eq!(
            err.to_string(),
            "Borrowing record not found: Borrowing record with id 12 not found"
        );
    }
}
