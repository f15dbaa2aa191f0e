//! Error types for Quote Table services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses carrying per-field validation messages
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::store::StoreError;
use crate::validation::Validator;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationFailed,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidCredentials,

    // Authorization errors (3xxx)
    Forbidden,

    // Resource errors (4xxx)
    NotFound,

    // Conflict errors (5xxx)
    DuplicateName,
    DuplicateEmail,

    // Rate limiting (6xxx)
    RateLimited,

    // Store errors (7xxx)
    StoreError,
    Inconsistent,

    // Internal errors (9xxx)
    InternalError,
    SerializationError,
    SessionError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationFailed => 1001,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidCredentials => 2002,

            ErrorCode::Forbidden => 3001,

            ErrorCode::NotFound => 4001,

            ErrorCode::DuplicateName => 5001,
            ErrorCode::DuplicateEmail => 5002,

            ErrorCode::RateLimited => 6001,

            ErrorCode::StoreError => 7001,
            ErrorCode::Inconsistent => 7002,

            ErrorCode::InternalError => 9001,
            ErrorCode::SerializationError => 9003,
            ErrorCode::SessionError => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Field and non-field errors collected for one submission
    #[error("Validation failed")]
    ValidationFailed(Validator),

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Unknown account and wrong password are deliberately the same value
    #[error("Invalid credentials")]
    InvalidCredentials,

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Conflict errors
    #[error("Duplicate author name: {name}")]
    DuplicateName { name: String },

    #[error("Duplicate email: {email}")]
    DuplicateEmail { email: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Inconsistent store response: {message}")]
    Inconsistent { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Session error: {message}")]
    Session { message: String },
}

impl AppError {
    /// Shorthand for a missing row of the given entity
    pub fn not_found(resource_type: &str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::ValidationFailed(_) => ErrorCode::ValidationFailed,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::DuplicateName { .. } => ErrorCode::DuplicateName,
            AppError::DuplicateEmail { .. } => ErrorCode::DuplicateEmail,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Store(_) => ErrorCode::StoreError,
            AppError::Inconsistent { .. } => ErrorCode::Inconsistent,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::PasswordHash(_) => ErrorCode::InternalError,
            AppError::Session { .. } => ErrorCode::SessionError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 422 Unprocessable Entity, the form is re-rendered with messages
            AppError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,

            // 401 Unauthorized
            AppError::Unauthorized { .. } |
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::DuplicateName { .. } |
            AppError::DuplicateEmail { .. } => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 502 Bad Gateway
            AppError::Store(_) => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            AppError::Inconsistent { .. } |
            AppError::Internal { .. } |
            AppError::Serialization(_) |
            AppError::PasswordHash(_) |
            AppError::Session { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Convert a unique-constraint conflict into a field error on the owning form.
    ///
    /// Any other error is returned unchanged.
    pub fn into_field_error(self) -> Self {
        match self {
            AppError::DuplicateName { .. } => {
                let mut v = Validator::new();
                v.add_field_error("name", "An author with this name already exists");
                AppError::ValidationFailed(v)
            }
            AppError::DuplicateEmail { .. } => {
                let mut v = Validator::new();
                v.add_field_error("email", "Email address is already in use");
                AppError::ValidationFailed(v)
            }
            other => other,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_field_errors: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let (field_errors, non_field_errors) = match self {
            AppError::ValidationFailed(v) => v.into_parts(),
            _ => (BTreeMap::new(), Vec::new()),
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                field_errors,
                non_field_errors,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Session {
            message: err.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::not_found("quote", 7);
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Resource not found: quote with id 7");
    }

    #[test]
    fn test_validation_error() {
        let mut v = Validator::new();
        v.check_field(false, "title", "The title field cannot be blank");
        let err = AppError::ValidationFailed(v);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_inconsistent_is_server_error() {
        let err = AppError::Inconsistent {
            message: "2 rows for primary key".into()
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_duplicates_become_field_errors() {
        let err = AppError::DuplicateEmail { email: "a@b.co".into() }.into_field_error();
        match err {
            AppError::ValidationFailed(v) => {
                assert_eq!(v.field_error("email"), Some("Email address is already in use"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = AppError::InvalidCredentials.into_field_error();
        assert!(matches!(err, AppError::InvalidCredentials));
    }
}
