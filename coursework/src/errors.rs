use crate::db::errors::DbError;
use crate::types::Permission;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed input (email, username, password shape, unknown permission tag)
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Another account already uses this email
    #[error("Email already exists")]
    EmailAlreadyExists,

    /// Another account already uses this username
    #[error("Username already exists")]
    UsernameAlreadyExists,

    /// Login failed. Deliberately does not say whether the email or the password was wrong.
    #[error("Wrong credentials")]
    WrongCredentials,

    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated,

    /// Valid session, missing permission
    #[error("Missing permission {permission}")]
    Forbidden { permission: Permission },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// A stored password hash could not be parsed
    #[error("Stored credential is malformed")]
    CorruptCredential,

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl Error {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::EmailAlreadyExists | Error::UsernameAlreadyExists => StatusCode::CONFLICT,
            Error::WrongCredentials => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::CorruptCredential | Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// The form field a client should attach this error to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Error::Validation { field, .. } => Some(field),
            Error::EmailAlreadyExists => Some("email"),
            Error::UsernameAlreadyExists => Some("username"),
            Error::Database(db_err) if db_err.is_unique_violation_on("email") => Some("email"),
            Error::Database(db_err) if db_err.is_unique_violation_on("username") => Some("username"),
            _ => None,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message, .. } => message.clone(),
            Error::EmailAlreadyExists => "An account with this email address already exists".to_string(),
            Error::UsernameAlreadyExists => "This username is already taken".to_string(),
            Error::WrongCredentials => "Incorrect email or password".to_string(),
            Error::Unauthenticated => "Authentication required".to_string(),
            Error::Forbidden { .. } => "You do not have permission to perform this action".to_string(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::CorruptCredential | Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } if db_err.is_unique_violation_on("email") => {
                    "An account with this email address already exists".to_string()
                }
                DbError::UniqueViolation { .. } if db_err.is_unique_violation_on("username") => "This username is already taken".to_string(),
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) | Error::CorruptCredential => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated | Error::Forbidden { .. } | Error::WrongCredentials => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Validation { .. } | Error::NotFound { .. } | Error::EmailAlreadyExists | Error::UsernameAlreadyExists => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorBody {
            message: self.user_message(),
            field: self.field(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
