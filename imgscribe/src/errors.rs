use crate::db::{errors::DbError, store::USERNAME_UNIQUE_CONSTRAINT};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error as ThisError;

/// External collaborators whose failures surface as generic 500s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    ObjectStore,
    Describer,
    RecordStore,
    Email,
}

impl Upstream {
    /// Message shown to clients; details stay in the logs
    pub fn client_message(&self) -> &'static str {
        match self {
            Upstream::ObjectStore => "Failed to upload image",
            Upstream::Describer => "Internal server error",
            Upstream::RecordStore => "Failed to save data",
            Upstream::Email => "Error sending email",
        }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::ObjectStore => write!(f, "object store"),
            Upstream::Describer => write!(f, "describer"),
            Upstream::RecordStore => write!(f, "record store"),
            Upstream::Email => write!(f, "email"),
        }
    }
}

#[derive(ThisError, Debug)]
pub enum Error {
    /// Credentials did not match a user
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{message}")]
    NotFound { message: String },

    /// An external service call failed
    #[error("{service} call failed: {source:#}")]
    Upstream {
        service: Upstream,
        #[source]
        source: anyhow::Error,
    },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),
}

impl Error {
    pub fn upstream(service: Upstream, source: impl Into<anyhow::Error>) -> Self {
        Error::Upstream {
            service,
            source: source.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Upstream { .. } | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { constraint, .. } if constraint.as_deref() == Some(USERNAME_UNIQUE_CONSTRAINT) => {
                    StatusCode::BAD_REQUEST
                }
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Invalid credentials".to_string()),
            Error::BadRequest { message } | Error::NotFound { message } => message.clone(),
            Error::Upstream { service, .. } => service.client_message().to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, .. } => match constraint.as_deref() {
                    Some(USERNAME_UNIQUE_CONSTRAINT) => "Username already exists".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::Other(_) => "Internal server error".to_string(),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Upstream { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } => {
                tracing::info!("Authentication failed: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let message = self.user_message();

        let body = match &self {
            Error::Unauthenticated { .. } => json!({ "success": false, "message": message }),
            _ if status.is_server_error() => json!({ "error": message }),
            _ => json!({ "message": message }),
        };

        (status, Json(body)).into_response()
    }
}
