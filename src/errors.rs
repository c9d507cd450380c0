//! Unified error type for the service.
//!
//! Every fallible operation in `core` returns [`Result`]. The HTTP layer turns an
//! [`Error`] into a JSON body of the form `{"error": "..."}` with a matching status code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use thiserror::Error;

/// All errors that can occur while serving a request.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input
    #[error("{message}")]
    BadRequest {
        /// What was wrong with the input
        message: String,
    },

    /// No token, or a token that failed validation
    #[error("{message}")]
    Unauthenticated {
        /// Why authentication failed
        message: String,
    },

    /// The caller is authenticated but may not perform the action
    #[error("{message}")]
    Unauthorized {
        /// Why the action was refused
        message: String,
    },

    /// A referenced record does not exist
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of record (e.g. "Department")
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// A uniqueness rule would be violated
    #[error("{message}")]
    Conflict {
        /// Which rule was violated
        message: String,
    },

    /// Amount is zero, negative, NaN or infinite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Uploaded file was rejected
    #[error("Upload rejected: {message}")]
    Upload {
        /// Why the upload was rejected
        message: String,
    },

    /// The external text-generation call failed
    #[error("Assistant unavailable: {message}")]
    Assistant {
        /// Upstream failure description
        message: String,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// I/O error (upload storage, config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else that should never reach a client in detail
    #[error("Internal error: {message}")]
    Internal {
        /// Description for the logs
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::BadRequest`].
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::NotFound`] with a numeric id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// HTTP status code this error maps to.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } | Self::InvalidAmount { .. } | Self::Upload { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Unauthorized { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Assistant { .. } => StatusCode::BAD_GATEWAY,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Storage and config details stay in the logs
        let message = if status.is_server_error() {
            tracing::error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
