//! Error types for the EventHub server.
//!
//! [`ServerError`] is what every handler returns. It renders as a JSON body
//! `{"error": "...", "code": "..."}` with a matching status code. Denials
//! carry no detail about why a credential was rejected; that detail is only
//! logged.
//!
//! # Example
//!
//! ```rust
//! use axum::http::StatusCode;
//! use axum::response::IntoResponse;
//! use eventhub_server::error::ServerError;
//!
//! let response = ServerError::validation("title cannot be empty").into_response();
//! assert_eq!(response.status(), StatusCode::BAD_REQUEST);
//! ```

use std::error::Error;
use std::fmt;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::access::AccessError;
use crate::board::BoardError;
use crate::directory::DirectoryError;

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,

    /// Stable machine-readable code.
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Top-level error type for request handling.
#[derive(Debug)]
pub enum ServerError {
    /// No credential, or one that failed verification.
    Unauthenticated,

    /// Authenticated, but the role is not permitted.
    Forbidden,

    /// The request body or parameters are invalid.
    Validation(String),

    /// The requested resource does not exist.
    NotFound(String),

    /// Too many attempts. The client should retry after `retry_after` seconds.
    RateLimit {
        /// Seconds until the next attempt is allowed.
        retry_after: u64,
    },

    /// Unexpected internal failure. The message is logged, never returned.
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "authentication required"),
            Self::Forbidden => write!(f, "access forbidden"),
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::RateLimit { retry_after } => {
                write!(f, "rate limit exceeded, retry after {retry_after} seconds")
            }
            Self::Internal(msg) => write!(f, "internal server error: {msg}"),
        }
    }
}

impl Error for ServerError {}

impl ServerError {
    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a new not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code placed in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::RateLimit { .. } => "rate_limited",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Returns `true` if this error indicates a client-side problem.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Returns `true` if this error indicates a server-side problem.
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::NotFound(msg) => msg.clone(),
            Self::RateLimit { .. } => "too many attempts".to_string(),
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let status = self.status();
        let body = ErrorResponse::new(self.public_message(), self.code());
        let mut response = (status, Json(body)).into_response();

        if let Self::RateLimit { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        response
    }
}

impl From<AccessError> for ServerError {
    fn from(err: AccessError) -> Self {
        if err.is_unauthenticated() {
            Self::Unauthenticated
        } else {
            Self::Forbidden
        }
    }
}

impl From<BoardError> for ServerError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::NotFound(_) => Self::NotFound(err.to_string()),
            BoardError::Validation(msg) => Self::Validation(msg),
        }
    }
}

impl From<DirectoryError> for ServerError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::InvalidCredentials => Self::Unauthenticated,
            DirectoryError::InvalidEntry(msg) => Self::Internal(msg),
        }
    }
}

/// A specialized Result type for handlers.
pub type Result<T> = std::result::Result<T, ServerError>;
