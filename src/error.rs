use std::borrow::Cow;

use axum::Json;
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionError;

/// Message sent to clients for every 5xx failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// Message sent to clients for a 4xx failure that carries no message of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed";

/// Message of the routing-miss envelope.
pub const NOT_FOUND_MESSAGE: &str = "Not Found";

/// Application-wide error types.
///
/// Every variant resolves to a status code and an optional machine-readable
/// code. Failures of 500 and above never reach the client with their own text;
/// see [`AppError::client_message`].
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    /// A failure with an explicit status and optional code and message.
    #[error("{}", .message.as_deref().unwrap_or("request failed"))]
    Status {
        status: StatusCode,
        code: Option<String>,
        message: Option<String>,
    },

    #[error("Failed to read request body: {0}")]
    Body(#[from] BytesRejection),

    #[error("Session store error: {0}")]
    Session(#[from] SessionError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Build a [`AppError::Status`] failure with a message.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        AppError::Status {
            status,
            code: None,
            message: Some(message.into()),
        }
    }

    /// Attach a machine-readable code. Only [`AppError::Status`] carries a custom code.
    pub fn with_code(self, code: impl Into<String>) -> Self {
        match self {
            AppError::Status {
                status, message, ..
            } => AppError::Status {
                status,
                code: Some(code.into()),
                message,
            },
            other => other,
        }
    }

    /// Status code resolved from the error, 500 when it carries none.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Status { status, .. } => *status,
            AppError::Body(rejection) => rejection.status(),
            AppError::Session(_)
            | AppError::SerializationError(_)
            | AppError::Internal(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Optional machine-readable code.
    pub fn code(&self) -> Option<&str> {
        match self {
            AppError::Status { code, .. } => code.as_deref(),
            AppError::Body(_) => Some("invalid_body"),
            AppError::Session(_) => Some("session_unavailable"),
            _ => None,
        }
    }

    /// User-facing message.
    ///
    /// 5xx failures always read [`INTERNAL_ERROR_MESSAGE`]; client failures keep
    /// their own message, or [`GENERIC_FAILURE_MESSAGE`] when they have none.
    pub fn client_message(&self) -> Cow<'_, str> {
        if self.status_code().is_server_error() {
            return Cow::Borrowed(INTERNAL_ERROR_MESSAGE);
        }

        let own = match self {
            AppError::NotFound(msg) => Some(Cow::Borrowed(msg.as_str())),
            AppError::Status { message, .. } => message.as_deref().map(Cow::Borrowed),
            AppError::Body(rejection) => Some(Cow::Owned(rejection.body_text())),
            _ => None,
        };

        match own {
            Some(msg) if !msg.is_empty() => msg,
            _ => Cow::Borrowed(GENERIC_FAILURE_MESSAGE),
        }
    }
}

/// JSON error envelope: `{"error":{"message":..,"code":..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

/// Inner part of [`ErrorEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                code,
            },
        }
    }
}

/// Details of a converted [`AppError`], attached to the response extensions.
///
/// The error-reporting middleware picks it up and writes the log record, so
/// the deployment mode decides what gets logged in one place.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub code: Option<String>,
    /// `Display` rendering of the error.
    pub error: String,
    /// `Debug` rendering, including the source chain.
    pub stack: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code().map(str::to_string);
        let body = ErrorEnvelope::new(self.client_message(), code.clone());

        let report = ErrorReport {
            status,
            code,
            error: self.to_string(),
            stack: format!("{self:?}"),
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
