//! Error types for the Batchflow clients

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the remote services
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The resource being created already exists
    ///
    /// Raised for the pool and job idempotency codes only; callers fall
    /// back to reading the existing resource.
    #[error("Already exists ({code}): {message}")]
    AlreadyExists {
        /// Remote error code (`PoolExists` or `JobExists`)
        code: String,
        /// Error message from the service
        message: String,
    },

    /// API returned an error status code
    #[error("API error (status {status}, code {}): {message}", .code.as_deref().unwrap_or("none"))]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Remote error code, when the body carried one
        code: Option<String>,
        /// Error message from the API
        message: String,
    },

    /// The service refused one task of an add-collection call
    #[error("Task '{task_id}' rejected ({}): {message}", .code.as_deref().unwrap_or("none"))]
    TaskRejected {
        task_id: String,
        code: Option<String>,
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Token acquisition failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Building a shared access signature failed
    #[error("Signing failed: {0}")]
    SigningError(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Create an API error from status code, remote code and message
    pub fn api_error(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    /// Check if this error is an idempotent "already exists" condition
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }

    /// Remote-provided error code, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::AlreadyExists { code, .. } => Some(code),
            Self::ApiError { code, .. } | Self::TaskRejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
