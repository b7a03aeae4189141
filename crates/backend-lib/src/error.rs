// ============================
// crates/backend-lib/src/error.rs
// ============================

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("System already initialized")]
    AlreadyInitialized,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Authentication rate limit exceeded")]
    AuthRateLimited,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyInitialized
            | AppError::InvalidInput(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded | AppError::AuthRateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "AUTH_001",
            AppError::InvalidCredentials => "AUTH_002",
            AppError::AuthRateLimited => "AUTH_003",
            AppError::Forbidden(_) => "AUTH_004",
            AppError::AlreadyInitialized => "SETUP_001",
            AppError::Internal(_) => "INT_001",
            AppError::NotFound(_) => "NF_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
            AppError::RateLimitExceeded => "RATE_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Validation(_) => "VAL_002",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Auth(msg) => msg.clone(),
            AppError::InvalidCredentials => "Invalid username or password".to_string(),
            AppError::AuthRateLimited => {
                "Too many login attempts, please try again later".to_string()
            },
            AppError::Forbidden(_) => "Insufficient permissions".to_string(),
            AppError::AlreadyInitialized => {
                "System already initialized, setup cannot be repeated".to_string()
            },
            AppError::Internal(_) => "An internal server error occurred".to_string(),
            AppError::Json(_) => "Internal server error".to_string(),
            AppError::Io(_) => "Internal server error".to_string(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::RateLimitExceeded => {
                "Too many requests, please try again later".to_string()
            },
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Validation(_) => "Data validation failed".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) && status.is_server_error() {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let mut body = serde_json::json!({
            "success": false,
            "message": message,
            "error": {
                "code": error_code,
                "message": message,
            }
        });
        if let AppError::Validation(errors) = &self {
            body["errors"] = serde_json::json!(errors);
        }

        (status, axum::Json(body)).into_response()
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
