//! Error types for the family calendar backend
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Client errors carry the message shown to the caller. Upstream and
/// internal errors keep their source for the server log and expose only a
/// generic message.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed, replayed or invalid request (400)
    #[error("{0}")]
    Validation(String),

    /// Authentication required or rejected (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Access denied (403)
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// An upstream dependency (identity provider, user store, token signer)
    /// failed while serving the request (500)
    #[error("{message}")]
    Upstream {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Token page could not be produced (500)
    #[error("Template error: {0}")]
    Template(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error (500, fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Wrap an upstream failure with the message the client will see.
    pub fn upstream(message: &'static str, source: impl Into<anyhow::Error>) -> Self {
        AppError::Upstream {
            message,
            source: source.into(),
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream { .. }
            | AppError::Template(_)
            | AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let (error_message, error_type) = match &self {
            AppError::Validation(msg) => (msg.clone(), "validation"),
            AppError::Unauthorized(msg) => (msg.clone(), "unauthorized"),
            AppError::Forbidden(msg) => (msg.clone(), "forbidden"),
            AppError::NotFound(msg) => (msg.clone(), "not_found"),
            AppError::Upstream { message, source } => {
                tracing::error!(error = %source, "{}", message);
                (message.to_string(), "upstream")
            }
            AppError::Template(msg) => {
                tracing::error!(error = %msg, "Token page rendering failed");
                ("Failed to render token page".to_string(), "template")
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                ("Database error".to_string(), "database")
            }
            AppError::Config(msg) => (msg.clone(), "config"),
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                ("Internal server error".to_string(), "internal")
            }
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
