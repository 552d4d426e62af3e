//! Error types for AIVerse
//!
//! One taxonomy for every failure a request can hit. Each variant maps to a
//! fixed HTTP status and is rendered as `{ "success": false, "message": ... }`.

use hyper::StatusCode;

/// Main error type for AIVerse operations
#[derive(Debug, thiserror::Error)]
pub enum AiverseError {
    /// No identity token, or one that does not verify
    #[error("{0}")]
    Unauthenticated(String),

    /// Plan or free quota does not allow the operation
    #[error("{0}")]
    EntitlementDenied(String),

    /// Malformed, oversized or unreadable input
    #[error("{0}")]
    Validation(String),

    /// AI or media provider failed or timed out
    #[error("{0}")]
    Upstream(String),

    /// Unknown creation id
    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

impl AiverseError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::EntitlementDenied(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable kind, used in usage events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::EntitlementDenied(_) => "entitlement_denied",
            Self::Validation(_) => "validation",
            Self::Upstream(_) => "upstream",
            Self::NotFound(_) => "not_found",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = serde_json::json!({
            "success": false,
            "message": self.to_string(),
        });
        (status, body.to_string())
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for AiverseError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AiverseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("Invalid JSON: {}", err))
    }
}

impl From<hyper::Error> for AiverseError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<reqwest::Error> for AiverseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Upstream("Provider request timed out".into())
        } else {
            Self::Upstream(format!("Provider request failed: {}", err))
        }
    }
}

impl From<mongodb::error::Error> for AiverseError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AiverseError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthenticated(format!("JWT error: {}", err))
    }
}

/// Result type alias for AIVerse operations
pub type Result<T> = std::result::Result<T, AiverseError>;
