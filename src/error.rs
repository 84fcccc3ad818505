//! Error types for the dashboard service
//!
//! Every failure a request can hit is folded into [`DashboardError`], which
//! knows its HTTP status and how to render itself as the JSON error body the
//! front end expects.

use crate::ingest::transform::{RejectedRow, TransformSummary};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use warp::http::StatusCode;

/// Main error type for dashboard operations
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("File has invalid headers: {}", errors.join("; "))]
    InvalidHeaders {
        required: Vec<String>,
        missing: Vec<String>,
        errors: Vec<String>,
    },

    #[error("No valid data rows after transformation")]
    NoValidRows {
        rejected: Vec<RejectedRow>,
        summary: TransformSummary,
    },

    #[error("File processing failed: {message}")]
    Decode { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] crate::store::StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// JSON error body returned by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_rows: Option<Vec<RejectedRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<TransformSummary>,
}

impl ErrorBody {
    fn plain(error: String, details: Option<String>) -> Self {
        Self {
            success: false,
            error,
            details,
            required_headers: None,
            missing_headers: None,
            all_errors: None,
            rejected_rows: None,
            summary: None,
        }
    }
}

impl DashboardError {
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. }
            | Self::Conflict { .. }
            | Self::InvalidHeaders { .. }
            | Self::NoValidRows { .. }
            | Self::Decode { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Config(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Render the error as the API's JSON error body
    pub fn to_error_body(&self) -> ErrorBody {
        match self {
            Self::InvalidInput { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::Conflict { message } => {
                ErrorBody::plain(sanitize_error_message(message), None)
            }
            Self::InvalidHeaders {
                required,
                missing,
                errors,
            } => ErrorBody {
                required_headers: Some(required.clone()),
                missing_headers: Some(missing.clone()),
                all_errors: Some(errors.clone()),
                ..ErrorBody::plain(
                    "File has invalid headers".to_string(),
                    Some("The uploaded file does not have all required columns.".to_string()),
                )
            },
            Self::NoValidRows { rejected, summary } => ErrorBody {
                rejected_rows: Some(rejected.clone()),
                summary: Some(summary.clone()),
                ..ErrorBody::plain(
                    "No valid data rows after transformation".to_string(),
                    Some("All data rows were rejected during processing.".to_string()),
                )
            },
            Self::Decode { message } => ErrorBody::plain(
                "File processing failed".to_string(),
                Some(sanitize_error_message(message)),
            ),
            Self::Storage(e) => ErrorBody::plain(
                "A database error occurred.".to_string(),
                Some(sanitize_error_message(&e.to_string())),
            ),
            Self::Config(e) => ErrorBody::plain(
                "Configuration error".to_string(),
                Some(sanitize_error_message(&e.to_string())),
            ),
            Self::Internal { message } => ErrorBody::plain(
                "Internal server error".to_string(),
                Some(sanitize_error_message(message)),
            ),
        }
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern is valid")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("path pattern is valid")
});

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Redact credentials and sensitive paths, and cap the message length
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_ERROR_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for dashboard operations
pub type DashboardResult<T> = Result<T, DashboardError>;
