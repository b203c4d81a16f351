//! Unified error types for Scout
//!
//! Model and action failures are fatal to the session that raised them and are
//! never retried. Lifecycle failures are local rejections the caller may act on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TestStatus;

/// Maximum characters of a raw transport body kept in a [`ModelError`]
pub const MAX_ERROR_BODY_CHARS: usize = 2000;

/// Failure classes of the generative-model transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelErrorKind {
    RateLimited,
    Auth,
    Timeout,
    ServiceError,
    MalformedResponse,
}

impl ModelErrorKind {
    /// Classify an HTTP status code returned by the model endpoint
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            401 | 403 => Self::Auth,
            408 | 504 => Self::Timeout,
            _ => Self::ServiceError,
        }
    }
}

impl std::fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::Auth => write!(f, "AUTH"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::ServiceError => write!(f, "SERVICE_ERROR"),
            Self::MalformedResponse => write!(f, "MALFORMED_RESPONSE"),
        }
    }
}

/// Error surfaced by a ModelGateway call
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("model error {kind}{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
pub struct ModelError {
    pub kind: ModelErrorKind,
    /// Raw HTTP status when the failure came from the transport
    pub status: Option<u16>,
    /// Detail, including the truncated raw body where one exists
    pub message: String,
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Build an error from an HTTP status and raw response body
    pub fn from_http(status: u16, body: &str) -> Self {
        Self {
            kind: ModelErrorKind::from_status(status),
            status: Some(status),
            message: truncate_chars(body, MAX_ERROR_BODY_CHARS),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::MalformedResponse, message)
    }
}

/// Failure classes of browser actuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionErrorKind {
    SelectorNotFound,
    Timeout,
    DriverError,
}

impl std::fmt::Display for ActionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelectorNotFound => write!(f, "SELECTOR_NOT_FOUND"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::DriverError => write!(f, "DRIVER_ERROR"),
        }
    }
}

/// Error surfaced by an ActionExecutor call
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("action error {kind}: {message}")]
pub struct ActionError {
    pub kind: ActionErrorKind,
    pub message: String,
}

impl ActionError {
    pub fn new(kind: ActionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn selector_not_found(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::SelectorNotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Timeout, message)
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::DriverError, message)
    }
}

/// Test synthesis failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("NO_USABLE_TRACE: session {session_id} has no usable turns ({reason})")]
    NoUsableTrace { session_id: String, reason: String },
}

/// Test case lifecycle failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("invalid transition for '{name}': cannot {operation} a {from} test case")]
    InvalidTransition {
        name: String,
        from: TestStatus,
        operation: String,
    },

    #[error("test case not found: {0}")]
    NotFound(String),

    #[error("test case name '{name}' is reserved by a {status} test case")]
    NameReserved { name: String, status: TestStatus },

    #[error("test case '{0}' is deprecated and cannot be edited")]
    Immutable(String),
}

/// Unified error type for all Scout operations
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    // Browser lifecycle (launch) outside of a single action
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Capture store error: {0}")]
    Capture(String),

    #[error("Test runner error: {0}")]
    Runner(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using ScoutError
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Truncate a string to at most `max` characters on a char boundary
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...[truncated]", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ModelErrorKind::from_status(429), ModelErrorKind::RateLimited);
        assert_eq!(ModelErrorKind::from_status(401), ModelErrorKind::Auth);
        assert_eq!(ModelErrorKind::from_status(403), ModelErrorKind::Auth);
        assert_eq!(ModelErrorKind::from_status(504), ModelErrorKind::Timeout);
        assert_eq!(ModelErrorKind::from_status(500), ModelErrorKind::ServiceError);
        assert_eq!(ModelErrorKind::from_status(400), ModelErrorKind::ServiceError);
    }

    #[test]
    fn test_from_http_truncates_body() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 50);
        let err = ModelError::from_http(503, &body);
        assert_eq!(err.status, Some(503));
        assert!(err.message.ends_with("...[truncated]"));
        assert!(err.message.len() < body.len());
    }

    #[test]
    fn test_error_display_names_kind() {
        let err = ModelError::from_http(429, "quota exceeded");
        let text = err.to_string();
        assert!(text.contains("RATE_LIMITED"));
        assert!(text.contains("HTTP 429"));

        let err = ActionError::selector_not_found("no match for 'Sign in'");
        assert!(err.to_string().contains("SELECTOR_NOT_FOUND"));
    }

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&ModelErrorKind::MalformedResponse).unwrap();
        assert_eq!(json, "\"MALFORMED_RESPONSE\"");
        let json = serde_json::to_string(&ActionErrorKind::DriverError).unwrap();
        assert_eq!(json, "\"DRIVER_ERROR\"");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo", 2), "hé...[truncated]");
    }
}
