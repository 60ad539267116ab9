//! Error types and result aliases for the Quotient SDK.
//!
//! This module defines the core error type [`QuotientError`] and the [`Result`] type alias
//! used throughout the library. Remote failures carry the HTTP status code that produced
//! them so callers can branch on it with [`QuotientError::status`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuotientError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Authentication(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("unexpected status code: {status}. {message}")]
    Api {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0} is not configured, call init() first")]
    NotConfigured(String),

    #[error("Tracing error: {0}")]
    Tracing(String),
}

impl QuotientError {
    /// HTTP status code associated with this error, if it came from the API.
    pub fn status(&self) -> Option<u16> {
        match self {
            QuotientError::BadRequest(_) => Some(400),
            QuotientError::Authentication(_) => Some(401),
            QuotientError::PermissionDenied(_) => Some(403),
            QuotientError::NotFound(_) => Some(404),
            QuotientError::Conflict(_) => Some(409),
            QuotientError::RateLimit(_) => Some(429),
            QuotientError::Server { status, .. } | QuotientError::Api { status, .. } => {
                Some(*status)
            }
            QuotientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True for network-level failures where no response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, QuotientError::Connection(_) | QuotientError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, QuotientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = QuotientError::NotFound("the server can not find the requested resource.".to_string());
        assert_eq!(err.to_string(), "not found: the server can not find the requested resource.");
    }

    #[test]
    fn test_validation_display_is_bare_message() {
        let err = QuotientError::Validation("missing required fields: name".to_string());
        assert_eq!(err.to_string(), "missing required fields: name");
    }

    #[test]
    fn test_api_error_display() {
        let err = QuotientError::Api {
            status: 418,
            message: "contact support@quotientai.co for help.".to_string(),
            body: None,
        };
        assert_eq!(
            err.to_string(),
            "unexpected status code: 418. contact support@quotientai.co for help."
        );
    }

    #[test]
    fn test_not_configured_display() {
        let err = QuotientError::NotConfigured("Logger".to_string());
        assert_eq!(err.to_string(), "Logger is not configured, call init() first");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(QuotientError::Authentication("x".into()).status(), Some(401));
        assert_eq!(QuotientError::RateLimit("x".into()).status(), Some(429));
        assert_eq!(
            QuotientError::Server {
                status: 503,
                message: "x".into()
            }
            .status(),
            Some(503)
        );
        assert_eq!(QuotientError::Config("x".into()).status(), None);
    }

    #[test]
    fn test_transport_classification() {
        assert!(QuotientError::Timeout("x".into()).is_transport());
        assert!(QuotientError::Connection("x".into()).is_transport());
        assert!(!QuotientError::NotFound("x".into()).is_transport());
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: QuotientError = json_err.into();

        match err {
            QuotientError::Serialization(_) => {}
            _ => panic!("Expected Serialization"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QuotientError = io_err.into();

        match err {
            QuotientError::Io(_) => {}
            _ => panic!("Expected Io"),
        }
    }
}
