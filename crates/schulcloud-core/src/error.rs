//! Error types for directory operations.
//!
//! This module provides the error taxonomy shared by the Schul-Cloud backend
//! extensions, including stable error codes and a structured response shape
//! for the HTTP route handlers that consume these services.

use serde::Serialize;
use thiserror::Error;

/// Main error type for Schul-Cloud service operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// The directory server rejected a bind
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A required entry was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Protocol-level directory failure
    #[error("Directory error: {server}: {message}")]
    Directory {
        /// Identifier of the directory server that failed
        server: String,
        /// Error message
        message: String,
    },

    /// Operation exceeded its configured deadline
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Specialized result type for Schul-Cloud service operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Optional request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Directory { .. } => "DIRECTORY_ERROR",
            Self::Timeout(_) => "TIMEOUT",
        }
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        self.into_error_response_with_id(None)
    }

    /// Converts the error into an `ErrorResponse` with a request ID.
    #[must_use]
    pub fn into_error_response_with_id(self, request_id: Option<String>) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                details: None,
            },
            request_id,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Directory { .. } | Self::Timeout(_)
        )
    }
}

// Conversions from external error types
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::Configuration("test".to_string()).error_code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(
            Error::Validation("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            Error::Authentication("test".to_string()).error_code(),
            "AUTHENTICATION_ERROR"
        );
        assert_eq!(
            Error::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            Error::Directory {
                server: "test".to_string(),
                message: "msg".to_string()
            }
            .error_code(),
            "DIRECTORY_ERROR"
        );
        assert_eq!(Error::Timeout("test".to_string()).error_code(), "TIMEOUT");
    }

    #[test]
    fn test_error_display() {
        let err = Error::Authentication("bind rejected".to_string());
        assert_eq!(err.to_string(), "Authentication failed: bind rejected");

        let err = Error::Directory {
            server: "s1".to_string(),
            message: "connection failed".to_string(),
        };
        assert_eq!(err.to_string(), "Directory error: s1: connection failed");
    }

    #[test]
    fn test_into_error_response() {
        let err = Error::NotFound("user max".to_string());
        let response = err.clone().into_error_response();

        assert_eq!(response.error.code, "NOT_FOUND");
        assert_eq!(response.error.message, "Not found: user max");
        assert!(response.request_id.is_none());

        let response_with_id = err.into_error_response_with_id(Some("req-456".to_string()));
        assert_eq!(response_with_id.request_id, Some("req-456".to_string()));
    }

    #[test]
    fn test_should_log() {
        assert!(Error::Configuration("test".to_string()).should_log());
        assert!(Error::Timeout("test".to_string()).should_log());
        assert!(Error::Directory {
            server: "test".to_string(),
            message: "msg".to_string()
        }
        .should_log());

        assert!(!Error::NotFound("test".to_string()).should_log());
        assert!(!Error::Authentication("test".to_string()).should_log());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let core_err: Error = err.into();
        assert!(matches!(core_err, Error::Configuration(_)));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: ErrorDetail {
                code: "TEST_ERROR".to_string(),
                message: "Test message".to_string(),
                details: None,
            },
            request_id: Some("req-123".to_string()),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("TEST_ERROR"));
        assert!(json.contains("Test message"));
        assert!(json.contains("req-123"));
    }

    #[test]
    fn test_error_response_serialization_no_request_id() {
        let response = ErrorResponse {
            error: ErrorDetail {
                code: "TEST_ERROR".to_string(),
                message: "Test message".to_string(),
                details: None,
            },
            request_id: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("request_id"));
    }
}
